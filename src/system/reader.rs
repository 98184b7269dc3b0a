// src/system/reader.rs

//! Blocking line readers over pipes, fifos and growing files.

use std::io::{self, BufRead, BufReader, Read};
use std::thread;
use std::time::Duration;

/// Result of pulling one line from a [`LineReader`].
#[derive(Debug)]
pub enum ReadOutcome {
    /// A complete line with its `\n` or `\r\n` terminator removed.
    Line(String),
    /// End of stream. Every later call returns this again.
    Exhausted,
    /// The underlying read failed. Bytes read before the failure were already
    /// returned as a final `Line`. Every later call returns `Exhausted`.
    Failed(io::Error),
}

/// Blocking line reader over one byte source.
///
/// Lines have no length limit; a very long line is buffered in full. Invalid
/// UTF-8 is replaced rather than rejected, since the text is only displayed.
#[derive(Debug)]
pub struct LineReader<R> {
    inner: BufReader<R>,
    buf: Vec<u8>,
    pending_error: Option<io::Error>,
    done: bool,
}

impl<R: Read> LineReader<R> {
    /// Wraps a readable source.
    pub fn new(source: R) -> Self {
        Self {
            inner: BufReader::new(source),
            buf: Vec::new(),
            pending_error: None,
            done: false,
        }
    }

    /// Blocks until the next line, end-of-stream or an I/O failure.
    ///
    /// A final line without a terminator is still returned before `Exhausted`.
    pub fn next_line(&mut self) -> ReadOutcome {
        if self.done {
            return ReadOutcome::Exhausted;
        }
        if let Some(e) = self.pending_error.take() {
            self.done = true;
            return ReadOutcome::Failed(e);
        }

        self.buf.clear();
        loop {
            match self.inner.read_until(b'\n', &mut self.buf) {
                Ok(0) if self.buf.is_empty() => {
                    self.done = true;
                    return ReadOutcome::Exhausted;
                }
                Ok(_) => return ReadOutcome::Line(decode_line(&self.buf)),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) if !self.buf.is_empty() => {
                    self.pending_error = Some(e);
                    return ReadOutcome::Line(decode_line(&self.buf));
                }
                Err(e) => {
                    self.done = true;
                    return ReadOutcome::Failed(e);
                }
            }
        }
    }

    /// Returns `true` once the reader has reached a terminal state.
    pub fn is_done(&self) -> bool {
        self.done
    }
}

/// Reads a plain file that another process is still appending to.
///
/// On end-of-file it sleeps and retries until `finished` reports that the
/// writer is gone; one last read then picks up anything written just before.
#[derive(Debug)]
pub struct FollowFile<R, F> {
    inner: R,
    finished: F,
    retry: Duration,
}

impl<R: Read, F: Fn() -> bool> FollowFile<R, F> {
    /// Follows `inner`, polling every `retry` until `finished` returns `true`.
    pub fn new(inner: R, finished: F, retry: Duration) -> Self {
        Self {
            inner,
            finished,
            retry,
        }
    }
}

impl<R: Read, F: Fn() -> bool> Read for FollowFile<R, F> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            let n = self.inner.read(buf)?;
            if n > 0 || buf.is_empty() {
                return Ok(n);
            }
            if (self.finished)() {
                return self.inner.read(buf);
            }
            thread::sleep(self.retry);
        }
    }
}

fn decode_line(raw: &[u8]) -> String {
    let line = raw.strip_suffix(b"\n").unwrap_or(raw);
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    String::from_utf8_lossy(line).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    /// Yields its payload once, then fails on every read.
    struct FailingSource {
        payload: Option<Vec<u8>>,
    }

    impl Read for FailingSource {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.payload.take() {
                Some(bytes) => {
                    let n = bytes.len().min(buf.len());
                    buf[..n].copy_from_slice(&bytes[..n]);
                    Ok(n)
                }
                None => Err(io::Error::new(io::ErrorKind::BrokenPipe, "pipe gone")),
            }
        }
    }

    fn line(outcome: ReadOutcome) -> String {
        match outcome {
            ReadOutcome::Line(text) => text,
            other => panic!("expected a line, got {:?}", other),
        }
    }

    #[test]
    fn test_reads_lines_in_order_and_strips_terminators() {
        let mut reader = LineReader::new(Cursor::new("one\ntwo\r\n\nthree\n"));
        assert_eq!(line(reader.next_line()), "one");
        assert_eq!(line(reader.next_line()), "two");
        assert_eq!(line(reader.next_line()), "");
        assert_eq!(line(reader.next_line()), "three");
        assert!(matches!(reader.next_line(), ReadOutcome::Exhausted));
    }

    #[test]
    fn test_unterminated_last_line_is_returned() {
        let mut reader = LineReader::new(Cursor::new("tail"));
        assert_eq!(line(reader.next_line()), "tail");
        assert!(matches!(reader.next_line(), ReadOutcome::Exhausted));
    }

    #[test]
    fn test_exhaustion_is_idempotent() {
        let mut reader = LineReader::new(Cursor::new(""));
        for _ in 0..3 {
            assert!(matches!(reader.next_line(), ReadOutcome::Exhausted));
        }
        assert!(reader.is_done());
    }

    #[test]
    fn test_failure_is_reported_once_then_exhausted() {
        let mut reader = LineReader::new(FailingSource {
            payload: Some(b"first\n".to_vec()),
        });
        assert_eq!(line(reader.next_line()), "first");
        match reader.next_line() {
            ReadOutcome::Failed(e) => assert_eq!(e.kind(), io::ErrorKind::BrokenPipe),
            other => panic!("expected failure, got {:?}", other),
        }
        assert!(matches!(reader.next_line(), ReadOutcome::Exhausted));
    }

    #[test]
    fn test_partial_line_before_failure_is_kept() {
        let mut reader = LineReader::new(FailingSource {
            payload: Some(b"first\nhalf a li".to_vec()),
        });
        assert_eq!(line(reader.next_line()), "first");
        assert_eq!(line(reader.next_line()), "half a li");
        assert!(matches!(reader.next_line(), ReadOutcome::Failed(_)));
        assert!(matches!(reader.next_line(), ReadOutcome::Exhausted));
        assert!(reader.is_done());
    }

    #[test]
    fn test_long_lines_are_not_truncated() {
        let long = "x".repeat(1 << 20);
        let mut reader = LineReader::new(Cursor::new(format!("{long}\n")));
        assert_eq!(line(reader.next_line()).len(), long.len());
    }

    #[test]
    fn test_invalid_utf8_is_replaced() {
        let mut reader = LineReader::new(Cursor::new(vec![b'a', 0xff, b'b', b'\n']));
        assert_eq!(line(reader.next_line()), "a\u{fffd}b");
    }

    #[test]
    fn test_follow_file_picks_up_appended_lines() {
        use std::fs::OpenOptions;
        use std::io::Write;
        use std::sync::Arc;
        use std::sync::atomic::{AtomicBool, Ordering};

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trace");
        std::fs::write(&path, "first\n").unwrap();

        let finished = Arc::new(AtomicBool::new(false));
        let writer = {
            let path = path.clone();
            let finished = Arc::clone(&finished);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(30));
                let mut file = OpenOptions::new().append(true).open(path).unwrap();
                file.write_all(b"second\n").unwrap();
                finished.store(true, Ordering::SeqCst);
            })
        };

        let file = std::fs::File::open(&path).unwrap();
        let follow = FollowFile::new(
            file,
            move || finished.load(Ordering::SeqCst),
            Duration::from_millis(5),
        );
        let mut reader = LineReader::new(follow);
        assert_eq!(line(reader.next_line()), "first");
        assert_eq!(line(reader.next_line()), "second");
        assert!(matches!(reader.next_line(), ReadOutcome::Exhausted));
        writer.join().unwrap();
    }
}
