// src/system/multiplexer.rs

//! # Event Multiplexer
//!
//! Fans several blocking sources into one ordered feed of [`Event`]s.
//!
//! Every source runs on its own thread and hands events over a rendezvous
//! channel (capacity zero). A worker therefore cannot start its next read
//! until the consumer has taken the previous event, so each source has at
//! most one event in flight. Whichever worker is ready first is delivered
//! first; there is no fixed polling order.
//!
//! A source that is exhausted or failed simply ends its thread and drops its
//! sender. When every sender is gone the feed ends.

use crate::{
    CancellationToken,
    models::{Event, MuxEvent, Stream},
    system::{
        reader::{FollowFile, LineReader, ReadOutcome},
        supervisor::{ExitWatcher, TraceChannel},
    },
};
use std::fs::File;
use std::io::{self, ErrorKind, Read};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::sync::Arc;
use std::thread;

/// Collects sources, then turns into an [`EventFeed`].
#[derive(Debug)]
pub struct Multiplexer {
    tx: SyncSender<Event>,
    rx: Receiver<Event>,
    cancellation_token: CancellationToken,
}

impl Multiplexer {
    /// An empty multiplexer. Workers stop early once `cancellation_token` is set.
    pub fn new(cancellation_token: CancellationToken) -> Self {
        let (tx, rx) = mpsc::sync_channel(0);
        Self {
            tx,
            rx,
            cancellation_token,
        }
    }

    /// Reads `source` line by line on a dedicated thread.
    pub fn attach_reader<R>(&self, stream: Stream, source: R) -> io::Result<()>
    where
        R: Read + Send + 'static,
    {
        let tx = self.tx.clone();
        thread::Builder::new()
            .name(format!("loupe-{}", stream.label()))
            .spawn(move || pump(stream, LineReader::new(source), &tx))?;
        Ok(())
    }

    /// Attaches the tracer's output channel lazily.
    ///
    /// The worker keeps trying to open the channel until it succeeds: a plain
    /// file may not exist yet and a fifo open blocks until the tracer opens
    /// its end. Only once opened is the channel read like any other source.
    pub fn attach_trace(&self, channel: TraceChannel) -> io::Result<()> {
        // Set once the worker is past opening the channel, whatever the outcome.
        let settled = Arc::new(AtomicBool::new(false));

        if channel.is_fifo {
            // If the tracer dies before opening the fifo, our open would
            // block forever. Once the process is gone, keep offering a writer
            // until the worker has opened: the release only lands while the
            // worker is actually blocked in `open`.
            let channel = channel.clone();
            let settled = Arc::clone(&settled);
            thread::Builder::new()
                .name("loupe-trace-release".to_string())
                .spawn(move || {
                    let _ = channel.watcher.wait();
                    while !settled.load(Ordering::SeqCst) && channel.path.exists() {
                        if channel.release_pending_reader() {
                            return;
                        }
                        thread::sleep(channel.retry_interval);
                    }
                })?;
        }

        let tx = self.tx.clone();
        let cancellation_token = Arc::clone(&self.cancellation_token);
        thread::Builder::new()
            .name("loupe-strace".to_string())
            .spawn(move || {
                let opened = open_trace_channel(&channel, &cancellation_token);
                settled.store(true, Ordering::SeqCst);
                let file = match opened {
                    Ok(Some(file)) => file,
                    Ok(None) => return,
                    Err(e) => {
                        log::warn!(
                            "Could not open trace channel '{}': {}",
                            channel.path.display(),
                            e
                        );
                        let _ = tx.send(MuxEvent::SourceFailed(Stream::Trace, e).into());
                        return;
                    }
                };
                log::debug!("Attached to trace channel '{}'", channel.path.display());

                if channel.is_fifo {
                    pump(Stream::Trace, LineReader::new(file), &tx);
                } else {
                    let watcher = channel.watcher.clone();
                    let follow = FollowFile::new(
                        file,
                        move || {
                            watcher.try_status().is_some()
                                || cancellation_token.load(Ordering::SeqCst)
                        },
                        channel.retry_interval,
                    );
                    pump(Stream::Trace, LineReader::new(follow), &tx);
                }
            })?;
        Ok(())
    }

    /// Delivers `ProcessExited` once the process is reaped.
    pub fn attach_exit_watcher(&self, watcher: ExitWatcher) -> io::Result<()> {
        let tx = self.tx.clone();
        thread::Builder::new()
            .name("loupe-exit".to_string())
            .spawn(move || {
                if let Some(code) = watcher.wait() {
                    log::debug!("Traced process exited with code {}", code);
                    let _ = tx.send(MuxEvent::ProcessExited(code).into());
                }
            })?;
        Ok(())
    }

    /// A handle for producers outside the multiplexer, such as the input thread.
    pub fn input_handle(&self) -> InputHandle {
        InputHandle {
            tx: self.tx.clone(),
        }
    }

    /// Stops accepting sources. The feed ends once every attached source
    /// and every input handle is gone.
    pub fn into_feed(self) -> EventFeed {
        EventFeed { rx: self.rx }
    }
}

/// Sends events into the feed from outside the multiplexer.
#[derive(Debug, Clone)]
pub struct InputHandle {
    tx: SyncSender<Event>,
}

impl InputHandle {
    /// Blocks until the loop takes the event. Fails once the loop is gone.
    pub fn send(&self, event: impl Into<Event>) -> Result<(), Event> {
        self.tx.send(event.into()).map_err(|e| e.0)
    }
}

/// The consumer side of the multiplexer.
#[derive(Debug)]
pub struct EventFeed {
    rx: Receiver<Event>,
}

impl EventFeed {
    /// Blocks until any source has an event. `None` once all sources are gone.
    pub fn next(&self) -> Option<Event> {
        self.rx.recv().ok()
    }

    /// Returns an event only if a source is ready to hand one over right now.
    pub fn try_next(&self) -> Option<Event> {
        self.rx.try_recv().ok()
    }
}

/// Reads lines until the source ends, forwarding each as an event.
fn pump<R: Read>(stream: Stream, mut reader: LineReader<R>, tx: &SyncSender<Event>) {
    loop {
        let (event, is_last) = match reader.next_line() {
            ReadOutcome::Line(text) => (MuxEvent::OutputLine(stream, text), false),
            ReadOutcome::Exhausted => {
                log::debug!("Source '{}' exhausted.", stream);
                (MuxEvent::SourceExhausted(stream), true)
            }
            ReadOutcome::Failed(e) => {
                log::warn!("Source '{}' failed: {}", stream, e);
                (MuxEvent::SourceFailed(stream, e), true)
            }
        };

        if tx.send(event.into()).is_err() {
            log::debug!("Session loop gone, abandoning source '{}'.", stream);
            return;
        }
        if is_last {
            return;
        }
    }
}

/// Opens the trace channel, retrying while it is not there yet.
///
/// Returns `Ok(None)` if the session is cancelled before the channel opens.
fn open_trace_channel(
    channel: &TraceChannel,
    cancellation_token: &CancellationToken,
) -> io::Result<Option<File>> {
    let mut attempts: u64 = 0;
    loop {
        if cancellation_token.load(Ordering::SeqCst) {
            return Ok(None);
        }
        match File::open(&channel.path) {
            Ok(file) => return Ok(Some(file)),
            Err(e) if matches!(
                e.kind(),
                ErrorKind::NotFound | ErrorKind::Interrupted | ErrorKind::WouldBlock
            ) =>
            {
                attempts += 1;
                if attempts == 1 || attempts % 100 == 0 {
                    log::debug!(
                        "Trace channel '{}' not readable yet ({}), attempt {}.",
                        channel.path.display(),
                        e,
                        attempts
                    );
                }
                thread::sleep(channel.retry_interval);
            }
            Err(e) => return Err(e),
        }
    }
}
