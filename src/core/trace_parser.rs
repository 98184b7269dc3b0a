// src/core/trace_parser.rs

//! Extracts structured facts from raw tracer lines.
//!
//! Only two shapes are recognized: a file-open family call and a `connect`
//! call carrying an IP address literal. Everything else is opaque text that
//! is still displayed verbatim by the caller.

use crate::models::TraceEvent;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // strace prefixes lines with the pid when following forks: `[pid 42] ` or `42 `.
    // `openat`/`openat2` take a dirfd first, so the path sits in the second field.
    static ref OPENAT_RE: Regex = Regex::new(
        r#"^(?:\[pid\s+\d+\]\s+|\d+\s+)?openat2?\([^,]*,\s*"((?:[^"\\]|\\.)*)""#
    )
    .unwrap();
    static ref OPEN_RE: Regex = Regex::new(
        r#"^(?:\[pid\s+\d+\]\s+|\d+\s+)?(?:open|creat)\("((?:[^"\\]|\\.)*)""#
    )
    .unwrap();
    static ref CONNECT_INET_RE: Regex = Regex::new(
        r#"^(?:\[pid\s+\d+\]\s+|\d+\s+)?connect\(.*sin_addr=inet_addr\("([^"]*)"\)"#
    )
    .unwrap();
    static ref CONNECT_INET6_RE: Regex = Regex::new(
        r#"^(?:\[pid\s+\d+\]\s+|\d+\s+)?connect\(.*inet_pton\(AF_INET6,\s*"([^"]*)""#
    )
    .unwrap();
}

/// Parses one tracer line into zero or one [`TraceEvent`].
///
/// A line that matches neither shape yields `None`; that is not an error.
pub fn parse_line(line: &str) -> Option<TraceEvent> {
    if let Some(path) = OPENAT_RE
        .captures(line)
        .or_else(|| OPEN_RE.captures(line))
        .and_then(|caps| caps.get(1))
    {
        return Some(TraceEvent::FileOpened {
            path: path.as_str().to_string(),
        });
    }

    CONNECT_INET_RE
        .captures(line)
        .or_else(|| CONNECT_INET6_RE.captures(line))
        .and_then(|caps| caps.get(1))
        .map(|address| TraceEvent::ConnectionAttempted {
            address: address.as_str().to_string(),
        })
}
