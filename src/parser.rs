//! Access log record parser.
//!
//! Converts one comma-delimited line
//! `<address>,<YYYY-MM-DD HH:MM>,<path>,<status>,<agent>` into a
//! [`LogRecord`]. Address, path and agent are kept as opaque text.

use std::fmt;

use chrono::NaiveDateTime;
use serde::{Serialize, Serializer};

use crate::error::ParseError;

pub const DELIMITER: char = ',';

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M";
const TIMESTAMP_LEN: usize = 16;

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Minute-precision point in time.
///
/// Ordering is chronological, which for the zero-padded textual form is
/// also lexicographic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(NaiveDateTime);

impl Timestamp {
    /// Parse the exact `YYYY-MM-DD HH:MM` shape. Seconds, single-digit
    /// components and surrounding whitespace are rejected.
    pub fn parse(s: &str) -> Option<Self> {
        if !has_timestamp_shape(s.as_bytes()) {
            return None;
        }
        NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT)
            .ok()
            .map(Timestamp)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(TIMESTAMP_FORMAT))
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// One web request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub address: String,
    pub timestamp: Timestamp,
    pub path: String,
    pub status: u16,
    pub agent: String,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn has_timestamp_shape(b: &[u8]) -> bool {
    if b.len() != TIMESTAMP_LEN {
        return false;
    }
    b.iter().enumerate().all(|(i, &c)| match i {
        4 | 7 => c == b'-',
        10 => c == b' ',
        13 => c == b':',
        _ => c.is_ascii_digit(),
    })
}

fn parse_status(s: &str) -> Result<u16, ParseError> {
    let invalid = || ParseError::InvalidStatus {
        value: s.to_string(),
    };
    // u16::from_str accepts a leading '+', which a status column never has.
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    s.parse().map_err(|_| invalid())
}

// ---------------------------------------------------------------------------
// Parse
// ---------------------------------------------------------------------------

/// Parse one input line. A trailing `\r` is stripped; nothing else is
/// trimmed.
pub fn parse_line(line: &str) -> Result<LogRecord, ParseError> {
    let line = line.strip_suffix('\r').unwrap_or(line);
    let fields: Vec<&str> = line.split(DELIMITER).collect();
    let [address, timestamp, path, status, agent] = fields[..] else {
        return Err(ParseError::MalformedLine {
            fields: fields.len(),
        });
    };

    let status = parse_status(status)?;
    let timestamp = Timestamp::parse(timestamp).ok_or_else(|| ParseError::InvalidTimestamp {
        value: timestamp.to_string(),
    })?;

    Ok(LogRecord {
        address: address.to_string(),
        timestamp,
        path: path.to_string(),
        status,
        agent: agent.to_string(),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
