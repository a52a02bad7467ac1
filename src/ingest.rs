//! Line ingestion.
//!
//! Feeds raw lines through the parser and applies the caller's policy for
//! rejected lines: abort on the first one, or record it and keep going.

use std::io::BufRead;

use tracing::{debug, info};

use crate::error::{IngestError, ParseError};
use crate::parser::{parse_line, LogRecord};

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParseMode {
    /// Fail on the first rejected line.
    Strict,
    /// Record rejected lines and continue.
    #[default]
    Skip,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    /// 1-based line number in the input.
    pub line: usize,
    pub content: String,
    pub error: ParseError,
}

#[derive(Debug, Default)]
pub struct Ingested {
    pub records: Vec<LogRecord>,
    pub rejected: Vec<Rejection>,
}

// ---------------------------------------------------------------------------
// Ingest
// ---------------------------------------------------------------------------

impl Ingested {
    /// Record one parsed line, or fail if `mode` is strict and the line was
    /// rejected.
    fn push(
        &mut self,
        line: usize,
        content: &str,
        parsed: Result<LogRecord, ParseError>,
        mode: ParseMode,
    ) -> Result<(), IngestError> {
        let error = match parsed {
            Ok(record) => {
                self.records.push(record);
                return Ok(());
            }
            Err(error) => error,
        };
        if mode == ParseMode::Strict {
            return Err(IngestError::Rejected {
                line,
                content: content.to_string(),
                source: error,
            });
        }
        debug!(line, %error, "skipping rejected line");
        self.rejected.push(Rejection {
            line,
            content: content.to_string(),
            error,
        });
        Ok(())
    }

    fn finish(self) -> Self {
        info!(
            accepted = self.records.len(),
            rejected = self.rejected.len(),
            "ingestion finished"
        );
        self
    }
}

fn is_blank(line: &[u8]) -> bool {
    line.strip_suffix(b"\r").unwrap_or(line).is_empty()
}

/// Parse every line. Blank lines are ignored and never counted as
/// rejections.
pub fn ingest_lines<I, S>(lines: I, mode: ParseMode) -> Result<Ingested, IngestError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out = Ingested::default();

    for (idx, line) in lines.into_iter().enumerate() {
        let line = line.as_ref();
        if is_blank(line.as_bytes()) {
            continue;
        }
        out.push(idx + 1, line, parse_line(line), mode)?;
    }
    Ok(out.finish())
}

/// Read and parse line-delimited input from any buffered reader.
///
/// A line that is not valid UTF-8 is rejected like any other bad line;
/// only a failing reader aborts with [`IngestError::Read`].
pub fn ingest_reader<R: BufRead>(reader: R, mode: ParseMode) -> Result<Ingested, IngestError> {
    let mut out = Ingested::default();

    for (idx, bytes) in reader.split(b'\n').enumerate() {
        let bytes = bytes?;
        if is_blank(&bytes) {
            continue;
        }
        match String::from_utf8(bytes) {
            Ok(line) => out.push(idx + 1, &line, parse_line(&line), mode)?,
            Err(e) => {
                let error = ParseError::InvalidEncoding {
                    valid_up_to: e.utf8_error().valid_up_to(),
                };
                let content = String::from_utf8_lossy(e.as_bytes());
                out.push(idx + 1, &content, Err(error), mode)?;
            }
        }
    }
    Ok(out.finish())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const INPUT: &str = "\
192.168.1.1,2024-02-01 10:15,/home,200,Mozilla/5.0
192.168.1.2,2024-02-01 10:16,/products
192.168.1.3,2024-02-01 10:17,/checkout,oops,Safari/13.1

192.168.1.10,2024-02-01 10:18,/home,404,Mozilla/5.0
";

    #[test]
    fn skip_mode_keeps_going() {
        let out = ingest_reader(INPUT.as_bytes(), ParseMode::Skip).unwrap();
        assert_eq!(out.records.len(), 2);
        assert_eq!(out.rejected.len(), 2);
        assert_eq!(out.rejected[0].line, 2);
        assert_eq!(out.rejected[0].error, ParseError::MalformedLine { fields: 3 });
        assert_eq!(out.rejected[1].line, 3);
        assert!(matches!(out.rejected[1].error, ParseError::InvalidStatus { .. }));
    }

    #[test]
    fn strict_mode_stops_at_first() {
        let err = ingest_reader(INPUT.as_bytes(), ParseMode::Strict).unwrap_err();
        match err {
            IngestError::Rejected { line, content, source } => {
                assert_eq!(line, 2);
                assert_eq!(content, "192.168.1.2,2024-02-01 10:16,/products");
                assert_eq!(source, ParseError::MalformedLine { fields: 3 });
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn blank_lines_ignored() {
        let out = ingest_lines(["", "\r", ""], ParseMode::Strict).unwrap();
        assert!(out.records.is_empty());
        assert!(out.rejected.is_empty());
    }

    #[test]
    fn invalid_utf8_rejected_in_skip_mode() {
        let mut input = b"10.0.0.1,2024-02-01 10:15,/home,200,curl\n".to_vec();
        input.extend_from_slice(b"10.0.0.2,2024-02-01 10:16,/home,200,bot\xff\xfe\n");
        input.extend_from_slice(b"10.0.0.3,2024-02-01 10:17,/home,404,curl\n");

        let out = ingest_reader(input.as_slice(), ParseMode::Skip).unwrap();
        assert_eq!(out.records.len(), 2);
        assert_eq!(out.rejected.len(), 1);
        let r = &out.rejected[0];
        assert_eq!(r.line, 2);
        assert_eq!(r.error, ParseError::InvalidEncoding { valid_up_to: 39 });
        assert!(r.content.starts_with("10.0.0.2,2024-02-01 10:16,/home,200,bot"));
    }

    #[test]
    fn invalid_utf8_fails_strict_mode() {
        let input = b"ok\xff,2024-02-01 10:15,/home,200,curl\n";
        let err = ingest_reader(&input[..], ParseMode::Strict).unwrap_err();
        assert!(matches!(
            err,
            IngestError::Rejected {
                line: 1,
                source: ParseError::InvalidEncoding { valid_up_to: 2 },
                ..
            }
        ));
    }

    #[test]
    fn reader_failure_is_read_error() {
        struct Broken;
        impl std::io::Read for Broken {
            fn read(&mut self, _: &mut [u8]) -> std::io::Result<usize> {
                Err(std::io::Error::other("disk gone"))
            }
        }
        let err = ingest_reader(std::io::BufReader::new(Broken), ParseMode::Skip).unwrap_err();
        assert!(matches!(err, IngestError::Read(_)));
    }

    #[test]
    fn line_numbers_count_blank_lines() {
        let out = ingest_lines(["", "bad"], ParseMode::Skip).unwrap();
        assert_eq!(out.rejected[0].line, 2);
    }
}
