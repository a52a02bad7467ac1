//! Error types shared across the crate.

use std::path::PathBuf;

use thiserror::Error;

/// Why a single input line was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("malformed line: expected 5 fields, found {fields}")]
    MalformedLine { fields: usize },

    #[error("invalid status {value:?}: expected an HTTP status code between 0 and 65535")]
    InvalidStatus { value: String },

    #[error("invalid timestamp {value:?}: expected YYYY-MM-DD HH:MM")]
    InvalidTimestamp { value: String },

    #[error("line is not valid UTF-8 after byte {valid_up_to}")]
    InvalidEncoding { valid_up_to: usize },
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("line {line}: {source} (content: {content:?})")]
    Rejected {
        line: usize,
        content: String,
        #[source]
        source: ParseError,
    },

    #[error("failed to read input: {0}")]
    Read(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("top-k must be at least 1, got {0}")]
    InvalidTopK(usize),

    #[error("statuses of interest must not be empty")]
    EmptyStatusSet,
}

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("invalid report options: {0}")]
    Config(#[from] ConfigError),

    #[error("report cancelled before completion")]
    Cancelled,
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize report: {0}")]
    Json(#[from] serde_json::Error),
}

impl ExportError {
    pub fn write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Write {
            path: path.into(),
            source,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_error_messages() {
        let e = ParseError::MalformedLine { fields: 4 };
        assert_eq!(e.to_string(), "malformed line: expected 5 fields, found 4");
        let e = ParseError::InvalidStatus { value: "70000".into() };
        assert_eq!(
            e.to_string(),
            "invalid status \"70000\": expected an HTTP status code between 0 and 65535"
        );
        let e = ParseError::InvalidEncoding { valid_up_to: 12 };
        assert_eq!(e.to_string(), "line is not valid UTF-8 after byte 12");
    }

    #[test]
    fn rejected_names_line() {
        let e = IngestError::Rejected {
            line: 7,
            content: "x,y".into(),
            source: ParseError::MalformedLine { fields: 2 },
        };
        assert!(e.to_string().starts_with("line 7: malformed line"));
    }

    #[test]
    fn config_error_wraps() {
        let e: ReportError = ConfigError::InvalidTopK(0).into();
        assert_eq!(e.to_string(), "invalid report options: top-k must be at least 1, got 0");
    }
}
