//! Failed-request detection per source address.
//!
//! Counts requests whose status is in a configured failure set, grouped by
//! address, and flags every address whose count exceeds a threshold.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::aggregate::tally;
use crate::error::ConfigError;
use crate::parser::LogRecord;

pub const DEFAULT_THRESHOLD: usize = 3;
pub const DEFAULT_FAILURE_STATUSES: [u16; 2] = [404, 500];

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnomalyPolicy {
    /// Statuses counted as failures.
    pub statuses: BTreeSet<u16>,
    /// An address is flagged when its failure count is strictly greater.
    pub threshold: usize,
}

impl Default for AnomalyPolicy {
    fn default() -> Self {
        Self {
            statuses: DEFAULT_FAILURE_STATUSES.into_iter().collect(),
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

impl AnomalyPolicy {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.statuses.is_empty() {
            return Err(ConfigError::EmptyStatusSet);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SuspiciousAddress {
    pub address: String,
    pub failed_count: usize,
}

// ---------------------------------------------------------------------------
// Detection
// ---------------------------------------------------------------------------

/// Flag addresses with more than `policy.threshold` failed requests.
///
/// Sorted by count descending, then address ascending. An empty vector
/// means nothing crossed the threshold.
pub fn detect_suspicious(
    records: &[LogRecord],
    policy: &AnomalyPolicy,
) -> Result<Vec<SuspiciousAddress>, ConfigError> {
    policy.validate()?;

    let failures = records
        .iter()
        .filter(|r| policy.statuses.contains(&r.status))
        .map(|r| r.address.as_str());

    let mut flagged: Vec<SuspiciousAddress> = tally(failures)
        .into_iter()
        .filter(|&(_, count)| count > policy.threshold)
        .map(|(address, failed_count)| SuspiciousAddress {
            address: address.to_string(),
            failed_count,
        })
        .collect();

    flagged.sort_by(|a, b| {
        b.failed_count
            .cmp(&a.failed_count)
            .then_with(|| a.address.cmp(&b.address))
    });

    Ok(flagged)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
