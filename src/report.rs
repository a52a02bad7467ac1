//! Report assembly.
//!
//! Runs each aggregation once over the same record set and collects the
//! results into a [`ReportBundle`]. The computations are independent, so
//! they may be dispatched on the rayon pool and joined before assembly.

#[cfg(test)]
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{info, warn};

use crate::aggregate::{AggregationEngine, AggregationResult, DEFAULT_TOP_K};
use crate::anomaly::{detect_suspicious, AnomalyPolicy, SuspiciousAddress};
use crate::error::{ConfigError, ReportError};
use crate::parser::Timestamp;

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportOptions {
    pub top_k: usize,
    pub anomaly: AnomalyPolicy,
    pub parallel: bool,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            anomaly: AnomalyPolicy::default(),
            parallel: false,
        }
    }
}

impl ReportOptions {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.top_k == 0 {
            return Err(ConfigError::InvalidTopK(self.top_k));
        }
        self.anomaly.validate()
    }
}

/// Cooperative cancellation, checked between aggregation steps.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
    deadline: Option<Instant>,
    /// Checks seen so far and how many may pass before cancelling.
    #[cfg(test)]
    trip_after: Option<(Arc<AtomicUsize>, usize)>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_deadline(timeout: Duration) -> Self {
        Self {
            deadline: Some(Instant::now() + timeout),
            ..Self::default()
        }
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed) || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    #[cfg(test)]
    fn count_check(&self) {
        if let Some((seen, limit)) = &self.trip_after {
            if seen.fetch_add(1, Ordering::Relaxed) >= *limit {
                self.cancel();
            }
        }
    }

    #[cfg(not(test))]
    fn count_check(&self) {}

    fn check(&self) -> Result<(), ReportError> {
        self.count_check();
        if self.is_cancelled() {
            Err(ReportError::Cancelled)
        } else {
            Ok(())
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportBundle {
    pub total_requests: usize,
    pub status_distribution: AggregationResult<u16>,
    pub top_pages: AggregationResult<String>,
    pub traffic_trend: AggregationResult<Timestamp>,
    pub agent_distribution: AggregationResult<String>,
    pub suspicious_addresses: Vec<SuspiciousAddress>,
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Build the full report bundle.
///
/// Options are validated before any work starts. Cancellation is observed
/// only between steps; a cancelled run returns no partial bundle.
pub fn build_report(
    engine: &AggregationEngine,
    options: &ReportOptions,
    cancel: &CancelToken,
) -> Result<ReportBundle, ReportError> {
    options.validate()?;
    if engine.total_count() == 0 {
        warn!("no valid records; report will be empty");
    }

    let bundle = if options.parallel {
        build_parallel(engine, options, cancel)?
    } else {
        build_sequential(engine, options, cancel)?
    };

    info!(
        total = bundle.total_requests,
        suspicious = bundle.suspicious_addresses.len(),
        parallel = options.parallel,
        "report built"
    );
    Ok(bundle)
}

fn build_sequential(
    engine: &AggregationEngine,
    options: &ReportOptions,
    cancel: &CancelToken,
) -> Result<ReportBundle, ReportError> {
    cancel.check()?;
    let status_distribution = engine.status_distribution();
    cancel.check()?;
    let top_pages = engine.top_pages(options.top_k)?;
    cancel.check()?;
    let traffic_trend = engine.traffic_trend();
    cancel.check()?;
    let agent_distribution = engine.agent_distribution();
    cancel.check()?;
    let suspicious_addresses = detect_suspicious(engine.records(), &options.anomaly)?;
    cancel.check()?;

    Ok(ReportBundle {
        total_requests: engine.total_count(),
        status_distribution,
        top_pages,
        traffic_trend,
        agent_distribution,
        suspicious_addresses,
    })
}

fn build_parallel(
    engine: &AggregationEngine,
    options: &ReportOptions,
    cancel: &CancelToken,
) -> Result<ReportBundle, ReportError> {
    let ((status, top), ((trend, agents), suspicious)) = rayon::join(
        || {
            rayon::join(
                || cancel.check().map(|_| engine.status_distribution()),
                || {
                    cancel.check()?;
                    Ok::<_, ReportError>(engine.top_pages(options.top_k)?)
                },
            )
        },
        || {
            rayon::join(
                || {
                    rayon::join(
                        || cancel.check().map(|_| engine.traffic_trend()),
                        || cancel.check().map(|_| engine.agent_distribution()),
                    )
                },
                || {
                    cancel.check()?;
                    Ok::<_, ReportError>(detect_suspicious(engine.records(), &options.anomaly)?)
                },
            )
        },
    );

    let bundle = ReportBundle {
        total_requests: engine.total_count(),
        status_distribution: status?,
        top_pages: top?,
        traffic_trend: trend?,
        agent_distribution: agents?,
        suspicious_addresses: suspicious?,
    };
    cancel.check()?;
    Ok(bundle)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
