//! Report output: human-readable summary, JSON, and a directory of
//! comma-delimited files (one per report, no header row).

use std::fmt::{self, Display};
use std::fs;
use std::path::{Path, PathBuf};

use crate::aggregate::AggregationResult;
use crate::error::ExportError;
use crate::report::ReportBundle;

// ---------------------------------------------------------------------------
// Text
// ---------------------------------------------------------------------------

fn pct(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64 * 100.0
    }
}

fn write_section<K: Display>(
    f: &mut fmt::Formatter<'_>,
    title: &str,
    result: &AggregationResult<K>,
    total: usize,
) -> fmt::Result {
    writeln!(f, "\n--- {title} ---")?;
    if result.is_empty() {
        return writeln!(f, "  (none)");
    }
    for b in result {
        let key = b.key.to_string();
        let shown = if key.is_empty() { "(empty)".to_string() } else { key };
        writeln!(f, "  {shown:<40} {:>8}  ({:.1}%)", b.count, pct(b.count, total))?;
    }
    Ok(())
}

/// Plain-text summary of a bundle read from `source`.
pub struct TextReport<'a> {
    pub bundle: &'a ReportBundle,
    pub source: &'a str,
}

impl fmt::Display for TextReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bundle = self.bundle;
        let total = bundle.total_requests;

        writeln!(f, "=== Access Log Report: {} ===", self.source)?;
        writeln!(f, "  total requests: {total:>10}")?;
        writeln!(f, "  suspicious:     {:>10}", bundle.suspicious_addresses.len())?;

        write_section(f, "Status Codes", &bundle.status_distribution, total)?;
        write_section(f, "Top Pages", &bundle.top_pages, total)?;
        write_section(f, "Traffic per Minute", &bundle.traffic_trend, total)?;
        write_section(f, "User Agents", &bundle.agent_distribution, total)?;

        writeln!(f, "\n--- Suspicious Addresses ---")?;
        if bundle.suspicious_addresses.is_empty() {
            writeln!(f, "  (none)")?;
        }
        for s in &bundle.suspicious_addresses {
            writeln!(f, "  {:<40} failed={:>6}", s.address, s.failed_count)?;
        }
        Ok(())
    }
}

/// Render the bundle as a plain-text summary.
pub fn render_text(bundle: &ReportBundle, source: &str) -> String {
    TextReport { bundle, source }.to_string()
}

// ---------------------------------------------------------------------------
// JSON
// ---------------------------------------------------------------------------

pub fn render_json(bundle: &ReportBundle) -> Result<String, ExportError> {
    Ok(serde_json::to_string_pretty(bundle)?)
}

// ---------------------------------------------------------------------------
// Directory export
// ---------------------------------------------------------------------------

fn csv_rows<K: Display>(result: &AggregationResult<K>) -> String {
    result
        .iter()
        .map(|b| format!("{},{}\n", b.key, b.count))
        .collect()
}

/// Write each report to `<dir>/<name>.csv`, creating `dir` if needed.
/// Returns the written paths in a fixed order.
pub fn export_dir(bundle: &ReportBundle, dir: &Path) -> Result<Vec<PathBuf>, ExportError> {
    fs::create_dir_all(dir).map_err(|e| ExportError::write(dir, e))?;

    let suspicious: String = bundle
        .suspicious_addresses
        .iter()
        .map(|s| format!("{},{}\n", s.address, s.failed_count))
        .collect();

    let files = [
        ("total_requests", format!("{}\n", bundle.total_requests)),
        ("status_distribution", csv_rows(&bundle.status_distribution)),
        ("top_pages", csv_rows(&bundle.top_pages)),
        ("traffic_trend", csv_rows(&bundle.traffic_trend)),
        ("agent_distribution", csv_rows(&bundle.agent_distribution)),
        ("suspicious_addresses", suspicious),
    ];

    let mut written = Vec::with_capacity(files.len());
    for (name, body) in files {
        let path = dir.join(format!("{name}.csv"));
        fs::write(&path, body).map_err(|e| ExportError::write(&path, e))?;
        written.push(path);
    }
    Ok(written)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
