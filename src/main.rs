use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use clap::{Args, Parser, Subcommand};
use tracing::info;

use hitlog::aggregate::{AggregationEngine, DEFAULT_TOP_K};
use hitlog::anomaly::{AnomalyPolicy, DEFAULT_FAILURE_STATUSES, DEFAULT_THRESHOLD};
use hitlog::error::IngestError;
use hitlog::export::{export_dir, render_json, render_text};
use hitlog::ingest::{ingest_reader, Ingested, ParseMode};
use hitlog::logging::init_logging;
use hitlog::report::{build_report, CancelToken, ReportOptions};

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

#[derive(Parser)]
#[command(name = "hitlog", about = "Web server access log reports")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone)]
struct CommonArgs {
    /// Comma-delimited access log: address,timestamp,path,status,agent
    input: PathBuf,
    /// Log progress and timing to stderr
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse the log and print every report
    Report {
        #[command(flatten)]
        common: CommonArgs,
        /// Number of pages to rank
        #[arg(long, default_value_t = DEFAULT_TOP_K)]
        top_k: usize,
        /// Flag addresses with more failed requests than this
        #[arg(long, default_value_t = DEFAULT_THRESHOLD)]
        threshold: usize,
        /// Status counted as a failure (repeatable)
        #[arg(long = "status", default_values_t = DEFAULT_FAILURE_STATUSES)]
        statuses: Vec<u16>,
        /// Abort on the first malformed line instead of skipping it
        #[arg(long)]
        strict: bool,
        /// Run the aggregations on a thread pool
        #[arg(long)]
        parallel: bool,
        /// Give up if the report is not finished within this many milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,
        /// Output as JSON format
        #[arg(long)]
        json: bool,
        /// Also write one CSV file per report into this directory
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Parse the log and list rejected lines
    Check {
        #[command(flatten)]
        common: CommonArgs,
    },
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_input(c: &CommonArgs, mode: ParseMode) -> Result<Ingested, IngestError> {
    let file = File::open(&c.input)?;
    ingest_reader(BufReader::new(file), mode)
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

#[allow(clippy::too_many_arguments)]
fn cmd_report(
    c: CommonArgs, top_k: usize, threshold: usize, statuses: Vec<u16>,
    strict: bool, parallel: bool, timeout_ms: Option<u64>,
    json: bool, out: Option<PathBuf>,
) -> i32 {
    let options = ReportOptions {
        top_k,
        anomaly: AnomalyPolicy {
            statuses: statuses.into_iter().collect(),
            threshold,
        },
        parallel,
    };
    if let Err(e) = options.validate() {
        eprintln!("error: {e}");
        return 2;
    }

    let mode = if strict { ParseMode::Strict } else { ParseMode::Skip };
    let t0 = Instant::now();
    let ingested = match read_input(&c, mode) {
        Ok(i) => i,
        Err(e) => {
            eprintln!("error: {}: {e}", c.input.display());
            return 1;
        }
    };
    let t1 = Instant::now();
    for r in &ingested.rejected {
        eprintln!("warning: line {}: {}", r.line, r.error);
    }

    let cancel = match timeout_ms {
        Some(ms) => CancelToken::with_deadline(Duration::from_millis(ms)),
        None => CancelToken::new(),
    };
    let engine = AggregationEngine::new(ingested.records);
    let bundle = match build_report(&engine, &options, &cancel) {
        Ok(b) => b,
        Err(e) => {
            eprintln!("error: {e}");
            return 1;
        }
    };
    let t2 = Instant::now();
    info!(
        parse_secs = (t1 - t0).as_secs_f64(),
        report_secs = (t2 - t1).as_secs_f64(),
        "timing"
    );

    if json {
        match render_json(&bundle) {
            Ok(s) => println!("{s}"),
            Err(e) => {
                eprintln!("error: {e}");
                return 1;
            }
        }
    } else {
        print!("{}", render_text(&bundle, &c.input.display().to_string()));
        if !ingested.rejected.is_empty() {
            println!("\n  skipped lines:  {:>10}", ingested.rejected.len());
        }
    }

    if let Some(dir) = out {
        match export_dir(&bundle, &dir) {
            Ok(paths) => info!(files = paths.len(), dir = %dir.display(), "exported"),
            Err(e) => {
                eprintln!("error: {e}");
                return 1;
            }
        }
    }
    0
}

fn cmd_check(c: CommonArgs) -> i32 {
    let ingested = match read_input(&c, ParseMode::Skip) {
        Ok(i) => i,
        Err(e) => {
            eprintln!("error: {}: {e}", c.input.display());
            return 1;
        }
    };

    println!("=== Check: {} ===", c.input.display());
    println!("  accepted:  {:>8}", ingested.records.len());
    println!("  rejected:  {:>8}", ingested.rejected.len());

    if ingested.rejected.is_empty() {
        return 0;
    }
    println!("\n--- Rejected Lines ---");
    for r in &ingested.rejected {
        let shown = if r.content.len() > 80 {
            format!("{}...", r.content.chars().take(77).collect::<String>())
        } else {
            r.content.clone()
        };
        println!("  [{:6}]  {}  {shown}", r.line, r.error);
    }
    1
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() {
    let cli = Cli::parse();
    let code = match cli.command {
        Commands::Report {
            common, top_k, threshold, statuses,
            strict, parallel, timeout_ms, json, out,
        } => {
            init_logging(common.verbose);
            cmd_report(common, top_k, threshold, statuses, strict, parallel, timeout_ms, json, out)
        }
        Commands::Check { common } => {
            init_logging(common.verbose);
            cmd_check(common)
        }
    };
    std::process::exit(code);
}
