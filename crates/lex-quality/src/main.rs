//! CLI entry point for the claims data-quality engine.

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use lex_quality::utils::coerce_claim_columns;
use lex_quality::{IssueType, QualityConfig, QualityPipeline, QualityReport, ReportOverview};
use polars::io::csv::read::CsvReadOptions;
use polars::prelude::*;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Parser, Debug)]
#[command(
    author = "Lex Machina Team",
    version,
    about = "Claims data-quality and anomaly detection",
    long_about = "Evaluates a CSV of insurance claims for duplicates, missing values, \
                  invalid formats, IQR outliers and isolation-forest anomalies, then \
                  prints per-issue counts, severities and an overall quality score.\n\n\
                  EXAMPLES:\n  \
                  # Default detectors and thresholds\n  \
                  lex-quality -i claims.csv\n\n  \
                  # Stricter anomaly threshold, reproducible seed\n  \
                  lex-quality -i claims.csv --contamination 0.01 --seed 7\n\n  \
                  # Full JSON report for other tools\n  \
                  lex-quality -i claims.csv --json | jq .overview"
)]
struct Args {
    /// Path to the CSV file to evaluate
    #[arg(short, long)]
    input: String,

    /// JSON file with a full quality configuration
    ///
    /// Flags given on the command line override values from the file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Column(s) identifying duplicate records (repeatable)
    #[arg(long = "duplicate-key")]
    duplicate_keys: Vec<String>,

    /// Numeric column for the IQR outlier check
    #[arg(long)]
    outlier_column: Option<String>,

    /// Numeric feature column(s) for the isolation forest (repeatable)
    #[arg(long = "feature")]
    features: Vec<String>,

    /// Expected anomaly fraction, strictly between 0 and 1
    #[arg(long)]
    contamination: Option<f64>,

    /// Number of isolation trees
    #[arg(long)]
    estimators: Option<usize>,

    /// Per-tree subsample cap
    #[arg(long)]
    max_samples: Option<usize>,

    /// Random seed for the isolation forest
    #[arg(long)]
    seed: Option<u64>,

    /// Run detectors one after another instead of concurrently
    #[arg(long)]
    sequential: bool,

    /// Only report these issue types (repeatable)
    #[arg(long = "issue")]
    issues: Vec<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Suppress progress output (only show warnings and the final result)
    #[arg(short, long)]
    quiet: bool,

    /// Output JSON to stdout instead of human-readable tables
    ///
    /// Disables all logging; only the final JSON report is written.
    #[arg(long)]
    json: bool,
}

/// JSON document printed with `--json`.
#[derive(Serialize)]
struct JsonOutput<'a> {
    input: &'a str,
    overview: ReportOverview,
    #[serde(flatten)]
    report: &'a QualityReport,
}

/// Initialize the tracing subscriber for logging.
///
/// When `json_output` is true, logging is completely disabled to ensure
/// only JSON is written to stdout.
fn init_logging(level: &str, quiet: bool, json_output: bool) {
    if json_output {
        return;
    }

    use tracing_subscriber::EnvFilter;

    let effective_level = if quiet { "warn" } else { level };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(effective_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level, args.quiet, args.json);

    if !Path::new(&args.input).exists() {
        return Err(anyhow!("Input file not found: {}", args.input));
    }

    let config = build_config(&args)?;
    debug!("Effective configuration: {:?}", config);

    info!("Loading dataset from: {}", args.input);
    let data = load_claims_csv(&args.input)?;
    info!("Dataset loaded successfully: {:?}", data.shape());

    let pipeline = QualityPipeline::builder()
        .config(config)
        .on_progress(|update| {
            debug!(
                "[{:>3.0}%] {}: {}",
                update.progress * 100.0,
                update.stage.display_name(),
                update.message
            );
        })
        .build()?;

    let mut report = pipeline.run(&data)?;
    if !args.issues.is_empty() {
        let selected: Vec<IssueType> = args
            .issues
            .iter()
            .map(|s| IssueType::from(s.as_str()))
            .collect();
        report = report.filter_issues(&selected);
    }

    if args.json {
        let output = JsonOutput {
            input: &args.input,
            overview: report.overview(),
            report: &report,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        print_report(&args.input, &report);
    }

    Ok(())
}

/// Merge the optional config file with command-line overrides.
fn build_config(args: &Args) -> Result<QualityConfig> {
    let base = match &args.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Reading config file {}", path.display()))?;
            serde_json::from_str::<QualityConfig>(&text)
                .with_context(|| format!("Parsing config file {}", path.display()))?
        }
        None => QualityConfig::default(),
    };

    let config = QualityConfig::builder()
        .duplicate_key_columns(if args.duplicate_keys.is_empty() {
            base.duplicate_key_columns
        } else {
            args.duplicate_keys.clone()
        })
        .outlier_column(args.outlier_column.clone().unwrap_or(base.outlier_column))
        .feature_columns(if args.features.is_empty() {
            base.feature_columns
        } else {
            args.features.clone()
        })
        .contamination(args.contamination.unwrap_or(base.contamination))
        .estimator_count(args.estimators.unwrap_or(base.estimator_count))
        .max_samples(args.max_samples.unwrap_or(base.max_samples))
        .random_seed(args.seed.unwrap_or(base.random_seed))
        .parallel_detectors(base.parallel_detectors && !args.sequential)
        .build()?;

    Ok(config)
}

/// Read a claims CSV as text, then type the numeric claim columns.
fn load_claims_csv(path: &str) -> Result<DataFrame> {
    let raw = CsvReadOptions::default()
        .with_infer_schema_length(Some(0))
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(PathBuf::from(path)))?
        .finish()
        .with_context(|| format!("Parsing CSV {}", path))?;
    Ok(coerce_claim_columns(raw)?)
}

/// Print the report as plain-text tables.
///
/// Uses `println!` rather than logging: this is the primary output and must
/// show regardless of log level.
fn print_report(input: &str, report: &QualityReport) {
    let overview = report.overview();

    println!("\n{}", "=".repeat(80));
    println!("DATA QUALITY REPORT");
    println!("{}\n", "=".repeat(80));

    println!("OVERVIEW");
    println!("{}", "-".repeat(40));
    println!("  File: {}", input);
    println!("  Rows: {}", overview.total_rows);
    println!("  Flagged (sum over issues): {}", overview.total_flagged);
    println!("  High/Critical: {}", overview.urgent_flagged);
    println!("  Quality score: {:.1} / 100", overview.quality_score);
    println!();

    println!("ISSUE SEVERITY");
    println!("{}", "-".repeat(40));
    println!(
        "{:<30} {:>8} {:<10} {:>6} {:>8}",
        "Issue", "Rows", "Severity", "Score", "Total"
    );
    println!("{}", "-".repeat(66));
    if report.severity.is_empty() {
        println!("  No issue types selected");
    }
    for row in &report.severity {
        println!(
            "{:<30} {:>8} {:<10} {:>6} {:>8}",
            row.issue_type.as_str(),
            row.row_count,
            row.severity_label.label(),
            row.severity_score,
            row.total_severity_score
        );
    }
    println!();

    println!("FLAGGED ROWS (first 10 per issue)");
    println!("{}", "-".repeat(40));
    for (issue, rows) in report.store.iter() {
        let preview: Vec<String> = rows.iter().take(10).map(|i| i.to_string()).collect();
        let more = if rows.len() > 10 { ", ..." } else { "" };
        println!("  {:<28} [{}{}]", issue.as_str(), preview.join(", "), more);
    }
    println!("\n{}", "=".repeat(80));
}
