//! Claims Data-Quality Engine
//!
//! Evaluates a fully materialized table of insurance claims for data-quality
//! defects and statistical anomalies, built on Polars.
//!
//! # Overview
//!
//! One run over a dataset snapshot:
//!
//! - **Preprocessing**: per-record missing-field counts, zip and date-of-birth
//!   validity flags, duplicate-identifier flags
//! - **Rule detectors**: duplicates, missing values, invalid formats, IQR
//!   outliers
//! - **Multivariate detector**: seeded isolation forest over numeric features
//! - **Reporting**: ordered result store, summary counts, severity-weighted
//!   totals and an overall quality score
//! - **Progress Reporting**: stage updates with cancellation support
//!
//! The source frame is never modified. Defective records are reported, not
//! repaired.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use lex_quality::{QualityConfig, QualityPipeline};
//! use polars::prelude::*;
//!
//! let df = CsvReadOptions::default()
//!     .with_has_header(true)
//!     .try_into_reader_with_file_path(Some("claims.csv".into()))?
//!     .finish()?;
//!
//! let config = QualityConfig::builder()
//!     .contamination(0.03)
//!     .random_seed(42)
//!     .build()?;
//!
//! let report = QualityPipeline::builder()
//!     .config(config)
//!     .build()?
//!     .run(&df)?;
//!
//! for row in &report.severity {
//!     println!("{}: {} rows ({})", row.issue_type, row.row_count, row.severity_label);
//! }
//! println!("Quality score: {:.1}", report.overview().quality_score);
//! ```
//!
//! # Custom anomaly models
//!
//! The isolation forest sits behind [`AnomalyModel`]. Pass another
//! implementation to [`QualityPipelineBuilder::anomaly_model`] to replace it,
//! e.g. with a deterministic stub in tests.

pub mod config;
pub mod detectors;
pub mod error;
pub mod pipeline;
pub mod preprocess;
pub mod reporting;
pub mod types;
pub mod utils;

// Re-exports for convenient access
pub use config::{ConfigValidationError, QualityConfig, QualityConfigBuilder};
pub use detectors::{AnomalyModel, DetectionContext, Detector, FeatureMatrix, IsolationForest};
pub use error::{QualityError, Result as QualityResult, ResultExt};
pub use pipeline::{
    CancellationToken, ClosureProgressReporter, ProgressReporter, ProgressUpdate, QualityPipeline,
    QualityPipelineBuilder, QualityRun, QualityStage,
};
pub use preprocess::{DerivedAttributes, Preprocessor};
pub use reporting::{QualityReport, ReportOverview, ResultStore};
pub use types::{IssueType, RowSet, Severity, SeverityRow, SummaryRow, columns};
