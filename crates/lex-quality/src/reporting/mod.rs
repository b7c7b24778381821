//! Result store, summary aggregation and severity scoring.
//!
//! Everything here reads only the [`ResultStore`] produced by the detectors;
//! the source dataset is needed again only to materialize flagged rows.
//!
//! # Example
//!
//! ```rust,ignore
//! use lex_quality::reporting::QualityReport;
//!
//! let report = QualityReport::from_store(store, df.height());
//! println!("{}", report.severity_frame()?);
//! println!("score: {:.1}", report.overview().quality_score);
//! ```

mod report;
mod severity;
mod store;
mod summary;

pub use report::{QualityReport, ReportOverview};
pub use severity::{
    FALLBACK_SEVERITY, MAX_SEVERITY_SCORE, quality_score, score, severity_frame, severity_of,
};
pub use store::ResultStore;
pub use summary::{summarize, summary_frame};
