//! Severity labels, weighted totals and the overall quality score.

use crate::types::{IssueType, Severity, SeverityRow, SummaryRow};
use polars::prelude::*;
use tracing::warn;

/// Highest per-record weight; the quality score normalizes against it.
pub const MAX_SEVERITY_SCORE: u32 = 4;

/// Fallback for issue types without a mapping.
pub const FALLBACK_SEVERITY: (Severity, u32) = (Severity::Low, 1);

/// Static severity mapping for each issue type.
pub fn severity_of(issue: &IssueType) -> (Severity, u32) {
    match issue {
        IssueType::Duplicates => (Severity::High, 3),
        IssueType::MissingValues => (Severity::Medium, 2),
        IssueType::InvalidFormats => (Severity::High, 3),
        IssueType::OutliersIqr => (Severity::Medium, 2),
        IssueType::AnomaliesIsolationForest => (Severity::Critical, MAX_SEVERITY_SCORE),
        IssueType::Custom(name) => {
            warn!(
                "No severity mapping for issue type '{}', using {} ({})",
                name, FALLBACK_SEVERITY.0, FALLBACK_SEVERITY.1
            );
            FALLBACK_SEVERITY
        }
    }
}

/// Attach severity to every summary row, keeping order.
pub fn score(summary: &[SummaryRow]) -> Vec<SeverityRow> {
    summary
        .iter()
        .map(|row| {
            let (severity_label, severity_score) = severity_of(&row.issue_type);
            SeverityRow {
                issue_type: row.issue_type.clone(),
                row_count: row.row_count,
                severity_label,
                severity_score,
                total_severity_score: u64::from(severity_score) * row.row_count as u64,
            }
        })
        .collect()
}

/// Quality score in [0, 100], rounded to one decimal.
///
/// The weighted total is measured against the worst case of every record
/// carrying one Critical issue; an empty dataset scores 100.
pub fn quality_score(severity: &[SeverityRow], total_rows: usize) -> f64 {
    if total_rows == 0 {
        return 100.0;
    }
    let weighted: u64 = severity.iter().map(|r| r.total_severity_score).sum();
    let worst = total_rows as f64 * f64::from(MAX_SEVERITY_SCORE);
    let penalty = (weighted as f64 / worst).min(1.0);
    ((100.0 - penalty * 100.0) * 10.0).round() / 10.0
}

/// Severity table as a frame with columns `issue_type`, `row_count`,
/// `severity_label`, `severity_score`, `total_severity_score`.
pub fn severity_frame(severity: &[SeverityRow]) -> PolarsResult<DataFrame> {
    let issue_types: Vec<String> = severity.iter().map(|r| r.issue_type.to_string()).collect();
    let row_counts: Vec<u64> = severity.iter().map(|r| r.row_count as u64).collect();
    let labels: Vec<&str> = severity.iter().map(|r| r.severity_label.label()).collect();
    let scores: Vec<u32> = severity.iter().map(|r| r.severity_score).collect();
    let totals: Vec<u64> = severity.iter().map(|r| r.total_severity_score).collect();
    DataFrame::new(vec![
        Column::new("issue_type".into(), issue_types),
        Column::new("row_count".into(), row_counts),
        Column::new("severity_label".into(), labels),
        Column::new("severity_score".into(), scores),
        Column::new("total_severity_score".into(), totals),
    ])
}
