use super::severity::{quality_score, score, severity_frame};
use super::store::ResultStore;
use super::summary::{summarize, summary_frame};
use crate::error::{Result, ResultExt};
use crate::types::{IssueType, SeverityRow, SummaryRow};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Headline numbers of a report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportOverview {
    pub total_rows: usize,
    /// Sum of row counts over all issue types; a record flagged by two
    /// detectors counts twice.
    pub total_flagged: usize,
    /// Flagged rows in High or Critical issue types.
    pub urgent_flagged: usize,
    pub quality_score: f64,
}

/// Complete output of a quality run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    pub total_rows: usize,
    pub store: ResultStore,
    pub summary: Vec<SummaryRow>,
    pub severity: Vec<SeverityRow>,
}

impl QualityReport {
    /// Derive summary and severity tables from a finished store.
    pub fn from_store(store: ResultStore, total_rows: usize) -> Self {
        let summary = summarize(&store);
        let severity = score(&summary);
        Self {
            total_rows,
            store,
            summary,
            severity,
        }
    }

    pub fn quality_score(&self) -> f64 {
        quality_score(&self.severity, self.total_rows)
    }

    pub fn overview(&self) -> ReportOverview {
        ReportOverview {
            total_rows: self.total_rows,
            total_flagged: self.severity.iter().map(|r| r.row_count).sum(),
            urgent_flagged: self
                .severity
                .iter()
                .filter(|r| r.severity_label.is_urgent())
                .map(|r| r.row_count)
                .sum(),
            quality_score: self.quality_score(),
        }
    }

    /// A copy restricted to `issues`, keeping the original entry order.
    pub fn filter_issues(&self, issues: &[IssueType]) -> Self {
        let store = ResultStore::from_entries(
            self.store
                .iter()
                .filter(|(issue, _)| issues.contains(issue))
                .map(|(issue, rows)| (issue.clone(), rows.clone())),
        );
        Self::from_store(store, self.total_rows)
    }

    pub fn summary_frame(&self) -> Result<DataFrame> {
        summary_frame(&self.summary).context("Building summary table")
    }

    pub fn severity_frame(&self) -> Result<DataFrame> {
        severity_frame(&self.severity).context("Building severity table")
    }

    /// Original records flagged for `issue`.
    pub fn rows(&self, df: &DataFrame, issue: &IssueType) -> Result<DataFrame> {
        self.store.rows(df, issue)
    }
}
