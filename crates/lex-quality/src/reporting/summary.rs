use super::store::ResultStore;
use crate::types::SummaryRow;
use polars::prelude::*;

/// One [`SummaryRow`] per store entry, in store order.
pub fn summarize(store: &ResultStore) -> Vec<SummaryRow> {
    store
        .iter()
        .map(|(issue, rows)| SummaryRow {
            issue_type: issue.clone(),
            row_count: rows.len(),
        })
        .collect()
}

/// Summary table as a frame with columns `issue_type`, `row_count`.
pub fn summary_frame(summary: &[SummaryRow]) -> PolarsResult<DataFrame> {
    let issue_types: Vec<String> = summary.iter().map(|r| r.issue_type.to_string()).collect();
    let row_counts: Vec<u64> = summary.iter().map(|r| r.row_count as u64).collect();
    DataFrame::new(vec![
        Column::new("issue_type".into(), issue_types),
        Column::new("row_count".into(), row_counts),
    ])
}
