//! Ordered, immutable mapping from issue type to flagged records.

use crate::error::{Result, ResultExt};
use crate::types::{IssueType, RowSet};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Detector outputs of one run, in execution order.
///
/// Built once by the pipeline and never mutated afterwards; every issue type
/// appears at most once.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultStore {
    entries: Vec<(IssueType, RowSet)>,
}

impl ResultStore {
    /// Build a store from `(issue, rows)` pairs, keeping their order.
    /// A repeated issue type replaces the earlier entry in place.
    pub fn from_entries(entries: impl IntoIterator<Item = (IssueType, RowSet)>) -> Self {
        let mut store: Vec<(IssueType, RowSet)> = Vec::new();
        for (issue, rows) in entries {
            match store.iter_mut().find(|(existing, _)| *existing == issue) {
                Some(slot) => slot.1 = rows,
                None => store.push((issue, rows)),
            }
        }
        Self { entries: store }
    }

    pub fn get(&self, issue: &IssueType) -> Option<&RowSet> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == issue)
            .map(|(_, rows)| rows)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&IssueType, &RowSet)> {
        self.entries.iter().map(|(issue, rows)| (issue, rows))
    }

    pub fn issue_types(&self) -> impl Iterator<Item = &IssueType> {
        self.entries.iter().map(|(issue, _)| issue)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The original records flagged for `issue`, in dataset order.
    ///
    /// An issue type with no entry yields a frame with the source schema and
    /// no rows.
    pub fn rows(&self, df: &DataFrame, issue: &IssueType) -> Result<DataFrame> {
        let Some(rows) = self.get(issue) else {
            return Ok(df.clear());
        };
        let idx = IdxCa::from_vec(
            "idx".into(),
            rows.iter().map(|i| i as IdxSize).collect(),
        );
        df.take(&idx)
            .context(format!("Materializing rows for '{}'", issue))
    }
}
