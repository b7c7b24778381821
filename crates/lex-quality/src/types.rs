use serde::{Deserialize, Serialize};
use std::fmt;

/// Column names of the claims schema delivered by the upstream loader.
pub mod columns {
    pub const CLAIM_ID: &str = "claim_id";
    pub const PATIENT_ID: &str = "patient_id";
    pub const DOCTOR_ID: &str = "doctor_id";
    pub const DIAGNOSIS_CODE: &str = "diagnosis_code";
    pub const PROCEDURE_CODE: &str = "procedure_code";
    pub const CLAIM_AMOUNT: &str = "claim_amount";
    pub const CLAIM_DATE: &str = "claim_date";
    pub const STATUS: &str = "status";
    pub const ZIP_CODE: &str = "zip_code";
    pub const DOB: &str = "dob";

    /// All source columns, in schema order.
    pub const ALL: [&str; 10] = [
        CLAIM_ID,
        PATIENT_ID,
        DOCTOR_ID,
        DIAGNOSIS_CODE,
        PROCEDURE_CODE,
        CLAIM_AMOUNT,
        CLAIM_DATE,
        STATUS,
        ZIP_CODE,
        DOB,
    ];
}

/// Kind of defect a detector reports.
///
/// The five named variants are the closed set produced by the built-in
/// detectors. `Custom` carries issue names coming from elsewhere (e.g. a
/// summary table read back from storage) so that scoring never fails on them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum IssueType {
    Duplicates,
    MissingValues,
    InvalidFormats,
    OutliersIqr,
    AnomaliesIsolationForest,
    Custom(String),
}

impl IssueType {
    /// The built-in issue types, in default execution order.
    pub const BUILTIN: [IssueType; 5] = [
        IssueType::Duplicates,
        IssueType::MissingValues,
        IssueType::InvalidFormats,
        IssueType::OutliersIqr,
        IssueType::AnomaliesIsolationForest,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            Self::Duplicates => "duplicates",
            Self::MissingValues => "missing_values",
            Self::InvalidFormats => "invalid_formats",
            Self::OutliersIqr => "outliers_iqr",
            Self::AnomaliesIsolationForest => "anomalies_isolation_forest",
            Self::Custom(name) => name,
        }
    }

    pub fn is_builtin(&self) -> bool {
        !matches!(self, Self::Custom(_))
    }
}

impl fmt::Display for IssueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for IssueType {
    fn from(name: &str) -> Self {
        match name {
            "duplicates" => Self::Duplicates,
            "missing_values" => Self::MissingValues,
            "invalid_formats" => Self::InvalidFormats,
            "outliers_iqr" => Self::OutliersIqr,
            "anomalies_isolation_forest" => Self::AnomaliesIsolationForest,
            other => Self::Custom(other.to_string()),
        }
    }
}

impl From<String> for IssueType {
    fn from(name: String) -> Self {
        Self::from(name.as_str())
    }
}

impl From<IssueType> for String {
    fn from(issue: IssueType) -> Self {
        issue.as_str().to_string()
    }
}

/// Severity category attached to an issue type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
            Self::Critical => "Critical",
        }
    }

    /// High and Critical issues are the ones surfaced as urgent.
    pub fn is_urgent(&self) -> bool {
        matches!(self, Self::High | Self::Critical)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Ordered set of flagged records, referenced by their row index in the
/// source dataset.
///
/// Indices are always ascending and unique, i.e. they follow the original
/// dataset order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RowSet {
    indices: Vec<usize>,
}

impl RowSet {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a row set from a per-row boolean mask.
    pub fn from_mask(mask: &[bool]) -> Self {
        let indices = mask
            .iter()
            .enumerate()
            .filter_map(|(idx, &flagged)| flagged.then_some(idx))
            .collect();
        Self { indices }
    }

    /// Build a row set from arbitrary indices; sorts and removes repeats.
    pub fn from_indices(mut indices: Vec<usize>) -> Self {
        indices.sort_unstable();
        indices.dedup();
        Self { indices }
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn contains(&self, row: usize) -> bool {
        self.indices.binary_search(&row).is_ok()
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.indices.iter().copied()
    }
}

/// One row of the summary table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryRow {
    pub issue_type: IssueType,
    pub row_count: usize,
}

/// One row of the severity table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityRow {
    pub issue_type: IssueType,
    pub row_count: usize,
    pub severity_label: Severity,
    pub severity_score: u32,
    pub total_severity_score: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_type_names_round_trip() {
        for issue in IssueType::BUILTIN {
            let name = issue.to_string();
            assert_eq!(IssueType::from(name.as_str()), issue);
        }
        assert_eq!(
            IssueType::from("schema_drift"),
            IssueType::Custom("schema_drift".to_string())
        );
    }

    #[test]
    fn test_issue_type_serializes_as_plain_string() {
        let json = serde_json::to_string(&IssueType::OutliersIqr).unwrap();
        assert_eq!(json, "\"outliers_iqr\"");
        let parsed: IssueType = serde_json::from_str("\"late_filing\"").unwrap();
        assert!(!parsed.is_builtin());
    }

    #[test]
    fn test_row_set_from_mask_keeps_order() {
        let set = RowSet::from_mask(&[false, true, false, true, true]);
        assert_eq!(set.indices(), &[1, 3, 4]);
        assert!(set.contains(3));
        assert!(!set.contains(0));
    }

    #[test]
    fn test_row_set_from_indices_sorts_and_dedups() {
        let set = RowSet::from_indices(vec![7, 2, 7, 0]);
        assert_eq!(set.indices(), &[0, 2, 7]);
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn test_severity_urgency() {
        assert!(Severity::Critical.is_urgent());
        assert!(Severity::High.is_urgent());
        assert!(!Severity::Medium.is_urgent());
        assert_eq!(Severity::Low.label(), "Low");
    }
}
