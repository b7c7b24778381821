//! Rule-based detectors: duplicates, missing values, invalid formats and
//! univariate IQR outliers.

use crate::error::{Result, ResultExt};
use crate::preprocess::{DerivedAttributes, duplicate_mask};
use crate::types::RowSet;
use crate::utils::{column_series, float_values};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Every member of every duplicate group over `key_columns`.
pub fn find_duplicates(df: &DataFrame, key_columns: &[String]) -> Result<RowSet> {
    Ok(RowSet::from_mask(&duplicate_mask(df, key_columns)?))
}

/// Records with at least one null field, across all source columns.
pub fn find_missing_values(derived: &DerivedAttributes) -> RowSet {
    let mask: Vec<bool> = derived.missing_count.iter().map(|&c| c > 0).collect();
    RowSet::from_mask(&mask)
}

/// Records with an invalid zip code or an invalid date of birth.
pub fn find_invalid_formats(derived: &DerivedAttributes) -> RowSet {
    RowSet::from_mask(&derived.invalid_format_mask())
}

/// Tukey fences derived from the interquartile range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IqrBounds {
    pub q1: f64,
    pub q3: f64,
    pub iqr: f64,
    pub low: f64,
    pub high: f64,
}

impl IqrBounds {
    pub const FENCE: f64 = 1.5;

    /// Compute bounds from the non-missing values; `None` if there are none.
    ///
    /// Quartiles use linear interpolation between the closest ranks.
    pub fn from_values(values: &[Option<f64>]) -> PolarsResult<Option<Self>> {
        let ca: Float64Chunked = values.iter().copied().collect();
        let q1 = ca.quantile(0.25, QuantileMethod::Linear)?;
        let q3 = ca.quantile(0.75, QuantileMethod::Linear)?;
        let (Some(q1), Some(q3)) = (q1, q3) else {
            return Ok(None);
        };

        let iqr = q3 - q1;
        Ok(Some(Self {
            q1,
            q3,
            iqr,
            low: q1 - Self::FENCE * iqr,
            high: q3 + Self::FENCE * iqr,
        }))
    }

    /// Strictly outside the fences.
    pub fn is_outlier(&self, value: f64) -> bool {
        value < self.low || value > self.high
    }
}

/// Records whose `column` value lies strictly outside the IQR fences.
/// Missing or non-numeric values are never flagged.
pub fn find_outliers_iqr(df: &DataFrame, column: &str) -> Result<RowSet> {
    let values = float_values(column_series(df, column)?)
        .context(format!("Reading numeric column '{}'", column))?;

    let bounds = IqrBounds::from_values(&values)
        .context(format!("Computing quartiles of '{}'", column))?;
    let Some(bounds) = bounds else {
        return Ok(RowSet::empty());
    };

    let mask: Vec<bool> = values
        .iter()
        .map(|v| v.is_some_and(|x| bounds.is_outlier(x)))
        .collect();
    Ok(RowSet::from_mask(&mask))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocess::Preprocessor;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_iqr_bounds_linear_interpolation() {
        let values: Vec<Option<f64>> = [10.0, 12.0, 12.0, 13.0, 15.0, 16.0, 18.0, 100.0]
            .into_iter()
            .map(Some)
            .collect();
        let bounds = IqrBounds::from_values(&values).unwrap().unwrap();
        assert_eq!(bounds.q1, 12.0);
        assert_eq!(bounds.q3, 16.5);
        assert_eq!(bounds.iqr, 4.5);
        assert_eq!(bounds.low, 5.25);
        assert_eq!(bounds.high, 23.25);
    }

    #[test]
    fn test_find_outliers_iqr_flags_only_extreme() {
        let df = df![
            "claim_amount" => [10.0, 12.0, 12.0, 13.0, 15.0, 16.0, 18.0, 100.0],
        ]
        .unwrap();
        let outliers = find_outliers_iqr(&df, "claim_amount").unwrap();
        assert_eq!(outliers.indices(), &[7]);
    }

    #[test]
    fn test_find_outliers_iqr_ignores_nulls() {
        let df = df![
            "claim_amount" => [Some(10.0), None, Some(12.0), Some(13.0), Some(-400.0), Some(f64::NAN), Some(11.0)],
        ]
        .unwrap();
        let outliers = find_outliers_iqr(&df, "claim_amount").unwrap();
        assert_eq!(outliers.indices(), &[4]);
    }

    #[test]
    fn test_find_outliers_iqr_boundary_is_not_outlier() {
        // q1 = 0, q3 = 1, fences = [-1.5, 2.5]
        let df = df!["x" => [0.0, 0.0, 1.0, 1.0, 2.5, -1.5, 0.5, 0.5, 0.0]].unwrap();
        let values = float_values(df.column("x").unwrap().as_materialized_series()).unwrap();
        let bounds = IqrBounds::from_values(&values).unwrap().unwrap();
        assert_eq!((bounds.low, bounds.high), (-1.5, 2.5));
        assert!(!bounds.is_outlier(2.5));
        assert!(!bounds.is_outlier(-1.5));
        assert!(find_outliers_iqr(&df, "x").unwrap().is_empty());
    }

    #[test]
    fn test_find_outliers_iqr_all_null_column() {
        let df = df!["claim_amount" => [None::<f64>, None, None]].unwrap();
        assert!(find_outliers_iqr(&df, "claim_amount").unwrap().is_empty());
    }

    #[test]
    fn test_find_outliers_iqr_unknown_column() {
        let df = df!["claim_amount" => [1.0]].unwrap();
        let err = find_outliers_iqr(&df, "amount").unwrap_err();
        assert_eq!(err.error_code(), "COLUMN_NOT_FOUND");
    }

    #[test]
    fn test_find_duplicates_includes_every_group_member() {
        let df = df![
            "claim_id" => ["C001", "C002", "C001", "C003", "C001", "C002"],
        ]
        .unwrap();
        let keys = vec!["claim_id".to_string()];
        let dups = find_duplicates(&df, &keys).unwrap();
        assert_eq!(dups.indices(), &[0, 1, 2, 4, 5]);
    }

    #[test]
    fn test_missing_and_format_detectors_use_derived_attributes() {
        let df = df![
            "claim_id" => ["C001", "C002", "C003"],
            "claim_amount" => [Some(1.0), None, Some(3.0)],
            "zip_code" => ["12345", "12345", "1234"],
            "dob" => ["1990-05-14", "2023-02-30", "1990-05-14"],
        ]
        .unwrap();
        let derived = Preprocessor::new().process(&df).unwrap();

        assert_eq!(find_missing_values(&derived).indices(), &[1]);
        assert_eq!(find_invalid_formats(&derived).indices(), &[1, 2]);
    }

    #[test]
    fn test_record_with_both_format_defects_is_flagged_once() {
        let df = df![
            "claim_id" => ["C001"],
            "zip_code" => ["ABCDE"],
            "dob" => ["not-a-date"],
        ]
        .unwrap();
        let derived = Preprocessor::new().process(&df).unwrap();
        assert_eq!(find_invalid_formats(&derived).len(), 1);
    }
}
