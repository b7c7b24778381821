//! Multivariate anomaly detection over a set of numeric feature columns.

use super::isolation_forest::{AnomalyModel, FeatureMatrix};
use crate::error::{QualityError, Result, ResultExt};
use crate::types::RowSet;
use crate::utils::{column_series, float_values};
use polars::prelude::*;
use tracing::debug;

/// Records the model labels anomalous on `feature_columns`.
///
/// Rows with a missing or non-finite value in any feature column are left
/// out of the model input and are never flagged. The returned indices refer
/// to the original frame.
pub fn find_anomalies(
    df: &DataFrame,
    feature_columns: &[String],
    contamination: f64,
    seed: u64,
    model: &dyn AnomalyModel,
) -> Result<RowSet> {
    let mut columns = Vec::with_capacity(feature_columns.len());
    for name in feature_columns {
        let values = float_values(column_series(df, name)?)
            .context(format!("Reading feature column '{}'", name))?;
        columns.push(values);
    }

    let mut kept = Vec::new();
    let mut rows = Vec::new();
    for row in 0..df.height() {
        let features: Option<Vec<f64>> = columns
            .iter()
            .map(|values| values[row].filter(|v| v.is_finite()))
            .collect();
        if let Some(features) = features {
            kept.push(row);
            rows.push(features);
        }
    }

    debug!(
        "Anomaly model input: {} of {} rows complete across {} features",
        kept.len(),
        df.height(),
        feature_columns.len()
    );

    if kept.is_empty() {
        return Ok(RowSet::empty());
    }

    let matrix = FeatureMatrix::from_rows(rows)
        .ok_or_else(|| QualityError::Internal("ragged feature matrix".to_string()))?;
    let labels = model.fit_predict(&matrix, contamination, seed)?;
    if labels.len() != kept.len() {
        return Err(QualityError::Internal(format!(
            "anomaly model returned {} labels for {} rows",
            labels.len(),
            kept.len()
        )));
    }

    Ok(RowSet::from_indices(
        kept.into_iter()
            .zip(labels)
            .filter_map(|(row, anomalous)| anomalous.then_some(row))
            .collect(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detectors::IsolationForest;
    use pretty_assertions::assert_eq;

    /// Flags every row whose first feature exceeds a fixed cutoff.
    struct Cutoff(f64);

    impl AnomalyModel for Cutoff {
        fn fit_predict(&self, features: &FeatureMatrix, _: f64, _: u64) -> Result<Vec<bool>> {
            Ok((0..features.n_rows())
                .map(|i| features.row(i)[0] > self.0)
                .collect())
        }
    }

    struct WrongLength;

    impl AnomalyModel for WrongLength {
        fn fit_predict(&self, _: &FeatureMatrix, _: f64, _: u64) -> Result<Vec<bool>> {
            Ok(vec![true])
        }
    }

    fn features() -> Vec<String> {
        vec!["claim_amount".to_string(), "patient_id".to_string()]
    }

    #[test]
    fn test_rows_with_missing_features_are_excluded() {
        let df = df![
            "claim_amount" => [Some(900.0), None, Some(950.0), Some(f64::NAN), Some(10.0)],
            "patient_id" => [Some(1i64), Some(2), None, Some(4), Some(5)],
        ]
        .unwrap();
        let flagged = find_anomalies(&df, &features(), 0.1, 42, &Cutoff(500.0)).unwrap();
        assert_eq!(flagged.indices(), &[0]);
    }

    #[test]
    fn test_no_complete_rows_flags_nothing() {
        let df = df![
            "claim_amount" => [None::<f64>, None],
            "patient_id" => [Some(1i64), Some(2)],
        ]
        .unwrap();
        let flagged = find_anomalies(&df, &features(), 0.1, 42, &WrongLength).unwrap();
        assert!(flagged.is_empty());
    }

    #[test]
    fn test_label_length_mismatch_is_internal_error() {
        let df = df![
            "claim_amount" => [1.0, 2.0, 3.0],
            "patient_id" => [1i64, 2, 3],
        ]
        .unwrap();
        let err = find_anomalies(&df, &features(), 0.1, 42, &WrongLength).unwrap_err();
        assert_eq!(err.error_code(), "INTERNAL_ERROR");
    }

    #[test]
    fn test_unknown_feature_column() {
        let df = df!["claim_amount" => [1.0]].unwrap();
        let err = find_anomalies(&df, &features(), 0.1, 42, &Cutoff(0.0)).unwrap_err();
        assert_eq!(err.error_code(), "COLUMN_NOT_FOUND");
    }

    #[test]
    fn test_isolation_forest_is_reproducible_for_a_seed() {
        let amounts: Vec<f64> = (0..80).map(|i| 100.0 + (i % 9) as f64).collect();
        let mut amounts = amounts;
        amounts.push(25_000.0);
        let patients: Vec<i64> = (0..81).map(|i| i % 11).collect();
        let df = df![
            "claim_amount" => amounts,
            "patient_id" => patients,
        ]
        .unwrap();

        let model = IsolationForest::new(100, 256);
        let first = find_anomalies(&df, &features(), 0.03, 42, &model).unwrap();
        let second = find_anomalies(&df, &features(), 0.03, 42, &model).unwrap();
        assert_eq!(first, second);
        assert!(first.contains(80));
    }
}
