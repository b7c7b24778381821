//! Issue detectors.
//!
//! Each [`Detector`] variant owns exactly one [`IssueType`] and turns the
//! dataset plus its derived attributes into the [`RowSet`] of flagged
//! records. Detectors only read their inputs, so any subset of them can run
//! concurrently over the same [`DetectionContext`].

pub mod isolation_forest;
mod multivariate;
mod rules;

pub use isolation_forest::{AnomalyModel, FeatureMatrix, FittedForest, IsolationForest};
pub use multivariate::find_anomalies;
pub use rules::{
    IqrBounds, find_duplicates, find_invalid_formats, find_missing_values, find_outliers_iqr,
};

use crate::config::QualityConfig;
use crate::error::{QualityError, Result};
use crate::preprocess::DerivedAttributes;
use crate::types::{IssueType, RowSet};
use polars::prelude::DataFrame;
use std::fmt;

/// Everything a detector may read.
#[derive(Clone, Copy)]
pub struct DetectionContext<'a> {
    pub df: &'a DataFrame,
    pub derived: &'a DerivedAttributes,
    pub config: &'a QualityConfig,
    pub model: &'a dyn AnomalyModel,
}

impl fmt::Debug for DetectionContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DetectionContext")
            .field("rows", &self.df.height())
            .field("config", self.config)
            .finish_non_exhaustive()
    }
}

/// The built-in detectors, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Detector {
    Duplicates,
    MissingValues,
    InvalidFormats,
    OutliersIqr,
    AnomaliesIsolationForest,
}

impl Detector {
    pub const ALL: [Detector; 5] = [
        Detector::Duplicates,
        Detector::MissingValues,
        Detector::InvalidFormats,
        Detector::OutliersIqr,
        Detector::AnomaliesIsolationForest,
    ];

    pub fn issue_type(&self) -> IssueType {
        match self {
            Self::Duplicates => IssueType::Duplicates,
            Self::MissingValues => IssueType::MissingValues,
            Self::InvalidFormats => IssueType::InvalidFormats,
            Self::OutliersIqr => IssueType::OutliersIqr,
            Self::AnomaliesIsolationForest => IssueType::AnomaliesIsolationForest,
        }
    }

    /// Run the detector.
    ///
    /// Any failure other than cancellation is reported as
    /// [`QualityError::DetectorFailed`] tagged with this detector's issue type.
    pub fn detect(&self, ctx: &DetectionContext<'_>) -> Result<RowSet> {
        let result = match self {
            Self::Duplicates => find_duplicates(ctx.df, &ctx.config.duplicate_key_columns),
            Self::MissingValues => Ok(find_missing_values(ctx.derived)),
            Self::InvalidFormats => Ok(find_invalid_formats(ctx.derived)),
            Self::OutliersIqr => find_outliers_iqr(ctx.df, &ctx.config.outlier_column),
            Self::AnomaliesIsolationForest => find_anomalies(
                ctx.df,
                &ctx.config.feature_columns,
                ctx.config.contamination,
                ctx.config.random_seed,
                ctx.model,
            ),
        };

        result.map_err(|e| match e {
            QualityError::Cancelled | QualityError::DetectorFailed { .. } => e,
            e if e.is_cancelled() => QualityError::Cancelled,
            e => QualityError::detector(self.issue_type(), e),
        })
    }
}

impl fmt::Display for Detector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.issue_type())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocess::Preprocessor;
    use polars::prelude::*;

    struct NeverAnomalous;

    impl AnomalyModel for NeverAnomalous {
        fn fit_predict(&self, features: &FeatureMatrix, _: f64, _: u64) -> Result<Vec<bool>> {
            Ok(vec![false; features.n_rows()])
        }
    }

    struct Cancelling;

    impl AnomalyModel for Cancelling {
        fn fit_predict(&self, _: &FeatureMatrix, _: f64, _: u64) -> Result<Vec<bool>> {
            Err(QualityError::Cancelled.with_context("fitting"))
        }
    }

    fn claims() -> DataFrame {
        df![
            "claim_id" => ["C1", "C2", "C1"],
            "patient_id" => [1i64, 2, 3],
            "doctor_id" => [10i64, 11, 12],
            "claim_amount" => [100.0, 110.0, 120.0],
            "zip_code" => ["12345", "1234", "12345"],
            "dob" => ["1990-05-14", "1990-05-14", "1990-05-14"],
        ]
        .unwrap()
    }

    #[test]
    fn test_detector_order_matches_builtin_issue_types() {
        let issues: Vec<IssueType> = Detector::ALL.iter().map(Detector::issue_type).collect();
        assert_eq!(issues, IssueType::BUILTIN.to_vec());
    }

    #[test]
    fn test_detect_dispatches_by_variant() {
        let df = claims();
        let derived = Preprocessor::new().process(&df).unwrap();
        let config = QualityConfig::default();
        let ctx = DetectionContext {
            df: &df,
            derived: &derived,
            config: &config,
            model: &NeverAnomalous,
        };

        assert_eq!(Detector::Duplicates.detect(&ctx).unwrap().indices(), &[0, 2]);
        assert_eq!(Detector::InvalidFormats.detect(&ctx).unwrap().indices(), &[1]);
        assert!(Detector::MissingValues.detect(&ctx).unwrap().is_empty());
        assert!(Detector::AnomaliesIsolationForest.detect(&ctx).unwrap().is_empty());
    }

    #[test]
    fn test_failure_is_tagged_with_issue_type() {
        let df = claims();
        let derived = Preprocessor::new().process(&df).unwrap();
        let config = QualityConfig {
            outlier_column: "amount".to_string(),
            ..QualityConfig::default()
        };
        let ctx = DetectionContext {
            df: &df,
            derived: &derived,
            config: &config,
            model: &NeverAnomalous,
        };

        let err = Detector::OutliersIqr.detect(&ctx).unwrap_err();
        assert_eq!(err.error_code(), "DETECTOR_FAILED");
        assert_eq!(err.failed_issue(), Some(&IssueType::OutliersIqr));
    }

    #[test]
    fn test_cancellation_is_not_wrapped() {
        let df = claims();
        let derived = Preprocessor::new().process(&df).unwrap();
        let config = QualityConfig::default();
        let ctx = DetectionContext {
            df: &df,
            derived: &derived,
            config: &config,
            model: &Cancelling,
        };

        let err = Detector::AnomaliesIsolationForest.detect(&ctx).unwrap_err();
        assert!(matches!(err, QualityError::Cancelled));
    }
}
