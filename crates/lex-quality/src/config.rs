//! Configuration types for the quality pipeline.
//!
//! This module provides configuration options using the builder pattern.
//! Scalar parameters are validated when the config is built; column
//! references are validated against a concrete dataset with
//! [`QualityConfig::validate_schema`] before any detector runs.

use crate::types::columns;
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};

pub const DEFAULT_CONTAMINATION: f64 = 0.03;
pub const DEFAULT_ESTIMATOR_COUNT: usize = 100;
pub const DEFAULT_MAX_SAMPLES: usize = 256;
pub const DEFAULT_RANDOM_SEED: u64 = 42;

/// Configuration for a quality run.
///
/// Use [`QualityConfig::builder()`] to create a new configuration
/// with fluent API.
///
/// # Example
///
/// ```rust,ignore
/// use lex_quality::QualityConfig;
///
/// let config = QualityConfig::builder()
///     .contamination(0.05)
///     .estimator_count(200)
///     .random_seed(7)
///     .build()?;
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityConfig {
    /// Columns whose combined values identify a duplicate group.
    /// Default: `["claim_id"]`
    pub duplicate_key_columns: Vec<String>,

    /// Numeric column checked by the IQR outlier detector.
    /// Default: `"claim_amount"`
    pub outlier_column: String,

    /// Numeric columns fed to the isolation forest.
    /// Default: `["claim_amount", "doctor_id", "patient_id"]`
    pub feature_columns: Vec<String>,

    /// Expected fraction of anomalous records, open interval (0, 1).
    /// Default: 0.03
    pub contamination: f64,

    /// Number of isolation trees.
    /// Default: 100
    pub estimator_count: usize,

    /// Upper bound on the per-tree subsample size.
    /// Default: 256
    pub max_samples: usize,

    /// Seed for the forest's random generator.
    /// Default: 42
    pub random_seed: u64,

    /// Run the five detectors on separate threads.
    /// Default: true
    pub parallel_detectors: bool,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            duplicate_key_columns: vec![columns::CLAIM_ID.to_string()],
            outlier_column: columns::CLAIM_AMOUNT.to_string(),
            feature_columns: default_feature_columns(),
            contamination: DEFAULT_CONTAMINATION,
            estimator_count: DEFAULT_ESTIMATOR_COUNT,
            max_samples: DEFAULT_MAX_SAMPLES,
            random_seed: DEFAULT_RANDOM_SEED,
            parallel_detectors: true,
        }
    }
}

fn default_feature_columns() -> Vec<String> {
    [columns::CLAIM_AMOUNT, columns::DOCTOR_ID, columns::PATIENT_ID]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl QualityConfig {
    /// Create a new configuration builder.
    pub fn builder() -> QualityConfigBuilder {
        QualityConfigBuilder::default()
    }

    /// Validate the scalar parameters and return the first offending one.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if !(self.contamination > 0.0 && self.contamination < 1.0) {
            return Err(ConfigValidationError::InvalidContamination(
                self.contamination,
            ));
        }

        if self.estimator_count == 0 {
            return Err(ConfigValidationError::InvalidEstimatorCount(
                self.estimator_count,
            ));
        }

        if self.max_samples == 0 {
            return Err(ConfigValidationError::InvalidMaxSamples(self.max_samples));
        }

        if self.duplicate_key_columns.is_empty() {
            return Err(ConfigValidationError::EmptyColumnList(
                "duplicate_key_columns".to_string(),
            ));
        }

        if self.feature_columns.is_empty() {
            return Err(ConfigValidationError::EmptyColumnList(
                "feature_columns".to_string(),
            ));
        }

        Ok(())
    }

    /// Validate that every column the config references exists in `df`.
    pub fn validate_schema(&self, df: &DataFrame) -> Result<(), ConfigValidationError> {
        for column in &self.duplicate_key_columns {
            require_column(df, "duplicate_key_columns", column)?;
        }
        require_column(df, "outlier_column", &self.outlier_column)?;
        for column in &self.feature_columns {
            require_column(df, "feature_columns", column)?;
        }

        Ok(())
    }
}

/// Fail with [`ConfigValidationError::UnknownColumn`] unless `df` has `column`.
pub(crate) fn require_column(
    df: &DataFrame,
    field: &str,
    column: &str,
) -> Result<(), ConfigValidationError> {
    if df.get_column_names().iter().any(|c| c.as_str() == column) {
        Ok(())
    } else {
        Err(ConfigValidationError::UnknownColumn {
            field: field.to_string(),
            column: column.to_string(),
        })
    }
}

/// Errors that can occur during configuration validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Invalid contamination: {0} (must be strictly between 0.0 and 1.0)")]
    InvalidContamination(f64),

    #[error("Invalid estimator_count: {0} (must be at least 1)")]
    InvalidEstimatorCount(usize),

    #[error("Invalid max_samples: {0} (must be at least 1)")]
    InvalidMaxSamples(usize),

    #[error("'{0}' must name at least one column")]
    EmptyColumnList(String),

    #[error("'{field}' references column '{column}' which is not in the dataset")]
    UnknownColumn { field: String, column: String },
}

impl ConfigValidationError {
    /// Name of the configuration parameter at fault.
    pub fn parameter(&self) -> &str {
        match self {
            Self::InvalidContamination(_) => "contamination",
            Self::InvalidEstimatorCount(_) => "estimator_count",
            Self::InvalidMaxSamples(_) => "max_samples",
            Self::EmptyColumnList(field) => field,
            Self::UnknownColumn { field, .. } => field,
        }
    }
}

/// Builder for [`QualityConfig`] with fluent API.
#[derive(Debug, Default)]
pub struct QualityConfigBuilder {
    duplicate_key_columns: Option<Vec<String>>,
    outlier_column: Option<String>,
    feature_columns: Option<Vec<String>>,
    contamination: Option<f64>,
    estimator_count: Option<usize>,
    max_samples: Option<usize>,
    random_seed: Option<u64>,
    parallel_detectors: Option<bool>,
}

impl QualityConfigBuilder {
    /// Set the columns that together identify duplicate records.
    pub fn duplicate_key_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.duplicate_key_columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    /// Set the column checked by the IQR outlier detector.
    pub fn outlier_column(mut self, column: impl Into<String>) -> Self {
        self.outlier_column = Some(column.into());
        self
    }

    /// Set the numeric feature columns for the isolation forest.
    pub fn feature_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.feature_columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    /// Set the expected anomaly fraction.
    ///
    /// # Arguments
    /// * `fraction` - Value strictly between 0.0 and 1.0 (e.g., 0.03 = 3%)
    pub fn contamination(mut self, fraction: f64) -> Self {
        self.contamination = Some(fraction);
        self
    }

    /// Set the number of isolation trees.
    pub fn estimator_count(mut self, count: usize) -> Self {
        self.estimator_count = Some(count);
        self
    }

    /// Set the per-tree subsample cap.
    pub fn max_samples(mut self, samples: usize) -> Self {
        self.max_samples = Some(samples);
        self
    }

    /// Set the random seed used by the isolation forest.
    pub fn random_seed(mut self, seed: u64) -> Self {
        self.random_seed = Some(seed);
        self
    }

    /// Enable or disable concurrent detector execution.
    pub fn parallel_detectors(mut self, parallel: bool) -> Self {
        self.parallel_detectors = Some(parallel);
        self
    }

    /// Build the configuration.
    ///
    /// Returns a validated `QualityConfig` or an error if validation fails.
    pub fn build(self) -> Result<QualityConfig, ConfigValidationError> {
        let defaults = QualityConfig::default();
        let config = QualityConfig {
            duplicate_key_columns: self
                .duplicate_key_columns
                .unwrap_or(defaults.duplicate_key_columns),
            outlier_column: self.outlier_column.unwrap_or(defaults.outlier_column),
            feature_columns: self.feature_columns.unwrap_or(defaults.feature_columns),
            contamination: self.contamination.unwrap_or(defaults.contamination),
            estimator_count: self.estimator_count.unwrap_or(defaults.estimator_count),
            max_samples: self.max_samples.unwrap_or(defaults.max_samples),
            random_seed: self.random_seed.unwrap_or(defaults.random_seed),
            parallel_detectors: self
                .parallel_detectors
                .unwrap_or(defaults.parallel_detectors),
        };

        config.validate()?;
        Ok(config)
    }
}
