//! Per-record derived quality attributes.
//!
//! The preprocessor runs once over the dataset before any detector. It never
//! touches the source frame; the attributes it computes live in
//! [`DerivedAttributes`], aligned with the frame's row order.

mod validators;

pub use validators::{DOB_FORMAT, is_valid_dob, is_valid_zip};

use crate::config::{ConfigValidationError, require_column};
use crate::error::{Result, ResultExt};
use crate::types::columns;
use crate::utils::{column_series, missing_mask, string_values};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// Quality signals computed per record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivedAttributes {
    /// Number of null fields in the record.
    pub missing_count: Vec<u32>,
    pub invalid_zip_flag: Vec<bool>,
    pub invalid_dob_flag: Vec<bool>,
    /// Set when another record shares the identifier value.
    pub duplicate_flag: Vec<bool>,
}

impl DerivedAttributes {
    pub fn len(&self) -> usize {
        self.missing_count.len()
    }

    pub fn is_empty(&self) -> bool {
        self.missing_count.is_empty()
    }

    /// `invalid_zip_flag OR invalid_dob_flag`, per record.
    pub fn invalid_format_mask(&self) -> Vec<bool> {
        self.invalid_zip_flag
            .iter()
            .zip(&self.invalid_dob_flag)
            .map(|(zip, dob)| *zip || *dob)
            .collect()
    }

    /// The attributes as a standalone frame, one column per attribute.
    pub fn to_dataframe(&self) -> PolarsResult<DataFrame> {
        DataFrame::new(vec![
            Column::new("missing_count".into(), self.missing_count.as_slice()),
            Column::new("invalid_zip_flag".into(), self.invalid_zip_flag.as_slice()),
            Column::new("invalid_dob_flag".into(), self.invalid_dob_flag.as_slice()),
            Column::new("duplicate_flag".into(), self.duplicate_flag.as_slice()),
        ])
    }
}

/// Computes [`DerivedAttributes`] from the raw claim fields.
#[derive(Debug, Clone)]
pub struct Preprocessor {
    identifier_column: String,
    zip_column: String,
    dob_column: String,
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self {
            identifier_column: columns::CLAIM_ID.to_string(),
            zip_column: columns::ZIP_CODE.to_string(),
            dob_column: columns::DOB.to_string(),
        }
    }
}

impl Preprocessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a different column as the record identifier.
    pub fn with_identifier_column(mut self, column: impl Into<String>) -> Self {
        self.identifier_column = column.into();
        self
    }

    pub fn identifier_column(&self) -> &str {
        &self.identifier_column
    }

    /// Validate that the identifier, zip and dob columns exist in `df`.
    pub fn validate_schema(
        &self,
        df: &DataFrame,
    ) -> std::result::Result<(), ConfigValidationError> {
        require_column(df, "identifier_column", &self.identifier_column)?;
        require_column(df, "zip_column", &self.zip_column)?;
        require_column(df, "dob_column", &self.dob_column)
    }

    pub fn process(&self, df: &DataFrame) -> Result<DerivedAttributes> {
        let missing_count = missing_counts(df).context("Counting missing fields")?;

        let zips = string_values(column_series(df, &self.zip_column)?)
            .context("Reading zip codes")?;
        let invalid_zip_flag = zips.iter().map(|z| !is_valid_zip(z.as_deref())).collect();

        let dobs = string_values(column_series(df, &self.dob_column)?)
            .context("Reading dates of birth")?;
        let invalid_dob_flag = dobs.iter().map(|d| !is_valid_dob(d.as_deref())).collect();

        let duplicate_flag = duplicate_mask(df, std::slice::from_ref(&self.identifier_column))?;

        let derived = DerivedAttributes {
            missing_count,
            invalid_zip_flag,
            invalid_dob_flag,
            duplicate_flag,
        };

        debug!(
            "Derived attributes for {} records ({} with missing fields)",
            derived.len(),
            derived.missing_count.iter().filter(|&&c| c > 0).count()
        );

        Ok(derived)
    }
}

/// Null fields per row, over every column of the frame.
fn missing_counts(df: &DataFrame) -> PolarsResult<Vec<u32>> {
    let mut counts = vec![0u32; df.height()];
    for col in df.get_columns() {
        let mask = missing_mask(col.as_materialized_series())?;
        for (count, missing) in counts.iter_mut().zip(mask) {
            if missing {
                *count += 1;
            }
        }
    }
    Ok(counts)
}

/// Rows belonging to a group of two or more records with identical values
/// across `keys`. Every member of a group is flagged; nulls compare equal.
pub(crate) fn duplicate_mask(df: &DataFrame, keys: &[String]) -> Result<Vec<bool>> {
    let height = df.height();
    let mut key_columns = Vec::with_capacity(keys.len());
    for key in keys {
        let values = string_values(column_series(df, key)?)
            .context(format!("Reading key column '{}'", key))?;
        key_columns.push(values);
    }

    let row_key = |row: usize| -> Vec<Option<&str>> {
        key_columns
            .iter()
            .map(|values| values[row].as_deref())
            .collect()
    };

    let mut group_sizes: HashMap<Vec<Option<&str>>, usize> = HashMap::with_capacity(height);
    for row in 0..height {
        *group_sizes.entry(row_key(row)).or_insert(0) += 1;
    }

    Ok((0..height)
        .map(|row| group_sizes.get(&row_key(row)).copied().unwrap_or(0) > 1)
        .collect())
}
