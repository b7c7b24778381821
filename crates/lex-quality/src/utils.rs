//! Shared column-access helpers.
//!
//! Detectors read source columns through these helpers so that null handling
//! is identical everywhere: a float `NaN` counts as missing, exactly like a
//! null, since the upstream normalizer coerces unparseable numbers to `NaN`.

use crate::error::{QualityError, Result};
use crate::types::columns;
use polars::prelude::*;

/// Check if a DataType is numeric (integer or float).
#[inline]
pub fn is_numeric_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

/// Check if a DataType is floating point.
#[inline]
pub fn is_float_dtype(dtype: &DataType) -> bool {
    matches!(dtype, DataType::Float32 | DataType::Float64)
}

/// Look up a column, mapping absence to [`QualityError::ColumnNotFound`].
pub fn column_series<'a>(df: &'a DataFrame, name: &str) -> Result<&'a Series> {
    df.column(name)
        .map(|col| col.as_materialized_series())
        .map_err(|_| QualityError::ColumnNotFound(name.to_string()))
}

/// Per-row missing flags for a series. Float `NaN` is treated as missing.
pub fn missing_mask(series: &Series) -> PolarsResult<Vec<bool>> {
    if is_float_dtype(series.dtype()) {
        let floats = series.cast(&DataType::Float64)?;
        Ok(floats
            .f64()?
            .into_iter()
            .map(|v| v.is_none_or(f64::is_nan))
            .collect())
    } else {
        let nulls = series.is_null();
        Ok(nulls.into_iter().map(|v| v.unwrap_or(false)).collect())
    }
}

/// Per-row numeric values; nulls, `NaN` and non-numeric strings become `None`.
pub fn float_values(series: &Series) -> PolarsResult<Vec<Option<f64>>> {
    let floats = series.cast(&DataType::Float64)?;
    Ok(floats
        .f64()?
        .into_iter()
        .map(|v| v.filter(|x| !x.is_nan()))
        .collect())
}

/// Per-row string form of every value; nulls stay `None`.
pub fn string_values(series: &Series) -> PolarsResult<Vec<Option<String>>> {
    let strings = series.cast(&DataType::String)?;
    Ok(strings
        .str()?
        .into_iter()
        .map(|v| v.map(str::to_string))
        .collect())
}

/// Type the numeric claim columns of a frame read entirely as text.
///
/// Claims CSVs are read without type inference so that zip codes like
/// `00501` keep their leading zeros. Afterwards `claim_amount` becomes
/// `Float64`, the patient and doctor ids `Int64` and `claim_date` a `Date`;
/// values that do not parse become null and so count as missing. Absent
/// columns are left alone. `dob` stays text for the format check.
pub fn coerce_claim_columns(df: DataFrame) -> PolarsResult<DataFrame> {
    let present: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|s| s.to_string())
        .collect();
    let casts: Vec<Expr> = [
        (columns::CLAIM_AMOUNT, DataType::Float64),
        (columns::PATIENT_ID, DataType::Int64),
        (columns::DOCTOR_ID, DataType::Int64),
        (columns::CLAIM_DATE, DataType::Date),
    ]
    .into_iter()
    .filter(|(name, _)| present.iter().any(|c| c == name))
    .map(|(name, dtype)| col(name).cast(dtype))
    .collect();

    if casts.is_empty() {
        return Ok(df);
    }
    df.lazy().with_columns(casts).collect()
}

/// Linear-interpolated quantile of an ascending-sorted slice.
///
/// Uses position `q * (n - 1)` like numpy's default `linear` method.
/// Returns `None` for an empty slice.
pub fn quantile_linear(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    let frac = pos - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * frac)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_numeric_dtype() {
        assert!(is_numeric_dtype(&DataType::Int64));
        assert!(is_numeric_dtype(&DataType::Float64));
        assert!(!is_numeric_dtype(&DataType::String));
        assert!(!is_numeric_dtype(&DataType::Boolean));
    }

    #[test]
    fn test_missing_mask_treats_nan_as_missing() {
        let series = Series::new("amount".into(), &[Some(1.0), None, Some(f64::NAN)]);
        assert_eq!(missing_mask(&series).unwrap(), vec![false, true, true]);
    }

    #[test]
    fn test_missing_mask_strings() {
        let series = Series::new("status".into(), &[Some("APPROVED"), None, Some("")]);
        assert_eq!(missing_mask(&series).unwrap(), vec![false, true, false]);
    }

    #[test]
    fn test_float_values_coerces_strings() {
        let series = Series::new("amount".into(), &[Some("12.5"), Some("abc"), None]);
        assert_eq!(float_values(&series).unwrap(), vec![Some(12.5), None, None]);
    }

    #[test]
    fn test_string_values_of_integers() {
        let series = Series::new("zip_code".into(), &[Some(12345i64), None]);
        assert_eq!(
            string_values(&series).unwrap(),
            vec![Some("12345".to_string()), None]
        );
    }

    #[test]
    fn test_coerce_claim_columns() {
        let df = df![
            "claim_amount" => [Some("12.5"), Some("n/a"), None],
            "patient_id" => ["7", "8", "9"],
            "zip_code" => ["00501", "12345", "1234"],
        ]
        .unwrap();
        let df = coerce_claim_columns(df).unwrap();
        assert_eq!(df.column("claim_amount").unwrap().dtype(), &DataType::Float64);
        assert_eq!(df.column("patient_id").unwrap().dtype(), &DataType::Int64);
        assert_eq!(df.column("zip_code").unwrap().dtype(), &DataType::String);
        assert_eq!(df.column("claim_amount").unwrap().null_count(), 2);
    }

    #[test]
    fn test_coerce_claim_date_nulls_unparseable_values() {
        let df = df![
            "claim_date" => [Some("2023-01-05"), Some("someday"), Some("2023-02-30"), None],
            "dob" => ["1990-05-14", "bad", "1990-05-14", "1990-05-14"],
        ]
        .unwrap();
        let df = coerce_claim_columns(df).unwrap();
        let dates = df.column("claim_date").unwrap();
        assert_eq!(dates.dtype(), &DataType::Date);
        assert_eq!(
            missing_mask(dates.as_materialized_series()).unwrap(),
            vec![false, true, true, true]
        );
        assert_eq!(df.column("dob").unwrap().dtype(), &DataType::String);
    }

    #[test]
    fn test_quantile_linear() {
        let sorted = [10.0, 12.0, 12.0, 13.0, 15.0, 16.0, 18.0, 100.0];
        assert_eq!(quantile_linear(&sorted, 0.25), Some(12.0));
        assert_eq!(quantile_linear(&sorted, 0.75), Some(16.5));
        assert_eq!(quantile_linear(&sorted, 0.0), Some(10.0));
        assert_eq!(quantile_linear(&sorted, 1.0), Some(100.0));
        assert_eq!(quantile_linear(&[], 0.5), None);
        assert_eq!(quantile_linear(&[4.0], 0.9), Some(4.0));
    }
}
