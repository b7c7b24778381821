//! Field-level format checks.
//!
//! These never fail: a value that cannot be checked is simply invalid.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;

/// Exactly five ASCII digits, nothing else.
static ZIP_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9]{5}$").expect("Invalid regex: zip code"));

/// Four-digit year, one- or two-digit month and day, no padding or sign.
static DOB_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[0-9]{4}-[0-9]{1,2}-[0-9]{1,2}$").expect("Invalid regex: date of birth")
});

pub const DOB_FORMAT: &str = "%Y-%m-%d";

/// `true` if `value` is a five-digit zip code.
pub fn is_valid_zip(value: Option<&str>) -> bool {
    value.is_some_and(|v| ZIP_PATTERN.is_match(v))
}

/// `true` if `value` is a real calendar date in `YYYY-MM-DD` form.
pub fn is_valid_dob(value: Option<&str>) -> bool {
    value.is_some_and(|v| {
        DOB_PATTERN.is_match(v) && NaiveDate::parse_from_str(v, DOB_FORMAT).is_ok()
    })
}
