// src/merge/prefix.rs

use once_cell::sync::Lazy;
use regex::Regex;

static LEADING_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{8}-").expect("leading date regex should compile"));
static TRAILING_PERIOD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"_\d{4}_\d{2}$").expect("trailing period regex should compile"));

/// Recover the dataset prefix from a file stem: drop a leading
/// `YYYYMMDD-` stamp, then a trailing `_YYYY_MM` suffix.
pub fn normalize(file_stem: &str) -> String {
    let stripped = LEADING_DATE.replace(file_stem, "");
    TRAILING_PERIOD.replace(&stripped, "").into_owned()
}
