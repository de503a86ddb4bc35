//! Fiscal year hints from document file names.

use chrono::Datelike;
use regex::Regex;
use std::sync::LazyLock;

pub const MIN_YEAR: i32 = 1990;

/// Tried in order, first valid year wins
static YEAR_PATTERNS: LazyLock<[Regex; 5]> = LazyLock::new(|| {
    [
        // 2023_tax.pdf, 2023-tax.pdf
        Regex::new(r"(?i)(?:^|[_\-\s])([0-9]{4})(?:[_\-\s]|\.pdf$)")
            .expect("valid separator regex"),
        // TY2023.pdf, FY2023.pdf
        Regex::new(r"(?i)(?:TY|FY)([0-9]{4})").expect("valid prefix regex"),
        // 2023-tax-return.pdf, 2023_1040.pdf
        Regex::new(r"(?i)([0-9]{4})[-_](?:1040|tax|return)").expect("valid leading year regex"),
        // tax-return-2023.pdf
        Regex::new(r"(?i)(?:1040|tax|return)[-_]([0-9]{4})").expect("valid trailing year regex"),
        Regex::new(r"(?i)^([0-9]{4})\.pdf$").expect("valid bare year regex"),
    ]
});

/// Guess the tax year from a file name, accepting years up to next year
pub fn year_from_filename(filename: &str) -> Option<i32> {
    year_from_filename_as_of(filename, chrono::Local::now().year())
}

pub fn year_from_filename_as_of(filename: &str, current_year: i32) -> Option<i32> {
    let valid = MIN_YEAR..=current_year + 1;

    YEAR_PATTERNS.iter().find_map(|pattern| {
        let year = pattern
            .captures(filename)?
            .get(1)?
            .as_str()
            .parse::<i32>()
            .ok()?;
        if valid.contains(&year) {
            Some(year)
        } else {
            log::debug!("Ignoring out of range year {} in '{}'", year, filename);
            None
        }
    })
}
