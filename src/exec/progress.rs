// src/exec/progress.rs

//! Progress-line recognition for the extraction tool's stdout.
//!
//! The tool reports progress as lines like
//! `[download]  42.7% of   10.00MiB at  1.20MiB/s ETA 00:07`. Anything else
//! on stdout is informational and ignored.

use thiserror::Error;

/// Prefix of every download status line.
pub const PROGRESS_PREFIX: &str = "[download] ";

/// Marker that follows the percentage on a progress line.
pub const PERCENT_MARKER: &str = "% of ";

/// A line had the progress shape but its percentage was not a number.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("unrecognised progress value {value:?} in line {line:?}")]
pub struct ProgressParseError {
    pub value: String,
    pub line: String,
}

/// Parse one stdout line.
///
/// - `Ok(None)`: not a progress line (ignored by the caller).
/// - `Ok(Some(f))`: progress fraction, i.e. the reported percentage / 100.
/// - `Err(_)`: a progress line whose percentage could not be parsed. This
///   means the tool changed its output format and is surfaced as a defect.
pub fn parse_progress_line(line: &str) -> Result<Option<f64>, ProgressParseError> {
    let Some(rest) = line.strip_prefix(PROGRESS_PREFIX) else {
        return Ok(None);
    };
    let Some(idx) = rest.find(PERCENT_MARKER) else {
        return Ok(None);
    };

    let value = rest[..idx].trim();
    let malformed = || ProgressParseError {
        value: value.to_string(),
        line: line.to_string(),
    };
    if !is_plain_decimal(value) {
        return Err(malformed());
    }
    value
        .parse::<f64>()
        .map(|percent| Some(percent / 100.0))
        .map_err(|_| malformed())
}

/// Digits with at most one `.`, and at least one digit.
///
/// `f64::from_str` also takes `NaN`, `inf`, signs and exponents, none of which
/// the tool ever prints as a percentage.
fn is_plain_decimal(value: &str) -> bool {
    let mut digits = 0usize;
    let mut dots = 0usize;
    for c in value.chars() {
        match c {
            '0'..='9' => digits += 1,
            '.' => dots += 1,
            _ => return false,
        }
    }
    digits > 0 && dots <= 1
}
