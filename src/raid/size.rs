//! Byte Sizes
//!
//! Parsing and formatting of human-readable sizes ("100 GB", "64 KB") and
//! stripe alignment. All multiples are binary (1 KB = 1024 bytes).

use crate::error::{Error, Result};

const KB: u64 = 1024;
const MB: u64 = KB * 1024;
const GB: u64 = MB * 1024;
const TB: u64 = GB * 1024;
const PB: u64 = TB * 1024;

const UNITS: [&str; 6] = ["B", "KB", "MB", "GB", "TB", "PB"];

/// Parse a size string (e.g., "64 KB", "1.82 TB", "512") to bytes
pub fn parse_size(s: &str) -> Result<u64> {
    let s = s.trim();
    if s.is_empty() {
        return Err(Error::InvalidSize("empty size string".into()));
    }

    // Find where the number ends and unit begins
    let mut num_end = 0;
    for (i, c) in s.char_indices() {
        if !c.is_ascii_digit() && c != '.' {
            num_end = i;
            break;
        }
        num_end = i + 1;
    }

    let num_str = &s[..num_end];
    let unit_str = s[num_end..].trim();

    let multiplier: u64 = match unit_str.to_uppercase().as_str() {
        "" | "B" => 1,
        "KB" => KB,
        "MB" => MB,
        "GB" => GB,
        "TB" => TB,
        "PB" => PB,
        _ => {
            return Err(Error::InvalidSize(format!(
                "{} is not a valid size suffix",
                unit_str
            )))
        }
    };

    // Plain byte counts stay exact up to u64::MAX
    if multiplier == 1 && !num_str.contains('.') {
        if let Ok(bytes) = num_str.parse::<u64>() {
            return Ok(bytes);
        }
    }

    let num: f64 = num_str
        .parse()
        .map_err(|_| Error::InvalidSize(format!("{} cannot be parsed as a Size", s)))?;

    let bytes = num * multiplier as f64;
    if !bytes.is_finite() || bytes >= u64::MAX as f64 {
        return Err(Error::InvalidSize(format!("{} is too large", s)));
    }
    Ok(bytes as u64)
}

/// Format bytes using the largest unit that keeps the mantissa below 1024
pub fn format_size(bytes: u64) -> String {
    let mut idx = 0;
    while idx < UNITS.len() - 1 && bytes >= 1u64 << ((idx + 1) * 10) {
        idx += 1;
    }
    let value = bytes as f64 / (1u64 << (idx * 10)) as f64;
    format!("{:.2} {}", value, UNITS[idx])
}

/// Round `value` up to the next multiple of a power-of-two stripe size
///
/// Returns `None` when the rounded value does not fit in a u64.
pub fn round_to_stripe(stripe_size: u64, value: u64) -> Option<u64> {
    if stripe_size == 0 {
        return Some(value);
    }
    let res = value & !(stripe_size - 1);
    if res != value {
        res.checked_add(stripe_size)
    } else {
        Some(res)
    }
}
