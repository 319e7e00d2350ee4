//! Human-readable byte sizes and reduction summaries.

/// Unit names in base-1024 order
pub const SIZE_UNITS: [&str; 9] = ["Bytes", "KB", "MB", "GB", "TB", "PB", "EB", "ZB", "YB"];

/// Percent string reported when the original size is zero
pub const ZERO_ORIGINAL_SENTINEL: &str = "Error: Original size is 0";

/// Reduction achieved by a compression run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReductionSummary {
    /// Percentage of the original size that was saved, e.g. `"40.00%"`
    pub percent: String,

    /// Amount saved, e.g. `"400.0 Bytes"`. Prefixed with `-` when the archive
    /// is larger than its input.
    pub saved: String,
}

impl ReductionSummary {
    /// Whether the summary carries the zero-size sentinel instead of a percentage
    pub fn is_degenerate(&self) -> bool {
        self.percent == ZERO_ORIGINAL_SENTINEL
    }
}

/// Format a byte count with the largest fitting unit, rounded to two decimals.
///
/// `0` maps to `"0 Bytes"`. Values keep their shortest decimal form, so
/// `1024` becomes `"1.0 KB"` and `1_500_000` becomes `"1.43 MB"`.
pub fn format_bytes(bytes: u64) -> String {
    format_bytes_wide(u128::from(bytes))
}

fn format_bytes_wide(bytes: u128) -> String {
    if bytes == 0 {
        return "0 Bytes".to_string();
    }

    let mut index = 0;
    let mut scale: u128 = 1;
    while index + 1 < SIZE_UNITS.len() && bytes >= scale * 1024 {
        scale *= 1024;
        index += 1;
    }

    let value = bytes as f64 / scale as f64;
    let rounded = (value * 100.0).round_ties_even() / 100.0;

    // Debug formatting keeps the trailing ".0" on whole numbers
    format!("{:?} {}", rounded, SIZE_UNITS[index])
}

/// Compute the size reduction between an input and its compressed output.
///
/// An original size of zero yields the sentinel pair
/// (`"Error: Original size is 0"`, `"0 Bytes"`).
pub fn reduction_summary(original: u64, compressed: u64) -> ReductionSummary {
    if original == 0 {
        return ReductionSummary {
            percent: ZERO_ORIGINAL_SENTINEL.to_string(),
            saved: "0 Bytes".to_string(),
        };
    }

    let difference = i128::from(original) - i128::from(compressed);
    let reduction = difference as f64 / original as f64 * 100.0;

    let saved = if difference < 0 {
        format!("-{}", format_bytes_wide(difference.unsigned_abs()))
    } else {
        format_bytes_wide(difference.unsigned_abs())
    };

    ReductionSummary {
        percent: format!("{:.2}%", reduction),
        saved,
    }
}
