//! Number formatting for balances and amounts.

use alloy_primitives::U256;
use chain_eth::units::to_display_f64;
use num_format::{Locale, ToFormattedString};

use crate::error::Result;

/// Fraction digits kept by [`number_format`].
const MAX_FRACTION_DIGITS: u32 = 3;

/// Above this every `f64` is a whole number and too wide for the scaled
/// `u128` path.
const WHOLE_ONLY: f64 = u64::MAX as f64;

/// Thresholds for [`format_compact`], largest first.
const COMPACT_STEPS: [(f64, &str); 3] = [
    (1_000_000_000.0, "B"),
    (1_000_000.0, "M"),
    (1_000.0, "K"),
];

/// Formats a number the way an en-US decimal formatter does: thousands
/// grouping, at most three fraction digits (rounded half away from zero),
/// trailing fraction zeros dropped.
///
/// ```
/// use wallet_connect::format::number_format;
/// assert_eq!(number_format(1500.0), "1,500");
/// assert_eq!(number_format(1234.5678), "1,234.568");
/// ```
pub fn number_format(value: f64) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value.is_infinite() {
        return if value < 0.0 { "-∞" } else { "∞" }.to_string();
    }

    if value.abs() >= WHOLE_ONLY {
        let sign = if value < 0.0 { "-" } else { "" };
        return format!("{sign}{}", group_digits(&format!("{}", value.abs())));
    }

    let scale = 10u128.pow(MAX_FRACTION_DIGITS);
    let scaled = (value.abs() * scale as f64).round() as u128;
    let whole = scaled / scale;
    let fraction = scaled % scale;

    let mut out = String::new();
    if value < 0.0 && scaled != 0 {
        out.push('-');
    }
    out.push_str(&whole.to_formatted_string(&Locale::en));

    if fraction != 0 {
        let digits = format!("{:0width$}", fraction, width = MAX_FRACTION_DIGITS as usize);
        out.push('.');
        out.push_str(digits.trim_end_matches('0'));
    }

    out
}

/// Inserts the en-US thousands separator into a plain run of digits.
fn group_digits(digits: &str) -> String {
    let separator = Locale::en.separator();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, digit) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push_str(separator);
        }
        out.push(digit);
    }
    out
}

/// [`number_format`] over a string input. Non-numeric input formats as `"NaN"`;
/// an empty string is zero.
pub fn number_format_str(value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return number_format(0.0);
    }
    number_format(trimmed.parse::<f64>().unwrap_or(f64::NAN))
}

/// Compact form with a `K`/`M`/`B` suffix once the value reaches a thousand,
/// million or billion: `2_500_000` becomes `"2.5M"`, `500` stays `"500"`.
pub fn format_compact(value: f64) -> String {
    for (step, suffix) in COMPACT_STEPS {
        if (value / step).abs() >= 1.0 {
            return format!("{}{suffix}", number_format(value / step));
        }
    }
    number_format(value)
}

/// Display string for a balance held in base units.
pub fn format_balance(value: U256, decimals: u8) -> Result<String> {
    Ok(format_compact(to_display_f64(value, decimals)?))
}
