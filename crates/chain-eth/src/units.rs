//! Conversion between decimal display amounts and integer base units.

use alloy_primitives::utils::{format_units, parse_units, ParseUnits};
use alloy_primitives::U256;

use crate::error::EthError;

/// Decimals of the native currency (wei per ether = 10^18).
pub const ETHER_DECIMALS: u8 = 18;

/// Fixed scale used when converting token transfer amounts.
pub const TOKEN_DECIMALS: u8 = 18;

/// Parses a positive decimal amount string (e.g. `"10"`, `"0.5"`) into base
/// units at the given scale.
///
/// Rejects non-numeric input, negative values, zero, and amounts with more
/// fraction digits than `decimals`.
pub fn parse_amount(amount: &str, decimals: u8) -> Result<U256, EthError> {
    let trimmed = amount.trim();
    if trimmed.is_empty() {
        return Err(EthError::InvalidAmount("amount is empty".into()));
    }
    if !is_plain_decimal(trimmed) {
        return Err(EthError::InvalidAmount(format!("{trimmed}: not a decimal number")));
    }

    if let Some((_, fraction)) = trimmed.split_once('.') {
        if fraction.len() > usize::from(decimals) {
            return Err(EthError::InvalidAmount(format!(
                "{trimmed}: more than {decimals} fraction digits"
            )));
        }
    }

    let parsed = parse_units(trimmed, decimals)
        .map_err(|e| EthError::InvalidAmount(format!("{trimmed}: {e}")))?;

    match parsed {
        ParseUnits::U256(value) if !value.is_zero() => Ok(value),
        _ => Err(EthError::InvalidAmount(format!(
            "{trimmed}: must be greater than zero"
        ))),
    }
}

/// Digits with at most one `.`; `parse_units` alone also accepts `_` separators.
fn is_plain_decimal(s: &str) -> bool {
    let (whole, fraction) = s.split_once('.').unwrap_or((s, ""));
    !(whole.is_empty() && fraction.is_empty())
        && whole.bytes().all(|b| b.is_ascii_digit())
        && fraction.bytes().all(|b| b.is_ascii_digit())
}

/// Formats base units as a decimal string at the given scale, e.g.
/// `1500000000000000000` at 18 decimals becomes `"1.500000000000000000"`.
pub fn format_amount(value: U256, decimals: u8) -> Result<String, EthError> {
    format_units(value, decimals).map_err(|e| EthError::EncodingError(e.to_string()))
}

/// Converts base units to a floating-point display value
/// (`value / 10^decimals`). Precision loss is accepted; the result is only
/// used for display.
pub fn to_display_f64(value: U256, decimals: u8) -> Result<f64, EthError> {
    let formatted = format_amount(value, decimals)?;
    formatted
        .parse::<f64>()
        .map_err(|e| EthError::EncodingError(format!("{formatted}: {e}")))
}

/// Parses a JSON-RPC hex quantity (`"0x1bc16d674ec80000"`) into a [`U256`].
///
/// `"0x"` and `"0x0"` both decode to zero.
pub fn parse_quantity(quantity: &str) -> Result<U256, EthError> {
    let digits = quantity
        .strip_prefix("0x")
        .or_else(|| quantity.strip_prefix("0X"))
        .ok_or_else(|| EthError::InvalidQuantity(format!("{quantity}: missing 0x prefix")))?;

    if digits.is_empty() {
        return Ok(U256::ZERO);
    }

    U256::from_str_radix(digits, 16)
        .map_err(|e| EthError::InvalidQuantity(format!("{quantity}: {e}")))
}

/// Encodes a value as a minimal JSON-RPC hex quantity.
pub fn to_quantity(value: U256) -> String {
    format!("{value:#x}")
}
