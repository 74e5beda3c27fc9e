//! Transfer form schema.
//!
//! Both fields are checked on every submit and all failures are reported
//! together, one message per field, so the form can show them inline.

use std::fmt;

use alloy_primitives::U256;
use chain_eth::address::is_address_shape;
use chain_eth::units::parse_amount;
use serde::{Deserialize, Serialize};

/// Minimum length before the recipient is checked for shape.
const MIN_RECIPIENT_LEN: usize = 5;

pub const MSG_RECIPIENT_REQUIRED: &str = "Please enter a recipient address";
pub const MSG_RECIPIENT_FORMAT: &str = "Invalid address format";
pub const MSG_AMOUNT_INVALID: &str = "Invalid amount";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Field {
    Recipient,
    Amount,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Recipient => f.write_str("recipient"),
            Field::Amount => f.write_str("amount"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: Field,
    pub message: String,
}

/// Every field error found in one validation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationErrors {
    pub errors: Vec<FieldError>,
}

impl ValidationErrors {
    fn push(&mut self, field: Field, message: &str) {
        self.errors.push(FieldError {
            field,
            message: message.to_string(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// First message for `field`, for inline display.
    pub fn message_for(&self, field: Field) -> Option<&str> {
        self.errors
            .iter()
            .find(|e| e.field == field)
            .map(|e| e.message.as_str())
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, err) in self.errors.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}: {}", err.field, err.message)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

/// Raw values as typed into the transfer dialog.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferForm {
    pub recipient: String,
    pub amount: String,
}

/// A transfer that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidTransfer {
    pub recipient: String,
    /// Amount as entered, trimmed.
    pub amount: String,
    /// Amount in base units at the fixed 18-decimal scale.
    pub amount_base_units: U256,
}

impl TransferForm {
    pub fn new(recipient: impl Into<String>, amount: impl Into<String>) -> Self {
        Self {
            recipient: recipient.into(),
            amount: amount.into(),
        }
    }

    pub fn validate(&self) -> Result<ValidTransfer, ValidationErrors> {
        let mut errors = ValidationErrors::default();

        let recipient = self.recipient.trim();
        if recipient.len() < MIN_RECIPIENT_LEN {
            errors.push(Field::Recipient, MSG_RECIPIENT_REQUIRED);
        } else if !is_address_shape(recipient) {
            errors.push(Field::Recipient, MSG_RECIPIENT_FORMAT);
        }

        let amount = self.amount.trim();
        let parsed = parse_amount(amount, chain_eth::units::TOKEN_DECIMALS);
        if parsed.is_err() {
            errors.push(Field::Amount, MSG_AMOUNT_INVALID);
        }

        match parsed {
            Ok(amount_base_units) if errors.is_empty() => Ok(ValidTransfer {
                recipient: recipient.to_string(),
                amount: amount.to_string(),
                amount_base_units,
            }),
            _ => Err(errors),
        }
    }
}

/// Keeps only the digits of a raw amount keystroke, as the amount field does
/// before storing its value.
pub fn sanitize_amount_input(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEAD: &str = "0x000000000000000000000000000000000000dEaD";

    #[test]
    fn accepts_valid_transfer() {
        let valid = TransferForm::new(DEAD, "10").validate().unwrap();
        assert_eq!(valid.recipient, DEAD);
        assert_eq!(
            valid.amount_base_units,
            U256::from(10_000_000_000_000_000_000u128)
        );
    }

    #[test]
    fn accepts_any_case_recipient() {
        let lower = DEAD.to_lowercase();
        assert!(TransferForm::new(lower, "1").validate().is_ok());
        assert!(TransferForm::new("0X000000000000000000000000000000000000DEAD", "1")
            .validate()
            .is_ok());
    }

    #[test]
    fn rejects_zero_amount() {
        let errs = TransferForm::new(DEAD, "0").validate().unwrap_err();
        assert_eq!(errs.message_for(Field::Amount), Some(MSG_AMOUNT_INVALID));
        assert!(errs.message_for(Field::Recipient).is_none());
    }

    #[test]
    fn rejects_negative_and_non_numeric_amounts() {
        for amount in ["-1", "abc", "", "1,000", "1_000", "NaN"] {
            let errs = TransferForm::new(DEAD, amount).validate().unwrap_err();
            assert_eq!(
                errs.message_for(Field::Amount),
                Some(MSG_AMOUNT_INVALID),
                "amount {amount:?} should be rejected"
            );
        }
    }

    #[test]
    fn short_recipient_is_required_message() {
        let errs = TransferForm::new("0x1", "5").validate().unwrap_err();
        assert_eq!(errs.message_for(Field::Recipient), Some(MSG_RECIPIENT_REQUIRED));
    }

    #[test]
    fn malformed_recipient_is_format_message() {
        for recipient in [
            "0x000000000000000000000000000000000000dEa",
            "0x000000000000000000000000000000000000dEaDD",
            "0xZZ0000000000000000000000000000000000dEaD",
            "000000000000000000000000000000000000dEaD00",
            "prefix0x000000000000000000000000000000000000dEaD",
        ] {
            let errs = TransferForm::new(recipient, "5").validate().unwrap_err();
            assert_eq!(
                errs.message_for(Field::Recipient),
                Some(MSG_RECIPIENT_FORMAT),
                "recipient {recipient:?} should be rejected"
            );
        }
    }

    #[test]
    fn collects_both_field_errors() {
        let errs = TransferForm::new("", "0").validate().unwrap_err();
        assert_eq!(errs.errors.len(), 2);
        assert_eq!(
            errs.to_string(),
            "recipient: Please enter a recipient address; amount: Invalid amount"
        );
    }

    #[test]
    fn sanitize_strips_non_digits() {
        assert_eq!(sanitize_amount_input("1,500"), "1500");
        assert_eq!(sanitize_amount_input("12a3 "), "123");
        assert_eq!(sanitize_amount_input(""), "");
    }
}
