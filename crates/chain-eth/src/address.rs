use alloy_primitives::Address;
use sha3::{Digest, Keccak256};

use crate::error::EthError;

/// Returns the 40-character hex body of a `0x`-prefixed address string.
fn hex_body(address: &str) -> Result<&str, EthError> {
    let hex_part = address
        .strip_prefix("0x")
        .or_else(|| address.strip_prefix("0X"))
        .ok_or_else(|| EthError::InvalidAddress("address must start with 0x".into()))?;

    if hex_part.len() != 40 {
        return Err(EthError::InvalidAddress(format!(
            "expected 40 hex characters, got {}",
            hex_part.len()
        )));
    }

    if !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(EthError::InvalidAddress(
            "address contains non-hex characters".into(),
        ));
    }

    Ok(hex_part)
}

/// Checks that a string has the shape of an address: `0x` followed by exactly
/// 40 hex digits, any case. No checksum is verified.
///
/// This is the check applied to transfer recipients.
pub fn is_address_shape(address: &str) -> bool {
    hex_body(address).is_ok()
}

/// Validates an Ethereum address string.
///
/// Checks that the address has the correct format (0x + 40 hex characters).
/// If the address contains mixed case, the EIP-55 checksum is verified and
/// `Ok(false)` is returned on mismatch.
pub fn validate_address(address: &str) -> Result<bool, EthError> {
    let hex_part = hex_body(address)?;

    // All-lowercase or all-uppercase carries no checksum.
    let is_all_lower = hex_part.chars().all(|c| !c.is_ascii_uppercase());
    let is_all_upper = hex_part.chars().all(|c| !c.is_ascii_lowercase());

    if is_all_lower || is_all_upper {
        return Ok(true);
    }

    let checksummed = checksum_address(address)?;
    Ok(checksummed[2..] == *hex_part)
}

/// Applies EIP-55 mixed-case checksum encoding to an Ethereum address.
///
/// Input case is ignored.
pub fn checksum_address(address: &str) -> Result<String, EthError> {
    let hex_part = hex_body(address)?.to_lowercase();

    // EIP-55: hash the lowercase hex address (without 0x).
    let hash = Keccak256::digest(hex_part.as_bytes());

    let mut checksummed = String::with_capacity(42);
    checksummed.push_str("0x");

    for (i, c) in hex_part.chars().enumerate() {
        // Nibble i of the hash: high nibble for even i, low nibble for odd.
        let byte = hash[i / 2];
        let nibble = if i % 2 == 0 { byte >> 4 } else { byte & 0x0f };
        if c.is_ascii_alphabetic() && nibble >= 8 {
            checksummed.push(c.to_ascii_uppercase());
        } else {
            checksummed.push(c);
        }
    }

    Ok(checksummed)
}

/// Parses a `0x`-prefixed address string into an [`Address`].
///
/// Only the shape is checked; checksum case is not enforced.
pub fn parse_address(address: &str) -> Result<Address, EthError> {
    let hex_part = hex_body(address)?;
    let bytes = hex::decode(hex_part)
        .map_err(|e| EthError::InvalidAddress(format!("invalid hex: {e}")))?;
    Ok(Address::from_slice(&bytes))
}

/// Shortens an address for display: first six and last four characters.
///
/// Strings too short to shorten are returned unchanged.
pub fn short_address(address: &str) -> String {
    if address.len() <= 10 || !address.is_ascii() {
        return address.to_string();
    }
    format!("{}...{}", &address[..6], &address[address.len() - 4..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eip55_checksum_known_addresses() {
        // Test vectors from EIP-55.
        let cases = [
            "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed",
            "0xfB6916095ca1df60bB79Ce92cE3Ea74c37c5d359",
            "0xdbF03B407c01E7cD3CBea99509d93f8DDDC8C6FB",
            "0xD1220A0cf47c7B9Be7A2E6BA89F429762e7b9aDb",
        ];

        for expected in &cases {
            let lower = format!("0x{}", expected[2..].to_lowercase());
            let result = checksum_address(&lower).unwrap();
            assert_eq!(&result, expected, "checksum mismatch for {}", expected);
        }
    }

    #[test]
    fn checksum_matches_alloy() {
        let addr = "0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed";
        let ours = checksum_address(addr).unwrap();
        let theirs = parse_address(addr).unwrap().to_checksum(None);
        assert_eq!(ours, theirs);
    }

    #[test]
    fn validate_valid_checksummed_address() {
        assert!(validate_address("0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed").unwrap());
    }

    #[test]
    fn validate_all_lowercase_address() {
        assert!(validate_address("0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed").unwrap());
    }

    #[test]
    fn validate_all_uppercase_address() {
        assert!(validate_address("0x5AAEB6053F3E94C9B9A09F33669435E7EF1BEAED").unwrap());
    }

    #[test]
    fn validate_bad_checksum_returns_false() {
        let addr = "0x5AAEB6053F3E94C9b9A09f33669435E7Ef1BeAed";
        assert!(!validate_address(addr).unwrap());
    }

    #[test]
    fn validate_short_address_errors() {
        assert!(validate_address("0x5aAeb6053F").is_err());
    }

    #[test]
    fn validate_no_prefix_errors() {
        assert!(validate_address("5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed").is_err());
    }

    #[test]
    fn validate_non_hex_chars_errors() {
        assert!(validate_address("0xGGGGb6053F3E94C9b9A09f33669435E7Ef1BeAed").is_err());
    }

    #[test]
    fn shape_accepts_any_case() {
        assert!(is_address_shape("0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed"));
        // Bad checksum is still the right shape.
        assert!(is_address_shape("0x5AAEB6053F3E94C9b9A09f33669435E7Ef1BeAed"));
        assert!(is_address_shape("0X000000000000000000000000000000000000dead"));
    }

    #[test]
    fn shape_is_anchored() {
        let embedded = "xx0x000000000000000000000000000000000000dEaDyy";
        assert!(!is_address_shape(embedded));
        assert!(!is_address_shape("0x000000000000000000000000000000000000dEaD0"));
        assert!(!is_address_shape(""));
        assert!(!is_address_shape("0x"));
    }

    #[test]
    fn parse_address_roundtrips_bytes() {
        let addr = parse_address("0x000000000000000000000000000000000000dEaD").unwrap();
        assert_eq!(addr.as_slice()[18], 0xde);
        assert_eq!(addr.as_slice()[19], 0xad);
    }

    #[test]
    fn short_address_formats() {
        assert_eq!(
            short_address("0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed"),
            "0x5aAe...eAed"
        );
        assert_eq!(short_address("0x1234"), "0x1234");
    }
}
