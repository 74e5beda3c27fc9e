//! Minimal ABI encoding and decoding for EVM function calls.
//!
//! Covers just the static call shapes the token client needs and the return
//! types of the ERC-20 view functions (`uint256`, `uint8`, `string`), without
//! pulling in a full ABI parser.

use alloy_primitives::{Address, U256};

use crate::error::EthError;

/// Size of one ABI word.
const WORD: usize = 32;

/// A single ABI-encoded parameter.
#[derive(Debug, Clone)]
pub enum AbiParam {
    /// A 20-byte address, left-padded to 32 bytes.
    Address(Address),
    /// A 256-bit unsigned integer, big-endian.
    Uint256(U256),
}

/// Encodes a function call with the given 4-byte selector and ABI parameters.
///
/// The output is `selector || encode(params[0]) || encode(params[1]) || ...`
/// where each parameter is encoded as a 32-byte ABI word.
pub fn encode_function_call(selector: [u8; 4], params: &[AbiParam]) -> Vec<u8> {
    let mut data = Vec::with_capacity(4 + params.len() * WORD);
    data.extend_from_slice(&selector);

    for param in params {
        data.extend_from_slice(&encode_param(param));
    }

    data
}

fn encode_param(param: &AbiParam) -> [u8; WORD] {
    match param {
        AbiParam::Address(addr) => {
            let mut word = [0u8; WORD];
            word[12..].copy_from_slice(addr.as_slice());
            word
        }
        AbiParam::Uint256(value) => value.to_be_bytes::<WORD>(),
    }
}

/// Returns the word at `index`, or a decoding error if `data` is too short.
fn word_at(data: &[u8], index: usize) -> Result<&[u8], EthError> {
    let start = index * WORD;
    data.get(start..start + WORD).ok_or_else(|| {
        EthError::DecodingError(format!(
            "expected at least {} bytes, got {}",
            start + WORD,
            data.len()
        ))
    })
}

/// Decodes a single `uint256` return value.
///
/// Extra trailing bytes are ignored.
pub fn decode_uint256(data: &[u8]) -> Result<U256, EthError> {
    let word = word_at(data, 0)?;
    Ok(U256::from_be_slice(word))
}

/// Decodes a single `uint8` return value, rejecting out-of-range words.
pub fn decode_uint8(data: &[u8]) -> Result<u8, EthError> {
    let value = decode_uint256(data)?;
    u8::try_from(value)
        .map_err(|_| EthError::DecodingError(format!("value {value} does not fit in uint8")))
}

/// Decodes a single dynamic `string` return value.
///
/// Layout: offset word, then at that offset a length word followed by the
/// UTF-8 bytes right-padded to a word boundary.
pub fn decode_string(data: &[u8]) -> Result<String, EthError> {
    let offset = usize::try_from(decode_uint256(data)?)
        .map_err(|_| EthError::DecodingError("string offset overflow".into()))?;

    let start = offset
        .checked_add(WORD)
        .ok_or_else(|| EthError::DecodingError("string offset overflow".into()))?;
    let len_word = data
        .get(offset..start)
        .ok_or_else(|| EthError::DecodingError("string length out of bounds".into()))?;
    let len = usize::try_from(U256::from_be_slice(len_word))
        .map_err(|_| EthError::DecodingError("string length overflow".into()))?;

    let end = start
        .checked_add(len)
        .ok_or_else(|| EthError::DecodingError("string length overflow".into()))?;
    let bytes = data
        .get(start..end)
        .ok_or_else(|| EthError::DecodingError("string data out of bounds".into()))?;

    String::from_utf8(bytes.to_vec())
        .map_err(|e| EthError::DecodingError(format!("string is not utf-8: {e}")))
}
