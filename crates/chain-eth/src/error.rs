use thiserror::Error;

/// Ethereum encoding and validation errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EthError {
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("invalid quantity: {0}")]
    InvalidQuantity(String),

    #[error("encoding error: {0}")]
    EncodingError(String),

    #[error("decoding error: {0}")]
    DecodingError(String),

    #[error("unsupported chain: {0}")]
    UnsupportedChain(u64),
}
