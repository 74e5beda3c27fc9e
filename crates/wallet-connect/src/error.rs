use thiserror::Error;

use crate::validation::ValidationErrors;

pub type Result<T, E = WalletError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum WalletError {
    #[error("No wallet provider is injected")]
    ProviderUnavailable,

    #[error("User rejected the request")]
    UserRejected,

    #[error("Provider error {code}: {message}")]
    Provider { code: i64, message: String },

    #[error("Invalid transfer: {0}")]
    Validation(ValidationErrors),

    #[error("Transaction submission failed: {0}")]
    Submission(String),

    #[error("Token contract unavailable: {0}")]
    ContractUnavailable(String),

    #[error("No signing account: {0}")]
    SignerUnavailable(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unexpected provider response: {0}")]
    Decode(String),

    #[error("Query was reset before it resolved")]
    Cancelled,

    #[error(transparent)]
    Eth(#[from] chain_eth::error::EthError),
}

impl WalletError {
    /// Whether this error came from the user declining in the wallet.
    pub fn is_user_rejection(&self) -> bool {
        matches!(self, WalletError::UserRejected)
    }
}

impl From<std::io::Error> for WalletError {
    fn from(e: std::io::Error) -> Self {
        WalletError::Storage(e.to_string())
    }
}

impl From<serde_json::Error> for WalletError {
    fn from(e: serde_json::Error) -> Self {
        WalletError::Decode(e.to_string())
    }
}

impl From<toml::de::Error> for WalletError {
    fn from(e: toml::de::Error) -> Self {
        WalletError::Config(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chain_eth::error::EthError;

    #[test]
    fn display_provider_error() {
        let err = WalletError::Provider {
            code: -32603,
            message: "internal".into(),
        };
        assert_eq!(err.to_string(), "Provider error -32603: internal");
    }

    #[test]
    fn eth_errors_pass_through() {
        let err: WalletError = EthError::InvalidAddress("short".into()).into();
        assert_eq!(err.to_string(), "invalid address: short");
    }

    #[test]
    fn user_rejection_flag() {
        assert!(WalletError::UserRejected.is_user_rejection());
        assert!(!WalletError::ProviderUnavailable.is_user_rejection());
    }
}
