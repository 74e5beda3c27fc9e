//! Client configuration, read from TOML.
//!
//! ```toml
//! chain_id = 11155111
//! token_contract = "0x1111111111111111111111111111111111111111"
//! receipt_poll_interval_ms = 1000
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chain_eth::address::is_address_shape;
use chain_eth::chains::{require_chain, EvmChain, SEPOLIA};
use chain_eth::units::TOKEN_DECIMALS;
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{Result, WalletError};

/// Env var naming the config file for [`ConnectConfig::load_default`].
pub const CONFIG_PATH_ENV: &str = "WALLET_CONNECT_CONFIG";

const APP_DIR: &str = "wallet-connect";
const SESSION_FILE: &str = "session.json";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConnectConfig {
    pub chain_id: u64,
    /// The ERC-20 contract. Without it the token panel reports unavailable.
    pub token_contract: Option<String>,
    pub token_decimals: u8,
    pub receipt_poll_interval_ms: u64,
    pub discovery_timeout_ms: u64,
    /// Session file; defaults to the platform data dir.
    pub storage_path: Option<PathBuf>,
}

impl Default for ConnectConfig {
    fn default() -> Self {
        Self {
            chain_id: SEPOLIA.chain_id,
            token_contract: None,
            token_decimals: TOKEN_DECIMALS,
            receipt_poll_interval_ms: 1000,
            discovery_timeout_ms: 500,
            storage_path: None,
        }
    }
}

impl ConnectConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|e| WalletError::Config(format!("{}: {e}", path.display())))?;
        let config = Self::from_toml_str(&text)?;
        info!(path = %path.display(), chain_id = config.chain_id, "loaded config");
        Ok(config)
    }

    /// Loads the file named by `WALLET_CONNECT_CONFIG`, or the defaults when
    /// the variable is unset.
    pub fn load_default() -> Result<Self> {
        match std::env::var_os(CONFIG_PATH_ENV) {
            Some(path) => Self::load(PathBuf::from(path)),
            None => {
                debug!("no config file, using defaults");
                Ok(Self::default())
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        require_chain(self.chain_id)?;
        if let Some(contract) = &self.token_contract {
            if !is_address_shape(contract) {
                return Err(WalletError::Config(format!(
                    "token_contract {contract:?} is not an address"
                )));
            }
        }
        if self.receipt_poll_interval_ms == 0 {
            return Err(WalletError::Config(
                "receipt_poll_interval_ms must be positive".into(),
            ));
        }
        Ok(())
    }

    pub fn chain(&self) -> Result<&'static EvmChain> {
        Ok(require_chain(self.chain_id)?)
    }

    pub fn receipt_poll_interval(&self) -> Duration {
        Duration::from_millis(self.receipt_poll_interval_ms)
    }

    pub fn discovery_timeout(&self) -> Duration {
        Duration::from_millis(self.discovery_timeout_ms)
    }

    /// Where the session file lives: `storage_path`, else
    /// `<data dir>/wallet-connect/session.json`, else the working directory.
    pub fn session_path(&self) -> PathBuf {
        if let Some(path) = &self.storage_path {
            return path.clone();
        }
        dirs::data_dir()
            .map(|dir| dir.join(APP_DIR).join(SESSION_FILE))
            .unwrap_or_else(|| PathBuf::from(SESSION_FILE))
    }
}
