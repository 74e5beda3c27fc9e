//! Adapter over an injected EIP-1193 wallet provider.
//!
//! The wallet exposes a single `request({ method, params })` entry point. The
//! adapter turns the handful of methods this client needs into typed calls and
//! maps provider failures onto [`WalletError`].

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chain_eth::chains::parse_chain_id;
use chain_eth::transaction::{CallRequest, TransactionReceipt, TransactionRequest};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::error::{Result, WalletError};

pub const ETH_REQUEST_ACCOUNTS: &str = "eth_requestAccounts";
pub const ETH_GET_BALANCE: &str = "eth_getBalance";
pub const ETH_SEND_TRANSACTION: &str = "eth_sendTransaction";
pub const ETH_GET_TRANSACTION_RECEIPT: &str = "eth_getTransactionReceipt";
pub const ETH_CHAIN_ID: &str = "eth_chainId";
pub const ETH_CALL: &str = "eth_call";

/// EIP-1193 code for "the user rejected the request".
pub const USER_REJECTED_CODE: i64 = 4001;

/// Error object returned by a provider request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

impl RpcError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn user_rejected() -> Self {
        Self::new(USER_REJECTED_CODE, "User rejected the request.")
    }
}

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.code)
    }
}

impl std::error::Error for RpcError {}

impl From<RpcError> for WalletError {
    fn from(e: RpcError) -> Self {
        if e.code == USER_REJECTED_CODE {
            WalletError::UserRejected
        } else {
            WalletError::Provider {
                code: e.code,
                message: e.message,
            }
        }
    }
}

/// The wallet-injected request interface.
#[async_trait]
pub trait Eip1193Provider: Send + Sync {
    async fn request(&self, method: &str, params: Vec<Value>) -> Result<Value, RpcError>;
}

/// Typed access to the injected provider.
///
/// Constructed with `None` when no wallet is present; every call then fails
/// with [`WalletError::ProviderUnavailable`].
#[derive(Clone, Default)]
pub struct ProviderAdapter {
    provider: Option<Arc<dyn Eip1193Provider>>,
}

impl fmt::Debug for ProviderAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderAdapter")
            .field("injected", &self.provider.is_some())
            .finish()
    }
}

impl ProviderAdapter {
    pub fn new(provider: Option<Arc<dyn Eip1193Provider>>) -> Self {
        Self { provider }
    }

    pub fn is_available(&self) -> bool {
        self.provider.is_some()
    }

    async fn request(&self, method: &str, params: Vec<Value>) -> Result<Value> {
        let provider = self
            .provider
            .as_ref()
            .ok_or(WalletError::ProviderUnavailable)?;

        debug!(method, "provider request");
        provider.request(method, params).await.map_err(|e| {
            warn!(method, code = e.code, message = %e.message, "provider request failed");
            WalletError::from(e)
        })
    }

    /// Prompts the wallet for account access.
    pub async fn request_accounts(&self) -> Result<Vec<String>> {
        let value = self.request(ETH_REQUEST_ACCOUNTS, Vec::new()).await?;
        // Some wallets answer `null` when nothing was shared.
        if value.is_null() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_value(value)?)
    }

    /// Native balance of `address` at the latest block, as a hex quantity.
    pub async fn get_balance(&self, address: &str) -> Result<String> {
        let value = self
            .request(ETH_GET_BALANCE, vec![json!(address), json!("latest")])
            .await?;
        expect_string(value, ETH_GET_BALANCE)
    }

    /// Hands a transaction to the wallet; returns its hash.
    pub async fn send_transaction(&self, tx: &TransactionRequest) -> Result<String> {
        let value = self
            .request(ETH_SEND_TRANSACTION, vec![serde_json::to_value(tx)?])
            .await?;
        expect_string(value, ETH_SEND_TRANSACTION)
    }

    /// `None` until the transaction is mined.
    pub async fn get_transaction_receipt(&self, hash: &str) -> Result<Option<TransactionReceipt>> {
        let value = self
            .request(ETH_GET_TRANSACTION_RECEIPT, vec![json!(hash)])
            .await?;
        if value.is_null() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_value(value)?))
    }

    pub async fn chain_id(&self) -> Result<u64> {
        let value = self.request(ETH_CHAIN_ID, Vec::new()).await?;
        let hex_id = expect_string(value, ETH_CHAIN_ID)?;
        Ok(parse_chain_id(&hex_id)?)
    }

    /// Read-only contract call at the latest block; returns the raw return data.
    pub async fn call(&self, call: &CallRequest) -> Result<Vec<u8>> {
        let value = self
            .request(ETH_CALL, vec![serde_json::to_value(call)?, json!("latest")])
            .await?;
        let data = expect_string(value, ETH_CALL)?;
        let digits = data.strip_prefix("0x").unwrap_or(&data);
        hex::decode(digits).map_err(|e| WalletError::Decode(format!("{ETH_CALL}: {e}")))
    }
}

fn expect_string(value: Value, method: &str) -> Result<String> {
    match value {
        Value::String(s) => Ok(s),
        other => Err(WalletError::Decode(format!(
            "{method}: expected a string, got {other}"
        ))),
    }
}

#[cfg(test)]
pub(crate) mod mock {
    //! Scripted provider for unit tests.

    use std::collections::{HashMap, VecDeque};

    use parking_lot::Mutex;

    use super::*;

    /// Replies from a per-method queue; the last reply of a method repeats
    /// once its queue is down to one entry.
    #[derive(Default)]
    pub struct MockProvider {
        replies: Mutex<HashMap<String, VecDeque<Result<Value, RpcError>>>>,
        pub calls: Mutex<Vec<(String, Vec<Value>)>>,
    }

    impl MockProvider {
        pub fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        pub fn reply(&self, method: &str, reply: Result<Value, RpcError>) {
            self.replies
                .lock()
                .entry(method.to_string())
                .or_default()
                .push_back(reply);
        }

        pub fn calls_to(&self, method: &str) -> Vec<Vec<Value>> {
            self.calls
                .lock()
                .iter()
                .filter(|(m, _)| m == method)
                .map(|(_, p)| p.clone())
                .collect()
        }
    }

    #[async_trait]
    impl Eip1193Provider for MockProvider {
        async fn request(&self, method: &str, params: Vec<Value>) -> Result<Value, RpcError> {
            self.calls.lock().push((method.to_string(), params));
            let mut replies = self.replies.lock();
            let queue = replies
                .get_mut(method)
                .ok_or_else(|| RpcError::new(-32601, format!("no reply for {method}")))?;
            if queue.len() > 1 {
                queue.pop_front().unwrap_or(Ok(Value::Null))
            } else {
                queue.front().cloned().unwrap_or(Ok(Value::Null))
            }
        }
    }
}
