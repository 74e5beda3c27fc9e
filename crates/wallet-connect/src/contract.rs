//! Client for the fixed ERC-20 token contract.
//!
//! Reads go through `eth_call` and need no account. Writes go through a
//! [`SigningClient`] bound to one address; the binding follows the active
//! session, so switching accounts in the wallet yields a fresh client instead
//! of reusing the one created for the first address.

use alloy_primitives::U256;
use chain_eth::abi::{decode_string, decode_uint256, decode_uint8};
use chain_eth::address::parse_address;
use chain_eth::erc20;
use chain_eth::transaction::{CallRequest, TransactionRequest};
use chain_eth::units::parse_amount;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::{Result, WalletError};
use crate::provider::ProviderAdapter;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenInfo {
    pub decimals: u8,
    pub symbol: String,
}

/// Write access to the token on behalf of one account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningClient {
    account: String,
}

impl SigningClient {
    fn new(account: &str) -> Result<Self> {
        if account.is_empty() {
            return Err(WalletError::SignerUnavailable("no connected address".into()));
        }
        parse_address(account).map_err(|e| WalletError::SignerUnavailable(e.to_string()))?;
        Ok(Self {
            account: account.to_string(),
        })
    }

    pub fn account(&self) -> &str {
        &self.account
    }

    fn is_bound_to(&self, account: &str) -> bool {
        self.account.eq_ignore_ascii_case(account)
    }
}

pub struct ContractClient {
    provider: ProviderAdapter,
    address: String,
    /// Scale used to convert transfer amounts.
    decimals: u8,
    signer: Mutex<Option<SigningClient>>,
}

impl ContractClient {
    pub fn new(provider: ProviderAdapter, address: &str, decimals: u8) -> Result<Self> {
        parse_address(address)?;
        Ok(Self {
            provider,
            address: address.to_string(),
            decimals,
            signer: Mutex::new(None),
        })
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    async fn read(&self, calldata: &[u8]) -> Result<Vec<u8>> {
        let call = CallRequest::new(&self.address, calldata);
        self.provider.call(&call).await.map_err(|e| match e {
            WalletError::ProviderUnavailable => WalletError::ProviderUnavailable,
            other => WalletError::ContractUnavailable(other.to_string()),
        })
    }

    /// Reads `decimals()` and `symbol()`.
    pub async fn get_info(&self) -> Result<TokenInfo> {
        let decimals_call = erc20::encode_decimals();
        let symbol_call = erc20::encode_symbol();
        let (decimals, symbol) =
            futures::try_join!(self.read(&decimals_call), self.read(&symbol_call))?;

        let info = TokenInfo {
            decimals: decode_uint8(&decimals)
                .map_err(|e| WalletError::ContractUnavailable(e.to_string()))?,
            symbol: decode_string(&symbol)
                .map_err(|e| WalletError::ContractUnavailable(e.to_string()))?,
        };
        debug!(contract = %self.address, symbol = %info.symbol, decimals = info.decimals, "token info");
        Ok(info)
    }

    /// Token balance of `owner` in base units.
    pub async fn get_balance(&self, owner: &str) -> Result<U256> {
        let data = self.read(&erc20::encode_balance_of(owner)?).await?;
        decode_uint256(&data).map_err(|e| WalletError::ContractUnavailable(e.to_string()))
    }

    /// The signing client for `account`, rebuilt if the bound account differs.
    pub fn signer(&self, account: &str) -> Result<SigningClient> {
        let mut slot = self.signer.lock();
        if let Some(current) = slot.as_ref().filter(|s| s.is_bound_to(account)) {
            return Ok(current.clone());
        }

        let client = SigningClient::new(account)?;
        if let Some(previous) = slot.as_ref() {
            info!(from = previous.account(), to = account, "rebinding token signer");
        }
        *slot = Some(client.clone());
        Ok(client)
    }

    pub fn bound_account(&self) -> Option<String> {
        self.signer.lock().as_ref().map(|s| s.account.clone())
    }

    /// Drops the signing client, e.g. on disconnect.
    pub fn clear_signer(&self) {
        self.signer.lock().take();
    }

    /// Submits `transfer(to, value)` from `from`; `value` is a decimal string
    /// scaled by the contract's fixed decimals. Returns the transaction hash.
    pub async fn transfer_to(&self, from: &str, to: &str, value: &str) -> Result<String> {
        let signer = self.signer(from)?;
        let amount = parse_amount(value, self.decimals)?;
        let calldata = erc20::encode_transfer(to, amount)?;
        let tx = TransactionRequest::contract_call(signer.account(), &self.address, &calldata)?;

        info!(from = signer.account(), to, %amount, "submitting token transfer");
        self.provider.send_transaction(&tx).await.map_err(|e| match e {
            WalletError::Provider { code, message } => {
                WalletError::Submission(format!("{message} ({code})"))
            }
            other => other,
        })
    }
}
