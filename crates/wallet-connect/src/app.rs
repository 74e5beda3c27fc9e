//! Headless application model.
//!
//! [`WalletApp`] owns the provider adapter, token client, session and query
//! cache, and exposes what the connect button, balance badges and transfer
//! dialog need. A host renders the view structs and forwards user actions to
//! the matching methods.

use std::sync::Arc;

use alloy_primitives::U256;
use chain_eth::address::short_address;
use chain_eth::transaction::{TransactionReceipt, TransactionRequest};
use chain_eth::units::{parse_quantity, ETHER_DECIMALS};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::ConnectConfig;
use crate::contract::{ContractClient, TokenInfo};
use crate::discovery::{request_providers, DiscoveryBus, ProviderDetail};
use crate::error::{Result, WalletError};
use crate::format::format_balance;
use crate::notify::{Notifier, PendingToast, ToastMessages};
use crate::provider::{Eip1193Provider, ProviderAdapter};
use crate::query::{tags, Observer, QueryCache, QueryKey, QueryOptions, QuerySnapshot};
use crate::session::{KeyValueStore, SessionStore};
use crate::validation::TransferForm;

pub const CONNECT_LABEL: &str = "Connect Wallet";
pub const CONNECTING_LABEL: &str = "Connecting...";

pub fn accounts_key() -> QueryKey {
    QueryKey::new(tags::ACCOUNTS)
}

pub fn native_balance_key(address: &str) -> QueryKey {
    QueryKey::new(tags::NATIVE_BALANCE).param(address.to_lowercase())
}

pub fn token_balance_key(address: &str) -> QueryKey {
    QueryKey::new(tags::CONTRACT_BALANCE).param(address.to_lowercase())
}

pub fn token_info_key() -> QueryKey {
    QueryKey::new(tags::CONTRACT_INFO)
}

pub fn receipt_key(hash: &str) -> QueryKey {
    QueryKey::new(tags::TRANSACTION_RECEIPT).param(hash)
}

/// What gets transferred: the chain's native currency or the configured token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TransferKind {
    Native,
    Token,
}

impl TransferKind {
    fn messages(self) -> ToastMessages {
        match self {
            TransferKind::Native => ToastMessages::new(
                "Sending transaction...",
                "Transaction confirmed",
                "Transaction failed",
            ),
            TransferKind::Token => ToastMessages::new(
                "Sending token transfer...",
                "Token transfer confirmed",
                "Token transfer failed",
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectButton {
    pub label: String,
    pub disabled: bool,
    pub connected: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BalanceView {
    /// Base units.
    pub raw: U256,
    pub display: String,
    pub symbol: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum TokenPanel {
    Available(BalanceView),
    /// The token could not be read; token transfers are hidden.
    Unavailable(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TransferDialog {
    pub open: bool,
    /// Set once the last submitted transfer has a receipt.
    pub confirmed: bool,
}

pub struct WalletApp {
    config: ConnectConfig,
    provider: ProviderAdapter,
    contract: Option<Arc<ContractClient>>,
    session: SessionStore,
    cache: QueryCache,
    notifier: Arc<dyn Notifier>,
    dialog: Arc<Mutex<TransferDialog>>,
    chain_id: Mutex<Option<u64>>,
}

impl WalletApp {
    /// Builds the app and restores a persisted session, so a reload shows the
    /// connected state without prompting the wallet again.
    pub fn new(
        config: ConnectConfig,
        provider: Option<Arc<dyn Eip1193Provider>>,
        store: Arc<dyn KeyValueStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self> {
        config.validate()?;
        let provider = ProviderAdapter::new(provider);
        let contract = config
            .token_contract
            .as_deref()
            .map(|address| ContractClient::new(provider.clone(), address, config.token_decimals))
            .transpose()?
            .map(Arc::new);

        let app = Self {
            config,
            provider,
            contract,
            session: SessionStore::new(store),
            cache: QueryCache::new(),
            notifier,
            dialog: Arc::new(Mutex::new(TransferDialog::default())),
            chain_id: Mutex::new(None),
        };

        let adapter = app.provider.clone();
        app.cache.register(&accounts_key(), QueryOptions::manual(), move || {
            let adapter = adapter.clone();
            async move { adapter.request_accounts().await }
        });

        let restored: Vec<String> = app.session.get()?.into_iter().collect();
        if let Some(address) = restored.first() {
            info!(address = %address, "restored session");
        }
        app.cache.set_data(&accounts_key(), restored);
        Ok(app)
    }

    pub fn config(&self) -> &ConnectConfig {
        &self.config
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    pub fn has_provider(&self) -> bool {
        self.provider.is_available()
    }

    /// Chain id reported by the wallet at the last connect.
    pub fn chain_id(&self) -> Option<u64> {
        *self.chain_id.lock()
    }

    /// The connected address, if any.
    pub fn address(&self) -> Option<String> {
        self.cache
            .get_data::<Vec<String>>(&accounts_key())?
            .into_iter()
            .find(|address| !address.is_empty())
    }

    fn require_address(&self) -> Result<String> {
        self.address()
            .ok_or_else(|| WalletError::SignerUnavailable("wallet is not connected".into()))
    }

    fn require_contract(&self) -> Result<Arc<ContractClient>> {
        self.contract
            .clone()
            .ok_or_else(|| WalletError::ContractUnavailable("no token contract configured".into()))
    }

    /// Prompts the wallet for accounts and persists the first one.
    pub async fn connect(&self) -> Result<String> {
        if !self.provider.is_available() {
            return Err(WalletError::ProviderUnavailable);
        }

        let accounts: Vec<String> = self.cache.refetch(&accounts_key()).await?;
        let address = accounts
            .into_iter()
            .find(|address| !address.is_empty())
            .ok_or_else(|| WalletError::SignerUnavailable("wallet shared no accounts".into()))?;

        self.session.set(&address)?;
        if let Some(contract) = &self.contract {
            contract.signer(&address)?;
        }

        match self.provider.chain_id().await {
            Ok(chain_id) => {
                if chain_id != self.config.chain_id {
                    warn!(chain_id, expected = self.config.chain_id, "wallet is on another chain");
                }
                *self.chain_id.lock() = Some(chain_id);
            }
            Err(e) => warn!(error = %e, "could not read chain id"),
        }

        Ok(address)
    }

    /// Forgets the session and returns to the disconnected state.
    pub fn disconnect(&self) -> Result<()> {
        self.session.clear()?;
        self.cache.set_data(&accounts_key(), Vec::<String>::new());
        for tag in [tags::NATIVE_BALANCE, tags::CONTRACT_BALANCE, tags::TRANSACTION_RECEIPT] {
            self.cache.reset_tag(tag);
        }
        if let Some(contract) = &self.contract {
            contract.clear_signer();
        }
        *self.chain_id.lock() = None;
        *self.dialog.lock() = TransferDialog::default();
        info!("disconnected");
        Ok(())
    }

    pub fn connect_button(&self) -> ConnectButton {
        if let Some(address) = self.address() {
            return ConnectButton {
                label: short_address(&address),
                disabled: false,
                connected: true,
            };
        }

        let loading = self.cache.snapshot(&accounts_key()).is_loading();
        ConnectButton {
            label: if loading { CONNECTING_LABEL } else { CONNECT_LABEL }.to_string(),
            disabled: loading || !self.provider.is_available(),
            connected: false,
        }
    }

    fn register_native_balance(&self, address: &str) -> QueryKey {
        let key = native_balance_key(address);
        let adapter = self.provider.clone();
        let address = address.to_string();
        self.cache.register(&key, QueryOptions::default(), move || {
            let adapter = adapter.clone();
            let address = address.clone();
            async move {
                let quantity = adapter.get_balance(&address).await?;
                Ok::<_, WalletError>(parse_quantity(&quantity)?)
            }
        });
        key
    }

    fn register_token_balance(&self, address: &str) -> Result<QueryKey> {
        let contract = self.require_contract()?;
        let key = token_balance_key(address);
        let address = address.to_string();
        self.cache.register(&key, QueryOptions::default(), move || {
            let contract = contract.clone();
            let address = address.clone();
            async move { contract.get_balance(&address).await }
        });
        Ok(key)
    }

    async fn fetch_balance(&self, key: &QueryKey) -> Result<U256> {
        self.cache
            .query::<U256>(key)
            .await?
            .ok_or_else(|| WalletError::Decode(format!("query {key} returned nothing")))
    }

    fn native_view(&self, raw: U256) -> Result<BalanceView> {
        Ok(BalanceView {
            raw,
            display: format_balance(raw, ETHER_DECIMALS)?,
            symbol: self.config.chain()?.symbol.to_string(),
        })
    }

    pub async fn native_balance(&self) -> Result<BalanceView> {
        let address = self.require_address()?;
        let key = self.register_native_balance(&address);
        let raw = self.fetch_balance(&key).await?;
        self.native_view(raw)
    }

    pub async fn token_info(&self) -> Result<TokenInfo> {
        let contract = self.require_contract()?;
        let key = token_info_key();
        self.cache.register(&key, QueryOptions::default(), move || {
            let contract = contract.clone();
            async move { contract.get_info().await }
        });
        self.cache
            .query::<TokenInfo>(&key)
            .await?
            .ok_or_else(|| WalletError::ContractUnavailable("token info missing".into()))
    }

    pub async fn token_balance(&self) -> Result<BalanceView> {
        let address = self.require_address()?;
        let info = self.token_info().await?;
        let key = self.register_token_balance(&address)?;
        let raw = self.fetch_balance(&key).await?;
        Ok(BalanceView {
            raw,
            display: format_balance(raw, info.decimals)?,
            symbol: info.symbol,
        })
    }

    /// Token balance, or the reason the token section is hidden.
    pub async fn token_panel(&self) -> Result<TokenPanel> {
        match self.token_balance().await {
            Ok(view) => Ok(TokenPanel::Available(view)),
            Err(WalletError::ContractUnavailable(message)) => Ok(TokenPanel::Unavailable(message)),
            Err(e) => Err(e),
        }
    }

    /// Last fetched balance without fetching; unchanged by invalidation until
    /// a refetch succeeds.
    pub fn cached_balance(&self, kind: TransferKind) -> Option<BalanceView> {
        let address = self.address()?;
        match kind {
            TransferKind::Native => {
                let raw = self.cache.get_data::<U256>(&native_balance_key(&address))?;
                self.native_view(raw).ok()
            }
            TransferKind::Token => {
                let raw = self.cache.get_data::<U256>(&token_balance_key(&address))?;
                let info = self.cache.get_data::<TokenInfo>(&token_info_key())?;
                Some(BalanceView {
                    raw,
                    display: format_balance(raw, info.decimals).ok()?,
                    symbol: info.symbol,
                })
            }
        }
    }

    pub fn balance_snapshot(&self, kind: TransferKind) -> Option<QuerySnapshot> {
        let address = self.address()?;
        let key = match kind {
            TransferKind::Native => native_balance_key(&address),
            TransferKind::Token => token_balance_key(&address),
        };
        Some(self.cache.snapshot(&key))
    }

    /// Keeps the balance of the connected account live: while observed, an
    /// invalidation refetches it in the background.
    pub fn observe_balance(&self, kind: TransferKind) -> Result<Observer> {
        let address = self.require_address()?;
        let key = match kind {
            TransferKind::Native => self.register_native_balance(&address),
            TransferKind::Token => self.register_token_balance(&address)?,
        };
        Ok(self.cache.observe(&key))
    }

    pub fn dialog(&self) -> TransferDialog {
        *self.dialog.lock()
    }

    pub fn open_dialog(&self) {
        self.dialog.lock().open = true;
    }

    pub fn close_dialog(&self) {
        self.dialog.lock().open = false;
    }

    /// Validates and submits a transfer from the connected account.
    ///
    /// Validation failures return before anything is sent. Once the wallet
    /// hands back a hash the receipt is polled; the returned
    /// [`PendingTransfer`] resolves when it arrives.
    pub async fn submit_transfer(
        &self,
        form: &TransferForm,
        kind: TransferKind,
    ) -> Result<PendingTransfer> {
        let transfer = form.validate().map_err(WalletError::Validation)?;
        if !self.provider.is_available() {
            return Err(WalletError::ProviderUnavailable);
        }
        let from = self.require_address()?;
        let target = match kind {
            TransferKind::Native => Target::Native(TransactionRequest::native(
                &from,
                &transfer.recipient,
                transfer.amount_base_units,
            )?),
            TransferKind::Token => Target::Token(self.require_contract()?),
        };

        *self.dialog.lock() = TransferDialog {
            open: false,
            confirmed: false,
        };

        let toast = PendingToast::show(self.notifier.clone(), kind.messages());
        let submitted = match target {
            Target::Native(tx) => {
                self.cache.reset_tag(tags::SEND_TRANSACTION);
                let key = QueryKey::new(tags::SEND_TRANSACTION)
                    .param(&from)
                    .param(&transfer.recipient)
                    .param(&transfer.amount);
                let adapter = self.provider.clone();
                self.cache.register(&key, QueryOptions::manual(), move || {
                    let adapter = adapter.clone();
                    let tx = tx.clone();
                    async move { adapter.send_transaction(&tx).await }
                });
                self.cache.refetch::<String>(&key).await
            }
            Target::Token(contract) => {
                let key = QueryKey::new(tags::CONTRACT_TRANSFER)
                    .param(&from)
                    .param(&transfer.recipient)
                    .param(&transfer.amount);
                let (sender, recipient, amount) =
                    (from.clone(), transfer.recipient.clone(), transfer.amount.clone());
                self.cache.register(&key, QueryOptions::manual(), move || {
                    let contract = contract.clone();
                    let (sender, recipient, amount) =
                        (sender.clone(), recipient.clone(), amount.clone());
                    async move { contract.transfer_to(&sender, &recipient, &amount).await }
                });
                self.cache.refetch::<String>(&key).await
            }
        };

        let hash = match submitted {
            Ok(hash) => hash,
            Err(e) => {
                toast.fail(&e.to_string());
                return Err(e);
            }
        };
        info!(%hash, ?kind, from = %from, to = %transfer.recipient, "transfer submitted");

        let adapter = self.provider.clone();
        let poll_hash = hash.clone();
        let poll = self.cache.poll(
            &receipt_key(&hash),
            self.config.receipt_poll_interval(),
            move || {
                let adapter = adapter.clone();
                let hash = poll_hash.clone();
                async move { adapter.get_transaction_receipt(&hash).await }
            },
            |receipt: &Option<TransactionReceipt>| receipt.is_some(),
        );

        let toast = Arc::new(Mutex::new(Some(toast)));
        let task_toast = toast.clone();
        let cache = self.cache.clone();
        let dialog = self.dialog.clone();
        let task = tokio::spawn(async move {
            let receipt = poll
                .wait()
                .await?
                .ok_or_else(|| WalletError::Decode("poll ended without a receipt".into()))?;

            if let Some(toast) = task_toast.lock().take() {
                if receipt.succeeded() {
                    toast.succeed();
                } else {
                    toast.fail("transaction reverted");
                }
            }

            let still_connected = cache
                .get_data::<Vec<String>>(&accounts_key())
                .is_some_and(|accounts| accounts.iter().any(|a| a.eq_ignore_ascii_case(&from)));
            if still_connected {
                cache.invalidate(&native_balance_key(&from));
                cache.invalidate(&token_balance_key(&from));
                dialog.lock().confirmed = true;
            } else {
                debug!(from = %from, "sender no longer connected; balances left as is");
            }
            debug!(hash = %receipt.transaction_hash, "receipt handled");
            Ok::<_, WalletError>(receipt)
        });

        Ok(PendingTransfer {
            hash,
            task: Some(task),
            toast,
        })
    }

    /// Runs wallet discovery on `bus` for the configured timeout.
    pub async fn discover(&self, bus: &DiscoveryBus) -> Vec<ProviderDetail> {
        request_providers(bus, self.config.discovery_timeout()).await
    }
}

enum Target {
    Native(TransactionRequest),
    Token(Arc<ContractClient>),
}

/// A submitted transfer awaiting its receipt.
///
/// The receipt is tracked by a background task that resolves the toast and
/// refreshes balances on its own; dropping this handle leaves it running.
/// [`PendingTransfer::cancel`] stops it and fails the toast.
pub struct PendingTransfer {
    hash: String,
    task: Option<JoinHandle<Result<TransactionReceipt>>>,
    toast: Arc<Mutex<Option<PendingToast>>>,
}

impl PendingTransfer {
    pub fn hash(&self) -> &str {
        &self.hash
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().is_none_or(JoinHandle::is_finished)
    }

    pub async fn wait(mut self) -> Result<TransactionReceipt> {
        let task = self.task.take().ok_or(WalletError::Cancelled)?;
        match task.await {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => Err(WalletError::Cancelled),
            Err(e) => Err(WalletError::Submission(format!("receipt task failed: {e}"))),
        }
    }

    /// Stops tracking the receipt. A toast still pending is resolved as failed.
    pub fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            debug!(hash = %self.hash, "transfer tracking cancelled");
        }
        if let Some(toast) = self.toast.lock().take() {
            toast.fail("tracking cancelled");
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::notify::{MemoryNotifier, ToastState};
    use crate::provider::mock::MockProvider;
    use crate::provider::{RpcError, ETH_CHAIN_ID, ETH_REQUEST_ACCOUNTS};
    use crate::session::MemoryStore;
    use crate::validation::{Field, MSG_AMOUNT_INVALID};

    const ALICE: &str = "0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed";

    fn app_with(mock: Option<Arc<MockProvider>>, store: Arc<MemoryStore>) -> (WalletApp, Arc<MemoryNotifier>) {
        let notifier = MemoryNotifier::new();
        let provider = mock.map(|m| m as Arc<dyn Eip1193Provider>);
        let app = WalletApp::new(ConnectConfig::default(), provider, store, notifier.clone()).unwrap();
        (app, notifier)
    }

    #[tokio::test]
    async fn starts_disconnected() {
        let (app, _) = app_with(Some(MockProvider::new()), Arc::new(MemoryStore::new()));
        assert_eq!(app.address(), None);
        assert_eq!(
            app.connect_button(),
            ConnectButton {
                label: CONNECT_LABEL.into(),
                disabled: false,
                connected: false
            }
        );
    }

    #[tokio::test]
    async fn no_provider_disables_connect() {
        let (app, _) = app_with(None, Arc::new(MemoryStore::new()));
        assert!(app.connect_button().disabled);
        assert!(matches!(app.connect().await, Err(WalletError::ProviderUnavailable)));
    }

    #[tokio::test]
    async fn connect_persists_and_labels_button() {
        let mock = MockProvider::new();
        mock.reply(ETH_REQUEST_ACCOUNTS, Ok(json!([ALICE])));
        mock.reply(ETH_CHAIN_ID, Ok(json!("0xaa36a7")));
        let store = Arc::new(MemoryStore::new());
        let (app, _) = app_with(Some(mock), store.clone());

        assert_eq!(app.connect().await.unwrap(), ALICE);
        assert_eq!(app.chain_id(), Some(11155111));
        assert_eq!(store.get("address").unwrap().as_deref(), Some(ALICE));
        let button = app.connect_button();
        assert!(button.connected);
        assert_eq!(button.label, "0x5aae...eaed");
    }

    #[tokio::test]
    async fn rejected_connect_stays_disconnected() {
        let mock = MockProvider::new();
        mock.reply(ETH_REQUEST_ACCOUNTS, Err(RpcError::user_rejected()));
        let (app, _) = app_with(Some(mock), Arc::new(MemoryStore::new()));
        assert!(matches!(app.connect().await, Err(WalletError::UserRejected)));
        assert_eq!(app.address(), None);
        assert!(app.cache().snapshot(&accounts_key()).is_error());
    }

    #[tokio::test]
    async fn chain_id_failure_does_not_fail_connect() {
        let mock = MockProvider::new();
        mock.reply(ETH_REQUEST_ACCOUNTS, Ok(json!([ALICE])));
        let (app, _) = app_with(Some(mock), Arc::new(MemoryStore::new()));
        assert!(app.connect().await.is_ok());
        assert_eq!(app.chain_id(), None);
    }

    #[tokio::test]
    async fn invalid_amount_submits_nothing() {
        let mock = MockProvider::new();
        let store = Arc::new(MemoryStore::new());
        store.set("address", ALICE).unwrap();
        let (app, notifier) = app_with(Some(mock.clone()), store);
        app.open_dialog();

        let form = TransferForm::new("0x000000000000000000000000000000000000dead", "0");
        match app.submit_transfer(&form, TransferKind::Native).await {
            Err(WalletError::Validation(errors)) => {
                assert_eq!(errors.message_for(Field::Amount), Some(MSG_AMOUNT_INVALID));
            }
            other => panic!("unexpected result: {:?}", other.map(|p| p.hash().to_string())),
        }
        assert!(mock.calls.lock().is_empty());
        assert!(notifier.history().is_empty());
        assert!(app.dialog().open);
    }

    #[tokio::test]
    async fn submission_error_shows_failure_toast() {
        let mock = MockProvider::new();
        mock.reply(
            crate::provider::ETH_SEND_TRANSACTION,
            Err(RpcError::user_rejected()),
        );
        let store = Arc::new(MemoryStore::new());
        store.set("address", ALICE).unwrap();
        let (app, notifier) = app_with(Some(mock), store);

        let form = TransferForm::new("0x000000000000000000000000000000000000dead", "1");
        assert!(matches!(
            app.submit_transfer(&form, TransferKind::Native).await,
            Err(WalletError::UserRejected)
        ));
        let states: Vec<_> = notifier.history().iter().map(|t| t.state).collect();
        assert_eq!(states, vec![ToastState::Pending, ToastState::Failure]);
        assert!(!app.dialog().open);
    }

    #[tokio::test]
    async fn token_panel_without_contract_is_unavailable() {
        let store = Arc::new(MemoryStore::new());
        store.set("address", ALICE).unwrap();
        let (app, _) = app_with(Some(MockProvider::new()), store);
        assert!(matches!(app.token_panel().await, Ok(TokenPanel::Unavailable(_))));
    }

    #[tokio::test]
    async fn dialog_open_close() {
        let (app, _) = app_with(None, Arc::new(MemoryStore::new()));
        app.open_dialog();
        assert!(app.dialog().open);
        app.close_dialog();
        assert_eq!(app.dialog(), TransferDialog::default());
    }
}
