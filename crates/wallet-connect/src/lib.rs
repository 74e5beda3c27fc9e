pub mod app;
pub mod config;
pub mod contract;
pub mod discovery;
pub mod error;
pub mod format;
pub mod logging;
pub mod notify;
pub mod provider;
pub mod query;
pub mod session;
pub mod validation;

// ─── Re-exports ──────────────────────────────────────────────────────

pub use app::{
    BalanceView, ConnectButton, PendingTransfer, TokenPanel, TransferDialog, TransferKind,
    WalletApp,
};
pub use config::ConnectConfig;
pub use contract::{ContractClient, SigningClient, TokenInfo};
pub use discovery::{
    announce_on_request, request_providers, DiscoveryBus, DiscoveryEvent, ProviderDetail,
    ProviderInfo,
};
pub use error::{Result, WalletError};
pub use logging::init_logging;
pub use notify::{LogNotifier, MemoryNotifier, Notifier, Toast, ToastState};
pub use provider::{Eip1193Provider, ProviderAdapter, RpcError};
pub use query::{PollHandle, QueryCache, QueryKey, QueryOptions, QuerySnapshot, QueryStatus};
pub use session::{FileStore, KeyValueStore, MemoryStore, SessionStore};
pub use validation::{TransferForm, ValidTransfer, ValidationErrors};
