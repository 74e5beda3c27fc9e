//! Three-state toast notifications bound to an async operation.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ToastState {
    Pending,
    Success,
    Failure,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Toast {
    pub id: u64,
    pub state: ToastState,
    pub message: String,
}

/// Receives toast updates. Later updates for the same id replace earlier ones.
pub trait Notifier: Send + Sync {
    fn notify(&self, toast: Toast);
}

/// Messages shown for each state of one operation.
#[derive(Debug, Clone)]
pub struct ToastMessages {
    pub pending: String,
    pub success: String,
    pub failure: String,
}

impl ToastMessages {
    pub fn new(
        pending: impl Into<String>,
        success: impl Into<String>,
        failure: impl Into<String>,
    ) -> Self {
        Self {
            pending: pending.into(),
            success: success.into(),
            failure: failure.into(),
        }
    }
}

static NEXT_TOAST_ID: AtomicU64 = AtomicU64::new(1);

/// A toast shown as pending, to be resolved exactly once.
pub struct PendingToast {
    id: u64,
    messages: ToastMessages,
    notifier: Arc<dyn Notifier>,
}

impl PendingToast {
    pub fn show(notifier: Arc<dyn Notifier>, messages: ToastMessages) -> Self {
        let id = NEXT_TOAST_ID.fetch_add(1, Ordering::Relaxed);
        notifier.notify(Toast {
            id,
            state: ToastState::Pending,
            message: messages.pending.clone(),
        });
        Self {
            id,
            messages,
            notifier,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn succeed(self) {
        self.notifier.notify(Toast {
            id: self.id,
            state: ToastState::Success,
            message: self.messages.success,
        });
    }

    /// Resolves as failed; `detail` is appended to the failure message.
    pub fn fail(self, detail: &str) {
        let message = if detail.is_empty() {
            self.messages.failure
        } else {
            format!("{}: {detail}", self.messages.failure)
        };
        self.notifier.notify(Toast {
            id: self.id,
            state: ToastState::Failure,
            message,
        });
    }
}

/// Records every update; hosts render [`MemoryNotifier::current`].
#[derive(Debug, Default)]
pub struct MemoryNotifier {
    history: Mutex<Vec<Toast>>,
}

impl MemoryNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn history(&self) -> Vec<Toast> {
        self.history.lock().clone()
    }

    /// Latest state of every toast, by id.
    pub fn current(&self) -> Vec<Toast> {
        let mut latest = BTreeMap::new();
        for toast in self.history.lock().iter() {
            latest.insert(toast.id, toast.clone());
        }
        latest.into_values().collect()
    }

    pub fn latest(&self) -> Option<Toast> {
        self.history.lock().last().cloned()
    }
}

impl Notifier for MemoryNotifier {
    fn notify(&self, toast: Toast) {
        self.history.lock().push(toast);
    }
}

/// Writes toasts to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, toast: Toast) {
        match toast.state {
            ToastState::Failure => error!(id = toast.id, "{}", toast.message),
            _ => info!(id = toast.id, state = ?toast.state, "{}", toast.message),
        }
    }
}
