use serde::Serialize;

/// The client's view of its relationship with the wallet provider.
///
/// `account_id` is only ever set while `readiness` is true.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WalletSession {
    readiness: bool,
    account_id: Option<String>,
}

impl WalletSession {
    /// Provider found and exposes event subscription.
    pub fn is_ready(&self) -> bool {
        self.readiness
    }

    /// Currently active account (tag-prefixed public key hex).
    pub fn account_id(&self) -> Option<&str> {
        self.account_id.as_deref()
    }

    pub fn is_connected(&self) -> bool {
        self.account_id.is_some()
    }

    /// Returns true when readiness changed.
    pub(crate) fn mark_ready(&mut self) -> bool {
        let changed = !self.readiness;
        self.readiness = true;
        changed
    }

    /// Replace the active account. Ignored while not ready. Returns true when
    /// the value changed.
    pub(crate) fn set_account(&mut self, account_id: Option<String>) -> bool {
        if !self.readiness || self.account_id == account_id {
            return false;
        }
        self.account_id = account_id;
        true
    }

    /// Back to the empty start-of-process session.
    pub(crate) fn reset(&mut self) -> bool {
        let changed = self.readiness || self.account_id.is_some();
        *self = WalletSession::default();
        changed
    }
}

/// Synchronizer lifecycle as seen from outside.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SyncState {
    /// Not started, or torn down.
    Absent,
    /// Polling for the provider.
    Discovering,
    /// Provider attached, no active account.
    Ready,
    /// Provider attached with an active account.
    Connected,
}
