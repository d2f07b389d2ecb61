use std::fmt;

use chain_cspr::CLValue;
use parking_lot::Mutex;
use serde::Serialize;

use crate::envelope::CallEnvelope;

/// The on-chain actions a user can take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TxKind {
    Deposit,
    Subscribe,
    CreatePlan,
}

impl TxKind {
    /// Contract entry point the proxy forwards to.
    pub fn entry_point(&self) -> &'static str {
        match self {
            TxKind::Deposit => "deposit",
            TxKind::Subscribe => "subscribe",
            TxKind::CreatePlan => "create_plan",
        }
    }
}

impl fmt::Display for TxKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.entry_point())
    }
}

/// Transaction lifecycle. Only moves forward; `Processed` and `Failed` are
/// terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TxStatus {
    Built,
    Submitted,
    Processed,
    Failed,
}

impl TxStatus {
    fn rank(&self) -> u8 {
        match self {
            TxStatus::Built => 0,
            TxStatus::Submitted => 1,
            TxStatus::Processed | TxStatus::Failed => 2,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.rank() == 2
    }
}

/// Provider status strings, mapped once at the callback boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderStatus {
    Submitted,
    Processed,
    Failed,
}

impl ProviderStatus {
    pub fn from_raw(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "processed" => ProviderStatus::Processed,
            "failed" | "error" | "cancelled" | "expired" | "timeout" => ProviderStatus::Failed,
            _ => ProviderStatus::Submitted,
        }
    }
}

impl From<ProviderStatus> for TxStatus {
    fn from(status: ProviderStatus) -> Self {
        match status {
            ProviderStatus::Submitted => TxStatus::Submitted,
            ProviderStatus::Processed => TxStatus::Processed,
            ProviderStatus::Failed => TxStatus::Failed,
        }
    }
}

/// One in-flight on-chain action.
#[derive(Debug)]
pub struct PendingTransaction {
    id: u64,
    envelope: CallEnvelope,
    status: Mutex<TxStatus>,
}

impl PendingTransaction {
    pub(crate) fn new(id: u64, envelope: CallEnvelope) -> Self {
        Self {
            id,
            envelope,
            status: Mutex::new(TxStatus::Built),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn kind(&self) -> TxKind {
        self.envelope.kind
    }

    pub fn envelope(&self) -> &CallEnvelope {
        &self.envelope
    }

    pub fn status(&self) -> TxStatus {
        *self.status.lock()
    }

    /// Move to `next` if it is later in the lifecycle. Returns true on change.
    pub fn advance(&self, next: TxStatus) -> bool {
        let mut status = self.status.lock();
        if next.rank() <= status.rank() {
            return false;
        }
        *status = next;
        true
    }

    /// Base units forwarded into the target call.
    pub fn attached_value_motes(&self) -> &str {
        &self.envelope.attached_value_motes
    }

    /// Plan id of a subscribe transaction.
    pub fn plan_id(&self) -> Option<u64> {
        match self.envelope.inner_args.get("plan_id") {
            Some(CLValue::U64(id)) if self.kind() == TxKind::Subscribe => Some(*id),
            _ => None,
        }
    }

    /// Display name of a create-plan transaction.
    pub fn plan_name(&self) -> Option<&str> {
        match self.envelope.inner_args.get("name") {
            Some(CLValue::String(name)) if self.kind() == TxKind::CreatePlan => Some(name),
            _ => None,
        }
    }
}
