//! Wallet session and transaction flow for the Ectoplasma subscription app.
//!
//! ```text
//!   ProviderLocator ──► SessionSynchronizer ──► WalletSession (watch)
//!                                                   │ account_id
//!   TransactionRequest ──► EnvelopeBuilder ◄────────┘
//!                              │ PendingTransaction
//!                              ▼
//!                      SubmissionCoordinator ──► WalletProvider::send
//!                              │ processed
//!                              ▼
//!                        SessionLedger
//! ```
//!
//! [`SubscriptionClient`] wires these together behind the user actions.
//! Encodings live in `chain_cspr`.

pub mod account;
pub mod client;
pub mod config;
pub mod coordinator;
pub mod envelope;
pub mod error;
pub mod ledger;
pub mod provider;
pub mod session;
pub mod synchronizer;
pub mod transaction;

#[cfg(test)]
pub(crate) mod testing;

pub use client::{Submission, SubscriptionClient};
pub use config::ClientConfig;
pub use coordinator::{ProcessedHook, SubmissionCoordinator, SubmissionReceipt};
pub use envelope::{CallEnvelope, EnvelopeBuilder, TransactionRequest};
pub use error::{AssetError, CoreError, ProviderError};
pub use ledger::SessionLedger;
pub use provider::{
    AssetSource, Capability, EventListener, FileAssetSource, LifecycleEvent, ListenerId,
    ProviderLocator, StaticAssetSource, StatusCallback, WalletProvider,
};
pub use session::{SyncState, WalletSession};
pub use synchronizer::{DiscoveryHandle, SessionSynchronizer, DISCOVERY_POLL_INTERVAL};
pub use transaction::{PendingTransaction, ProviderStatus, TxKind, TxStatus};
