//! Transaction submission.
//!
//! Signing and broadcast belong to the wallet provider. The coordinator hands
//! over the deploy JSON, maps the provider's free-form status callbacks onto
//! [`TxStatus`], and runs the caller's hook once when a transaction reaches
//! `Processed`. Nothing is retried: a resubmitted deploy could charge twice.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::CoreError;
use crate::provider::{Capability, StatusCallback, WalletProvider};
use crate::transaction::{PendingTransaction, ProviderStatus, TxStatus};

/// Runs when a transaction is first reported `processed`.
pub type ProcessedHook = Arc<dyn Fn(&PendingTransaction) + Send + Sync>;

/// Outcome of handing a transaction to the provider.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmissionReceipt {
    pub tx_id: u64,
    /// Status when `send` returned. Later callbacks may still advance it.
    pub status: TxStatus,
    pub provider_result: Value,
}

pub struct SubmissionCoordinator {
    provider: Arc<dyn WalletProvider>,
}

impl SubmissionCoordinator {
    pub fn new(provider: Arc<dyn WalletProvider>) -> Self {
        Self { provider }
    }

    /// Submit `tx` for signing by `account_id`.
    ///
    /// Any failure before or during `send` leaves `tx` in `Failed`.
    pub async fn submit(
        &self,
        tx: Arc<PendingTransaction>,
        account_id: Option<&str>,
        on_processed: ProcessedHook,
    ) -> Result<SubmissionReceipt, CoreError> {
        let Some(account_id) = account_id else {
            tx.advance(TxStatus::Failed);
            return Err(CoreError::MissingConfiguration("no active account".into()));
        };
        if !self.provider.supports(Capability::Send) {
            tx.advance(TxStatus::Failed);
            return Err(CoreError::ProviderUnavailable(format!(
                "provider does not support {}",
                Capability::Send
            )));
        }

        let tx_id = tx.id();
        let deploy = tx.envelope().to_json();
        tx.advance(TxStatus::Submitted);
        info!(
            target: "submission",
            tx_id,
            kind = %tx.kind(),
            deploy_hash = %tx.envelope().deploy_hash(),
            "submitting to wallet"
        );

        let tracked = tx.clone();
        let on_status: StatusCallback = Arc::new(move |raw: &str, _data: &Value| {
            let status = ProviderStatus::from_raw(raw);
            debug!(target: "submission", tx_id, raw, ?status, "status callback");

            let next = TxStatus::from(status);
            if !tracked.advance(next) {
                return;
            }
            match next {
                TxStatus::Processed => {
                    info!(target: "submission", tx_id, "transaction processed");
                    on_processed(tracked.as_ref());
                }
                TxStatus::Failed => warn!(target: "submission", tx_id, raw, "transaction failed"),
                _ => {}
            }
        });

        match self.provider.send(deploy, account_id, on_status).await {
            Ok(provider_result) => Ok(SubmissionReceipt {
                tx_id,
                status: tx.status(),
                provider_result,
            }),
            Err(e) => {
                tx.advance(TxStatus::Failed);
                warn!(target: "submission", tx_id, error = %e, "wallet send failed");
                Err(CoreError::SubmissionFailed(e.to_string()))
            }
        }
    }
}
