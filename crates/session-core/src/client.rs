use std::collections::BTreeSet;
use std::sync::Arc;

use chain_cspr::balance::{query_balance_request, WalletBalance};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::config::ClientConfig;
use crate::coordinator::{ProcessedHook, SubmissionCoordinator, SubmissionReceipt};
use crate::envelope::{EnvelopeBuilder, TransactionRequest};
use crate::error::{CoreError, ProviderError};
use crate::ledger::SessionLedger;
use crate::provider::{AssetSource, Capability, ProviderLocator, WalletProvider};
use crate::session::{SyncState, WalletSession};
use crate::synchronizer::{DiscoveryHandle, SessionSynchronizer};
use crate::transaction::PendingTransaction;

/// A submitted transaction and what the wallet said about it.
#[derive(Debug, Clone)]
pub struct Submission {
    /// Shared with the wallet's status callback; its status keeps advancing.
    pub transaction: Arc<PendingTransaction>,
    pub receipt: SubmissionReceipt,
}

/// The user-facing actions of the subscription app.
pub struct SubscriptionClient {
    synchronizer: Arc<SessionSynchronizer>,
    builder: EnvelopeBuilder,
    ledger: Arc<Mutex<SessionLedger>>,
}

impl SubscriptionClient {
    pub fn new(
        config: ClientConfig,
        locator: Arc<dyn ProviderLocator>,
        assets: Arc<dyn AssetSource>,
    ) -> Self {
        let synchronizer = SessionSynchronizer::with_poll_interval(locator, config.poll_interval());
        Self {
            synchronizer,
            builder: EnvelopeBuilder::new(config, assets),
            ledger: Arc::new(Mutex::new(SessionLedger::new())),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        self.builder.config()
    }

    /// Start provider discovery. Requires a tokio runtime.
    pub fn start(&self) -> Result<DiscoveryHandle, CoreError> {
        self.synchronizer.start()
    }

    pub fn shutdown(&self) {
        self.synchronizer.shutdown();
    }

    pub fn session(&self) -> WalletSession {
        self.synchronizer.session()
    }

    pub fn watch_session(&self) -> watch::Receiver<WalletSession> {
        self.synchronizer.subscribe()
    }

    pub fn state(&self) -> SyncState {
        self.synchronizer.state()
    }

    // ─── Wallet actions ──────────────────────────────────────────────

    pub fn connect(&self) -> Result<(), CoreError> {
        self.provider_action(Capability::SignIn, |provider| provider.sign_in())
    }

    pub fn switch_account(&self) -> Result<(), CoreError> {
        self.provider_action(Capability::SwitchAccount, |provider| provider.switch_account())
    }

    pub fn disconnect(&self) -> Result<(), CoreError> {
        self.provider_action(Capability::SignOut, |provider| provider.sign_out())
    }

    fn provider_action(
        &self,
        capability: Capability,
        action: impl FnOnce(&dyn WalletProvider) -> Result<(), ProviderError>,
    ) -> Result<(), CoreError> {
        let provider = self.attached_provider()?;
        if !provider.supports(capability) {
            return Err(ProviderError::Unsupported(capability).into());
        }
        action(provider.as_ref()).map_err(|e| match e {
            ProviderError::Unsupported(_) => CoreError::from(e),
            other => CoreError::ProviderUnavailable(format!("{capability} failed: {other}")),
        })?;
        info!(target: "wallet_session", %capability, "wallet action requested");
        Ok(())
    }

    fn attached_provider(&self) -> Result<Arc<dyn WalletProvider>, CoreError> {
        self.synchronizer
            .provider()
            .ok_or_else(|| CoreError::ProviderUnavailable("wallet provider not found".into()))
    }

    // ─── Contract actions ────────────────────────────────────────────

    /// Deposit `amount` CSPR into the subscription contract.
    pub async fn deposit(&self, amount: &str) -> Result<Submission, CoreError> {
        self.execute(TransactionRequest::Deposit {
            amount: amount.to_string(),
        })
        .await
    }

    pub async fn subscribe(&self, plan_id: &str) -> Result<Submission, CoreError> {
        self.execute(TransactionRequest::Subscribe {
            plan_id: plan_id.to_string(),
        })
        .await
    }

    /// Create a plan priced in CSPR per period of `duration_days` days.
    pub async fn create_plan(
        &self,
        name: &str,
        price: &str,
        duration_days: &str,
    ) -> Result<Submission, CoreError> {
        self.execute(TransactionRequest::CreatePlan {
            name: name.to_string(),
            price: price.to_string(),
            duration_days: duration_days.to_string(),
        })
        .await
    }

    /// Build, submit and, once processed, record `request`.
    pub async fn execute(&self, request: TransactionRequest) -> Result<Submission, CoreError> {
        let session = self.synchronizer.session();
        if !session.is_ready() {
            return Err(CoreError::ProviderUnavailable("wallet provider not ready".into()));
        }
        let provider = self.attached_provider()?;

        let transaction = Arc::new(self.builder.build(&request, session.account_id()).await?);

        let ledger = self.ledger.clone();
        let on_processed: ProcessedHook = Arc::new(move |tx: &PendingTransaction| {
            if let Err(e) = ledger.lock().apply(tx) {
                warn!(target: "submission", tx_id = tx.id(), error = %e, "processed transaction not recorded");
            }
        });
        let receipt = SubmissionCoordinator::new(provider)
            .submit(transaction.clone(), session.account_id(), on_processed)
            .await?;

        Ok(Submission {
            transaction,
            receipt,
        })
    }

    // ─── Session bookkeeping ─────────────────────────────────────────

    pub fn ledger(&self) -> SessionLedger {
        self.ledger.lock().clone()
    }

    pub fn balance_cspr(&self) -> Result<String, CoreError> {
        self.ledger.lock().balance_cspr()
    }

    pub fn subscribed_plans(&self) -> BTreeSet<u64> {
        self.ledger.lock().subscribed_plans().clone()
    }

    /// JSON-RPC body asking for the active account's on-chain balance.
    pub fn wallet_balance_request(&self, id: u64) -> Result<Value, CoreError> {
        let session = self.synchronizer.session();
        let account_id = session
            .account_id()
            .ok_or_else(|| CoreError::MissingConfiguration("no active account".into()))?;
        Ok(query_balance_request(account_id, id))
    }

    pub fn parse_wallet_balance(&self, response: &Value) -> Result<WalletBalance, CoreError> {
        Ok(WalletBalance::from_rpc_response(response)?)
    }
}
