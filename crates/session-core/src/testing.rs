//! In-process wallet provider and locator for unit tests.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};

use crate::error::ProviderError;
use crate::provider::{
    Capability, EventListener, LifecycleEvent, ListenerId, ProviderLocator, StatusCallback,
    WalletProvider,
};

const ALL_CAPABILITIES: [Capability; 7] = [
    Capability::SignIn,
    Capability::SwitchAccount,
    Capability::SignOut,
    Capability::Events,
    Capability::Unsubscribe,
    Capability::ActiveAccount,
    Capability::Send,
];

#[derive(Default)]
pub(crate) struct FakeProvider {
    capabilities: HashSet<Capability>,
    listeners: Mutex<Vec<(LifecycleEvent, ListenerId, EventListener)>>,
    next_listener: AtomicU64,
    on_calls: AtomicUsize,
    off_calls: AtomicUsize,
    sign_in_calls: AtomicUsize,
    active_account: Mutex<(Option<Value>, Duration)>,
    statuses: Mutex<Vec<String>>,
    send_error: Mutex<Option<ProviderError>>,
    action_error: Mutex<Option<ProviderError>>,
    sent: Mutex<Vec<(Value, String)>>,
    last_callback: Mutex<Option<StatusCallback>>,
}

impl FakeProvider {
    pub(crate) fn full() -> Self {
        Self::with_capabilities(&ALL_CAPABILITIES)
    }

    pub(crate) fn with_capabilities(capabilities: &[Capability]) -> Self {
        Self {
            capabilities: capabilities.iter().copied().collect(),
            ..Self::default()
        }
    }

    /// Deliver `payload` to every listener registered for `event`.
    pub(crate) fn emit(&self, event: LifecycleEvent, payload: &Value) {
        let targets: Vec<EventListener> = self
            .listeners
            .lock()
            .iter()
            .filter(|(e, _, _)| *e == event)
            .map(|(_, _, listener)| listener.clone())
            .collect();
        for listener in targets {
            listener(payload);
        }
    }

    pub(crate) fn set_active_account(&self, account: Option<Value>, delay: Duration) {
        *self.active_account.lock() = (account, delay);
    }

    /// Statuses reported synchronously from within `send`.
    pub(crate) fn script_statuses(&self, statuses: &[&str]) {
        *self.statuses.lock() = statuses.iter().map(|s| s.to_string()).collect();
    }

    pub(crate) fn fail_send(&self, error: ProviderError) {
        *self.send_error.lock() = Some(error);
    }

    /// Make sign-in, account switching and sign-out fail with `error`.
    pub(crate) fn fail_wallet_actions(&self, error: ProviderError) {
        *self.action_error.lock() = Some(error);
    }

    fn wallet_action(&self) -> Result<(), ProviderError> {
        match self.action_error.lock().clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    /// Report a status after `send` has already returned.
    pub(crate) fn report_status(&self, status: &str) {
        let callback = self.last_callback.lock().clone();
        if let Some(callback) = callback {
            callback(status, &Value::Null);
        }
    }

    pub(crate) fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }

    pub(crate) fn on_calls(&self) -> usize {
        self.on_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn off_calls(&self) -> usize {
        self.off_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn sign_in_calls(&self) -> usize {
        self.sign_in_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn sent(&self) -> Vec<(Value, String)> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl WalletProvider for FakeProvider {
    fn supports(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }

    fn sign_in(&self) -> Result<(), ProviderError> {
        self.sign_in_calls.fetch_add(1, Ordering::SeqCst);
        self.wallet_action()
    }

    fn switch_account(&self) -> Result<(), ProviderError> {
        self.wallet_action()
    }

    fn sign_out(&self) -> Result<(), ProviderError> {
        self.wallet_action()
    }

    fn on(&self, event: LifecycleEvent, listener: EventListener) -> Result<ListenerId, ProviderError> {
        self.on_calls.fetch_add(1, Ordering::SeqCst);
        let id = self.next_listener.fetch_add(1, Ordering::SeqCst);
        self.listeners.lock().push((event, id, listener));
        Ok(id)
    }

    fn off(&self, _event: LifecycleEvent, id: ListenerId) -> Result<(), ProviderError> {
        self.off_calls.fetch_add(1, Ordering::SeqCst);
        self.listeners.lock().retain(|(_, existing, _)| *existing != id);
        Ok(())
    }

    async fn active_account(&self) -> Result<Option<Value>, ProviderError> {
        let (account, delay) = self.active_account.lock().clone();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        Ok(account)
    }

    async fn send(
        &self,
        deploy: Value,
        account_id: &str,
        on_status: StatusCallback,
    ) -> Result<Value, ProviderError> {
        let hash = deploy.get("hash").cloned().unwrap_or(Value::Null);
        self.sent.lock().push((deploy, account_id.to_string()));
        *self.last_callback.lock() = Some(on_status.clone());

        if let Some(error) = self.send_error.lock().clone() {
            return Err(error);
        }
        let statuses = self.statuses.lock().clone();
        for status in &statuses {
            on_status(status.as_str(), &json!({ "deployHash": hash }));
        }
        Ok(json!({ "deployHash": hash }))
    }
}

/// Returns the provider only after `hidden_for` unsuccessful probes.
pub(crate) struct CountingLocator {
    provider: Arc<FakeProvider>,
    hidden_for: usize,
    probes: AtomicUsize,
}

impl CountingLocator {
    pub(crate) fn new(provider: Arc<FakeProvider>, hidden_for: usize) -> Self {
        Self {
            provider,
            hidden_for,
            probes: AtomicUsize::new(0),
        }
    }

    pub(crate) fn probes(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }
}

impl ProviderLocator for CountingLocator {
    fn locate(&self) -> Option<Arc<dyn WalletProvider>> {
        let probe = self.probes.fetch_add(1, Ordering::SeqCst);
        if probe < self.hidden_for {
            return None;
        }
        Some(self.provider.clone() as Arc<dyn WalletProvider>)
    }
}
