//! Wallet session synchronizer.
//!
//! ```text
//! Absent -> Discovering -> Ready <-> Connected
//! ```
//!
//! The provider script loads on its own schedule, so discovery probes once
//! and then polls at a fixed interval until the provider shows up with event
//! support. Once attached, five lifecycle listeners keep the session's active
//! account current, and a best-effort active-account query seeds it without
//! waiting for an event.
//!
//! Events are applied in delivery order and the last write wins. The seed
//! query and a `signed_in` event may resolve in either order; both describe
//! the provider's own current state, so neither is preferred.

use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::account::extract_account_id;
use crate::error::CoreError;
use crate::provider::{
    Capability, EventListener, LifecycleEvent, ListenerId, ProviderLocator, WalletProvider,
};
use crate::session::{SyncState, WalletSession};

/// Delay between discovery probes.
pub const DISCOVERY_POLL_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Discovering,
    Attached,
}

struct Attachment {
    provider: Arc<dyn WalletProvider>,
    listeners: Vec<(LifecycleEvent, ListenerId)>,
}

struct Inner {
    phase: Phase,
    /// Bumped on every attach and shutdown. Listeners and seed queries carry
    /// the value they were created under and go quiet once it moves on.
    generation: u64,
    attachment: Option<Attachment>,
    poll: Option<JoinHandle<()>>,
    runtime: Option<Handle>,
}

impl Inner {
    fn is_current(&self, generation: u64) -> bool {
        self.phase == Phase::Attached && self.generation == generation
    }
}

/// Owns the [`WalletSession`] and is its only writer.
pub struct SessionSynchronizer {
    locator: Arc<dyn ProviderLocator>,
    poll_interval: Duration,
    session: watch::Sender<WalletSession>,
    /// Published phase, for discovery handles.
    lifecycle: watch::Sender<Phase>,
    inner: Mutex<Inner>,
}

impl SessionSynchronizer {
    pub fn new(locator: Arc<dyn ProviderLocator>) -> Arc<Self> {
        Self::with_poll_interval(locator, DISCOVERY_POLL_INTERVAL)
    }

    pub fn with_poll_interval(locator: Arc<dyn ProviderLocator>, poll_interval: Duration) -> Arc<Self> {
        let (session, _) = watch::channel(WalletSession::default());
        let (lifecycle, _) = watch::channel(Phase::Idle);
        Arc::new(Self {
            locator,
            // tokio intervals reject a zero period.
            poll_interval: poll_interval.max(Duration::from_millis(1)),
            session,
            lifecycle,
            inner: Mutex::new(Inner {
                phase: Phase::Idle,
                generation: 0,
                attachment: None,
                poll: None,
                runtime: None,
            }),
        })
    }

    /// Snapshot of the current session.
    pub fn session(&self) -> WalletSession {
        self.session.borrow().clone()
    }

    /// Receiver that observes every session change.
    pub fn subscribe(&self) -> watch::Receiver<WalletSession> {
        self.session.subscribe()
    }

    pub fn state(&self) -> SyncState {
        match self.inner.lock().phase {
            Phase::Idle => SyncState::Absent,
            Phase::Discovering => SyncState::Discovering,
            Phase::Attached if self.session.borrow().is_connected() => SyncState::Connected,
            Phase::Attached => SyncState::Ready,
        }
    }

    /// The attached provider, if discovery has completed.
    pub fn provider(&self) -> Option<Arc<dyn WalletProvider>> {
        self.inner
            .lock()
            .attachment
            .as_ref()
            .map(|attachment| attachment.provider.clone())
    }

    /// Begin discovery: probe once, then poll until the provider appears.
    ///
    /// Must be called from within a tokio runtime. Calling it again while
    /// discovery is running or after attachment returns a handle to the
    /// existing run.
    pub fn start(self: &Arc<Self>) -> Result<DiscoveryHandle, CoreError> {
        let runtime = Handle::try_current()
            .map_err(|e| CoreError::Internal(format!("discovery needs a tokio runtime: {e}")))?;

        {
            let mut inner = self.inner.lock();
            if inner.phase != Phase::Idle {
                return Ok(self.handle());
            }
            inner.phase = Phase::Discovering;
            inner.runtime = Some(runtime.clone());
            self.lifecycle.send_replace(Phase::Discovering);
        }
        info!(target: "wallet_session", "discovering wallet provider");

        if self.probe() {
            return Ok(self.handle());
        }

        let weak = Arc::downgrade(self);
        let period = self.poll_interval;
        let task = runtime.spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(sync) = weak.upgrade() else { break };
                if sync.probe() {
                    break;
                }
            }
        });

        let mut inner = self.inner.lock();
        match inner.phase {
            Phase::Discovering => inner.poll = Some(task),
            Phase::Attached => {}
            Phase::Idle => task.abort(),
        }
        drop(inner);

        Ok(self.handle())
    }

    /// Stop discovery and detach from the provider.
    ///
    /// Listeners are removed when the provider can unsubscribe; otherwise they
    /// stay registered but are ignored. The session returns to empty.
    pub fn shutdown(&self) {
        let (poll, attachment) = {
            let mut inner = self.inner.lock();
            inner.phase = Phase::Idle;
            inner.generation += 1;
            inner.runtime = None;
            self.lifecycle.send_replace(Phase::Idle);
            (inner.poll.take(), inner.attachment.take())
        };

        if let Some(poll) = poll {
            poll.abort();
        }
        if let Some(attachment) = attachment {
            release_listeners(&attachment.provider, attachment.listeners);
        }

        self.session.send_if_modified(WalletSession::reset);
        info!(target: "wallet_session", "session synchronizer stopped");
    }

    fn cancel_discovery(&self) {
        let mut inner = self.inner.lock();
        if inner.phase != Phase::Discovering {
            return;
        }
        inner.phase = Phase::Idle;
        inner.runtime = None;
        self.lifecycle.send_replace(Phase::Idle);
        if let Some(poll) = inner.poll.take() {
            poll.abort();
        }
        debug!(target: "wallet_session", "discovery cancelled");
    }

    fn handle(self: &Arc<Self>) -> DiscoveryHandle {
        DiscoveryHandle {
            synchronizer: Arc::downgrade(self),
            lifecycle: self.lifecycle.subscribe(),
        }
    }

    fn is_current(&self, generation: u64) -> bool {
        self.inner.lock().is_current(generation)
    }

    /// One discovery attempt. Returns true once the provider is attached.
    fn probe(self: &Arc<Self>) -> bool {
        let Some(provider) = self.locator.locate() else {
            debug!(target: "wallet_session", "wallet provider not present yet");
            return false;
        };
        if !provider.supports(Capability::Events) {
            debug!(target: "wallet_session", "wallet provider present without event support");
            return false;
        }
        self.attach(provider);
        true
    }

    fn attach(self: &Arc<Self>, provider: Arc<dyn WalletProvider>) {
        let generation = {
            let mut inner = self.inner.lock();
            if inner.phase != Phase::Discovering {
                return;
            }
            inner.phase = Phase::Attached;
            inner.generation += 1;
            // The poll loop exits on its own after a successful probe.
            inner.poll.take();
            inner.generation
        };
        self.session.send_if_modified(WalletSession::mark_ready);

        // Registered outside the lock: a provider may call back synchronously.
        let mut listeners = Vec::with_capacity(LifecycleEvent::ALL.len());
        for event in LifecycleEvent::ALL {
            let weak: Weak<Self> = Arc::downgrade(self);
            let listener: EventListener = Arc::new(move |payload: &Value| {
                if let Some(sync) = weak.upgrade() {
                    sync.handle_event(generation, event, payload);
                }
            });
            match provider.on(event, listener) {
                Ok(id) => listeners.push((event, id)),
                Err(e) => warn!(target: "wallet_session", %event, error = %e, "failed to subscribe"),
            }
        }

        let mut inner = self.inner.lock();
        if !inner.is_current(generation) {
            // Shut down while subscribing.
            drop(inner);
            release_listeners(&provider, listeners);
            return;
        }
        inner.attachment = Some(Attachment {
            provider: provider.clone(),
            listeners,
        });
        self.lifecycle.send_replace(Phase::Attached);
        drop(inner);

        info!(target: "wallet_session", "wallet provider attached");
        self.seed_active_account(provider, generation);
    }

    fn handle_event(self: &Arc<Self>, generation: u64, event: LifecycleEvent, payload: &Value) {
        if !self.is_current(generation) {
            return;
        }
        debug!(target: "wallet_session", %event, "lifecycle event");

        match event {
            LifecycleEvent::Loaded => {
                self.session.send_if_modified(WalletSession::mark_ready);
                if let Some(provider) = self.provider() {
                    self.seed_active_account(provider, generation);
                }
            }
            LifecycleEvent::SignedIn | LifecycleEvent::SwitchedAccount => {
                match extract_account_id(payload) {
                    Some(account_id) => self.set_account(Some(account_id), event.as_str()),
                    None => debug!(target: "wallet_session", %event, "payload carries no usable account"),
                }
            }
            LifecycleEvent::SignedOut | LifecycleEvent::Disconnected => {
                self.set_account(None, event.as_str());
            }
        }
    }

    fn set_account(&self, account_id: Option<String>, source: &'static str) {
        let shown = account_id.clone().unwrap_or_else(|| "<none>".to_string());
        if self.session.send_if_modified(|session| session.set_account(account_id)) {
            info!(target: "wallet_session", source, account = %shown, "active account changed");
        }
    }

    /// Fire-and-forget query for the active account. The answer is dropped if
    /// the attachment it was asked for has ended by the time it arrives.
    fn seed_active_account(self: &Arc<Self>, provider: Arc<dyn WalletProvider>, generation: u64) {
        if !provider.supports(Capability::ActiveAccount) {
            return;
        }
        let Some(runtime) = self.inner.lock().runtime.clone() else {
            return;
        };

        let weak = Arc::downgrade(self);
        runtime.spawn(async move {
            let result = provider.active_account().await;
            let Some(sync) = weak.upgrade() else { return };
            if !sync.is_current(generation) {
                debug!(target: "wallet_session", "discarding active account from an ended attachment");
                return;
            }
            match result {
                Ok(Some(payload)) => {
                    if let Some(account_id) = extract_account_id(&payload) {
                        sync.set_account(Some(account_id), "active_account");
                    }
                }
                Ok(None) => debug!(target: "wallet_session", "no active account"),
                Err(e) => warn!(target: "wallet_session", error = %e, "failed to read active account"),
            }
        });
    }
}

fn release_listeners(provider: &Arc<dyn WalletProvider>, listeners: Vec<(LifecycleEvent, ListenerId)>) {
    if !provider.supports(Capability::Unsubscribe) {
        debug!(target: "wallet_session", "provider cannot unsubscribe; listeners left in place");
        return;
    }
    for (event, id) in listeners {
        if let Err(e) = provider.off(event, id) {
            warn!(target: "wallet_session", %event, error = %e, "failed to unsubscribe");
        }
    }
}

/// Handle to a discovery run.
pub struct DiscoveryHandle {
    synchronizer: Weak<SessionSynchronizer>,
    lifecycle: watch::Receiver<Phase>,
}

impl DiscoveryHandle {
    /// Stop polling if the provider has not been found yet. No effect after
    /// attachment.
    pub fn cancel(&self) {
        if let Some(sync) = self.synchronizer.upgrade() {
            sync.cancel_discovery();
        }
    }

    /// Wait until the provider is attached.
    ///
    /// Fails with [`CoreError::ProviderUnavailable`] if discovery is cancelled
    /// or the synchronizer shuts down before a provider is found.
    pub async fn ready(&mut self) -> Result<(), CoreError> {
        let phase = *self
            .lifecycle
            .wait_for(|phase| *phase != Phase::Discovering)
            .await
            .map_err(|_| CoreError::ProviderUnavailable("session synchronizer dropped".into()))?;
        match phase {
            Phase::Attached => Ok(()),
            Phase::Idle | Phase::Discovering => Err(CoreError::ProviderUnavailable(
                "discovery stopped before a wallet provider was found".into(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{CountingLocator, FakeProvider};
    use serde_json::json;

    fn sync_for(locator: Arc<CountingLocator>) -> Arc<SessionSynchronizer> {
        SessionSynchronizer::new(locator)
    }

    #[tokio::test(start_paused = true)]
    async fn immediate_discovery_skips_polling() {
        let provider = Arc::new(FakeProvider::full());
        let locator = Arc::new(CountingLocator::new(provider.clone(), 0));
        let sync = sync_for(locator.clone());

        sync.start().unwrap();

        assert!(sync.session().is_ready());
        assert_eq!(sync.state(), SyncState::Ready);
        assert_eq!(locator.probes(), 1);
        assert_eq!(provider.listener_count(), 5);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(locator.probes(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn polls_until_provider_appears_then_stops() {
        let provider = Arc::new(FakeProvider::full());
        // Initial probe plus three poll ticks.
        let locator = Arc::new(CountingLocator::new(provider.clone(), 3));
        let sync = sync_for(locator.clone());
        let mut changes = sync.subscribe();

        let mut handle = sync.start().unwrap();
        assert_eq!(sync.state(), SyncState::Discovering);
        assert!(!sync.session().is_ready());

        tokio::time::sleep(DISCOVERY_POLL_INTERVAL * 2 + Duration::from_millis(10)).await;
        assert_eq!(locator.probes(), 3);
        assert!(!sync.session().is_ready());

        handle.ready().await.unwrap();
        assert_eq!(locator.probes(), 4);
        assert_eq!(provider.on_calls(), 5);
        assert!(changes.has_changed().unwrap());
        changes.mark_unchanged();

        tokio::time::sleep(DISCOVERY_POLL_INTERVAL * 10).await;
        assert_eq!(locator.probes(), 4);
        assert_eq!(provider.on_calls(), 5);
        assert!(!changes.has_changed().unwrap());

        provider.emit(
            LifecycleEvent::SignedIn,
            &json!({ "account": { "public_key": "01ab" } }),
        );
        assert_eq!(sync.session().account_id(), Some("01ab"));
        assert_eq!(sync.state(), SyncState::Connected);
    }

    #[tokio::test(start_paused = true)]
    async fn provider_without_events_keeps_polling() {
        let provider = Arc::new(FakeProvider::with_capabilities(&[Capability::Send]));
        let locator = Arc::new(CountingLocator::new(provider.clone(), 0));
        let sync = sync_for(locator.clone());

        sync.start().unwrap();
        tokio::time::sleep(DISCOVERY_POLL_INTERVAL * 4 + Duration::from_millis(10)).await;

        assert_eq!(locator.probes(), 5);
        assert!(!sync.session().is_ready());
        assert_eq!(sync.state(), SyncState::Discovering);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_stops_polling() {
        let provider = Arc::new(FakeProvider::full());
        let locator = Arc::new(CountingLocator::new(provider, 100));
        let sync = sync_for(locator.clone());

        let handle = sync.start().unwrap();
        tokio::time::sleep(DISCOVERY_POLL_INTERVAL + Duration::from_millis(10)).await;
        handle.cancel();
        let probes = locator.probes();

        tokio::time::sleep(DISCOVERY_POLL_INTERVAL * 5).await;
        assert_eq!(locator.probes(), probes);
        assert_eq!(sync.state(), SyncState::Absent);
    }

    #[tokio::test(start_paused = true)]
    async fn seed_query_sets_account() {
        let provider = Arc::new(FakeProvider::full());
        provider.set_active_account(Some(json!({ "public_key": "01aa" })), Duration::ZERO);
        let sync = sync_for(Arc::new(CountingLocator::new(provider, 0)));

        sync.start().unwrap();
        tokio::time::sleep(Duration::from_millis(1)).await;

        assert_eq!(sync.session().account_id(), Some("01aa"));
    }

    #[tokio::test(start_paused = true)]
    async fn late_seed_query_overrides_earlier_event() {
        let provider = Arc::new(FakeProvider::full());
        provider.set_active_account(Some(json!({ "public_key": "01aa" })), Duration::from_millis(100));
        let sync = sync_for(Arc::new(CountingLocator::new(provider.clone(), 0)));

        sync.start().unwrap();
        provider.emit(LifecycleEvent::SignedIn, &json!({ "account": { "public_key": "01bb" } }));
        assert_eq!(sync.session().account_id(), Some("01bb"));

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(sync.session().account_id(), Some("01aa"));
    }

    #[tokio::test(start_paused = true)]
    async fn late_event_overrides_seed_query() {
        let provider = Arc::new(FakeProvider::full());
        provider.set_active_account(Some(json!({ "public_key": "01aa" })), Duration::ZERO);
        let sync = sync_for(Arc::new(CountingLocator::new(provider.clone(), 0)));

        sync.start().unwrap();
        tokio::time::sleep(Duration::from_millis(1)).await;
        provider.emit(LifecycleEvent::SwitchedAccount, &json!({ "publicKeyHex": "01bb" }));

        assert_eq!(sync.session().account_id(), Some("01bb"));
    }

    #[tokio::test(start_paused = true)]
    async fn sign_out_and_disconnect_clear_account() {
        let provider = Arc::new(FakeProvider::full());
        let sync = sync_for(Arc::new(CountingLocator::new(provider.clone(), 0)));
        sync.start().unwrap();

        for clearing in [LifecycleEvent::SignedOut, LifecycleEvent::Disconnected] {
            provider.emit(LifecycleEvent::SignedIn, &json!({ "public_key": "01ab" }));
            assert_eq!(sync.state(), SyncState::Connected);
            provider.emit(clearing, &Value::Null);
            assert_eq!(sync.session().account_id(), None);
            assert_eq!(sync.state(), SyncState::Ready);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn unusable_payload_leaves_account_unchanged() {
        let provider = Arc::new(FakeProvider::full());
        let sync = sync_for(Arc::new(CountingLocator::new(provider.clone(), 0)));
        sync.start().unwrap();

        provider.emit(LifecycleEvent::SignedIn, &json!({ "public_key": "01ab" }));
        provider.emit(LifecycleEvent::SwitchedAccount, &json!({ "account": { "name": "?" } }));
        assert_eq!(sync.session().account_id(), Some("01ab"));
    }

    #[tokio::test(start_paused = true)]
    async fn loaded_reseeds_account() {
        let provider = Arc::new(FakeProvider::full());
        let sync = sync_for(Arc::new(CountingLocator::new(provider.clone(), 0)));
        sync.start().unwrap();
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(sync.session().account_id(), None);

        provider.set_active_account(Some(json!({ "account": { "publicKey": "02cc" } })), Duration::ZERO);
        provider.emit(LifecycleEvent::Loaded, &Value::Null);
        tokio::time::sleep(Duration::from_millis(1)).await;

        assert_eq!(sync.session().account_id(), Some("02cc"));
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_unsubscribes_and_resets() {
        let provider = Arc::new(FakeProvider::full());
        let sync = sync_for(Arc::new(CountingLocator::new(provider.clone(), 0)));
        sync.start().unwrap();
        provider.emit(LifecycleEvent::SignedIn, &json!({ "public_key": "01ab" }));

        sync.shutdown();

        assert_eq!(provider.listener_count(), 0);
        assert_eq!(provider.off_calls(), 5);
        assert_eq!(sync.session(), WalletSession::default());
        assert_eq!(sync.state(), SyncState::Absent);
        assert!(sync.provider().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_without_unsubscribe_ignores_later_events() {
        let provider = Arc::new(FakeProvider::with_capabilities(&[
            Capability::Events,
            Capability::Send,
        ]));
        let sync = sync_for(Arc::new(CountingLocator::new(provider.clone(), 0)));
        sync.start().unwrap();

        sync.shutdown();
        assert_eq!(provider.listener_count(), 5);
        assert_eq!(provider.off_calls(), 0);

        provider.emit(LifecycleEvent::SignedIn, &json!({ "public_key": "01ab" }));
        assert_eq!(sync.session().account_id(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_cancels_outstanding_poll() {
        let provider = Arc::new(FakeProvider::full());
        let locator = Arc::new(CountingLocator::new(provider, 100));
        let sync = sync_for(locator.clone());
        sync.start().unwrap();

        sync.shutdown();
        tokio::time::sleep(DISCOVERY_POLL_INTERVAL * 5).await;
        assert_eq!(locator.probes(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn seed_from_ended_attachment_is_dropped() {
        let provider = Arc::new(FakeProvider::full());
        provider.set_active_account(Some(json!({ "public_key": "01aa" })), Duration::from_millis(100));
        let sync = sync_for(Arc::new(CountingLocator::new(provider.clone(), 0)));

        sync.start().unwrap();
        tokio::task::yield_now().await;
        sync.shutdown();

        provider.set_active_account(None, Duration::ZERO);
        sync.start().unwrap();
        assert_eq!(sync.state(), SyncState::Ready);
        provider.emit(LifecycleEvent::SignedOut, &Value::Null);

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(sync.session().account_id(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn ready_fails_after_cancel() {
        let provider = Arc::new(FakeProvider::full());
        let sync = sync_for(Arc::new(CountingLocator::new(provider, 100)));

        let mut handle = sync.start().unwrap();
        handle.cancel();

        let result = tokio::time::timeout(Duration::from_secs(5), handle.ready()).await;
        assert!(matches!(result, Ok(Err(CoreError::ProviderUnavailable(_)))));
    }

    #[tokio::test(start_paused = true)]
    async fn ready_fails_after_shutdown_while_waiting() {
        let provider = Arc::new(FakeProvider::full());
        let sync = sync_for(Arc::new(CountingLocator::new(provider, 100)));
        let mut handle = sync.start().unwrap();

        let stopper = sync.clone();
        tokio::spawn(async move {
            tokio::time::sleep(DISCOVERY_POLL_INTERVAL * 2).await;
            stopper.shutdown();
        });

        let result = tokio::time::timeout(Duration::from_secs(5), handle.ready()).await;
        assert!(matches!(result, Ok(Err(CoreError::ProviderUnavailable(_)))));
    }

    #[tokio::test(start_paused = true)]
    async fn ready_succeeds_once_attached() {
        let provider = Arc::new(FakeProvider::full());
        let sync = sync_for(Arc::new(CountingLocator::new(provider.clone(), 2)));

        let mut handle = sync.start().unwrap();
        handle.ready().await.unwrap();

        assert_eq!(sync.state(), SyncState::Ready);
        assert_eq!(provider.on_calls(), 5);
        // A handle taken after attachment resolves straight away.
        sync.start().unwrap().ready().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn start_twice_attaches_once() {
        let provider = Arc::new(FakeProvider::full());
        let locator = Arc::new(CountingLocator::new(provider.clone(), 0));
        let sync = sync_for(locator.clone());

        sync.start().unwrap();
        sync.start().unwrap();

        assert_eq!(locator.probes(), 1);
        assert_eq!(provider.on_calls(), 5);
    }

    #[test]
    fn start_outside_runtime_fails() {
        let provider = Arc::new(FakeProvider::full());
        let sync = sync_for(Arc::new(CountingLocator::new(provider, 0)));
        assert!(matches!(sync.start(), Err(CoreError::Internal(_))));
    }
}
