//! Boundaries to the outside world: the injected wallet provider, the lookup
//! that discovers it, and the asset source that serves the proxy program.
//!
//! Every provider operation is optional. Callers check [`WalletProvider::supports`]
//! before use, and the default method bodies report
//! [`ProviderError::Unsupported`].

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{AssetError, ProviderError};

/// Optional provider capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    SignIn,
    SwitchAccount,
    SignOut,
    /// `on(event, listener)`; required for discovery to succeed.
    Events,
    /// `off(event, listener)`.
    Unsubscribe,
    ActiveAccount,
    Send,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Capability::SignIn => "sign_in",
            Capability::SwitchAccount => "switch_account",
            Capability::SignOut => "sign_out",
            Capability::Events => "events",
            Capability::Unsubscribe => "unsubscribe",
            Capability::ActiveAccount => "active_account",
            Capability::Send => "send",
        };
        f.write_str(name)
    }
}

/// Provider lifecycle signals the session tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleEvent {
    Loaded,
    SignedIn,
    SwitchedAccount,
    SignedOut,
    Disconnected,
}

impl LifecycleEvent {
    pub const ALL: [LifecycleEvent; 5] = [
        LifecycleEvent::Loaded,
        LifecycleEvent::SignedIn,
        LifecycleEvent::SwitchedAccount,
        LifecycleEvent::SignedOut,
        LifecycleEvent::Disconnected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleEvent::Loaded => "loaded",
            LifecycleEvent::SignedIn => "signed_in",
            LifecycleEvent::SwitchedAccount => "switched_account",
            LifecycleEvent::SignedOut => "signed_out",
            LifecycleEvent::Disconnected => "disconnected",
        }
    }
}

impl fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Handle returned by [`WalletProvider::on`], passed back to `off`.
pub type ListenerId = u64;

/// Lifecycle listener; receives the event payload.
pub type EventListener = Arc<dyn Fn(&Value) + Send + Sync>;

/// Status callback; receives the raw status string and its data.
pub type StatusCallback = Arc<dyn Fn(&str, &Value) + Send + Sync>;

/// The injected wallet. It holds the keys, signs and broadcasts.
#[async_trait]
pub trait WalletProvider: Send + Sync {
    fn supports(&self, capability: Capability) -> bool;

    fn sign_in(&self) -> Result<(), ProviderError> {
        Err(ProviderError::Unsupported(Capability::SignIn))
    }

    fn switch_account(&self) -> Result<(), ProviderError> {
        Err(ProviderError::Unsupported(Capability::SwitchAccount))
    }

    fn sign_out(&self) -> Result<(), ProviderError> {
        Err(ProviderError::Unsupported(Capability::SignOut))
    }

    fn on(&self, event: LifecycleEvent, listener: EventListener) -> Result<ListenerId, ProviderError>;

    fn off(&self, _event: LifecycleEvent, _id: ListenerId) -> Result<(), ProviderError> {
        Err(ProviderError::Unsupported(Capability::Unsubscribe))
    }

    /// The provider's view of the active account, in whatever payload shape
    /// it uses. `Ok(None)` when no account is active.
    async fn active_account(&self) -> Result<Option<Value>, ProviderError> {
        Err(ProviderError::Unsupported(Capability::ActiveAccount))
    }

    /// Sign and broadcast a deploy. The provider may invoke `on_status` any
    /// number of times, before or after this future resolves.
    async fn send(
        &self,
        _deploy: Value,
        _account_id: &str,
        _on_status: StatusCallback,
    ) -> Result<Value, ProviderError> {
        Err(ProviderError::Unsupported(Capability::Send))
    }
}

/// Looks for the provider in the host environment. Probed repeatedly until
/// it returns one.
pub trait ProviderLocator: Send + Sync {
    fn locate(&self) -> Option<Arc<dyn WalletProvider>>;
}

impl<F> ProviderLocator for F
where
    F: Fn() -> Option<Arc<dyn WalletProvider>> + Send + Sync,
{
    fn locate(&self) -> Option<Arc<dyn WalletProvider>> {
        self()
    }
}

/// Byte payload retrieval keyed by path.
#[async_trait]
pub trait AssetSource: Send + Sync {
    async fn fetch(&self, path: &str) -> Result<Vec<u8>, AssetError>;
}

/// Serves assets from a directory on disk.
#[derive(Debug, Clone)]
pub struct FileAssetSource {
    root: PathBuf,
}

impl FileAssetSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl AssetSource for FileAssetSource {
    async fn fetch(&self, path: &str) -> Result<Vec<u8>, AssetError> {
        let full = self.root.join(path.trim_start_matches('/'));
        tokio::fs::read(&full).await.map_err(|e| AssetError {
            path: path.to_string(),
            reason: e.to_string(),
        })
    }
}

/// Serves assets held in memory, e.g. a proxy program embedded with
/// `include_bytes!`.
#[derive(Debug, Clone, Default)]
pub struct StaticAssetSource {
    assets: HashMap<String, Vec<u8>>,
}

impl StaticAssetSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_asset(mut self, path: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        self.assets.insert(path.into(), bytes.into());
        self
    }
}

#[async_trait]
impl AssetSource for StaticAssetSource {
    async fn fetch(&self, path: &str) -> Result<Vec<u8>, AssetError> {
        self.assets.get(path).cloned().ok_or_else(|| AssetError {
            path: path.to_string(),
            reason: "not found".into(),
        })
    }
}
