use std::time::Duration;

use chain_cspr::deploy::DEFAULT_TTL_MS;
use chain_cspr::network::{network_by_chain_name, CasperNetwork, CASPER_TESTNET};
use chain_cspr::package_hash_to_bytes;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Prefix of the unset package hash shipped in templates.
pub const PACKAGE_HASH_PLACEHOLDER: &str = "REPLACE_WITH_PACKAGE_HASH_HEX";

/// Deployed subscription contract package on testnet.
pub const DEFAULT_PACKAGE_HASH: &str =
    "hash-bafd091015bcf3e4c09f52ddf1221fd6f1d8ced42c08ff1c927913a13166da5c";

pub const DEFAULT_PROXY_WASM_PATH: &str = "/proxy_caller.wasm";

/// Standard payment per deploy: 5 CSPR.
pub const DEFAULT_PAYMENT_MOTES: &str = "5000000000";

pub const DEFAULT_PLAN_DESCRIPTION: &str = "Hackathon demo plan";

pub const ENV_RPC_URL: &str = "CASPER_RPC_URL";
pub const ENV_CHAIN_NAME: &str = "CASPER_CHAIN_NAME";
pub const ENV_PACKAGE_HASH: &str = "ECTOPLASMA_PACKAGE_HASH";

/// Client settings. Every field has a default, so partial JSON is accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub contract_package_hash: String,
    pub proxy_wasm_path: String,
    pub payment_amount_motes: String,
    pub chain_name: String,
    pub rpc_url: String,
    pub plan_description: String,
    pub poll_interval_ms: u64,
    pub ttl_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            contract_package_hash: DEFAULT_PACKAGE_HASH.to_string(),
            proxy_wasm_path: DEFAULT_PROXY_WASM_PATH.to_string(),
            payment_amount_motes: DEFAULT_PAYMENT_MOTES.to_string(),
            chain_name: CASPER_TESTNET.chain_name.to_string(),
            rpc_url: CASPER_TESTNET.rpc_url.to_string(),
            plan_description: DEFAULT_PLAN_DESCRIPTION.to_string(),
            poll_interval_ms: 250,
            ttl_ms: DEFAULT_TTL_MS,
        }
    }
}

impl ClientConfig {
    pub fn from_json(json: &str) -> Result<Self, CoreError> {
        serde_json::from_str(json).map_err(|e| CoreError::Internal(format!("invalid client config: {e}")))
    }

    /// Defaults with environment overrides applied.
    pub fn from_env() -> Self {
        Self::default().apply_env()
    }

    pub fn apply_env(self) -> Self {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from `lookup`; blank values are ignored.
    pub fn apply_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(url) = get(ENV_RPC_URL) {
            self.rpc_url = url;
        }
        if let Some(chain) = get(ENV_CHAIN_NAME) {
            self.chain_name = chain;
        }
        if let Some(hash) = get(ENV_PACKAGE_HASH) {
            self.contract_package_hash = hash;
        }
        self
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn network(&self) -> Option<&'static CasperNetwork> {
        network_by_chain_name(&self.chain_name)
    }

    pub fn is_package_hash_configured(&self) -> bool {
        let hash = self.contract_package_hash.trim();
        !hash.is_empty() && !hash.starts_with(PACKAGE_HASH_PLACEHOLDER)
    }

    /// Decoded contract package hash.
    pub fn contract_package_bytes(&self) -> Result<Vec<u8>, CoreError> {
        if !self.is_package_hash_configured() {
            return Err(CoreError::MissingConfiguration(
                "contract package hash is not set".into(),
            ));
        }
        Ok(package_hash_to_bytes(&self.contract_package_hash)?)
    }
}
