//! Call envelope construction.
//!
//! Every action runs the same proxy program, which calls a contract entry
//! point on the account's behalf. The entry point's own arguments are
//! serialized first and passed to the proxy as one opaque byte array:
//!
//! ```text
//! session args (proxy)        inner args (per entry point)
//!   contract_package_hash       deposit:      <none>
//!   entry_point                 subscribe:    plan_id
//!   args  ─────────────────────►create_plan:  price_per_period, period_secs,
//!   attached_value                            name, description
//!   amount (always 0)
//! ```
//!
//! All validation happens before the proxy program is fetched, so a rejected
//! request never touches the asset source or the wallet.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chain_cspr::{
    cspr_to_motes, make_deploy, CLValue, Deploy, ExecutableDeployItem, PublicKey, RuntimeArgs, U512,
};
use chrono::Utc;
use serde_json::Value;
use tracing::{debug, info};

use crate::config::ClientConfig;
use crate::error::CoreError;
use crate::provider::AssetSource;
use crate::transaction::{PendingTransaction, TxKind};

pub const SECONDS_PER_DAY: u64 = 86_400;

/// A user action, with fields as entered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionRequest {
    /// Amount in CSPR.
    Deposit { amount: String },
    Subscribe { plan_id: String },
    /// Price in CSPR per period; duration in whole days.
    CreatePlan {
        name: String,
        price: String,
        duration_days: String,
    },
}

impl TransactionRequest {
    pub fn kind(&self) -> TxKind {
        match self {
            TransactionRequest::Deposit { .. } => TxKind::Deposit,
            TransactionRequest::Subscribe { .. } => TxKind::Subscribe,
            TransactionRequest::CreatePlan { .. } => TxKind::CreatePlan,
        }
    }
}

/// A built, unsigned proxy call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallEnvelope {
    pub kind: TxKind,
    /// Entry-point arguments, before embedding.
    pub inner_args: RuntimeArgs,
    pub attached_value_motes: String,
    pub payment_amount_motes: String,
    pub deploy: Deploy,
}

impl CallEnvelope {
    /// Deploy JSON handed to the wallet.
    pub fn to_json(&self) -> Value {
        self.deploy.to_json()
    }

    pub fn deploy_hash(&self) -> String {
        self.deploy.hash_hex()
    }

    #[cfg(test)]
    pub(crate) fn sample(kind: TxKind) -> Self {
        let account = PublicKey::from_hex(
            "01d75a980182b10ab7d54bfed3c964073a0ee172f3daa62325af021a68f707511a",
        )
        .unwrap();
        let payment = ExecutableDeployItem::standard_payment("5000000000").unwrap();
        let session = ExecutableDeployItem::module_bytes(Vec::new(), RuntimeArgs::new());
        let deploy = make_deploy(account, "casper-test", Utc::now(), 1_800_000, payment, session).unwrap();
        Self {
            kind,
            inner_args: RuntimeArgs::new(),
            attached_value_motes: "0".into(),
            payment_amount_motes: "5000000000".into(),
            deploy,
        }
    }
}

/// Builds [`PendingTransaction`]s from user requests.
pub struct EnvelopeBuilder {
    config: ClientConfig,
    assets: Arc<dyn AssetSource>,
    next_id: AtomicU64,
}

impl EnvelopeBuilder {
    pub fn new(config: ClientConfig, assets: Arc<dyn AssetSource>) -> Self {
        Self {
            config,
            assets,
            next_id: AtomicU64::new(1),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Validate `request` and assemble its deploy for `account_id`.
    pub async fn build(
        &self,
        request: &TransactionRequest,
        account_id: Option<&str>,
    ) -> Result<PendingTransaction, CoreError> {
        let account_id =
            account_id.ok_or_else(|| CoreError::MissingConfiguration("no active account".into()))?;
        let account = PublicKey::from_hex(account_id)?;

        let (inner_args, attached_value_motes) = entry_point_args(request, &self.config.plan_description)?;
        let package_hash = self.config.contract_package_bytes()?;

        let proxy = self
            .assets
            .fetch(&self.config.proxy_wasm_path)
            .await
            .map_err(|e| CoreError::AssetLoadFailure(e.to_string()))?;
        debug!(target: "envelope", path = %self.config.proxy_wasm_path, bytes = proxy.len(), "proxy program loaded");

        let kind = request.kind();
        let session = proxy_session(proxy, package_hash, kind, &inner_args, &attached_value_motes)?;
        let payment = ExecutableDeployItem::standard_payment(&self.config.payment_amount_motes)?;
        let deploy = make_deploy(
            account,
            &self.config.chain_name,
            Utc::now(),
            self.config.ttl_ms,
            payment,
            session,
        )?;

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        info!(
            target: "envelope",
            id,
            %kind,
            attached = %attached_value_motes,
            deploy_hash = %deploy.hash_hex(),
            "envelope built"
        );

        Ok(PendingTransaction::new(
            id,
            CallEnvelope {
                kind,
                inner_args,
                attached_value_motes,
                payment_amount_motes: self.config.payment_amount_motes.clone(),
                deploy,
            },
        ))
    }
}

/// Inner arguments and attached value for `request`.
fn entry_point_args(
    request: &TransactionRequest,
    plan_description: &str,
) -> Result<(RuntimeArgs, String), CoreError> {
    let mut args = RuntimeArgs::new();
    match request {
        TransactionRequest::Deposit { amount } => {
            let motes = positive_motes(amount)?;
            Ok((args, motes.to_string()))
        }
        TransactionRequest::Subscribe { plan_id } => {
            args.insert("plan_id", CLValue::U64(parse_plan_id(plan_id)?));
            Ok((args, "0".to_string()))
        }
        TransactionRequest::CreatePlan {
            name,
            price,
            duration_days,
        } => {
            let name = required("name", name)?;
            let price = required("price", price)?;
            let duration_days = required("duration", duration_days)?;

            let price_motes = positive_motes(price)?;
            let period_secs = period_seconds(duration_days)?;

            args.insert("price_per_period", CLValue::U512(price_motes));
            args.insert("period_secs", CLValue::U64(period_secs));
            args.insert("name", CLValue::string(name));
            args.insert("description", CLValue::string(plan_description));
            Ok((args, "0".to_string()))
        }
    }
}

/// CSPR amount in motes; must be non-zero and fit a U512.
fn positive_motes(amount: &str) -> Result<U512, CoreError> {
    let motes: U512 = cspr_to_motes(amount)?
        .parse()
        .map_err(|_| CoreError::InvalidAmountFormat(amount.trim().to_string()))?;
    if motes.is_zero() {
        return Err(CoreError::NonPositiveAmount(amount.trim().to_string()));
    }
    Ok(motes)
}

fn required<'a>(field: &str, value: &'a str) -> Result<&'a str, CoreError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(CoreError::MissingPlanField(field.to_string()));
    }
    Ok(value)
}

fn parse_plan_id(raw: &str) -> Result<u64, CoreError> {
    let raw = raw.trim();
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(CoreError::InvalidPlanIdentifier(raw.to_string()));
    }
    raw.parse()
        .map_err(|_| CoreError::InvalidPlanIdentifier(raw.to_string()))
}

/// Whole days to seconds.
fn period_seconds(days: &str) -> Result<u64, CoreError> {
    let invalid = || CoreError::InvalidDuration(days.to_string());
    if !days.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    let days: u64 = days.parse().map_err(|_| invalid())?;
    if days == 0 {
        return Err(invalid());
    }
    days.checked_mul(SECONDS_PER_DAY).ok_or_else(invalid)
}

fn proxy_session(
    proxy: Vec<u8>,
    package_hash: Vec<u8>,
    kind: TxKind,
    inner_args: &RuntimeArgs,
    attached_value_motes: &str,
) -> Result<ExecutableDeployItem, CoreError> {
    let mut args = RuntimeArgs::new();
    args.insert("contract_package_hash", CLValue::ByteArray(package_hash));
    args.insert("entry_point", CLValue::string(kind.entry_point()));
    args.insert("args", CLValue::ByteArray(inner_args.to_bytes()));
    args.insert("attached_value", CLValue::u512(attached_value_motes)?);
    args.insert("amount", CLValue::U512(U512::zero()));
    Ok(ExecutableDeployItem::module_bytes(proxy, args))
}
