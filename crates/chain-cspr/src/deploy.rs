//! Deploy assembly and hashing.
//!
//! A deploy is a header, a payment item and a session item. Hashes are
//! BLAKE2b-256 over the `bytesrepr` encodings:
//!
//! ```text
//! body_hash   = blake2b256(payment_bytes || session_bytes)
//! deploy_hash = blake2b256(header_bytes)
//!
//! Header:
//!   account               tag u8 || key bytes
//!   timestamp             u64 (ms since epoch)
//!   ttl                   u64 (ms)
//!   gas_price             u64
//!   body_hash             32 bytes
//!   dependencies          u32 count || 32 bytes each
//!   chain_name            u32 len || utf8
//!
//! ModuleBytes item:
//!   tag                   u8 (0)
//!   module_bytes          u32 len || bytes
//!   args                  RuntimeArgs
//! ```
//!
//! Approvals are left empty; the wallet provider signs.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Value};

use crate::clvalue::{CLValue, RuntimeArgs};
use crate::error::CsprError;
use crate::public_key::PublicKey;

/// Default deploy time-to-live: 30 minutes.
pub const DEFAULT_TTL_MS: u64 = 30 * 60 * 1000;

/// Default gas price multiplier.
pub const DEFAULT_GAS_PRICE: u64 = 1;

const MODULE_BYTES_TAG: u8 = 0;

/// Executable part of a deploy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutableDeployItem {
    /// Raw wasm executed in the account's context.
    ModuleBytes {
        module_bytes: Vec<u8>,
        args: RuntimeArgs,
    },
}

impl ExecutableDeployItem {
    pub fn module_bytes(module_bytes: Vec<u8>, args: RuntimeArgs) -> Self {
        ExecutableDeployItem::ModuleBytes { module_bytes, args }
    }

    /// Standard payment: empty module bytes with a single `amount` argument.
    pub fn standard_payment(amount_motes: &str) -> Result<Self, CsprError> {
        let mut args = RuntimeArgs::new();
        args.insert("amount", CLValue::u512(amount_motes)?);
        Ok(ExecutableDeployItem::ModuleBytes {
            module_bytes: Vec::new(),
            args,
        })
    }

    pub fn args(&self) -> &RuntimeArgs {
        match self {
            ExecutableDeployItem::ModuleBytes { args, .. } => args,
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            ExecutableDeployItem::ModuleBytes { module_bytes, args } => {
                let args_bytes = args.to_bytes();
                let mut out = Vec::with_capacity(1 + 4 + module_bytes.len() + args_bytes.len());
                out.push(MODULE_BYTES_TAG);
                out.extend_from_slice(&(module_bytes.len() as u32).to_le_bytes());
                out.extend_from_slice(module_bytes);
                out.extend_from_slice(&args_bytes);
                out
            }
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            ExecutableDeployItem::ModuleBytes { module_bytes, args } => json!({
                "ModuleBytes": {
                    "module_bytes": hex::encode(module_bytes),
                    "args": args.to_json(),
                }
            }),
        }
    }
}

/// Deploy header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployHeader {
    pub account: PublicKey,
    pub timestamp: DateTime<Utc>,
    pub ttl_ms: u64,
    pub gas_price: u64,
    pub body_hash: [u8; 32],
    pub dependencies: Vec<[u8; 32]>,
    pub chain_name: String,
}

impl DeployHeader {
    pub fn to_bytes(&self) -> Result<Vec<u8>, CsprError> {
        let timestamp_ms = u64::try_from(self.timestamp.timestamp_millis())
            .map_err(|_| CsprError::Encoding("timestamp before unix epoch".into()))?;

        let mut out = Vec::new();
        out.extend_from_slice(&self.account.to_bytes());
        out.extend_from_slice(&timestamp_ms.to_le_bytes());
        out.extend_from_slice(&self.ttl_ms.to_le_bytes());
        out.extend_from_slice(&self.gas_price.to_le_bytes());
        out.extend_from_slice(&self.body_hash);
        out.extend_from_slice(&(self.dependencies.len() as u32).to_le_bytes());
        for dependency in &self.dependencies {
            out.extend_from_slice(dependency);
        }
        out.extend_from_slice(&crate::clvalue::encode_string(&self.chain_name));
        Ok(out)
    }

    pub fn to_json(&self) -> Value {
        json!({
            "account": self.account.to_hex(),
            "timestamp": self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            "ttl": format_ttl(self.ttl_ms),
            "gas_price": self.gas_price,
            "body_hash": hex::encode(self.body_hash),
            "dependencies": self.dependencies.iter().map(hex::encode).collect::<Vec<_>>(),
            "chain_name": self.chain_name,
        })
    }
}

/// An unsigned deploy ready to hand to a wallet for signing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deploy {
    pub hash: [u8; 32],
    pub header: DeployHeader,
    pub payment: ExecutableDeployItem,
    pub session: ExecutableDeployItem,
}

impl Deploy {
    /// Deploy hash as lowercase hex.
    pub fn hash_hex(&self) -> String {
        hex::encode(self.hash)
    }

    /// Deploy JSON as accepted by wallet providers.
    pub fn to_json(&self) -> Value {
        json!({
            "hash": self.hash_hex(),
            "header": self.header.to_json(),
            "payment": self.payment.to_json(),
            "session": self.session.to_json(),
            "approvals": [],
        })
    }
}

/// Assemble a deploy, computing its body hash and deploy hash.
pub fn make_deploy(
    account: PublicKey,
    chain_name: &str,
    timestamp: DateTime<Utc>,
    ttl_ms: u64,
    payment: ExecutableDeployItem,
    session: ExecutableDeployItem,
) -> Result<Deploy, CsprError> {
    if chain_name.is_empty() {
        return Err(CsprError::Encoding("chain name must not be empty".into()));
    }

    let mut body = payment.to_bytes();
    body.extend_from_slice(&session.to_bytes());
    let body_hash = blake2b_256(&body);

    let header = DeployHeader {
        account,
        timestamp,
        ttl_ms,
        gas_price: DEFAULT_GAS_PRICE,
        body_hash,
        dependencies: Vec::new(),
        chain_name: chain_name.to_string(),
    };
    let hash = blake2b_256(&header.to_bytes()?);

    Ok(Deploy {
        hash,
        header,
        payment,
        session,
    })
}

/// Render a ttl the way deploy JSON expects (`30m`, `1h`, `90s`, `1500ms`).
fn format_ttl(ttl_ms: u64) -> String {
    const HOUR: u64 = 60 * 60 * 1000;
    const MINUTE: u64 = 60 * 1000;
    const SECOND: u64 = 1000;

    match ttl_ms {
        0 => "0ms".to_string(),
        ms if ms % HOUR == 0 => format!("{}h", ms / HOUR),
        ms if ms % MINUTE == 0 => format!("{}m", ms / MINUTE),
        ms if ms % SECOND == 0 => format!("{}s", ms / SECOND),
        ms => format!("{ms}ms"),
    }
}

fn blake2b_256(data: &[u8]) -> [u8; 32] {
    let hash = blake2b_simd::Params::new().hash_length(32).hash(data);
    let mut result = [0u8; 32];
    result.copy_from_slice(hash.as_bytes());
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const ED25519_ACCOUNT: &str =
        "01d75a980182b10ab7d54bfed3c964073a0ee172f3daa62325af021a68f707511a";

    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 11, 20, 12, 0, 0).unwrap()
    }

    fn sample_deploy() -> Deploy {
        let mut args = RuntimeArgs::new();
        args.insert("entry_point", CLValue::string("deposit"));
        make_deploy(
            PublicKey::from_hex(ED25519_ACCOUNT).unwrap(),
            "casper-test",
            fixed_time(),
            DEFAULT_TTL_MS,
            ExecutableDeployItem::standard_payment("5000000000").unwrap(),
            ExecutableDeployItem::module_bytes(vec![0x00, 0x61, 0x73, 0x6d], args),
        )
        .unwrap()
    }

    #[test]
    fn standard_payment_layout() {
        let payment = ExecutableDeployItem::standard_payment("5000000000").unwrap();
        let bytes = payment.to_bytes();
        // tag || empty module || 1 arg "amount" U512
        let expected = concat!(
            "00",
            "00000000",
            "01000000",
            "06000000", "616d6f756e74",
            "06000000", "0500f2052a01", "08",
        );
        assert_eq!(hex::encode(bytes), expected);
    }

    #[test]
    fn header_bytes_layout() {
        let deploy = sample_deploy();
        let bytes = deploy.header.to_bytes().unwrap();
        // 33 key + 8 ts + 8 ttl + 8 gas + 32 body + 4 deps + 4 + 11 chain name
        assert_eq!(bytes.len(), 33 + 8 + 8 + 8 + 32 + 4 + 4 + 11);
        assert_eq!(bytes[0], 0x01);
        let ts = u64::from_le_bytes(bytes[33..41].try_into().unwrap());
        assert_eq!(ts, fixed_time().timestamp_millis() as u64);
        assert!(bytes.ends_with(b"casper-test"));
    }

    #[test]
    fn hashes_are_deterministic() {
        assert_eq!(sample_deploy().hash, sample_deploy().hash);
        assert_eq!(sample_deploy().header.body_hash, sample_deploy().header.body_hash);
    }

    #[test]
    fn hash_covers_header() {
        let a = sample_deploy();
        let mut header = a.header.clone();
        header.chain_name = "casper".into();
        let rehashed = blake2b_256(&header.to_bytes().unwrap());
        assert_ne!(rehashed, a.hash);
    }

    #[test]
    fn body_hash_covers_session() {
        let a = sample_deploy();
        let b = make_deploy(
            a.header.account.clone(),
            "casper-test",
            fixed_time(),
            DEFAULT_TTL_MS,
            a.payment.clone(),
            ExecutableDeployItem::module_bytes(vec![0xff], RuntimeArgs::new()),
        )
        .unwrap();
        assert_ne!(a.header.body_hash, b.header.body_hash);
        assert_ne!(a.hash, b.hash);
    }

    #[test]
    fn json_shape() {
        let deploy = sample_deploy();
        let json = deploy.to_json();

        assert_eq!(json["hash"], deploy.hash_hex());
        assert_eq!(json["header"]["account"], ED25519_ACCOUNT);
        assert_eq!(json["header"]["timestamp"], "2025-11-20T12:00:00.000Z");
        assert_eq!(json["header"]["ttl"], "30m");
        assert_eq!(json["header"]["gas_price"], 1);
        assert_eq!(json["header"]["chain_name"], "casper-test");
        assert_eq!(json["header"]["dependencies"], json!([]));
        assert_eq!(json["payment"]["ModuleBytes"]["module_bytes"], "");
        assert_eq!(json["payment"]["ModuleBytes"]["args"][0][0], "amount");
        assert_eq!(json["session"]["ModuleBytes"]["module_bytes"], "0061736d");
        assert_eq!(json["approvals"], json!([]));
    }

    #[test]
    fn empty_chain_name_rejected() {
        let result = make_deploy(
            PublicKey::from_hex(ED25519_ACCOUNT).unwrap(),
            "",
            fixed_time(),
            DEFAULT_TTL_MS,
            ExecutableDeployItem::standard_payment("1").unwrap(),
            ExecutableDeployItem::module_bytes(vec![], RuntimeArgs::new()),
        );
        assert!(result.is_err());
    }

    #[test]
    fn ttl_formatting() {
        assert_eq!(format_ttl(DEFAULT_TTL_MS), "30m");
        assert_eq!(format_ttl(2 * 60 * 60 * 1000), "2h");
        assert_eq!(format_ttl(90_000), "90s");
        assert_eq!(format_ttl(1_500), "1500ms");
    }

    #[test]
    fn blake2b_256_output_is_32_bytes() {
        let digest = blake2b_256(b"hello");
        assert_eq!(digest.len(), 32);
        assert!(digest.iter().any(|&b| b != 0));
    }
}
