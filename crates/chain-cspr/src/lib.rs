//! Casper chain support for the subscription client.
//!
//! This crate provides:
//! - Decimal CSPR <-> integer motes conversion without floating point
//! - Contract package hash decoding
//! - Account public key parsing (Ed25519 and secp256k1)
//! - Typed contract arguments with Casper's byte serialization
//! - Deploy assembly, hashing and JSON rendering
//! - Network definitions and balance RPC shapes
//!
//! Everything here is pure: no I/O, no clocks beyond the timestamp the caller
//! passes in.

pub mod amount;
pub mod balance;
pub mod clvalue;
pub mod deploy;
pub mod error;
pub mod network;
pub mod package_hash;
pub mod public_key;

pub use amount::{cspr_to_motes, from_base_units, motes_to_cspr, to_base_units, CSPR_DECIMALS};
pub use clvalue::{CLValue, RuntimeArgs, U512};
pub use deploy::{make_deploy, Deploy, DeployHeader, ExecutableDeployItem};
pub use error::CsprError;
pub use package_hash::{bytes_to_package_hash, package_hash_to_bytes, PACKAGE_HASH_PREFIX};
pub use public_key::PublicKey;
