use chain_cspr::CsprError;
use thiserror::Error;

use crate::provider::Capability;

/// Errors surfaced by the session core to its callers.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("Invalid amount format: {0}")]
    InvalidAmountFormat(String),

    #[error("Invalid identifier format: {0}")]
    InvalidIdentifierFormat(String),

    #[error("Invalid plan identifier: {0}")]
    InvalidPlanIdentifier(String),

    #[error("Invalid duration: {0}")]
    InvalidDuration(String),

    #[error("Missing plan field: {0}")]
    MissingPlanField(String),

    #[error("Amount must be greater than zero: {0}")]
    NonPositiveAmount(String),

    #[error("Missing configuration: {0}")]
    MissingConfiguration(String),

    #[error("Failed to load asset: {0}")]
    AssetLoadFailure(String),

    #[error("Wallet provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("Submission failed: {0}")]
    SubmissionFailed(String),

    #[error("Invalid account key: {0}")]
    InvalidAccountKey(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<CsprError> for CoreError {
    fn from(e: CsprError) -> Self {
        match e {
            CsprError::InvalidAmountFormat(msg) => CoreError::InvalidAmountFormat(msg),
            CsprError::InvalidIdentifierFormat(msg) => CoreError::InvalidIdentifierFormat(msg),
            CsprError::InvalidPublicKey(msg) => CoreError::InvalidAccountKey(msg),
            other => CoreError::Internal(format!("CSPR: {other}")),
        }
    }
}

impl From<ProviderError> for CoreError {
    fn from(e: ProviderError) -> Self {
        match e {
            ProviderError::Unsupported(capability) => {
                CoreError::ProviderUnavailable(format!("provider does not support {capability}"))
            }
            other => CoreError::SubmissionFailed(other.to_string()),
        }
    }
}

/// Errors reported by a wallet provider implementation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("capability not supported: {0}")]
    Unsupported(Capability),

    #[error("rejected by wallet: {0}")]
    Rejected(String),

    #[error("transport error: {0}")]
    Transport(String),
}

/// Error fetching an auxiliary asset (the proxy program).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{path}: {reason}")]
pub struct AssetError {
    pub path: String,
    pub reason: String,
}
