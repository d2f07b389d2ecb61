use thiserror::Error;

/// Casper chain encoding errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CsprError {
    #[error("invalid amount format: {0}")]
    InvalidAmountFormat(String),

    #[error("invalid identifier format: {0}")]
    InvalidIdentifierFormat(String),

    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("encoding error: {0}")]
    Encoding(String),

    #[error("rpc error: {0}")]
    Rpc(String),
}
