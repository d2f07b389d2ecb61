//! Active-account extraction from provider payloads.
//!
//! Payload shapes differ between event types and provider versions. The
//! account object is either under `account` or the payload itself, and its
//! key sits under one of several field names, sometimes one `account` level
//! deeper still. Shapes are tried in order; the first non-empty string wins.

use serde_json::Value;

/// Where to look for the public key inside the account object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountShape {
    /// `account.<field>`
    Field(&'static str),
    /// `account.<outer>.<field>`
    Nested(&'static str, &'static str),
}

/// Extraction order.
pub const ACCOUNT_SHAPES: &[AccountShape] = &[
    AccountShape::Field("public_key"),
    AccountShape::Field("publicKeyHex"),
    AccountShape::Field("publicKey"),
    AccountShape::Nested("account", "public_key"),
    AccountShape::Nested("account", "publicKeyHex"),
];

impl AccountShape {
    fn extract<'a>(&self, account: &'a Value) -> Option<&'a str> {
        let value = match self {
            AccountShape::Field(field) => account.get(*field),
            AccountShape::Nested(outer, field) => account.get(*outer).and_then(|v| v.get(*field)),
        };
        value.and_then(Value::as_str).filter(|s| !s.is_empty())
    }
}

/// Pull the active account's public key out of a provider payload.
pub fn extract_account_id(payload: &Value) -> Option<String> {
    if payload.is_null() {
        return None;
    }
    let account = match payload.get("account") {
        Some(inner) if !inner.is_null() => inner,
        _ => payload,
    };
    ACCOUNT_SHAPES
        .iter()
        .find_map(|shape| shape.extract(account))
        .map(str::to_string)
}
