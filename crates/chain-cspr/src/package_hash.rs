//! Contract package identifier encoding.
//!
//! Package hashes are written as `hash-` followed by hex. The proxy program
//! takes the raw bytes, so the prefix is dropped before decoding.

use crate::error::CsprError;

/// Textual prefix carried by formatted contract package hashes.
pub const PACKAGE_HASH_PREFIX: &str = "hash-";

/// Decode a (optionally `hash-` prefixed) hex package identifier into bytes.
///
/// Case is ignored. The remaining text must be hex digits of even length.
pub fn package_hash_to_bytes(identifier: &str) -> Result<Vec<u8>, CsprError> {
    let trimmed = identifier.trim();
    let hex_str = trimmed.strip_prefix(PACKAGE_HASH_PREFIX).unwrap_or(trimmed);
    let normalized = hex_str.to_ascii_lowercase();

    if !normalized.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(CsprError::InvalidIdentifierFormat(format!(
            "non-hex characters in {identifier:?}"
        )));
    }
    if normalized.len() % 2 != 0 {
        return Err(CsprError::InvalidIdentifierFormat(format!(
            "odd hex length {}",
            normalized.len()
        )));
    }

    hex::decode(&normalized)
        .map_err(|e| CsprError::InvalidIdentifierFormat(format!("invalid hex: {e}")))
}

/// Format package identifier bytes as a `hash-` prefixed lowercase hex string.
pub fn bytes_to_package_hash(bytes: &[u8]) -> String {
    format!("{PACKAGE_HASH_PREFIX}{}", hex::encode(bytes))
}
