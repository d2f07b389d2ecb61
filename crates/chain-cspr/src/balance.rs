//! JSON-RPC shapes for reading an account's main-purse balance.
//!
//! Only request construction and response parsing live here; transport is the
//! caller's concern.

use serde::Serialize;
use serde_json::{json, Value};

use crate::amount::motes_to_cspr;
use crate::error::CsprError;

/// Build a `query_balance` JSON-RPC 2.0 request for an account's main purse.
pub fn query_balance_request(public_key_hex: &str, id: u64) -> Value {
    json!({
        "id": id,
        "jsonrpc": "2.0",
        "method": "query_balance",
        "params": {
            "purse_identifier": {
                "main_purse_under_public_key": public_key_hex,
            }
        }
    })
}

/// Extract the balance in motes from a `query_balance` response.
///
/// Nodes report `result.balance` either as a plain string or as an object
/// holding the string under `value` or `parsed`.
pub fn parse_balance_motes(response: &Value) -> Result<String, CsprError> {
    if let Some(error) = response.get("error").filter(|e| !e.is_null()) {
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("RPC error");
        return Err(CsprError::Rpc(message.to_string()));
    }

    let balance = response
        .get("result")
        .and_then(|result| result.get("balance"))
        .ok_or_else(|| CsprError::Rpc("missing result.balance".into()))?;

    let motes = balance
        .as_str()
        .or_else(|| balance.get("value").and_then(Value::as_str))
        .or_else(|| balance.get("parsed").and_then(Value::as_str))
        .ok_or_else(|| CsprError::Rpc("unexpected balance format in RPC response".into()))?;

    if motes.is_empty() || !motes.bytes().all(|b| b.is_ascii_digit()) {
        return Err(CsprError::Rpc(format!("balance is not an integer: {motes:?}")));
    }

    Ok(motes.to_string())
}

/// An account balance in both representations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WalletBalance {
    #[serde(rename = "balanceCSPR")]
    pub balance_cspr: String,
    pub motes: String,
}

impl WalletBalance {
    pub fn from_motes(motes: &str) -> Result<Self, CsprError> {
        Ok(Self {
            balance_cspr: motes_to_cspr(motes)?,
            motes: motes.to_string(),
        })
    }

    /// Parse a full `query_balance` response.
    pub fn from_rpc_response(response: &Value) -> Result<Self, CsprError> {
        Self::from_motes(&parse_balance_motes(response)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_shape() {
        let request = query_balance_request("01ab", 1);
        assert_eq!(request["jsonrpc"], "2.0");
        assert_eq!(request["method"], "query_balance");
        assert_eq!(
            request["params"]["purse_identifier"]["main_purse_under_public_key"],
            "01ab"
        );
    }

    #[test]
    fn parses_string_balance() {
        let response = json!({ "result": { "balance": "2500000000000" } });
        assert_eq!(parse_balance_motes(&response).unwrap(), "2500000000000");
    }

    #[test]
    fn parses_object_value_balance() {
        let response = json!({ "result": { "balance": { "value": "42" } } });
        assert_eq!(parse_balance_motes(&response).unwrap(), "42");
    }

    #[test]
    fn parses_object_parsed_balance() {
        let response = json!({ "result": { "balance": { "parsed": "7" } } });
        assert_eq!(parse_balance_motes(&response).unwrap(), "7");
    }

    #[test]
    fn rpc_error_surfaces_message() {
        let response = json!({ "error": { "code": -32003, "message": "purse not found" } });
        assert_eq!(
            parse_balance_motes(&response).unwrap_err(),
            CsprError::Rpc("purse not found".into())
        );
    }

    #[test]
    fn null_error_is_ignored() {
        let response = json!({ "error": null, "result": { "balance": "1" } });
        assert_eq!(parse_balance_motes(&response).unwrap(), "1");
    }

    #[test]
    fn unexpected_shape_rejected() {
        assert!(parse_balance_motes(&json!({ "result": {} })).is_err());
        assert!(parse_balance_motes(&json!({ "result": { "balance": 5 } })).is_err());
        assert!(parse_balance_motes(&json!({ "result": { "balance": "1.5" } })).is_err());
    }

    #[test]
    fn wallet_balance_from_response() {
        let response = json!({ "result": { "balance": "1500000000" } });
        let balance = WalletBalance::from_rpc_response(&response).unwrap();
        assert_eq!(balance.balance_cspr, "1.5");
        assert_eq!(balance.motes, "1500000000");

        let json = serde_json::to_value(&balance).unwrap();
        assert_eq!(json["balanceCSPR"], "1.5");
    }
}
