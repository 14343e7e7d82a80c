// src/blockchain/models.rs
use std::str::FromStr;

use ethers_core::types::{Address, U256};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

// --- Error types for payload validation ---

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PayloadError {
    #[error("invalid EVM address '{0}'")]
    InvalidAddress(String),
    #[error("invalid wei amount '{0}': expected a decimal or 0x-prefixed hex integer")]
    InvalidAmount(String),
    #[error("invalid call data: {0}")]
    InvalidCallData(String),
    #[error("invalid typed data: {0}")]
    InvalidTypedData(String),
    #[error("message must not be empty")]
    EmptyMessage,
    #[error("malformed payload: {0}")]
    Malformed(String),
}

// --- Payload Models ---

/// `send_transaction` payload: what the wallet is asked to send.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TransactionPayload {
    /// Destination address (0x-prefixed hex string)
    pub to: String,
    /// Amount in wei, decimal or 0x-prefixed hex
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// ABI-encoded call data (0x-prefixed hex string)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

/// `sign_message` payload for `personal_sign`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessagePayload {
    pub message: String,
}

/// `sign_typed_data` payload carrying an EIP-712 document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TypedDataPayload {
    pub typed_data: Value,
}

impl TransactionPayload {
    /// Validate and normalize user-supplied transaction fields.
    pub fn new(to: &str, value: Option<&str>, data: Option<&str>) -> Result<Self, PayloadError> {
        let to = to.trim();
        Address::from_str(to).map_err(|_| PayloadError::InvalidAddress(to.to_string()))?;

        let value = match value.map(str::trim).filter(|v| !v.is_empty()) {
            Some(v) => {
                parse_wei(v)?;
                Some(v.to_string())
            }
            None => None,
        };

        let data = match data.map(str::trim).filter(|d| !d.is_empty() && *d != "0x") {
            Some(d) => {
                let hex_body = d
                    .strip_prefix("0x")
                    .ok_or_else(|| PayloadError::InvalidCallData("must start with 0x".into()))?;
                hex::decode(hex_body).map_err(|e| PayloadError::InvalidCallData(e.to_string()))?;
                Some(d.to_string())
            }
            None => None,
        };

        Ok(Self {
            to: to.to_string(),
            value,
            data,
        })
    }

    /// Value in wei; a missing value means zero.
    pub fn value_wei(&self) -> Result<U256, PayloadError> {
        match self.value.as_deref() {
            Some(v) => parse_wei(v),
            None => Ok(U256::zero()),
        }
    }
}

impl MessagePayload {
    pub fn new(message: &str) -> Result<Self, PayloadError> {
        if message.is_empty() {
            return Err(PayloadError::EmptyMessage);
        }
        Ok(Self {
            message: message.to_string(),
        })
    }
}

impl TypedDataPayload {
    /// Accepts the EIP-712 document either as an object or as a JSON string.
    pub fn new(typed_data: Value) -> Result<Self, PayloadError> {
        let typed_data = match typed_data {
            Value::String(s) => serde_json::from_str::<Value>(&s)
                .map_err(|e| PayloadError::InvalidTypedData(e.to_string()))?,
            other => other,
        };
        let obj = typed_data
            .as_object()
            .ok_or_else(|| PayloadError::InvalidTypedData("expected a JSON object".into()))?;
        for key in ["domain", "types", "primaryType", "message"] {
            if !obj.contains_key(key) {
                return Err(PayloadError::InvalidTypedData(format!("missing '{}'", key)));
            }
        }
        Ok(Self { typed_data })
    }

    pub fn primary_type(&self) -> Option<&str> {
        self.typed_data.get("primaryType").and_then(Value::as_str)
    }
}

/// Parse a wei amount given as a decimal or 0x-prefixed hex string.
pub fn parse_wei(input: &str) -> Result<U256, PayloadError> {
    let trimmed = input.trim();
    let parsed = match trimmed.strip_prefix("0x") {
        Some(hex_digits) => U256::from_str_radix(hex_digits, 16).ok(),
        None => U256::from_dec_str(trimmed).ok(),
    };
    parsed.ok_or_else(|| PayloadError::InvalidAmount(input.to_string()))
}
