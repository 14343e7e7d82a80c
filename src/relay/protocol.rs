//! Wire messages exchanged with the wallet page over the relay WebSocket.
//!
//! Server → client: [`SigningRequest`]
//! Client → server: [`SigningResponse`]
//!
//! Both carry a `version` so the page and the relay can evolve separately.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::blockchain::chains::ChainTarget;

/// Current wire protocol version.
pub const PROTOCOL_VERSION: u32 = 1;

fn default_version() -> u32 {
    PROTOCOL_VERSION
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    SendTransaction,
    SignMessage,
    SignTypedData,
}

impl RequestKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestKind::SendTransaction => "send_transaction",
            RequestKind::SignMessage => "sign_message",
            RequestKind::SignTypedData => "sign_typed_data",
        }
    }
}

impl std::fmt::Display for RequestKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a tool handler wants the wallet to do, before the relay assigns an id.
#[derive(Debug, Clone, PartialEq)]
pub struct WalletAction {
    pub kind: RequestKind,
    pub chain: ChainTarget,
    pub data: Value,
}

impl WalletAction {
    pub fn new(kind: RequestKind, chain: ChainTarget, data: Value) -> Self {
        Self { kind, chain, data }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SigningRequest {
    #[serde(default = "default_version")]
    pub version: u32,
    pub id: String,
    #[serde(rename = "type")]
    pub kind: RequestKind,
    /// Chain name, or `any`.
    pub chain: String,
    pub data: Value,
}

impl SigningRequest {
    /// Assigns a fresh correlation id to `action`.
    pub fn from_action(action: WalletAction) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            id: new_request_id(),
            kind: action.kind,
            chain: action.chain.as_str().to_string(),
            data: action.data,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SigningResponse {
    #[serde(default = "default_version")]
    pub version: u32,
    pub id: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SigningResponse {
    pub fn success(id: impl Into<String>, result: impl Into<String>) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            id: id.into(),
            success: true,
            result: Some(result.into()),
            error: None,
        }
    }

    pub fn failure(id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            id: id.into(),
            success: false,
            result: None,
            error: Some(error.into()),
        }
    }
}

/// Correlation ids are random v4 UUIDs and are never reused.
pub fn new_request_id() -> String {
    Uuid::new_v4().to_string()
}
