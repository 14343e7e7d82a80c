//! Human-reviewable rendering of a signing request.

use async_trait::async_trait;
use ethers_core::utils::format_ether;
use serde::Serialize;

use crate::blockchain::{
    chains::{ChainTarget, ANY_CHAIN},
    models::{MessagePayload, PayloadError, TransactionPayload, TypedDataPayload},
};
use crate::relay::protocol::{RequestKind, SigningRequest};

/// Selector plus the first ABI word.
pub const CALL_DATA_PREVIEW_CHARS: usize = 2 + 8 + 64;
pub const MESSAGE_PREVIEW_CHARS: usize = 200;

/// A request's payload, decoded for its kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Transaction(TransactionPayload),
    Message(MessagePayload),
    TypedData(TypedDataPayload),
}

impl Payload {
    pub fn decode(request: &SigningRequest) -> Result<Self, PayloadError> {
        let data = &request.data;
        match request.kind {
            RequestKind::SendTransaction => {
                let raw: TransactionPayload = serde_json::from_value(data.clone())
                    .map_err(|e| PayloadError::Malformed(e.to_string()))?;
                TransactionPayload::new(&raw.to, raw.value.as_deref(), raw.data.as_deref())
                    .map(Payload::Transaction)
            }
            RequestKind::SignMessage => {
                let message = data
                    .get("message")
                    .and_then(|m| m.as_str())
                    .ok_or(PayloadError::EmptyMessage)?;
                MessagePayload::new(message).map(Payload::Message)
            }
            RequestKind::SignTypedData => {
                let doc = data.get("typedData").cloned().ok_or_else(|| {
                    PayloadError::InvalidTypedData("missing 'typedData'".to_string())
                })?;
                TypedDataPayload::new(doc).map(Payload::TypedData)
            }
        }
    }
}

/// What the approver is shown before anything is signed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestPreview {
    pub id: String,
    pub kind: RequestKind,
    pub chain: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_data: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_type: Option<String>,
}

impl RequestPreview {
    pub fn build(request: &SigningRequest, target: ChainTarget, payload: &Payload) -> Self {
        let mut preview = Self {
            id: request.id.clone(),
            kind: request.kind,
            chain: chain_label(target),
            destination: None,
            value: None,
            call_data: None,
            message: None,
            primary_type: None,
        };

        match payload {
            Payload::Transaction(tx) => {
                let symbol = target
                    .chain()
                    .map(|c| c.native_currency().symbol)
                    .unwrap_or_else(|| "ETH".to_string());
                preview.destination = Some(tx.to.clone());
                preview.value = tx
                    .value_wei()
                    .ok()
                    .map(|wei| format!("{} {}", trim_decimal(&format_ether(wei)), symbol));
                preview.call_data = tx
                    .data
                    .as_deref()
                    .map(|d| truncate(d, CALL_DATA_PREVIEW_CHARS));
            }
            Payload::Message(m) => {
                preview.message = Some(truncate(&m.message, MESSAGE_PREVIEW_CHARS));
            }
            Payload::TypedData(t) => {
                preview.primary_type = t.primary_type().map(str::to_string);
                preview.message = t
                    .typed_data
                    .get("message")
                    .map(|m| truncate(&m.to_string(), MESSAGE_PREVIEW_CHARS));
            }
        }
        preview
    }

    /// Multi-line text rendering for terminal approvers and logs.
    pub fn summary(&self) -> String {
        let mut lines = vec![
            format!("Request: {}", self.kind),
            format!("Chain:   {}", self.chain),
        ];
        let fields = [
            ("To:      ", &self.destination),
            ("Value:   ", &self.value),
            ("Data:    ", &self.call_data),
            ("Type:    ", &self.primary_type),
            ("Message: ", &self.message),
        ];
        for (label, value) in fields {
            if let Some(v) = value {
                lines.push(format!("{}{}", label, v));
            }
        }
        lines.join("\n")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Approve,
    Reject,
}

/// The human in the loop. Nothing is signed unless this returns `Approve`.
#[async_trait]
pub trait Approver: Send + Sync {
    async fn review(&self, preview: &RequestPreview) -> Decision;
}

fn chain_label(target: ChainTarget) -> String {
    match target {
        ChainTarget::Any => format!("{} (current wallet chain)", ANY_CHAIN),
        ChainTarget::Specific(chain) => format!("{} ({})", chain.display_name(), chain.id()),
    }
}

/// Truncates on a char boundary, noting the original length.
pub fn truncate(text: &str, max_chars: usize) -> String {
    let total = text.chars().count();
    if total <= max_chars {
        return text.to_string();
    }
    let head: String = text.chars().take(max_chars).collect();
    format!("{}… ({} chars)", head, total)
}

fn trim_decimal(s: &str) -> String {
    if !s.contains('.') {
        return s.to_string();
    }
    s.trim_end_matches('0').trim_end_matches('.').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::chains::Chain;
    use crate::relay::protocol::WalletAction;
    use serde_json::json;

    fn signing_request(kind: RequestKind, chain: ChainTarget, data: serde_json::Value) -> SigningRequest {
        SigningRequest::from_action(WalletAction::new(kind, chain, data))
    }

    #[test]
    fn test_transaction_preview() {
        let call_data = format!("0xa9059cbb{}", "00".repeat(64));
        let req = signing_request(
            RequestKind::SendTransaction,
            ChainTarget::Specific(Chain::Polygon),
            json!({
                "to": "0x742d35Cc6634C0532925a3b844Bc454e4438f44e",
                "value": "1500000000000000000",
                "data": call_data,
            }),
        );
        let payload = Payload::decode(&req).unwrap();
        let preview = RequestPreview::build(&req, ChainTarget::Specific(Chain::Polygon), &payload);

        assert_eq!(preview.chain, "Polygon PoS (137)");
        assert_eq!(preview.value.as_deref(), Some("1.5 POL"));
        let data = preview.call_data.clone().unwrap();
        assert!(data.starts_with("0xa9059cbb"));
        assert!(data.ends_with("(138 chars)"));
        assert!(preview.summary().contains("To:      0x742d35Cc"));
    }

    #[test]
    fn test_zero_value_and_any_chain() {
        let req = signing_request(
            RequestKind::SendTransaction,
            ChainTarget::Any,
            json!({ "to": "0x0000000000000000000000000000000000000001" }),
        );
        let payload = Payload::decode(&req).unwrap();
        let preview = RequestPreview::build(&req, ChainTarget::Any, &payload);
        assert_eq!(preview.value.as_deref(), Some("0 ETH"));
        assert!(preview.chain.starts_with("any"));
        assert_eq!(preview.call_data, None);
    }

    #[test]
    fn test_message_preview_truncates() {
        let long = "é".repeat(250);
        let req = signing_request(RequestKind::SignMessage, ChainTarget::Any, json!({ "message": long }));
        let payload = Payload::decode(&req).unwrap();
        let preview = RequestPreview::build(&req, ChainTarget::Any, &payload);
        let shown = preview.message.unwrap();
        assert!(shown.ends_with("(250 chars)"));
        assert_eq!(shown.chars().filter(|c| *c == 'é').count(), MESSAGE_PREVIEW_CHARS);
    }

    #[test]
    fn test_typed_data_preview() {
        let req = signing_request(
            RequestKind::SignTypedData,
            ChainTarget::Any,
            json!({ "typedData": {
                "domain": {}, "types": {}, "primaryType": "Permit", "message": { "value": "1" }
            }}),
        );
        let payload = Payload::decode(&req).unwrap();
        let preview = RequestPreview::build(&req, ChainTarget::Any, &payload);
        assert_eq!(preview.primary_type.as_deref(), Some("Permit"));
        assert_eq!(preview.message.as_deref(), Some(r#"{"value":"1"}"#));
    }

    #[test]
    fn test_decode_rejects_mismatched_payloads() {
        let req = signing_request(RequestKind::SignMessage, ChainTarget::Any, json!({ "to": "0x1" }));
        assert_eq!(Payload::decode(&req), Err(PayloadError::EmptyMessage));

        let req = signing_request(RequestKind::SendTransaction, ChainTarget::Any, json!({ "to": "nope" }));
        assert!(matches!(Payload::decode(&req), Err(PayloadError::InvalidAddress(_))));

        let req = signing_request(RequestKind::SendTransaction, ChainTarget::Any, json!({}));
        assert!(matches!(Payload::decode(&req), Err(PayloadError::Malformed(_))));

        let req = signing_request(RequestKind::SignTypedData, ChainTarget::Any, json!({}));
        assert!(matches!(Payload::decode(&req), Err(PayloadError::InvalidTypedData(_))));
    }

    #[test]
    fn test_trim_decimal() {
        assert_eq!(trim_decimal("1.000000000000000000"), "1");
        assert_eq!(trim_decimal("0.050000000000000000"), "0.05");
        assert_eq!(trim_decimal("10"), "10");
    }
}
