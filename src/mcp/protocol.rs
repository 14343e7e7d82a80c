// src/mcp/protocol.rs

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub const JSONRPC_VERSION: &str = "2.0";

/// One line of agent input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    #[serde(default = "jsonrpc_version")]
    pub jsonrpc: String,
    /// Absent or null for notifications.
    #[serde(default)]
    pub id: Value,
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
}

/// The `params` of a `tools/call`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ToolCall {
    pub name: String,
    #[serde(default = "empty_arguments")]
    pub arguments: Value,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Response {
    pub jsonrpc: String,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorObject>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorObject {
    pub code: i32,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

fn jsonrpc_version() -> String {
    JSONRPC_VERSION.to_string()
}

fn empty_arguments() -> Value {
    json!({})
}

impl Request {
    pub fn is_notification(&self) -> bool {
        self.id.is_null()
    }

    /// Decodes `params` as a tool invocation; `arguments` defaults to `{}`.
    pub fn tool_call(&self) -> Result<ToolCall, Response> {
        let params = self.params.clone().ok_or_else(|| {
            Response::error(
                self.id.clone(),
                error_codes::INVALID_PARAMS,
                "Missing 'params' object".into(),
            )
        })?;
        let call: ToolCall = serde_json::from_value(params).map_err(|e| {
            Response::error(
                self.id.clone(),
                error_codes::INVALID_PARAMS,
                format!("Invalid tool call: {}", e),
            )
        })?;
        if call.arguments.is_null() {
            return Ok(ToolCall {
                arguments: empty_arguments(),
                ..call
            });
        }
        Ok(call)
    }
}

impl Response {
    fn with_outcome(id: Value, outcome: Result<Value, ErrorObject>) -> Self {
        let (result, error) = match outcome {
            Ok(value) => (Some(value), None),
            Err(err) => (None, Some(err)),
        };
        Self {
            jsonrpc: jsonrpc_version(),
            id,
            result,
            error,
        }
    }

    pub fn success(id: Value, result: Value) -> Self {
        Self::with_outcome(id, Ok(result))
    }

    pub fn error(id: Value, code: i32, message: String) -> Self {
        Self::with_outcome(
            id,
            Err(ErrorObject {
                code,
                message,
                data: None,
            }),
        )
    }

    /// A `tools/call` result: text content for the agent, structured fields
    /// for JSON-friendly clients, and `isError` for failed tool outcomes.
    pub fn tool_result(id: Value, text: String, structured: Value, is_error: bool) -> Self {
        let mut result = match structured {
            Value::Object(map) => Value::Object(map),
            Value::Null => json!({}),
            other => json!({ "data": other }),
        };
        result["content"] = json!([{ "type": "text", "text": text }]);
        result["isError"] = Value::Bool(is_error);
        Self::success(id, result)
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// JSON-RPC 2.0 error codes used by the dispatcher.
pub mod error_codes {
    pub const PARSE_ERROR: i32 = -32700;
    pub const METHOD_NOT_FOUND: i32 = -32601;
    pub const INVALID_PARAMS: i32 = -32602;
    pub const INTERNAL_ERROR: i32 = -32603;
}
