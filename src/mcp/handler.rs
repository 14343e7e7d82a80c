//! # MCP Handler Module
//!
//! Dispatches JSON-RPC tool calls from the agent to the wallet relay.
//!
//! ## Supported Tools
//!
//! - `wallet_status` - Relay port, wallet page URL, connection state
//! - `send_transaction` - Ask the connected wallet to send a transaction
//! - `sign_message` - Ask the connected wallet to `personal_sign` a message
//! - `sign_typed_data` - Ask the connected wallet to sign an EIP-712 document
//!
//! Wallet outcomes are reported as tool results, with rejection, timeout and
//! other failures worded distinctly so the agent can tell them apart.

use serde_json::{json, Value};
use tracing::{info, warn};

use crate::{
    blockchain::{
        chains::ChainTarget,
        models::{MessagePayload, TransactionPayload, TypedDataPayload},
    },
    mcp::protocol::{error_codes, Request, Response, ToolCall},
    relay::{RelayError, RequestKind, WalletAction},
    utils, AppState,
};

/// How a relayed wallet request ended, as the agent should understand it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Completed,
    Rejected,
    TimedOut,
    NoWallet,
    Failed,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Completed => "completed",
            Outcome::Rejected => "rejected",
            Outcome::TimedOut => "timed_out",
            Outcome::NoWallet => "no_wallet",
            Outcome::Failed => "failed",
        }
    }
}

/// True when wallet text says the human declined.
pub fn is_user_rejection(message: &str) -> bool {
    let m = message.to_lowercase();
    m.contains("user rejected") || m.contains("user denied") || m.contains("rejected by user")
}

/// Classifies a relay failure and renders the text shown to the agent.
pub fn describe_failure(err: &RelayError) -> (Outcome, String) {
    match err {
        RelayError::Wallet(msg) if is_user_rejection(msg) => {
            (Outcome::Rejected, format!("Rejected in wallet: {}", msg))
        }
        RelayError::Timeout(_) => (Outcome::TimedOut, format!("Timed out: {}", err)),
        RelayError::NoClient { .. } | RelayError::DeliveryFailed => {
            (Outcome::NoWallet, format!("Failed: {}", err))
        }
        other => (Outcome::Failed, format!("Failed: {}", other)),
    }
}

/// This is the main dispatcher for all incoming MCP requests.
pub async fn handle_mcp_request(req: Request, state: AppState) -> Option<Response> {
    info!("Handling MCP request for method: {}", req.method);

    if req.is_notification() {
        return None;
    }

    let response = match req.method.as_str() {
        "initialize" => handle_initialize(&req),
        "tools/list" => handle_tools_list(&req),
        "tools/call" => match req.tool_call() {
            Ok(call) => handle_tool_call(&req.id, call, &state).await,
            Err(resp) => resp,
        },
        // Tool names are also accepted as methods, with params as the arguments
        name @ ("wallet_status" | "send_transaction" | "sign_message" | "sign_typed_data") => {
            let call = ToolCall {
                name: name.to_string(),
                arguments: req.params.clone().unwrap_or_else(|| json!({})),
            };
            handle_tool_call(&req.id, call, &state).await
        }
        _ => Response::error(
            req.id,
            error_codes::METHOD_NOT_FOUND,
            format!("Method not found: {}", req.method),
        ),
    };

    Some(response)
}

/// Runs one tool; argument problems come back as JSON-RPC errors, wallet
/// outcomes as tool results.
async fn handle_tool_call(req_id: &Value, call: ToolCall, state: &AppState) -> Response {
    let args = &call.arguments;
    let res: Result<Response, Response> = match call.name.as_str() {
        "wallet_status" => wallet_status(state, req_id).await,
        "send_transaction" => send_transaction(state, args, req_id).await,
        "sign_message" => sign_message(state, args, req_id).await,
        "sign_typed_data" => sign_typed_data(state, args, req_id).await,
        other => Err(Response::error(
            req_id.clone(),
            error_codes::METHOD_NOT_FOUND,
            format!("Unknown tool: {}", other),
        )),
    };

    res.unwrap_or_else(|err_resp| err_resp)
}

async fn send_transaction(
    state: &AppState,
    args: &Value,
    req_id: &Value,
) -> Result<Response, Response> {
    let to = utils::get_required_arg::<String>(args, "to", req_id)?;
    let value = utils::get_optional_str(args, "value");
    let data = utils::get_optional_str(args, "data");
    let chain = parse_chain(args, req_id)?;
    let payload = TransactionPayload::new(&to, value.as_deref(), data.as_deref())
        .map_err(|e| invalid_params(req_id, e.to_string()))?;
    let action = WalletAction::new(RequestKind::SendTransaction, chain, to_json(&payload, req_id)?);
    Ok(relay_action(state, req_id, action).await)
}

async fn sign_message(state: &AppState, args: &Value, req_id: &Value) -> Result<Response, Response> {
    let message = utils::get_required_arg::<String>(args, "message", req_id)?;
    let chain = parse_chain(args, req_id)?;
    let payload =
        MessagePayload::new(&message).map_err(|e| invalid_params(req_id, e.to_string()))?;
    let action = WalletAction::new(RequestKind::SignMessage, chain, to_json(&payload, req_id)?);
    Ok(relay_action(state, req_id, action).await)
}

async fn sign_typed_data(
    state: &AppState,
    args: &Value,
    req_id: &Value,
) -> Result<Response, Response> {
    let typed_data = utils::get_required_arg::<Value>(args, "typedData", req_id)?;
    let chain = parse_chain(args, req_id)?;
    let payload =
        TypedDataPayload::new(typed_data).map_err(|e| invalid_params(req_id, e.to_string()))?;
    let action = WalletAction::new(RequestKind::SignTypedData, chain, to_json(&payload, req_id)?);
    Ok(relay_action(state, req_id, action).await)
}

async fn wallet_status(state: &AppState, req_id: &Value) -> Result<Response, Response> {
    let port = state.relay.start().await.map_err(|e| {
        Response::error(req_id.clone(), error_codes::INTERNAL_ERROR, e.to_string())
    })?;
    let health = state.relay.health().await;
    let url = state.relay.ui_url();
    let connected = health.clients > 0;

    let summary = match (&url, connected) {
        (Some(u), true) => format!("Wallet connected via {} ({} pending)", u, health.pending_requests),
        (Some(u), false) => format!("No wallet connected. Open {} and connect a wallet.", u),
        (None, _) => format!("Relay listening on port {}", port),
    };
    Ok(Response::tool_result(
        req_id.clone(),
        summary,
        json!({
            "connected": connected,
            "port": port,
            "url": url,
            "clients": health.clients,
            "pendingRequests": health.pending_requests,
        }),
        false,
    ))
}

/// Sends `action` through the relay and turns the outcome into a tool result.
async fn relay_action(state: &AppState, req_id: &Value, action: WalletAction) -> Response {
    let kind = action.kind;
    let chain = action.chain;
    match state.relay.send_transaction(action).await {
        Ok(result) => {
            let (label, field) = match kind {
                RequestKind::SendTransaction => ("Transaction sent", "hash"),
                RequestKind::SignMessage | RequestKind::SignTypedData => ("Signed", "signature"),
            };
            Response::tool_result(
                req_id.clone(),
                format!("{}: {}", label, result),
                json!({
                    "outcome": Outcome::Completed.as_str(),
                    "chain": chain.as_str(),
                    field: result,
                }),
                false,
            )
        }
        Err(e) => {
            let (outcome, text) = describe_failure(&e);
            warn!(kind = %kind, outcome = outcome.as_str(), error = %e, "Wallet request did not complete");
            Response::tool_result(
                req_id.clone(),
                text,
                json!({
                    "outcome": outcome.as_str(),
                    "chain": chain.as_str(),
                    "error": e.to_string(),
                }),
                true,
            )
        }
    }
}

fn parse_chain(args: &Value, req_id: &Value) -> Result<ChainTarget, Response> {
    match utils::get_optional_str(args, "chain") {
        Some(raw) => raw
            .parse::<ChainTarget>()
            .map_err(|e| invalid_params(req_id, e.to_string())),
        None => Ok(ChainTarget::Any),
    }
}

fn to_json<T: serde::Serialize>(payload: &T, req_id: &Value) -> Result<Value, Response> {
    serde_json::to_value(payload).map_err(|e| {
        Response::error(req_id.clone(), error_codes::INTERNAL_ERROR, e.to_string())
    })
}

fn invalid_params(req_id: &Value, message: String) -> Response {
    Response::error(req_id.clone(), error_codes::INVALID_PARAMS, message)
}

/// Handles the 'initialize' request.
fn handle_initialize(req: &Request) -> Response {
    let server_info = json!({
        "name": "evm_wallet_relay",
        "version": env!("CARGO_PKG_VERSION")
    });
    let capabilities = json!({ "tools": { "listChanged": false } });
    let instructions = "Relays transactions and signature requests to a browser wallet. \
        Nothing is signed without the user approving it in the wallet page; \
        call wallet_status first to get the page URL.";

    Response::success(
        req.id.clone(),
        json!({
            "serverInfo": server_info,
            "protocolVersion": "2025-06-18",
            "capabilities": capabilities,
            "instructions": instructions
        }),
    )
}

/// Handles the 'tools/list' request by returning a JSON definition of all available tools.
fn handle_tools_list(req: &Request) -> Response {
    let chain_description = format!(
        "Chain to execute on: one of {} or 'any' (default) to use the wallet's current chain.",
        crate::blockchain::Chain::names().join(", ")
    );
    let tools = json!([
        {
            "name": "wallet_status",
            "description": "Start the wallet relay if needed and report its URL and whether a wallet page is connected.",
            "inputSchema": { "type": "object", "properties": {}, "additionalProperties": false }
        },
        {
            "name": "send_transaction",
            "description": "Ask the connected browser wallet to send a transaction. The user reviews and approves it in the wallet page.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "to": {"type": "string", "description": "The 0x... destination address."},
                    "value": {"type": "string", "description": "Amount in wei, decimal or 0x-hex. Defaults to 0."},
                    "data": {"type": "string", "description": "0x-prefixed ABI-encoded call data."},
                    "chain": {"type": "string", "description": chain_description}
                },
                "required": ["to"]
            }
        },
        {
            "name": "sign_message",
            "description": "Ask the connected browser wallet to sign a plain-text message (personal_sign).",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "message": {"type": "string", "description": "The message to sign."},
                    "chain": {"type": "string", "description": chain_description}
                },
                "required": ["message"]
            }
        },
        {
            "name": "sign_typed_data",
            "description": "Ask the connected browser wallet to sign EIP-712 typed data (eth_signTypedData_v4).",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "typedData": {"description": "EIP-712 document with domain, types, primaryType and message; object or JSON string."},
                    "chain": {"type": "string", "description": chain_description}
                },
                "required": ["typedData"]
            }
        }
    ]);
    Response::success(req.id.clone(), json!({ "tools": tools }))
}
