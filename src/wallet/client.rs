//! The wallet-side peer: answers relay requests using a wallet provider,
//! after a human approves them.

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use thiserror::Error;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};
use url::Url;

use super::preview::{Approver, Decision, Payload, RequestPreview};
use super::provider::{ProviderError, WalletProvider};
use crate::blockchain::chains::ChainTarget;
use crate::relay::protocol::{RequestKind, SigningRequest, SigningResponse, PROTOCOL_VERSION};

#[derive(Error, Debug)]
pub enum WalletClientError {
    #[error("invalid relay url '{0}'")]
    InvalidUrl(String),
    #[error("relay socket error: {0}")]
    Socket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("failed to encode response: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Text sent back when the human (or the wallet on their behalf) declines.
pub fn rejection_message(kind: RequestKind) -> &'static str {
    match kind {
        RequestKind::SendTransaction => "User rejected transaction",
        RequestKind::SignMessage | RequestKind::SignTypedData => "User rejected signature request",
    }
}

/// WebSocket endpoint for a relay page URL (`http://127.0.0.1:3847/` → `ws://127.0.0.1:3847/ws`).
pub fn socket_url(relay_url: &str) -> Result<Url, WalletClientError> {
    let mut url =
        Url::parse(relay_url).map_err(|_| WalletClientError::InvalidUrl(relay_url.to_string()))?;
    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        _ => return Err(WalletClientError::InvalidUrl(relay_url.to_string())),
    };
    url.set_scheme(scheme)
        .map_err(|_| WalletClientError::InvalidUrl(relay_url.to_string()))?;
    if !url.path().ends_with("/ws") {
        url.set_path("/ws");
    }
    Ok(url)
}

pub struct WalletClient<P, A> {
    provider: P,
    approver: A,
    account: Option<String>,
    chain_id: Option<u64>,
}

impl<P: WalletProvider, A: Approver> WalletClient<P, A> {
    pub fn new(provider: P, approver: A) -> Self {
        Self {
            provider,
            approver,
            account: None,
            chain_id: None,
        }
    }

    pub fn account(&self) -> Option<&str> {
        self.account.as_deref()
    }

    pub fn chain_id(&self) -> Option<u64> {
        self.chain_id
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Asks the wallet for its account and current chain.
    pub async fn connect_wallet(&mut self) -> Result<String, ProviderError> {
        let accounts = self.provider.request_accounts().await?;
        let account = accounts
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::new(4100, "Wallet returned no accounts"))?;
        let chain_id = self.provider.chain_id().await?;
        info!(%account, chain_id, "Wallet connected");
        self.account = Some(account.clone());
        self.chain_id = Some(chain_id);
        Ok(account)
    }

    /// Produces exactly one response for `request`.
    pub async fn handle_request(&mut self, request: &SigningRequest) -> SigningResponse {
        if request.version > PROTOCOL_VERSION {
            return SigningResponse::failure(
                &request.id,
                format!("Unsupported protocol version {}", request.version),
            );
        }

        let target = match request.chain.parse::<ChainTarget>() {
            Ok(target) => target,
            Err(e) => return SigningResponse::failure(&request.id, e.to_string()),
        };
        let payload = match Payload::decode(request) {
            Ok(payload) => payload,
            Err(e) => return SigningResponse::failure(&request.id, e.to_string()),
        };

        let preview = RequestPreview::build(request, target, &payload);
        if self.approver.review(&preview).await == Decision::Reject {
            info!(request_id = %request.id, kind = %request.kind, "Request rejected by user");
            return SigningResponse::failure(&request.id, rejection_message(request.kind));
        }

        match self.execute(target, &payload).await {
            Ok(result) => {
                info!(request_id = %request.id, kind = %request.kind, "Request approved and signed");
                SigningResponse::success(&request.id, result)
            }
            Err(e) if e.is_user_rejection() => {
                SigningResponse::failure(&request.id, rejection_message(request.kind))
            }
            Err(e) => {
                warn!(request_id = %request.id, error = %e, "Wallet provider failed");
                SigningResponse::failure(&request.id, e.message)
            }
        }
    }

    async fn execute(&mut self, target: ChainTarget, payload: &Payload) -> Result<String, ProviderError> {
        let account = match self.account.clone() {
            Some(account) => account,
            None => self.connect_wallet().await?,
        };
        self.ensure_chain(target).await?;

        match payload {
            Payload::Transaction(tx) => self.provider.send_transaction(&account, tx).await,
            Payload::Message(m) => self.provider.personal_sign(&m.message, &account).await,
            Payload::TypedData(t) => self.provider.sign_typed_data(&account, &t.typed_data).await,
        }
    }

    /// Switches the wallet to `target`, adding the chain first if the wallet
    /// does not know it. `any` never switches.
    async fn ensure_chain(&mut self, target: ChainTarget) -> Result<(), ProviderError> {
        let Some(chain) = target.chain() else {
            return Ok(());
        };
        let current = match self.chain_id {
            Some(id) => id,
            None => {
                let id = self.provider.chain_id().await?;
                self.chain_id = Some(id);
                id
            }
        };
        if current == chain.id() {
            return Ok(());
        }

        match self.provider.switch_chain(chain.id()).await {
            Ok(()) => {}
            Err(e) if e.is_unrecognized_chain() => {
                info!(chain = %chain, "Wallet does not know chain, adding it");
                self.provider.add_chain(&chain.add_chain_params()).await?;
                self.provider.switch_chain(chain.id()).await?;
            }
            Err(e) => return Err(e),
        }
        debug!(from = current, to = chain.id(), "Switched wallet chain");
        self.chain_id = Some(chain.id());
        Ok(())
    }

    /// Connects to the relay at `relay_url` and answers requests one at a time
    /// until the relay closes the socket. Returns how many were answered.
    pub async fn run(&mut self, relay_url: &str) -> Result<usize, WalletClientError> {
        let url = socket_url(relay_url)?;
        let (socket, _) = connect_async(url.as_str()).await?;
        let (mut write, mut read) = socket.split();
        info!(%url, "Connected to wallet relay");

        let mut answered = 0;
        while let Some(message) = read.next().await {
            let text = match message? {
                Message::Text(text) => text,
                Message::Close(_) => break,
                _ => continue,
            };

            let response = match serde_json::from_str::<SigningRequest>(&text) {
                Ok(request) => self.handle_request(&request).await,
                Err(e) => {
                    // answer anything that still carries an id so it doesn't ride to timeout
                    let id = serde_json::from_str::<Value>(&text)
                        .ok()
                        .and_then(|v| v.get("id").and_then(Value::as_str).map(str::to_string));
                    match id {
                        Some(id) => SigningResponse::failure(id, format!("Malformed request: {}", e)),
                        None => {
                            warn!(error = %e, "Ignoring malformed relay message");
                            continue;
                        }
                    }
                }
            };

            write
                .send(Message::Text(serde_json::to_string(&response)?))
                .await?;
            answered += 1;
        }

        info!(answered, "Relay connection closed");
        Ok(answered)
    }
}
