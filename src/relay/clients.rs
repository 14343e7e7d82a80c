//! The set of connected wallet pages and point-to-point delivery to one of them.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, RwLock};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::error::RelayError;
use super::protocol::{SigningRequest, SigningResponse};

pub type ClientId = u64;

/// Outbound queue depth per socket. Requests are rare and small.
pub const CLIENT_QUEUE_CAPACITY: usize = 32;

/// Floor for the client poll interval.
pub const MIN_CLIENT_POLL: Duration = Duration::from_millis(10);

struct ClientHandle {
    tx: mpsc::Sender<String>,
    peer: Option<SocketAddr>,
    connected_at: DateTime<Utc>,
}

/// Snapshot of a connected client for status reporting.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientInfo {
    pub id: ClientId,
    pub peer: Option<String>,
    pub connected_at: DateTime<Utc>,
}

/// Connected sockets keyed by connection order, so "first" means oldest.
pub struct ClientSet {
    next_id: AtomicU64,
    clients: RwLock<BTreeMap<ClientId, ClientHandle>>,
}

impl Default for ClientSet {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientSet {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            clients: RwLock::new(BTreeMap::new()),
        }
    }

    pub async fn connect(&self, tx: mpsc::Sender<String>, peer: Option<SocketAddr>) -> ClientId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut clients = self.clients.write().await;
        clients.insert(
            id,
            ClientHandle {
                tx,
                peer,
                connected_at: Utc::now(),
            },
        );
        info!(client_id = id, ?peer, connected = clients.len(), "Wallet client connected");
        id
    }

    pub async fn disconnect(&self, id: ClientId) {
        let mut clients = self.clients.write().await;
        if clients.remove(&id).is_some() {
            info!(client_id = id, connected = clients.len(), "Wallet client disconnected");
        }
    }

    /// Sends `request` to the first open client that has queue room. Never
    /// broadcasts and never waits on a client's queue: a client whose writer
    /// is stuck is skipped, a closed one is pruned.
    pub async fn deliver(&self, request: &SigningRequest) -> Result<bool, RelayError> {
        let text = serde_json::to_string(request)?;

        let candidates: Vec<(ClientId, mpsc::Sender<String>)> = {
            let clients = self.clients.read().await;
            clients.iter().map(|(id, c)| (*id, c.tx.clone())).collect()
        };

        let mut stale = Vec::new();
        let mut delivered_to = None;
        for (id, tx) in candidates {
            if tx.is_closed() {
                stale.push(id);
                continue;
            }
            match tx.try_send(text.clone()) {
                Ok(()) => {
                    delivered_to = Some(id);
                    break;
                }
                Err(TrySendError::Full(_)) => {
                    warn!(client_id = id, "Wallet client queue is full, skipping");
                }
                Err(TrySendError::Closed(_)) => stale.push(id),
            }
        }

        if !stale.is_empty() {
            let mut clients = self.clients.write().await;
            for id in &stale {
                clients.remove(id);
            }
            debug!(pruned = stale.len(), "Pruned closed wallet clients");
        }

        match delivered_to {
            Some(client_id) => {
                info!(
                    request_id = %request.id,
                    kind = %request.kind,
                    chain = %request.chain,
                    client_id,
                    "Delivered signing request"
                );
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Parses an inbound socket message. Malformed input is logged and ignored.
    pub fn parse_inbound(client_id: ClientId, raw: &str) -> Option<SigningResponse> {
        match serde_json::from_str::<SigningResponse>(raw) {
            Ok(response) => Some(response),
            Err(e) => {
                warn!(client_id, error = %e, "Ignoring malformed message from wallet client");
                None
            }
        }
    }

    /// Polls every `poll` (at least [`MIN_CLIENT_POLL`]) until a client is
    /// connected or `max_wait` elapses.
    pub async fn wait_for_client(&self, poll: Duration, max_wait: Duration) -> bool {
        let poll = poll.max(MIN_CLIENT_POLL);
        let deadline = Instant::now() + max_wait;
        loop {
            if !self.is_empty().await {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            tokio::time::sleep(poll.min(deadline - now)).await;
        }
    }

    /// Drops every outbound sender; each socket task sees its queue close and exits.
    pub async fn close_all(&self) -> usize {
        let mut clients = self.clients.write().await;
        let closed = clients.len();
        clients.clear();
        closed
    }

    pub async fn len(&self) -> usize {
        self.clients.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.clients.read().await.is_empty()
    }

    pub async fn snapshot(&self) -> Vec<ClientInfo> {
        self.clients
            .read()
            .await
            .iter()
            .map(|(id, c)| ClientInfo {
                id: *id,
                peer: c.peer.map(|p| p.to_string()),
                connected_at: c.connected_at,
            })
            .collect()
    }
}
