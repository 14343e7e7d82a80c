//! Correlation table: request id → pending completion.
//!
//! Every settle path (wallet response, expiry, shutdown) goes through
//! `DashMap::remove`, so exactly one of them wins for a given id and the
//! others become no-ops.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::error::RelayError;
use super::protocol::{RequestKind, SigningRequest, SigningResponse};

pub type Settlement = Result<String, RelayError>;

struct PendingEntry {
    sender: oneshot::Sender<Settlement>,
    kind: RequestKind,
    created_at: Instant,
    timeout: Duration,
}

#[derive(Default)]
pub struct CorrelationTable {
    pending: DashMap<String, PendingEntry>,
}

impl CorrelationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `request` and returns the receiver its caller suspends on.
    pub fn register(
        &self,
        request: &SigningRequest,
        timeout: Duration,
    ) -> oneshot::Receiver<Settlement> {
        let (tx, rx) = oneshot::channel();
        let entry = PendingEntry {
            sender: tx,
            kind: request.kind,
            created_at: Instant::now(),
            timeout,
        };
        if self.pending.insert(request.id.clone(), entry).is_some() {
            // ids are random v4 UUIDs; a collision means a caller reused one
            warn!(request_id = %request.id, "Replaced an existing pending request with the same id");
        }
        debug!(request_id = %request.id, kind = %request.kind, "Registered pending request");
        rx
    }

    /// Completes the entry for `response.id`. Returns false when no entry was
    /// waiting (late, duplicate, or already expired).
    pub fn settle(&self, response: SigningResponse) -> bool {
        let Some((id, entry)) = self.pending.remove(&response.id) else {
            warn!(
                request_id = %response.id,
                success = response.success,
                "Dropping response for unknown or already settled request"
            );
            return false;
        };

        let elapsed_ms = entry.created_at.elapsed().as_millis() as u64;
        let outcome = match (response.success, response.result, response.error) {
            (true, Some(result), _) => Ok(result),
            (true, None, _) => Err(RelayError::Wallet(
                "wallet reported success without a result".to_string(),
            )),
            (false, _, Some(error)) => Err(RelayError::Wallet(error)),
            (false, _, None) => Err(RelayError::Wallet("Unknown wallet error".to_string())),
        };

        info!(
            request_id = %id,
            kind = %entry.kind,
            success = outcome.is_ok(),
            elapsed_ms,
            "Settled request"
        );
        complete(&id, entry.sender, outcome);
        true
    }

    /// Fails the entry with a timeout if it is still pending.
    pub fn expire(&self, id: &str) -> bool {
        let Some((id, entry)) = self.pending.remove(id) else {
            return false;
        };
        warn!(
            request_id = %id,
            kind = %entry.kind,
            timeout_secs = entry.timeout.as_secs(),
            "Request timed out waiting for the wallet"
        );
        let timeout = entry.timeout;
        complete(&id, entry.sender, Err(RelayError::Timeout(timeout)));
        true
    }

    /// Drops the entry without completing it.
    pub fn remove(&self, id: &str) -> bool {
        self.pending.remove(id).is_some()
    }

    /// Spawns the timer that expires `id` after `after`.
    ///
    /// The returned guard owns the timer. Dropping it cancels the timer and
    /// removes the entry if it is still pending, so a caller that goes away
    /// leaves nothing behind in the table.
    pub fn arm_expiry(self: &Arc<Self>, id: &str, after: Duration) -> ExpiryGuard {
        let table = Arc::clone(self);
        let timer_id = id.to_string();
        let timer = tokio::spawn(async move {
            tokio::time::sleep(after).await;
            table.expire(&timer_id);
        });
        ExpiryGuard {
            table: Arc::clone(self),
            id: id.to_string(),
            timer,
        }
    }

    /// Fails every pending entry with [`RelayError::Shutdown`].
    pub fn fail_all(&self) -> usize {
        let ids: Vec<String> = self.pending.iter().map(|e| e.key().clone()).collect();
        let mut failed = 0;
        for id in ids {
            if let Some((id, entry)) = self.pending.remove(&id) {
                complete(&id, entry.sender, Err(RelayError::Shutdown));
                failed += 1;
            }
        }
        if failed > 0 {
            info!(failed, "Failed pending requests on shutdown");
        }
        failed
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.pending.contains_key(id)
    }
}

/// Expiry timer for one pending entry; see [`CorrelationTable::arm_expiry`].
pub struct ExpiryGuard {
    table: Arc<CorrelationTable>,
    id: String,
    timer: JoinHandle<()>,
}

impl Drop for ExpiryGuard {
    fn drop(&mut self) {
        self.timer.abort();
        if self.table.remove(&self.id) {
            debug!(request_id = %self.id, "Removed abandoned pending request");
        }
    }
}

fn complete(id: &str, sender: oneshot::Sender<Settlement>, outcome: Settlement) {
    if sender.send(outcome).is_err() {
        // the tool call that was waiting went away
        debug!(request_id = %id, "Pending request receiver dropped");
    }
}
