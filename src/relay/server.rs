//! The relay server: owns the correlation table and the client set, runs the
//! HTTP/WebSocket listener, and turns a [`WalletAction`] into a settled result.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use url::Url;

use super::clients::ClientSet;
use super::correlation::CorrelationTable;
use super::error::RelayError;
use super::launcher::BrowserLauncher;
use super::ports::bind_with_retry;
use super::protocol::{SigningRequest, WalletAction};
use crate::api::{self, health::HealthReport};

pub const DEFAULT_PORT: u16 = 3847;
pub const DEFAULT_PORT_ATTEMPTS: u16 = 10;
pub const DEFAULT_CLIENT_WAIT: Duration = Duration::from_secs(30);
pub const DEFAULT_CLIENT_POLL: Duration = Duration::from_millis(500);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// Timing and binding knobs for one relay instance.
#[derive(Debug, Clone)]
pub struct RelaySettings {
    pub host: IpAddr,
    /// Preferred port; the bound port may be higher if this one is busy.
    pub port: u16,
    pub max_port_attempts: u16,
    /// How long a dispatch waits for a wallet page to connect.
    pub client_wait: Duration,
    pub client_poll_interval: Duration,
    /// How long a delivered request may stay unanswered.
    pub request_timeout: Duration,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: DEFAULT_PORT,
            max_port_attempts: DEFAULT_PORT_ATTEMPTS,
            client_wait: DEFAULT_CLIENT_WAIT,
            client_poll_interval: DEFAULT_CLIENT_POLL,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

/// Shared with the HTTP and WebSocket handlers.
#[derive(Clone)]
pub struct RelayState {
    pub pending: Arc<CorrelationTable>,
    pub clients: Arc<ClientSet>,
    host: IpAddr,
    bound_port: Arc<AtomicU16>,
}

impl RelayState {
    pub fn new() -> Self {
        Self::with_host(IpAddr::V4(Ipv4Addr::LOCALHOST))
    }

    /// State for a listener bound on `host`.
    pub fn with_host(host: IpAddr) -> Self {
        Self {
            pending: Arc::new(CorrelationTable::new()),
            clients: Arc::new(ClientSet::new()),
            host,
            bound_port: Arc::new(AtomicU16::new(0)),
        }
    }

    /// Address the listener is configured to bind.
    pub fn host(&self) -> IpAddr {
        self.host
    }

    /// Port the listener actually bound, if it is running.
    pub fn port(&self) -> Option<u16> {
        match self.bound_port.load(Ordering::SeqCst) {
            0 => None,
            port => Some(port),
        }
    }
}

impl Default for RelayState {
    fn default() -> Self {
        Self::new()
    }
}

struct RunningListener {
    port: u16,
    shutdown: CancellationToken,
    task: JoinHandle<()>,
}

pub struct RelayServer {
    settings: RelaySettings,
    state: RelayState,
    launcher: Arc<dyn BrowserLauncher>,
    listener: Mutex<Option<RunningListener>>,
}

impl RelayServer {
    pub fn new(settings: RelaySettings, launcher: Arc<dyn BrowserLauncher>) -> Self {
        Self {
            state: RelayState::with_host(settings.host),
            settings,
            launcher,
            listener: Mutex::new(None),
        }
    }

    pub fn settings(&self) -> &RelaySettings {
        &self.settings
    }

    pub fn state(&self) -> &RelayState {
        &self.state
    }

    /// Binds the listener if it is not already running and returns the bound
    /// port. Concurrent callers queue on the same lock and share one listener.
    pub async fn start(&self) -> Result<u16, RelayError> {
        let mut guard = self.listener.lock().await;
        if let Some(running) = guard.as_ref() {
            if !running.task.is_finished() {
                return Ok(running.port);
            }
            warn!(port = running.port, "Relay server task exited, rebinding");
            *guard = None;
        }

        let listener = bind_with_retry(
            self.settings.host,
            self.settings.port,
            self.settings.max_port_attempts,
        )
        .await?;
        let port = listener
            .local_addr()
            .map_err(|source| RelayError::Bind {
                port: self.settings.port,
                source,
            })?
            .port();

        let app = api::relay_router(self.state.clone());
        let shutdown = CancellationToken::new();
        let signal = shutdown.clone();
        let task = tokio::spawn(async move {
            let result = axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .with_graceful_shutdown(async move { signal.cancelled().await })
            .await;
            if let Err(e) = result {
                error!(error = %e, "Relay server terminated with an error");
            }
        });

        self.state.bound_port.store(port, Ordering::SeqCst);
        info!("🔐 Wallet relay listening on {}", ui_url(self.settings.host, port));
        *guard = Some(RunningListener {
            port,
            shutdown,
            task,
        });
        Ok(port)
    }

    /// Stops accepting, closes wallet sockets, fails anything still pending
    /// and releases the port. No-op when not running.
    pub async fn stop(&self) {
        let Some(running) = self.listener.lock().await.take() else {
            return;
        };

        running.shutdown.cancel();
        let closed = self.state.clients.close_all().await;
        if let Err(e) = running.task.await {
            warn!(error = %e, "Relay server task ended abnormally");
        }
        let failed = self.state.pending.fail_all();
        self.state.bound_port.store(0, Ordering::SeqCst);
        info!(port = running.port, closed, failed, "Wallet relay stopped");
    }

    pub fn port(&self) -> Option<u16> {
        self.state.port()
    }

    /// URL of the wallet page, once the listener is bound.
    pub fn ui_url(&self) -> Option<String> {
        self.port().map(|port| ui_url(self.settings.host, port))
    }

    pub async fn is_connected(&self) -> bool {
        !self.state.clients.is_empty().await
    }

    pub fn pending_count(&self) -> usize {
        self.state.pending.len()
    }

    pub async fn health(&self) -> HealthReport {
        HealthReport::collect(&self.state).await
    }

    /// Relays `action` to the connected wallet and waits for its answer.
    ///
    /// Fails fast with [`RelayError::NoClient`] when no wallet page connects
    /// within `client_wait`; otherwise settles with the wallet's result, its
    /// error text, or [`RelayError::Timeout`] after `request_timeout`.
    pub async fn send_transaction(&self, action: WalletAction) -> Result<String, RelayError> {
        let port = self.start().await?;
        let ui_url = ui_url(self.settings.host, port);

        if let Err(e) = self.launcher.open(&ui_url) {
            warn!(error = %e, url = %ui_url, "Could not open the wallet page");
        }

        let connected = self
            .state
            .clients
            .wait_for_client(self.settings.client_poll_interval, self.settings.client_wait)
            .await;
        if !connected {
            warn!(
                waited_secs = self.settings.client_wait.as_secs(),
                "No wallet client connected"
            );
            return Err(RelayError::NoClient {
                waited: self.settings.client_wait,
                ui_url,
            });
        }

        let request = SigningRequest::from_action(action);
        let timeout = self.settings.request_timeout;
        let receiver = self.state.pending.register(&request, timeout);
        // armed before delivery; dropping it (early return or a cancelled
        // caller) removes the entry if it is still pending
        let _expiry = self.state.pending.arm_expiry(&request.id, timeout);

        if !self.state.clients.deliver(&request).await? {
            warn!(request_id = %request.id, "No wallet client could take the request");
            return Err(RelayError::DeliveryFailed);
        }

        // a dropped sender means the entry was removed without completion
        receiver.await.unwrap_or(Err(RelayError::Shutdown))
    }
}

/// Browsers cannot open a wildcard address, so those map to loopback.
fn ui_url(host: IpAddr, port: u16) -> String {
    let host = match host {
        IpAddr::V4(v4) if v4.is_unspecified() => IpAddr::V4(Ipv4Addr::LOCALHOST),
        IpAddr::V6(v6) if v6.is_unspecified() => IpAddr::V6(Ipv6Addr::LOCALHOST),
        other => other,
    };
    let addr = SocketAddr::new(host, port);
    match Url::parse(&format!("http://{}/", addr)) {
        Ok(url) => url.to_string(),
        Err(_) => format!("http://{}/", addr),
    }
}
