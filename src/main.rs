// src/main.rs

use std::env;
use std::sync::Arc;

use evm_wallet_relay::{
    config::Config,
    mcp::{
        handler::handle_mcp_request,
        protocol::{error_codes, Request, Response},
    },
    relay::{BrowserLauncher, NoopBrowser, SystemBrowser},
    AppState,
};
use tokio::io::{self, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// --- Standalone relay ---
async fn run_relay(state: AppState) {
    if let Err(e) = state.relay.start().await {
        error!("❌ Failed to start wallet relay: {}", e);
        return;
    }
    if let Some(url) = state.relay.ui_url() {
        info!("Open {} in a browser with a wallet extension", url);
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl-C: {}", e);
    }
    info!("Shutdown signal received");
    state.relay.stop().await;
}

// --- Tool mode (JSON-RPC over stdin/stdout) ---

/// Serializes responses onto stdout, one JSON document per line.
fn spawn_stdout_writer(mut responses: mpsc::UnboundedReceiver<Response>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut stdout = io::stdout();
        while let Some(response) = responses.recv().await {
            let mut line = match serde_json::to_string(&response) {
                Ok(json) => json,
                Err(e) => {
                    error!("Failed to encode response: {}", e);
                    continue;
                }
            };
            debug!("Sending: {}", line);
            line.push('\n');
            if let Err(e) = stdout.write_all(line.as_bytes()).await {
                error!("Failed to write response: {}", e);
                return;
            }
            if let Err(e) = stdout.flush().await {
                error!("Failed to flush stdout: {}", e);
                return;
            }
        }
    })
}

async fn run_mcp_server(state: AppState) {
    info!("🚀 Starting wallet relay tools on stdin/stdout...");

    // Wallet calls wait on a human, so every request gets its own task
    let (out_tx, out_rx) = mpsc::unbounded_channel::<Response>();
    let writer = spawn_stdout_writer(out_rx);
    let mut lines = BufReader::new(io::stdin()).lines();

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => {
                info!("stdin closed");
                break;
            }
            Err(e) => {
                error!("Failed to read from stdin: {}", e);
                break;
            }
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        debug!("Received: {}", line);

        match serde_json::from_str::<Request>(line) {
            Ok(request) => {
                let state = state.clone();
                let out_tx = out_tx.clone();
                tokio::spawn(async move {
                    if let Some(response) = handle_mcp_request(request, state).await {
                        if out_tx.send(response).is_err() {
                            warn!("Response dropped: writer has stopped");
                        }
                    }
                });
            }
            Err(parse_error) => {
                error!("JSON parse error: {}", parse_error);
                let _ = out_tx.send(Response::error(
                    serde_json::Value::Null,
                    error_codes::PARSE_ERROR,
                    format!("Parse error: {}", parse_error),
                ));
            }
        }
    }

    // settles anything still waiting on the wallet so its task can answer
    state.relay.stop().await;
    drop(out_tx);
    if let Err(e) = writer.await {
        error!("Response writer ended abnormally: {}", e);
    }
    info!("Tool server shutting down");
}

#[tokio::main]
async fn main() {
    // Logs go to stderr; stdout carries JSON-RPC in tool mode
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "evm_wallet_relay=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("❌ Invalid configuration: {:#}", e);
            return;
        }
    };

    let launcher: Arc<dyn BrowserLauncher> = if config.open_browser {
        Arc::new(SystemBrowser)
    } else {
        Arc::new(NoopBrowser)
    };
    let app_state = AppState::new(config, launcher);

    let tool_mode = env::args().any(|arg| arg == "--mcp") || env::var("MCP_MODE").is_ok();
    if tool_mode {
        run_mcp_server(app_state).await;
    } else {
        run_relay(app_state).await;
    }
}
