// src/lib.rs

use std::sync::Arc;

pub mod api;
pub mod blockchain;
pub mod config;
pub mod mcp;
pub mod relay;
pub mod utils;
pub mod wallet;

/// Application state shared by the tool dispatcher.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: config::Config,
    /// The one relay instance every tool call goes through
    pub relay: Arc<relay::RelayServer>,
}

impl AppState {
    /// Builds the relay from `config`, opening the wallet page with `launcher`.
    pub fn new(config: config::Config, launcher: Arc<dyn relay::BrowserLauncher>) -> Self {
        let relay = Arc::new(relay::RelayServer::new(config.relay_settings(), launcher));
        Self { config, relay }
    }
}
