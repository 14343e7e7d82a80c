//! # API Module
//!
//! HTTP surface of the wallet relay.
//!
//! ## Available Endpoints
//!
//! - `GET /` - Wallet connection and approval page
//! - `GET /assets/:file` - Script and stylesheet for the page
//! - `GET /health` - Connected client count and pending request count
//! - `GET /ws` - WebSocket the wallet page connects to

pub mod health;
pub mod socket;
pub mod ui;

use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;

use crate::relay::RelayState;

/// Builds the relay router over `state`.
pub fn relay_router(state: RelayState) -> Router {
    Router::new()
        .route("/", get(ui::index_handler))
        .route("/assets/:file", get(ui::asset_handler))
        .route("/health", get(health::health_handler))
        .route("/ws", get(socket::ws_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
