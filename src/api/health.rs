use axum::{extract::State, response::IntoResponse, Json};
use serde::Serialize;

use crate::relay::{RelayState, PROTOCOL_VERSION};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub status: &'static str,
    pub clients: usize,
    pub pending_requests: usize,
    pub port: Option<u16>,
    pub protocol_version: u32,
}

impl HealthReport {
    pub async fn collect(state: &RelayState) -> Self {
        Self {
            status: "ok",
            clients: state.clients.len().await,
            pending_requests: state.pending.len(),
            port: state.port(),
            protocol_version: PROTOCOL_VERSION,
        }
    }
}

pub async fn health_handler(State(state): State<RelayState>) -> impl IntoResponse {
    Json(HealthReport::collect(&state).await)
}
