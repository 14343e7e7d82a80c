use std::net::{IpAddr, SocketAddr};

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        ConnectInfo, State,
    },
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, warn};
use url::Url;

use crate::relay::{
    clients::{ClientId, ClientSet, CLIENT_QUEUE_CAPACITY},
    RelayState,
};

/// GET /ws
/// Upgrades a wallet page connection and registers it with the client set.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<RelayState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Response {
    if !origin_allowed(&headers, state.host(), state.port()) {
        warn!(%peer, origin = ?headers.get(header::ORIGIN), "Rejected wallet socket from foreign origin");
        return (StatusCode::FORBIDDEN, "origin not allowed").into_response();
    }
    ws.on_upgrade(move |socket| handle_socket(socket, state, peer))
}

/// Browsers always send `Origin`; only the relay's own page may connect,
/// served from loopback or from the configured bind address.
/// Non-browser wallet clients send none and are allowed.
fn origin_allowed(headers: &HeaderMap, host: IpAddr, port: Option<u16>) -> bool {
    let Some(origin) = headers.get(header::ORIGIN) else {
        return true;
    };
    let Some(url) = origin.to_str().ok().and_then(|o| Url::parse(o).ok()) else {
        return false;
    };
    let own_host = match url.host() {
        Some(url::Host::Domain(name)) => name.eq_ignore_ascii_case("localhost"),
        Some(url::Host::Ipv4(ip)) => ip.is_loopback() || IpAddr::V4(ip) == host,
        Some(url::Host::Ipv6(ip)) => ip.is_loopback() || IpAddr::V6(ip) == host,
        None => false,
    };
    own_host && port.is_some() && url.port_or_known_default() == port
}

async fn handle_socket(socket: WebSocket, state: RelayState, peer: SocketAddr) {
    let (mut socket_tx, mut socket_rx) = socket.split();
    let (tx, mut rx) = mpsc::channel::<String>(CLIENT_QUEUE_CAPACITY);
    let client_id = state.clients.connect(tx, Some(peer)).await;

    let mut writer_task = tokio::spawn(async move {
        while let Some(text) = rx.recv().await {
            if socket_tx.send(Message::Text(text)).await.is_err() {
                return;
            }
        }
        // queue closed by the relay: say goodbye
        let _ = socket_tx.send(Message::Close(None)).await;
    });

    loop {
        tokio::select! {
            _ = &mut writer_task => break,
            incoming = socket_rx.next() => {
                let Some(incoming) = incoming else { break };
                match incoming {
                    Ok(Message::Text(text)) => on_message(&state, client_id, &text),
                    Ok(Message::Binary(bytes)) => match std::str::from_utf8(&bytes) {
                        Ok(text) => on_message(&state, client_id, text),
                        Err(_) => warn!(client_id, "Ignoring non-UTF-8 binary message"),
                    },
                    Ok(Message::Close(_)) => break,
                    Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
                    Err(e) => {
                        debug!(client_id, error = %e, "Wallet socket error");
                        break;
                    }
                }
            }
        }
    }

    // in-flight requests stay pending: another page may still answer them
    state.clients.disconnect(client_id).await;
    if !writer_task.is_finished() {
        writer_task.abort();
    }
}

fn on_message(state: &RelayState, client_id: ClientId, raw: &str) {
    if let Some(response) = ClientSet::parse_inbound(client_id, raw) {
        state.pending.settle(response);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn with_origin(origin: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::ORIGIN, HeaderValue::from_str(origin).unwrap());
        headers
    }

    fn loopback() -> IpAddr {
        IpAddr::V4(std::net::Ipv4Addr::LOCALHOST)
    }

    #[test]
    fn test_origin_policy() {
        let host = loopback();
        assert!(origin_allowed(&HeaderMap::new(), host, Some(3847)));
        assert!(origin_allowed(&with_origin("http://127.0.0.1:3847"), host, Some(3847)));
        assert!(origin_allowed(&with_origin("http://localhost:3847"), host, Some(3847)));
        assert!(origin_allowed(&with_origin("http://[::1]:3847"), host, Some(3847)));
        assert!(!origin_allowed(&with_origin("http://localhost:3848"), host, Some(3847)));
        assert!(!origin_allowed(&with_origin("https://evil.example"), host, Some(3847)));
        assert!(!origin_allowed(&with_origin("null"), host, Some(3847)));
        assert!(!origin_allowed(&with_origin("http://127.0.0.1:3847"), host, None));
    }

    #[test]
    fn test_origin_matches_configured_host() {
        let lan: IpAddr = "192.168.1.20".parse().unwrap();
        assert!(origin_allowed(&with_origin("http://192.168.1.20:3847"), lan, Some(3847)));
        assert!(!origin_allowed(&with_origin("http://192.168.1.21:3847"), lan, Some(3847)));
        assert!(!origin_allowed(&with_origin("http://192.168.1.20:3847"), loopback(), Some(3847)));

        let lan6: IpAddr = "fd00::20".parse().unwrap();
        assert!(origin_allowed(&with_origin("http://[fd00::20]:3847"), lan6, Some(3847)));
    }
}
