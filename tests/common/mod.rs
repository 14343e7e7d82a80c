//! Shared helpers for the relay integration tests.
#![allow(dead_code)]

use std::net::{IpAddr, Ipv4Addr, TcpListener};
use std::sync::Arc;
use std::time::Duration;

use evm_wallet_relay::relay::{
    NoopBrowser, RelayServer, RelaySettings, SigningRequest, SigningResponse,
};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

pub type WalletSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub const LOCALHOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

/// A port that was free a moment ago.
pub fn free_port() -> u16 {
    let listener = TcpListener::bind((LOCALHOST, 0)).unwrap();
    listener.local_addr().unwrap().port()
}

/// Holds `count` consecutive ports open and returns the first one.
pub fn occupy_consecutive(count: u16) -> (u16, Vec<TcpListener>) {
    for _ in 0..50 {
        let base = free_port();
        if base.checked_add(count).is_none() {
            continue;
        }
        let held: Vec<TcpListener> = (base..base + count)
            .filter_map(|p| TcpListener::bind((LOCALHOST, p)).ok())
            .collect();
        if held.len() == count as usize {
            return (base, held);
        }
    }
    panic!("could not find {count} consecutive free ports");
}

pub fn test_settings(port: u16) -> RelaySettings {
    RelaySettings {
        host: LOCALHOST,
        port,
        max_port_attempts: 10,
        client_wait: Duration::from_secs(3),
        client_poll_interval: Duration::from_millis(20),
        request_timeout: Duration::from_secs(5),
    }
}

pub fn test_server(settings: RelaySettings) -> Arc<RelayServer> {
    Arc::new(RelayServer::new(settings, Arc::new(NoopBrowser)))
}

/// Connects a scripted wallet page to the relay's socket.
pub async fn connect_wallet(port: u16) -> WalletSocket {
    let (socket, _) = connect_async(format!("ws://127.0.0.1:{}/ws", port))
        .await
        .expect("wallet socket should connect");
    socket
}

/// Next signing request pushed to this page.
pub async fn next_request(socket: &mut WalletSocket) -> SigningRequest {
    let message = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match socket.next().await {
                Some(Ok(Message::Text(text))) => return text,
                Some(Ok(_)) => continue,
                other => panic!("wallet socket ended: {other:?}"),
            }
        }
    })
    .await
    .expect("no request delivered in time");
    serde_json::from_str(&message).expect("request should decode")
}

pub async fn respond(socket: &mut WalletSocket, response: &SigningResponse) {
    socket
        .send(Message::Text(serde_json::to_string(response).unwrap()))
        .await
        .unwrap();
}
