//! # Relay Module
//!
//! Bridges a headless tool process to a human-operated wallet page.
//!
//! A tool handler calls [`RelayServer::send_transaction`]; the relay makes
//! sure its HTTP/WebSocket listener is bound, waits for a wallet page to
//! connect, assigns the request a correlation id, pushes it to exactly one
//! connected page and suspends until that page answers, the request times
//! out, or the relay shuts down.

pub mod clients;
pub mod correlation;
pub mod error;
pub mod launcher;
pub mod ports;
pub mod protocol;
pub mod server;

pub use error::RelayError;
pub use launcher::{BrowserLauncher, NoopBrowser, SystemBrowser};
pub use protocol::{RequestKind, SigningRequest, SigningResponse, WalletAction, PROTOCOL_VERSION};
pub use server::{RelayServer, RelaySettings, RelayState};
