//! # Wallet Module
//!
//! The peer on the other side of the relay socket. It decodes each signing
//! request, shows a preview to an [`Approver`], and on approval drives a
//! [`WalletProvider`] (switching or adding the chain first when needed),
//! then answers the request id exactly once.
//!
//! The bundled web page (`assets/relay.js`) implements the same protocol
//! against a browser extension; this module is the native counterpart.

pub mod client;
pub mod preview;
pub mod provider;

pub use client::{rejection_message, socket_url, WalletClient, WalletClientError};
pub use preview::{Approver, Decision, Payload, RequestPreview};
pub use provider::{ProviderError, WalletProvider, UNRECOGNIZED_CHAIN, USER_REJECTED};
