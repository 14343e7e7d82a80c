use std::time::Duration;

use thiserror::Error;

/// Everything that can go wrong between a tool call and a settled signature.
#[derive(Error, Debug)]
pub enum RelayError {
    #[error(
        "no wallet connected after waiting {}s; open {ui_url} in a browser with a wallet extension",
        .waited.as_secs()
    )]
    NoClient { waited: Duration, ui_url: String },

    #[error("no active wallet connection: the wallet page disconnected before the request could be delivered")]
    DeliveryFailed,

    /// The wallet answered with `success: false`, or with a malformed answer.
    /// The text is the wallet's own and covers user rejection.
    #[error("{0}")]
    Wallet(String),

    #[error("timed out after {}s waiting for the wallet to respond", .0.as_secs())]
    Timeout(Duration),

    #[error("could not bind relay server: ports {start}-{end} are all in use")]
    PortsExhausted { start: u16, end: u16 },

    #[error("could not bind relay server on port {port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: std::io::Error,
    },

    #[error("relay server shut down before the wallet responded")]
    Shutdown,

    #[error("failed to encode signing request: {0}")]
    Encode(#[from] serde_json::Error),
}

impl RelayError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, RelayError::Timeout(_))
    }

    /// Text the wallet sent back, if the failure came from the wallet.
    pub fn wallet_message(&self) -> Option<&str> {
        match self {
            RelayError::Wallet(msg) => Some(msg),
            _ => None,
        }
    }
}
