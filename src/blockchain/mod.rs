// src/blockchain/mod.rs

pub mod chains;
pub mod models;

// Re-export commonly used types
pub use chains::{Chain, ChainTarget};
pub use models::{MessagePayload, PayloadError, TransactionPayload, TypedDataPayload};
