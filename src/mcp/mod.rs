// JSON-RPC surface exposed to the agent over stdin/stdout
pub mod handler;
pub mod protocol;
