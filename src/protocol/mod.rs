//! MCP protocol types used by the gateway client (version 2025-03-26)

mod messages;
mod types;

pub use messages::*;
pub use types::*;

/// MCP Protocol version negotiated by default
pub const PROTOCOL_VERSION: &str = "2025-03-26";

/// JSON-RPC version string
pub const JSONRPC_VERSION: &str = "2.0";
