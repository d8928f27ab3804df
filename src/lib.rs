//! M2M Gateway Bridge Library
//!
//! Lets an agent call tools served by an OAuth2-protected tool gateway as if
//! they were local capabilities.
//!
//! # Features
//!
//! - **Client credentials**: token endpoint from configuration, a Cognito
//!   domain prefix, or OpenID Connect discovery
//! - **Token lifecycle**: cached bearer token, refreshed ahead of expiry with
//!   a single in-flight exchange
//! - **Gateway sessions**: JSON-RPC over streamable HTTP, refresh-and-retry
//!   once on 401
//! - **Agent bridge**: remote and local tools behind one ordered toolset
//!
//! # Protocol Version
//!
//! Speaks MCP protocol version 2025-03-26 (Streamable HTTP).

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod bridge;
pub mod cli;
pub mod config;
pub mod error;
pub mod failsafe;
pub mod gateway;
pub mod oauth;
pub mod protocol;
pub mod transport;

#[cfg(test)]
mod test_support;

pub use error::{Error, Result};

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Setup tracing/logging
///
/// `RUST_LOG` takes precedence over `level`.
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn setup_tracing(level: &str, format: Option<&str>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::registry().with(filter);

    let installed = match format {
        Some("json") => subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init(),
        _ => subscriber.with(fmt::layer().with_writer(std::io::stderr)).try_init(),
    };

    installed.map_err(|e| Error::Internal(format!("Failed to install tracing subscriber: {e}")))
}
