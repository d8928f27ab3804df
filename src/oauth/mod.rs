//! OAuth 2.0 client-credentials support
//!
//! - Client credential loading, with OpenID Connect discovery of the token
//!   endpoint
//! - Token exchange against the authorization server
//! - A caching token provider with single-flight refresh

mod credential;
mod discovery;
mod exchange;
mod provider;
mod token;

pub use credential::{ClientCredential, CredentialStore};
pub use discovery::OpenIdConfiguration;
pub use exchange::{HttpTokenExchange, TokenExchange};
pub use provider::{DEFAULT_REFRESH_MARGIN, TokenProvider};
pub use token::{BearerToken, DEFAULT_TOKEN_TTL, TokenResponse};
