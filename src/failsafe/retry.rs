//! Retry decision point
//!
//! Every outbound operation gets at most one retry. Whether that retry
//! happens, and whether the bearer token must be refreshed first, is decided
//! here from the error alone so the policy can be tested without I/O.

use crate::Error;

/// Attempts per operation, including the first one
pub const MAX_ATTEMPTS: u32 = 2;

/// Kind of outbound operation being retried
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// OAuth2 client-credentials exchange
    TokenExchange,
    /// Gateway session handshake
    Connect,
    /// Catalog listing or tool invocation on an open session
    ToolCall,
}

/// What to do after a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Invalidate the bearer token, fetch a new one, then retry
    RefreshAndRetry,
    /// Retry with the same token
    Retry,
    /// Surface the error
    Fail,
}

/// Decide how to proceed after `attempt` (1-based) failed with `error`
#[must_use]
pub fn decide(operation: Operation, error: &Error, attempt: u32) -> RetryDecision {
    if attempt >= MAX_ATTEMPTS {
        return RetryDecision::Fail;
    }

    match (operation, error) {
        (Operation::Connect | Operation::ToolCall, Error::Unauthorized { .. }) => {
            RetryDecision::RefreshAndRetry
        }
        (_, Error::Timeout { .. }) | (Operation::Connect, Error::GatewayUnreachable { .. }) => {
            RetryDecision::Retry
        }
        _ => RetryDecision::Fail,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn unauthorized() -> Error {
        Error::Unauthorized {
            endpoint: "https://gw.example/mcp".to_string(),
        }
    }

    fn timeout() -> Error {
        Error::Timeout {
            endpoint: "https://gw.example/mcp".to_string(),
        }
    }

    fn unreachable() -> Error {
        Error::GatewayUnreachable {
            endpoint: "https://gw.example/mcp".to_string(),
            reason: "connection refused".to_string(),
        }
    }

    #[test]
    fn unauthorized_refreshes_once() {
        for op in [Operation::Connect, Operation::ToolCall] {
            assert_eq!(decide(op, &unauthorized(), 1), RetryDecision::RefreshAndRetry);
            assert_eq!(decide(op, &unauthorized(), 2), RetryDecision::Fail);
        }
    }

    #[test]
    fn timeouts_retry_once_everywhere() {
        for op in [Operation::TokenExchange, Operation::Connect, Operation::ToolCall] {
            assert_eq!(decide(op, &timeout(), 1), RetryDecision::Retry);
            assert_eq!(decide(op, &timeout(), 2), RetryDecision::Fail);
        }
    }

    #[test]
    fn unreachable_only_retried_at_connect() {
        assert_eq!(decide(Operation::Connect, &unreachable(), 1), RetryDecision::Retry);
        assert_eq!(decide(Operation::ToolCall, &unreachable(), 1), RetryDecision::Fail);
        assert_eq!(
            decide(Operation::TokenExchange, &unreachable(), 1),
            RetryDecision::Fail
        );
    }

    #[test]
    fn application_errors_never_retried() {
        let err = Error::ToolInvocation {
            tool: "lookup_beneficiary".to_string(),
            payload: json!({"code": -32000, "message": "not found"}),
        };
        assert_eq!(decide(Operation::ToolCall, &err, 1), RetryDecision::Fail);

        let err = Error::auth("https://auth.example/token", "invalid_client");
        assert_eq!(decide(Operation::TokenExchange, &err, 1), RetryDecision::Fail);
    }
}
