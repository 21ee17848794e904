//! Error types for collaborator calls and reconciliation passes.

use std::fmt;

use thiserror::Error;

/// Errors reported by the orchestrator and load balancer adapters.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The API call itself failed (transport, throttling, service error).
    #[error("{operation} failed: {message}")]
    Api {
        operation: &'static str,
        message: String,
    },

    /// The call succeeded but reported a per-item failure.
    #[error("{operation} reported failure for {arn}: {reason}")]
    Failure {
        operation: &'static str,
        arn: String,
        reason: String,
    },

    /// A named resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The response lacks data the pass depends on.
    #[error("malformed {operation} response: {message}")]
    Malformed {
        operation: &'static str,
        message: String,
    },
}

impl ClientError {
    pub fn malformed(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Malformed {
            operation,
            message: message.into(),
        }
    }
}

/// Which target group mutation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
    Register,
    Deregister,
}

impl fmt::Display for Mutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mutation::Register => f.write_str("register"),
            Mutation::Deregister => f.write_str("deregister"),
        }
    }
}

/// Errors that terminate a reconciliation pass.
#[derive(Debug, Error)]
pub enum SyncError {
    /// A read from the orchestrator or load balancer failed. Nothing was mutated.
    #[error("upstream query failed: {0}")]
    UpstreamQuery(#[source] ClientError),

    /// The configured target group name does not resolve.
    #[error("target group not found: {0}")]
    NotFound(String),

    /// Registration or deregistration failed.
    ///
    /// `registered` counts targets already registered during this pass; they
    /// are left in place.
    #[error("{mutation} targets failed ({registered} already registered): {source}")]
    UpstreamMutation {
        mutation: Mutation,
        registered: usize,
        #[source]
        source: ClientError,
    },
}

/// Result type for reconciliation passes.
pub type Result<T> = std::result::Result<T, SyncError>;
