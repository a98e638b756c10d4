//! Common error types for the vault deployment harness.

use std::path::PathBuf;

use thiserror::Error;

/// Failure taxonomy shared by the verifier and the deployment coordinator
#[derive(Debug, Error)]
pub enum HarnessError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Could not reach a node (refused, reset, DNS, request timeout)
    #[error("Connection error to {address}: {message}")]
    Connection { address: String, message: String },

    /// Node answered with a non-success HTTP status
    #[error("Server error from {address} (HTTP {status}): {message}")]
    Server {
        address: String,
        status: u16,
        message: String,
    },

    /// Response body did not match the expected shape
    #[error("Invalid response from {address}: {message}")]
    InvalidResponse { address: String, message: String },

    /// Node stayed unreachable for the whole retry budget
    #[error("Cannot connect to {address} after {attempts} attempts")]
    Unreachable { address: String, attempts: u32 },

    /// Cluster is initialized but no credential record exists
    #[error("Cluster is initialized but credential record {} is missing", .0.display())]
    CredentialsMissing(PathBuf),

    /// Credential record exists but could not be read or written
    #[error("Credential record error: {0}")]
    Credentials(String),

    /// Node still sealed or reporting a bad seal state
    #[error("Seal check failed on {address}: {message}")]
    Seal { address: String, message: String },

    /// Node rejected the root token
    #[error("Node {0} does not accept the root token")]
    NotAuthenticated(String),

    /// HA leadership invariant violated
    #[error("HA check failed: {0}")]
    HaViolation(String),

    /// Written value not observed identically on every node
    #[error("Consistency check failed: {0}")]
    Consistency(String),

    /// Orchestrator command failed
    #[error("Orchestration error: {0}")]
    Orchestration(String),

    /// Timeout
    #[error("Operation timed out: {0}")]
    Timeout(String),
}

impl HarnessError {
    /// Create a connection error for the given node
    pub fn connection(address: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Connection {
            address: address.into(),
            message: message.into(),
        }
    }

    /// Create an orchestration error with the given message
    pub fn orchestration(msg: impl Into<String>) -> Self {
        Self::Orchestration(msg.into())
    }

    /// Returns true if the node could not be reached at all
    pub fn is_connectivity(&self) -> bool {
        matches!(self, Self::Connection { .. })
    }

    /// Returns true for the transient "internal server error" class
    pub fn is_internal_server_error(&self) -> bool {
        matches!(self, Self::Server { status: 500, .. })
    }

    /// Returns true for errors that mean the cluster itself misbehaved
    pub fn is_assertion(&self) -> bool {
        matches!(
            self,
            Self::Seal { .. }
                | Self::NotAuthenticated(_)
                | Self::HaViolation(_)
                | Self::Consistency(_)
        )
    }
}
