//! Core types shared across harness components.

use serde::{Deserialize, Serialize};

/// Key shares and root token produced by the first initialization of a cluster.
///
/// This is both the body vault returns from `PUT /v1/sys/init` and the shape of
/// the durable credential record. Losing it locks the cluster's data forever.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnsealMaterial {
    /// Unseal key shares, hex encoded, in the order vault returned them
    pub keys: Vec<String>,

    /// The same shares, base64 encoded
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keys_base64: Vec<String>,

    /// Root authentication token
    pub root_token: String,
}

impl UnsealMaterial {
    /// Shares to submit when unsealing, capped at the number available
    pub fn shares(&self, count: usize) -> &[String] {
        &self.keys[..count.min(self.keys.len())]
    }
}

/// Request body for `PUT /v1/sys/init`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitRequest {
    pub secret_shares: u8,
    pub secret_threshold: u8,
}

/// Response of `GET /v1/sys/init`
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct InitStatus {
    pub initialized: bool,
}

/// Seal state of a single node (`/v1/sys/seal-status`, `/v1/sys/unseal`)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealStatus {
    /// Is the node sealed?
    pub sealed: bool,

    /// Threshold of shares needed to unseal
    #[serde(default)]
    pub t: u8,

    /// Total number of shares
    #[serde(default)]
    pub n: u8,

    /// Shares submitted towards the current unseal attempt
    #[serde(default)]
    pub progress: u8,

    /// Cluster name, only reported once unsealed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_name: Option<String>,
}

/// Per-node view of HA leadership (`/v1/sys/leader`)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HaStatus {
    pub ha_enabled: bool,

    /// Does this node consider itself the leader?
    pub is_self: bool,

    #[serde(default)]
    pub leader_address: String,

    #[serde(default)]
    pub leader_cluster_address: String,
}

/// Secret as returned by a logical read
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Secret {
    #[serde(default)]
    pub data: serde_json::Map<String, serde_json::Value>,

    #[serde(default)]
    pub lease_duration: u64,
}

impl Secret {
    /// String value of a field, if present
    pub fn field(&self, name: &str) -> Option<&str> {
        self.data.get(name).and_then(|v| v.as_str())
    }
}

/// Lifecycle state of a verification run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    /// Nothing known about the cluster yet
    #[default]
    Unknown,
    /// Cluster was initialized by an earlier run
    Initialized,
    /// Cluster has never been initialized
    Uninitialized,
    /// Every node reports unsealed
    Unsealed,
    /// Every node accepts the root token
    Authenticated,
    /// HA and consistency checks passed
    Verified,
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Unknown => "unknown",
            Self::Initialized => "initialized",
            Self::Uninitialized => "uninitialized",
            Self::Unsealed => "unsealed",
            Self::Authenticated => "authenticated",
            Self::Verified => "verified",
        };
        f.write_str(name)
    }
}

/// Outcome of a successful verification run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationReport {
    /// Final lifecycle state
    pub state: RunState,

    /// Node addresses in verification order
    pub nodes: Vec<String>,

    /// Whether this run performed the first initialization
    pub initialized_cluster: bool,

    /// Leader reported by the HA check (HA clusters only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub leader_address: Option<String>,

    /// Last value written by the consistency check
    pub consistency_value: String,
}
