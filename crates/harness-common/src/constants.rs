//! Shared constants for the vault deployment harness.

/// Port the vault API listens on
pub const DEFAULT_VAULT_PORT: u16 = 8200;

/// Key shares requested when initializing a fresh cluster
pub const DEFAULT_KEY_SHARES: u8 = 1;

/// Shares required to unseal a node
pub const DEFAULT_KEY_THRESHOLD: u8 = 1;

/// Attempts made while waiting for a node to accept connections
pub const PROBE_MAX_ATTEMPTS: u32 = 10;

/// Pause between connection attempts (seconds)
pub const PROBE_BACKOFF_SECS: u64 = 2;

/// Attempts made while waiting for a node to accept the root token
pub const AUTH_MAX_ATTEMPTS: u32 = 10;

/// Pause between authentication checks (seconds)
pub const AUTH_BACKOFF_SECS: u64 = 2;

/// Secret written and read back by the consistency check
pub const CONSISTENCY_SECRET_PATH: &str = "secret/uuids";

/// Field holding the generated value inside the consistency secret
pub const CONSISTENCY_FIELD: &str = "uuid";

/// Lease attached to the consistency secret
pub const CONSISTENCY_LEASE: &str = "1h";

/// Credential record location, relative to the working directory
pub const DEFAULT_CREDENTIALS_FILE: &str = "tests/data.yaml";

/// Per-request timeout for the vault HTTP client (seconds)
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;

/// Upper bound on waiting for the model to settle (seconds)
pub const DEFAULT_DEPLOY_TIMEOUT_SECS: u64 = 3600;

/// Interval between model status polls (seconds)
pub const DEFAULT_DEPLOY_POLL_SECS: u64 = 5;

/// Number of vault units in an HA deployment
pub const HA_UNIT_COUNT: usize = 3;

/// Series used for every deployed application
pub const DEFAULT_SERIES: &str = "xenial";

/// Juju application and charm names
pub mod apps {
    /// Secrets service application
    pub const VAULT: &str = "vault";

    /// Certificate authority used by etcd
    pub const EASYRSA: &str = "easyrsa";

    /// Store charm for easyrsa
    pub const EASYRSA_CHARM: &str = "cs:~containers/easyrsa";

    /// HA coordination store
    pub const ETCD: &str = "etcd";

    /// etcd snap channel
    pub const ETCD_CHANNEL: &str = "3.1/stable";
}

/// Juju status values
pub mod status {
    /// Application or workload is healthy
    pub const ACTIVE: &str = "active";

    /// Unit agent has no pending work
    pub const IDLE: &str = "idle";
}

/// Vault HTTP header names
pub mod headers {
    /// Token header
    pub const X_VAULT_TOKEN: &str = "X-Vault-Token";
}
