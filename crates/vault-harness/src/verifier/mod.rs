//! Cluster unseal-and-verify lifecycle.
//!
//! A run walks the cluster through
//! `Unknown → {Initialized | Uninitialized} → Unsealed → Authenticated → Verified`:
//!
//! 1. probe the first node until it answers whether the cluster is initialized
//! 2. initialize (persisting the material first) or recover the material
//! 3. unseal every node
//! 4. bind the root token everywhere and confirm it is accepted
//! 5. check seal status and, for more than one node, HA leadership
//! 6. write a fresh value through each node and read it back from all nodes

mod ha;

use std::time::Duration;

use futures::future::try_join_all;
use harness_common::constants::{
    AUTH_BACKOFF_SECS, AUTH_MAX_ATTEMPTS, CONSISTENCY_FIELD, CONSISTENCY_LEASE,
    CONSISTENCY_SECRET_PATH, DEFAULT_KEY_SHARES, DEFAULT_KEY_THRESHOLD, PROBE_BACKOFF_SECS,
    PROBE_MAX_ATTEMPTS,
};
use harness_common::{HarnessError, Result, RunState, UnsealMaterial, VerificationReport};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::client::SecretsClient;
use crate::credentials::CredentialStore;
use crate::retry::{RetryPolicy, retry_if};

pub use ha::check_ha_statuses;

/// A secrets-service node under verification
pub struct ClusterNode<C> {
    pub address: String,
    pub client: C,
}

impl<C: SecretsClient> ClusterNode<C> {
    pub fn new(client: C) -> Self {
        Self {
            address: client.address().to_string(),
            client,
        }
    }
}

/// Tunables for a verification run
#[derive(Debug, Clone)]
pub struct VerifierSettings {
    /// Shares requested when initializing
    pub key_shares: u8,
    /// Shares required to unseal
    pub key_threshold: u8,
    /// Shares submitted per sealed node before giving up on it
    pub unseal_shares: usize,
    /// Budget for waiting on an unreachable node
    pub probe: RetryPolicy,
    /// Budget for waiting out internal errors while checking the token
    pub auth: RetryPolicy,
    pub secret_path: String,
    pub lease: String,
}

impl Default for VerifierSettings {
    fn default() -> Self {
        Self {
            key_shares: DEFAULT_KEY_SHARES,
            key_threshold: DEFAULT_KEY_THRESHOLD,
            unseal_shares: DEFAULT_KEY_THRESHOLD as usize,
            probe: RetryPolicy::new(PROBE_MAX_ATTEMPTS, Duration::from_secs(PROBE_BACKOFF_SECS)),
            auth: RetryPolicy::new(AUTH_MAX_ATTEMPTS, Duration::from_secs(AUTH_BACKOFF_SECS)),
            secret_path: CONSISTENCY_SECRET_PATH.to_string(),
            lease: CONSISTENCY_LEASE.to_string(),
        }
    }
}

/// Drives every node of one cluster through the verification lifecycle
pub struct ClusterVerifier<C> {
    nodes: Vec<ClusterNode<C>>,
    store: CredentialStore,
    settings: VerifierSettings,
    state: RunState,
}

impl<C: SecretsClient> ClusterVerifier<C> {
    pub fn new(
        nodes: Vec<ClusterNode<C>>,
        store: CredentialStore,
        settings: VerifierSettings,
    ) -> Result<Self> {
        if nodes.is_empty() {
            return Err(HarnessError::Config("no nodes to verify".to_string()));
        }
        if settings.key_threshold == 0 || settings.key_threshold > settings.key_shares {
            return Err(HarnessError::Config(format!(
                "key threshold {} must be between 1 and key shares {}",
                settings.key_threshold, settings.key_shares
            )));
        }

        if settings.unseal_shares < settings.key_threshold as usize {
            warn!(
                unseal_shares = settings.unseal_shares,
                threshold = settings.key_threshold,
                "Fewer shares submitted per node than the unseal threshold"
            );
        }

        Ok(Self {
            nodes,
            store,
            settings,
            state: RunState::Unknown,
        })
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    fn advance(&mut self, state: RunState) {
        debug!(from = %self.state, to = %state, "Cluster state changed");
        self.state = state;
    }

    /// Ask the first node whether the cluster is initialized, waiting for it
    /// to accept connections.
    pub async fn probe_initialized(&mut self) -> Result<bool> {
        let node = &self.nodes[0];
        let client = &node.client;
        info!(address = %node.address, "Checking if vault is initialized");

        let initialized = retry_if(
            self.settings.probe,
            "probe-initialized",
            HarnessError::is_connectivity,
            || client.is_initialized(),
        )
        .await
        .map_err(|e| {
            if e.is_connectivity() {
                HarnessError::Unreachable {
                    address: node.address.clone(),
                    attempts: self.settings.probe.max_attempts,
                }
            } else {
                e
            }
        })?;

        self.advance(if initialized {
            RunState::Initialized
        } else {
            RunState::Uninitialized
        });
        Ok(initialized)
    }

    /// Initialize a fresh cluster or recover the material of an existing one.
    ///
    /// Fresh material is persisted before this returns, so nothing is ever
    /// unsealed with keys that exist only in memory.
    pub async fn initialize_or_recover(&mut self) -> Result<UnsealMaterial> {
        match self.state {
            RunState::Initialized => self.store.load(),
            RunState::Uninitialized => {
                if self.store.exists() {
                    warn!(
                        path = %self.store.path().display(),
                        "Cluster is uninitialized, replacing stale credential record"
                    );
                }

                self.store.ensure_writable()?;

                let node = &self.nodes[0];
                info!(
                    address = %node.address,
                    shares = self.settings.key_shares,
                    threshold = self.settings.key_threshold,
                    "Initializing vault"
                );

                let material = node
                    .client
                    .initialize(self.settings.key_shares, self.settings.key_threshold)
                    .await?;
                self.store.save(&material)?;

                info!(path = %self.store.path().display(), "Unseal material persisted");
                Ok(material)
            }
            state => Err(HarnessError::Config(format!(
                "cannot initialize or recover from state {}",
                state
            ))),
        }
    }

    /// Unseal every sealed node. All nodes finish before this returns.
    pub async fn unseal_all(&mut self, material: &UnsealMaterial) -> Result<()> {
        let shares = material.shares(self.settings.unseal_shares.max(1));
        if shares.is_empty() {
            return Err(HarnessError::Credentials(
                "unseal material holds no keys".to_string(),
            ));
        }

        try_join_all(self.nodes.iter().map(|node| unseal_node(node, shares))).await?;

        self.advance(RunState::Unsealed);
        Ok(())
    }

    /// Bind `token` to every node and confirm each node accepts it.
    pub async fn authenticate_all(&mut self, token: &str) -> Result<()> {
        for node in &mut self.nodes {
            node.client.set_token(token);
        }

        for node in &self.nodes {
            let client = &node.client;
            let accepted = retry_if(
                self.settings.auth,
                "check-authenticated",
                HarnessError::is_internal_server_error,
                || client.is_authenticated(),
            )
            .await?;

            if !accepted {
                return Err(HarnessError::NotAuthenticated(node.address.clone()));
            }
            debug!(address = %node.address, "Token accepted");
        }

        self.advance(RunState::Authenticated);
        Ok(())
    }

    /// Every node is unsealed and reports the cluster it belongs to.
    pub async fn verify_seal_status(&self) -> Result<()> {
        for node in &self.nodes {
            let status = node.client.seal_status().await?;

            if status.sealed {
                return Err(HarnessError::Seal {
                    address: node.address.clone(),
                    message: "node reports sealed".to_string(),
                });
            }
            if status.cluster_name.as_deref().unwrap_or_default().is_empty() {
                return Err(HarnessError::Seal {
                    address: node.address.clone(),
                    message: "node reports no cluster name".to_string(),
                });
            }
        }
        Ok(())
    }

    /// Exactly one leader, agreed on by every node. Returns the leader's
    /// node address.
    pub async fn verify_ha(&self) -> Result<String> {
        info!("Checking HA statuses");

        let mut statuses = Vec::with_capacity(self.nodes.len());
        for node in &self.nodes {
            statuses.push((node.address.clone(), node.client.ha_status().await?));
        }

        check_ha_statuses(&statuses)
    }

    /// Write a fresh value through each node in turn and require every node
    /// to read it back unchanged. Returns the last value written.
    pub async fn verify_consistency(&self) -> Result<String> {
        let path = self.settings.secret_path.as_str();
        let mut value = String::new();

        for writer in &self.nodes {
            value = uuid::Uuid::new_v4().to_string();
            info!(address = %writer.address, "Writing a secret");

            let mut fields = Map::new();
            fields.insert(CONSISTENCY_FIELD.to_string(), Value::from(value.as_str()));
            fields.insert("lease".to_string(), Value::from(self.settings.lease.as_str()));
            writer.client.write(path, &fields).await?;

            for reader in &self.nodes {
                info!(address = %reader.address, "Reading secret");
                let secret = reader.client.read(path).await?;
                let observed = secret.as_ref().and_then(|s| s.field(CONSISTENCY_FIELD));

                if observed != Some(value.as_str()) {
                    return Err(HarnessError::Consistency(format!(
                        "{} wrote {} to {} but {} read {:?}",
                        writer.address, value, path, reader.address, observed
                    )));
                }
            }
        }

        Ok(value)
    }

    /// Run the whole lifecycle.
    pub async fn run(mut self) -> Result<VerificationReport> {
        info!(
            address = %self.nodes[0].address,
            nodes = self.nodes.len(),
            "Picked node for performing unseal"
        );

        let initialized = self.probe_initialized().await?;
        let material = self.initialize_or_recover().await?;
        self.unseal_all(&material).await?;
        self.authenticate_all(&material.root_token).await?;
        self.verify_seal_status().await?;

        let leader_address = if self.nodes.len() > 1 {
            Some(self.verify_ha().await?)
        } else {
            None
        };

        let consistency_value = self.verify_consistency().await?;
        self.advance(RunState::Verified);

        Ok(VerificationReport {
            state: self.state(),
            nodes: self.nodes.iter().map(|n| n.address.clone()).collect(),
            initialized_cluster: !initialized,
            leader_address,
            consistency_value,
        })
    }
}

/// Submit shares to one node until it reports unsealed
async fn unseal_node<C: SecretsClient>(node: &ClusterNode<C>, shares: &[String]) -> Result<()> {
    if !node.client.is_sealed().await? {
        debug!(address = %node.address, "Already unsealed");
        return Ok(());
    }

    info!(address = %node.address, "Unsealing");
    let mut progress = 0;
    for key in shares {
        let status = node.client.unseal(key).await?;
        if !status.sealed {
            return Ok(());
        }
        progress = status.progress;
    }

    Err(HarnessError::Seal {
        address: node.address.clone(),
        message: format!(
            "still sealed after submitting {} shares (progress {})",
            shares.len(),
            progress
        ),
    })
}
