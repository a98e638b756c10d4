//! Deployment coordinator.
//!
//! Converges the current Juju model on the requested topology and hands back
//! the addresses of the vault units:
//! - vault (local charm) and its database, related to each other
//! - for HA: easyrsa and etcd, related to each other and to vault, and vault
//!   scaled to three units
//!
//! Every step is idempotent, so re-running against a deployed model only
//! waits for it to settle. The orchestrator connection is released on every
//! exit path.

mod juju;
pub(crate) mod status;
mod topology;

use std::path::PathBuf;
use std::time::{Duration, Instant};

use harness_common::constants::{
    DEFAULT_DEPLOY_POLL_SECS, DEFAULT_DEPLOY_TIMEOUT_SECS, DEFAULT_SERIES, apps,
    status::ACTIVE,
};
use harness_common::{HarnessError, Result};
use tracing::{info, warn};

pub use juju::{AppSpec, JujuCli, Orchestrator};
pub use status::ModelStatus;
pub use topology::{DatabaseKind, HaMode, Topology};

/// Tunables for the coordinator
#[derive(Debug, Clone)]
pub struct DeploySettings {
    /// Local vault charm directory
    pub charm_dir: PathBuf,
    pub series: String,
    pub easyrsa_charm: String,
    /// Upper bound on waiting for the model to settle
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl DeploySettings {
    pub fn new(charm_dir: impl Into<PathBuf>) -> Self {
        Self {
            charm_dir: charm_dir.into(),
            series: DEFAULT_SERIES.to_string(),
            easyrsa_charm: apps::EASYRSA_CHARM.to_string(),
            timeout: Duration::from_secs(DEFAULT_DEPLOY_TIMEOUT_SECS),
            poll_interval: Duration::from_secs(DEFAULT_DEPLOY_POLL_SECS),
        }
    }
}

/// Brings a model to the requested topology
pub struct DeploymentCoordinator {
    settings: DeploySettings,
}

impl DeploymentCoordinator {
    pub fn new(settings: DeploySettings) -> Self {
        Self { settings }
    }

    /// Converge the model, then release `orchestrator` whatever the outcome.
    ///
    /// Returns the public addresses of the vault units, in unit order.
    pub async fn run<O: Orchestrator>(
        &self,
        orchestrator: O,
        topology: Topology,
    ) -> Result<Vec<String>> {
        let result = self.converge(&orchestrator, topology).await;
        let released = orchestrator.disconnect().await;

        if let Err(ref e) = result {
            warn!(error = %e, "Deployment failed");
        }

        let addresses = result?;
        released?;
        Ok(addresses)
    }

    async fn converge<O: Orchestrator>(
        &self,
        orchestrator: &O,
        topology: Topology,
    ) -> Result<Vec<String>> {
        let database = topology.database;
        let status = orchestrator.status().await?;

        self.ensure_app(orchestrator, &status, &self.vault_spec()).await?;
        self.ensure_app(
            orchestrator,
            &status,
            &AppSpec::new(database.app_name(), database.app_name(), &self.settings.series),
        )
        .await?;
        ensure_relation(
            orchestrator,
            &status,
            apps::VAULT,
            database.vault_endpoint(),
            &database.db_endpoint(),
        )
        .await?;

        if topology.is_ha() {
            self.ensure_ha(orchestrator, &status).await?;
        }

        let settled = self
            .wait_until_settled(orchestrator, &[apps::VAULT, database.app_name()])
            .await?;

        let mut addresses = settled.unit_addresses(apps::VAULT);
        let wanted = topology.vault_units();
        if addresses.len() < wanted {
            return Err(HarnessError::orchestration(format!(
                "expected {} vault units with addresses, found {}",
                wanted,
                addresses.len()
            )));
        }
        addresses.truncate(wanted);

        info!(units = ?addresses, "✅ Deployment settled");
        Ok(addresses)
    }

    fn vault_spec(&self) -> AppSpec {
        AppSpec::new(
            apps::VAULT,
            self.settings.charm_dir.display().to_string(),
            &self.settings.series,
        )
        .with_config("disable-mlock", "true")
    }

    async fn ensure_app<O: Orchestrator>(
        &self,
        orchestrator: &O,
        status: &ModelStatus,
        spec: &AppSpec,
    ) -> Result<()> {
        if status.has_application(&spec.name) {
            info!(app = %spec.name, "Application already deployed");
            return Ok(());
        }
        orchestrator.deploy(spec).await
    }

    async fn ensure_ha<O: Orchestrator>(
        &self,
        orchestrator: &O,
        status: &ModelStatus,
    ) -> Result<()> {
        let series = &self.settings.series;

        self.ensure_app(
            orchestrator,
            status,
            &AppSpec::new(apps::EASYRSA, &self.settings.easyrsa_charm, series),
        )
        .await?;
        self.ensure_app(
            orchestrator,
            status,
            &AppSpec::new(apps::ETCD, apps::ETCD, series)
                .with_config("channel", apps::ETCD_CHANNEL),
        )
        .await?;

        ensure_relation(orchestrator, status, apps::ETCD, "certificates", "easyrsa:client").await?;
        ensure_relation(orchestrator, status, apps::ETCD, "db", "vault:etcd").await?;

        // Unit counts must reflect any vault deployed above
        let current = orchestrator.status().await?.unit_count(apps::VAULT);
        let wanted = harness_common::constants::HA_UNIT_COUNT;
        if current < wanted {
            orchestrator.add_units(apps::VAULT, wanted - current).await?;
        } else {
            info!(units = current, "Vault already scaled");
        }

        Ok(())
    }

    /// Poll until every app in `app_names` is active and all units are idle.
    async fn wait_until_settled<O: Orchestrator>(
        &self,
        orchestrator: &O,
        app_names: &[&str],
    ) -> Result<ModelStatus> {
        let start = Instant::now();
        info!(apps = ?app_names, "⏳ Waiting for model to settle");

        loop {
            match orchestrator.status().await {
                Ok(status) => {
                    let active = app_names
                        .iter()
                        .all(|app| status.application_status(app) == Some(ACTIVE));
                    if active && status.all_units_idle() {
                        return Ok(status);
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Status poll failed, retrying");
                }
            }

            if start.elapsed() >= self.settings.timeout {
                return Err(HarnessError::Timeout(format!(
                    "model did not settle within {:?}",
                    self.settings.timeout
                )));
            }

            tokio::time::sleep(self.settings.poll_interval).await;
        }
    }
}

/// Relate unless `app:endpoint` is already related to the remote application
async fn ensure_relation<O: Orchestrator>(
    orchestrator: &O,
    status: &ModelStatus,
    app: &str,
    endpoint: &str,
    remote_endpoint: &str,
) -> Result<()> {
    let remote_app = remote_endpoint.split(':').next().unwrap_or(remote_endpoint);
    if status.has_relation(app, endpoint, remote_app) {
        info!(
            app = %app,
            endpoint = %endpoint,
            remote = %remote_endpoint,
            "Relation already present"
        );
        return Ok(());
    }
    orchestrator.add_relation(app, endpoint, remote_endpoint).await
}
