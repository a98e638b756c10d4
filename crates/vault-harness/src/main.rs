//! # vault-harness - Vault deployment verification
//!
//! Deploys the vault charm with its database (and, for HA, easyrsa + etcd)
//! into the current Juju model, then drives every vault unit through
//! initialization, unseal, authentication, HA and consistency checks.
//!
//! ## Flow
//! ```text
//! Juju model ──(unit addresses)──▶ ClusterVerifier ──▶ report
//!                                        │
//!                                 tests/data.yaml (unseal keys, root token)
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use harness_common::{HarnessError, VerificationReport};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod client;
mod config;
mod credentials;
mod deploy;
mod retry;
mod verifier;

#[cfg(test)]
mod testing;

use client::VaultHttpClient;
use config::AppConfig;
use credentials::CredentialStore;
use deploy::{DatabaseKind, DeploymentCoordinator, HaMode, JujuCli, Topology};
use verifier::{ClusterNode, ClusterVerifier};

/// Deploy vault with Juju and verify the running cluster
#[derive(Parser, Debug)]
#[command(name = "vault-harness")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "config/vault-harness.toml")]
    config: String,

    /// Database backend
    #[arg(short, long, value_enum, default_value_t = DatabaseKind::Postgresql)]
    database: DatabaseKind,

    /// HA backend
    #[arg(long, value_enum, default_value_t = HaMode::Disabled)]
    hamode: HaMode,

    /// Local vault charm directory (overrides config)
    #[arg(long, env = "VAULT_CHARM_DIR")]
    charm_dir: Option<PathBuf>,

    /// Credential record path (overrides config)
    #[arg(long, env = "VAULT_CREDENTIALS")]
    credentials: Option<PathBuf>,

    /// Verify these unit addresses instead of deploying
    #[arg(long, value_delimiter = ',')]
    units: Vec<String>,

    /// Juju model (overrides config, defaults to the current model)
    #[arg(short, long, env = "JUJU_MODEL")]
    model: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "LOG_LEVEL")]
    log_level: String,

    /// Enable JSON logging output
    #[arg(long, default_value = "false")]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // VAULT_CHARM_DIR and friends may come from .env
    dotenvy::dotenv().ok();

    // Parse CLI arguments
    let args = Args::parse();

    // Initialize logging
    init_logging(&args.log_level, args.json_logs)?;

    info!("🔐 Starting vault-harness v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = AppConfig::load(&args.config, &args)?;
    info!("📋 Configuration loaded from {}", args.config);

    let topology = Topology {
        database: args.database,
        ha: args.hamode,
    };

    let units = if args.units.is_empty() {
        deploy(&config, topology).await?
    } else {
        info!(units = ?args.units, "Skipping deployment, verifying given units");
        args.units.clone()
    };

    let report = verify(&config, &units).await?;

    info!(
        state = %report.state,
        nodes = ?report.nodes,
        leader = ?report.leader_address,
        value = %report.consistency_value,
        "✅ Cluster verified"
    );
    Ok(())
}

/// Converge the model and return the vault unit addresses
async fn deploy(config: &AppConfig, topology: Topology) -> Result<Vec<String>> {
    let settings = config.deploy_settings()?;
    info!(database = ?topology.database, ha = ?topology.ha, "🚀 Deploying");

    let juju = JujuCli::connect(
        config.juju.binary.clone(),
        config.juju.model.clone(),
        config.juju.relate_command.clone(),
    )
    .await
    .context("Failed to connect to Juju")?;

    DeploymentCoordinator::new(settings)
        .run(juju, topology)
        .await
        .context("Deployment failed")
}

async fn verify(config: &AppConfig, units: &[String]) -> Result<VerificationReport> {
    let mut nodes = Vec::with_capacity(units.len());
    for unit in units {
        let client = VaultHttpClient::for_unit(unit, config.vault_port, config.http_timeout())?;
        info!(address = %unit, url = %client.base_url(), "Creating client");
        nodes.push(ClusterNode::new(client));
    }

    let store = CredentialStore::new(&config.credentials_path);
    let verifier = ClusterVerifier::new(nodes, store, config.verifier_settings())?;

    verifier.run().await.map_err(verification_error)
}

/// Separate a misbehaving cluster from a run that could not finish
fn verification_error(e: HarnessError) -> anyhow::Error {
    if e.is_assertion() {
        error!(error = %e, "❌ Cluster failed verification");
        anyhow::Error::new(e).context("Cluster verification failed")
    } else {
        anyhow::Error::new(e).context("Could not complete verification")
    }
}

/// Initialize structured logging with tracing
fn init_logging(level: &str, json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_thread_ids(true))
            .init();
    }

    Ok(())
}
