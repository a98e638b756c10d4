//! Configuration management for the harness.

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use harness_common::constants::{
    AUTH_BACKOFF_SECS, AUTH_MAX_ATTEMPTS, CONSISTENCY_LEASE, CONSISTENCY_SECRET_PATH,
    DEFAULT_CREDENTIALS_FILE, DEFAULT_DEPLOY_POLL_SECS, DEFAULT_DEPLOY_TIMEOUT_SECS,
    DEFAULT_HTTP_TIMEOUT_SECS, DEFAULT_KEY_SHARES, DEFAULT_KEY_THRESHOLD, DEFAULT_SERIES,
    DEFAULT_VAULT_PORT, PROBE_BACKOFF_SECS, PROBE_MAX_ATTEMPTS, apps,
};

use crate::deploy::DeploySettings;
use crate::retry::RetryPolicy;
use crate::verifier::VerifierSettings;

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Local vault charm directory (required unless units are given)
    #[serde(default)]
    pub charm_dir: Option<PathBuf>,

    /// Series for every deployed application
    #[serde(default = "default_series")]
    pub series: String,

    /// Vault API port on each unit
    #[serde(default = "default_vault_port")]
    pub vault_port: u16,

    /// Credential record path
    #[serde(default = "default_credentials_path")]
    pub credentials_path: PathBuf,

    /// Per-request timeout for the vault client
    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,

    /// Juju client configuration
    #[serde(default)]
    pub juju: JujuConfig,

    /// Unseal and retry configuration
    #[serde(default)]
    pub unseal: UnsealConfig,

    /// Consistency check configuration
    #[serde(default)]
    pub consistency: ConsistencyConfig,
}

/// Juju-specific configuration
#[derive(Debug, Clone, Deserialize)]
pub struct JujuConfig {
    /// Path or name of the juju binary
    #[serde(default = "default_juju_binary")]
    pub binary: String,

    /// Model to use (current model if unset)
    #[serde(default)]
    pub model: Option<String>,

    /// `add-relation` on Juju 2.x, `integrate` on 3.x
    #[serde(default = "default_relate_command")]
    pub relate_command: String,

    #[serde(default = "default_easyrsa_charm")]
    pub easyrsa_charm: String,

    /// Upper bound on waiting for the model to settle
    #[serde(default = "default_deploy_timeout")]
    pub deploy_timeout_secs: u64,

    /// Interval between status polls
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
}

impl Default for JujuConfig {
    fn default() -> Self {
        Self {
            binary: default_juju_binary(),
            model: None,
            relate_command: default_relate_command(),
            easyrsa_charm: default_easyrsa_charm(),
            deploy_timeout_secs: default_deploy_timeout(),
            poll_interval_secs: default_poll_interval(),
        }
    }
}

/// Unseal-specific configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UnsealConfig {
    /// Key shares requested at initialization
    #[serde(default = "default_key_shares")]
    pub key_shares: u8,

    /// Shares required to unseal
    #[serde(default = "default_key_threshold")]
    pub key_threshold: u8,

    /// Shares submitted per sealed node (defaults to the threshold)
    #[serde(default)]
    pub shares_per_node: Option<usize>,

    #[serde(default = "default_probe_attempts")]
    pub probe_attempts: u32,

    #[serde(default = "default_probe_backoff")]
    pub probe_backoff_secs: u64,

    #[serde(default = "default_auth_attempts")]
    pub auth_attempts: u32,

    #[serde(default = "default_auth_backoff")]
    pub auth_backoff_secs: u64,
}

impl Default for UnsealConfig {
    fn default() -> Self {
        Self {
            key_shares: default_key_shares(),
            key_threshold: default_key_threshold(),
            shares_per_node: None,
            probe_attempts: default_probe_attempts(),
            probe_backoff_secs: default_probe_backoff(),
            auth_attempts: default_auth_attempts(),
            auth_backoff_secs: default_auth_backoff(),
        }
    }
}

/// Consistency check configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ConsistencyConfig {
    #[serde(default = "default_secret_path")]
    pub secret_path: String,

    #[serde(default = "default_lease")]
    pub lease: String,
}

impl Default for ConsistencyConfig {
    fn default() -> Self {
        Self {
            secret_path: default_secret_path(),
            lease: default_lease(),
        }
    }
}

// Default value functions
fn default_series() -> String { DEFAULT_SERIES.to_string() }
fn default_vault_port() -> u16 { DEFAULT_VAULT_PORT }
fn default_credentials_path() -> PathBuf { PathBuf::from(DEFAULT_CREDENTIALS_FILE) }
fn default_http_timeout() -> u64 { DEFAULT_HTTP_TIMEOUT_SECS }
fn default_juju_binary() -> String { "juju".to_string() }
fn default_relate_command() -> String { "add-relation".to_string() }
fn default_easyrsa_charm() -> String { apps::EASYRSA_CHARM.to_string() }
fn default_deploy_timeout() -> u64 { DEFAULT_DEPLOY_TIMEOUT_SECS }
fn default_poll_interval() -> u64 { DEFAULT_DEPLOY_POLL_SECS }
fn default_key_shares() -> u8 { DEFAULT_KEY_SHARES }
fn default_key_threshold() -> u8 { DEFAULT_KEY_THRESHOLD }
fn default_probe_attempts() -> u32 { PROBE_MAX_ATTEMPTS }
fn default_probe_backoff() -> u64 { PROBE_BACKOFF_SECS }
fn default_auth_attempts() -> u32 { AUTH_MAX_ATTEMPTS }
fn default_auth_backoff() -> u64 { AUTH_BACKOFF_SECS }
fn default_secret_path() -> String { CONSISTENCY_SECRET_PATH.to_string() }
fn default_lease() -> String { CONSISTENCY_LEASE.to_string() }

impl AppConfig {
    /// Load configuration from file, with CLI overrides
    pub fn load(config_path: &str, args: &super::Args) -> Result<Self> {
        let mut config = Self::from_file(config_path)?;

        // Apply CLI overrides
        if let Some(ref charm_dir) = args.charm_dir {
            config.charm_dir = Some(charm_dir.clone());
        }
        if let Some(ref credentials) = args.credentials {
            config.credentials_path = credentials.clone();
        }
        if let Some(ref model) = args.model {
            config.juju.model = Some(model.clone());
        }

        Ok(config)
    }

    fn from_file(config_path: &str) -> Result<Self> {
        if !Path::new(config_path).exists() {
            // Use defaults if config file doesn't exist
            tracing::warn!(path = %config_path, "Config file not found, using defaults");
            return Ok(Self::default());
        }

        let settings = config::Config::builder()
            .add_source(config::File::with_name(config_path))
            .build()
            .context("Failed to load config file")?;

        settings
            .try_deserialize()
            .context("Failed to parse config")
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn verifier_settings(&self) -> VerifierSettings {
        let unseal = &self.unseal;
        VerifierSettings {
            key_shares: unseal.key_shares,
            key_threshold: unseal.key_threshold,
            unseal_shares: unseal
                .shares_per_node
                .unwrap_or(unseal.key_threshold as usize),
            probe: RetryPolicy::new(
                unseal.probe_attempts,
                Duration::from_secs(unseal.probe_backoff_secs),
            ),
            auth: RetryPolicy::new(
                unseal.auth_attempts,
                Duration::from_secs(unseal.auth_backoff_secs),
            ),
            secret_path: self.consistency.secret_path.clone(),
            lease: self.consistency.lease.clone(),
        }
    }

    pub fn deploy_settings(&self) -> Result<DeploySettings> {
        let Some(ref charm_dir) = self.charm_dir else {
            bail!(
                "Please set the environment variable VAULT_CHARM_DIR to point at the local charm"
            );
        };

        Ok(DeploySettings {
            series: self.series.clone(),
            easyrsa_charm: self.juju.easyrsa_charm.clone(),
            timeout: Duration::from_secs(self.juju.deploy_timeout_secs),
            poll_interval: Duration::from_secs(self.juju.poll_interval_secs),
            ..DeploySettings::new(charm_dir)
        })
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            charm_dir: None,
            series: default_series(),
            vault_port: default_vault_port(),
            credentials_path: default_credentials_path(),
            http_timeout_secs: default_http_timeout(),
            juju: JujuConfig::default(),
            unseal: UnsealConfig::default(),
            consistency: ConsistencyConfig::default(),
        }
    }
}
