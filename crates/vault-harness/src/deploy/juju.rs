//! Juju orchestrator access.
//!
//! `JujuCli` drives the `juju` client binary against the current (or a named)
//! model. Each call runs one command and returns its stdout; a non-zero exit
//! status becomes `HarnessError::Orchestration` carrying stderr.

use std::collections::BTreeMap;
use std::future::Future;

use harness_common::{HarnessError, Result};
use tokio::process::Command;
use tracing::{debug, info};

use super::status::ModelStatus;

/// Application to deploy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppSpec {
    /// Application name in the model
    pub name: String,
    /// Store charm name or local charm directory
    pub charm: String,
    pub series: String,
    /// Charm configuration (`--config key=value`)
    pub config: BTreeMap<String, String>,
}

impl AppSpec {
    pub fn new(
        name: impl Into<String>,
        charm: impl Into<String>,
        series: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            charm: charm.into(),
            series: series.into(),
            config: BTreeMap::new(),
        }
    }

    pub fn with_config(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.insert(key.into(), value.into());
        self
    }
}

/// Operations the deployment coordinator needs from the orchestrator
pub trait Orchestrator: Send + Sync {
    /// Current model status
    fn status(&self) -> impl Future<Output = Result<ModelStatus>> + Send;

    /// Deploy an application
    fn deploy(&self, spec: &AppSpec) -> impl Future<Output = Result<()>> + Send;

    /// Relate `app:local_endpoint` to `remote_endpoint` (`app:endpoint`)
    fn add_relation(
        &self,
        app: &str,
        local_endpoint: &str,
        remote_endpoint: &str,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Add `count` units to `app`
    fn add_units(&self, app: &str, count: usize) -> impl Future<Output = Result<()>> + Send;

    /// Release the connection
    fn disconnect(self) -> impl Future<Output = Result<()>> + Send;
}

/// Orchestrator backed by the `juju` command line client
#[derive(Debug, Clone)]
pub struct JujuCli {
    binary: String,
    model: Option<String>,
    relate_command: String,
}

impl JujuCli {
    /// Check the controller answers for the model and return a handle to it
    pub async fn connect(
        binary: impl Into<String>,
        model: Option<String>,
        relate_command: impl Into<String>,
    ) -> Result<Self> {
        let cli = Self {
            binary: binary.into(),
            model,
            relate_command: relate_command.into(),
        };

        let output = cli.run("show-model", &["--format=json".to_string()]).await?;
        let name = parse_model_name(&output)?;
        info!(model = %name, "🔌 Connected to Juju model");

        Ok(cli)
    }

    async fn run(&self, subcommand: &str, args: &[String]) -> Result<String> {
        let argv = command_args(subcommand, self.model.as_deref(), args);
        debug!(binary = %self.binary, args = ?argv, "Running juju");

        let output = Command::new(&self.binary)
            .args(&argv)
            .output()
            .await
            .map_err(|e| {
                HarnessError::orchestration(format!("Failed to run {}: {}", self.binary, e))
            })?;

        if !output.status.success() {
            return Err(HarnessError::orchestration(format!(
                "juju {} failed ({}): {}",
                subcommand,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl Orchestrator for JujuCli {
    async fn status(&self) -> Result<ModelStatus> {
        let output = self.run("status", &["--format=json".to_string()]).await?;
        ModelStatus::from_json(&output)
            .map_err(|e| HarnessError::orchestration(format!("Unparsable juju status: {}", e)))
    }

    async fn deploy(&self, spec: &AppSpec) -> Result<()> {
        info!(app = %spec.name, charm = %spec.charm, "Deploying application");
        self.run("deploy", &deploy_args(spec)).await?;
        Ok(())
    }

    async fn add_relation(
        &self,
        app: &str,
        local_endpoint: &str,
        remote_endpoint: &str,
    ) -> Result<()> {
        let local = format!("{}:{}", app, local_endpoint);
        info!(local = %local, remote = %remote_endpoint, "Adding relation");
        self.run(&self.relate_command, &[local, remote_endpoint.to_string()]).await?;
        Ok(())
    }

    async fn add_units(&self, app: &str, count: usize) -> Result<()> {
        info!(app = %app, count = count, "Adding units");
        self.run("add-unit", &[app.to_string(), "-n".to_string(), count.to_string()])
            .await?;
        Ok(())
    }

    async fn disconnect(self) -> Result<()> {
        info!("🔌 Disconnected from Juju model");
        Ok(())
    }
}

/// `juju <subcommand> [-m model] args...`
fn command_args(subcommand: &str, model: Option<&str>, args: &[String]) -> Vec<String> {
    let mut argv = vec![subcommand.to_string()];
    if let Some(model) = model {
        argv.push("-m".to_string());
        argv.push(model.to_string());
    }
    argv.extend(args.iter().cloned());
    argv
}

fn deploy_args(spec: &AppSpec) -> Vec<String> {
    let mut args = vec![
        spec.charm.clone(),
        spec.name.clone(),
        "--series".to_string(),
        spec.series.clone(),
    ];
    for (key, value) in &spec.config {
        args.push("--config".to_string());
        args.push(format!("{}={}", key, value));
    }
    args
}

/// `show-model` prints `{"<name>": {...}}`
fn parse_model_name(output: &str) -> Result<String> {
    let value: serde_json::Value = serde_json::from_str(output)
        .map_err(|e| HarnessError::orchestration(format!("Unparsable show-model output: {}", e)))?;

    value
        .as_object()
        .and_then(|models| models.keys().next().cloned())
        .ok_or_else(|| HarnessError::orchestration("No current model"))
}
