//! Secrets-service client contract.
//!
//! The verifier drives nodes only through [`SecretsClient`], so the same state
//! machine runs against real vault units and the simulated cluster in tests.

use std::future::Future;

use harness_common::{HaStatus, Result, SealStatus, Secret, UnsealMaterial};
use serde_json::{Map, Value};

mod http;

pub use http::VaultHttpClient;

/// Operations the verifier needs from one secrets-service node
pub trait SecretsClient: Send + Sync {
    /// Address this client is bound to (used in logs and errors)
    fn address(&self) -> &str;

    /// Has the cluster been initialized?
    fn is_initialized(&self) -> impl Future<Output = Result<bool>> + Send;

    /// Initialize the cluster, returning the only copy of its unseal material
    fn initialize(
        &self,
        shares: u8,
        threshold: u8,
    ) -> impl Future<Output = Result<UnsealMaterial>> + Send;

    /// Current seal state of this node
    fn seal_status(&self) -> impl Future<Output = Result<SealStatus>> + Send;

    /// Is this node sealed?
    fn is_sealed(&self) -> impl Future<Output = Result<bool>> + Send {
        async move { Ok(self.seal_status().await?.sealed) }
    }

    /// Submit one key share
    fn unseal(&self, key: &str) -> impl Future<Output = Result<SealStatus>> + Send;

    /// Bind a token to every subsequent request
    fn set_token(&mut self, token: &str);

    /// Does the node accept the bound token?
    fn is_authenticated(&self) -> impl Future<Output = Result<bool>> + Send;

    /// Read a logical path; `None` when nothing is stored there
    fn read(&self, path: &str) -> impl Future<Output = Result<Option<Secret>>> + Send;

    /// Write fields to a logical path
    fn write(
        &self,
        path: &str,
        fields: &Map<String, Value>,
    ) -> impl Future<Output = Result<()>> + Send;

    /// HA leadership as seen by this node
    fn ha_status(&self) -> impl Future<Output = Result<HaStatus>> + Send;
}
