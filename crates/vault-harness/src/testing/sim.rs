//! In-memory vault cluster with failure injection.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use harness_common::{HaStatus, HarnessError, Result, SealStatus, Secret, UnsealMaterial};
use serde_json::{Map, Value};

use crate::client::SecretsClient;

/// Failure a simulated node reports, mapped to an HTTP status
#[derive(Debug, Clone)]
pub struct SimError {
    pub status: u16,
    pub message: String,
}

impl SimError {
    fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

#[derive(Debug, Default)]
struct SimNode {
    sealed: bool,
    progress: Vec<String>,
    connect_failures: u32,
    auth_failures: u32,
    stale_reads: bool,
}

#[derive(Debug, Default)]
struct SimState {
    nodes: Vec<SimNode>,
    initialized: bool,
    keys: Vec<String>,
    threshold: u8,
    root_token: String,
    secrets: HashMap<String, Map<String, Value>>,
    leader: Option<usize>,
    split_brain: bool,
    init_calls: u32,
    unseal_calls: u32,
}

/// Shared handle to a simulated cluster
#[derive(Clone, Default)]
pub struct SimCluster {
    state: Arc<Mutex<SimState>>,
}

impl SimCluster {
    /// Fresh, uninitialized cluster of `nodes` sealed nodes
    pub fn new(nodes: usize) -> Self {
        let state = SimState {
            nodes: (0..nodes)
                .map(|_| SimNode {
                    sealed: true,
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Cluster that an earlier run already initialized with `material`
    pub fn initialized(nodes: usize, material: &UnsealMaterial, threshold: u8) -> Self {
        let cluster = Self::new(nodes);
        {
            let mut state = cluster.lock();
            state.initialized = true;
            state.keys = material.keys.clone();
            state.threshold = threshold;
            state.root_token = material.root_token.clone();
        }
        cluster
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap()
    }

    pub fn address(node: usize) -> String {
        format!("10.0.0.{}", node + 1)
    }

    /// Client bound directly to `node`
    pub fn client(&self, node: usize) -> SimClient {
        SimClient {
            cluster: self.clone(),
            node,
            address: Self::address(node),
            token: None,
        }
    }

    /// Pre-elect a leader
    pub fn elect(&self, node: usize) {
        self.lock().leader = Some(node);
    }

    /// Every node claims leadership
    pub fn split_brain(&self) {
        self.lock().split_brain = true;
    }

    /// Refuse the next `count` requests to `node` at the connection level
    pub fn refuse_connections(&self, node: usize, count: u32) {
        self.lock().nodes[node].connect_failures = count;
    }

    /// Answer the next `count` token checks on `node` with HTTP 500
    pub fn fail_auth_checks(&self, node: usize, count: u32) {
        self.lock().nodes[node].auth_failures = count;
    }

    /// `node` never sees replicated writes
    pub fn stale_reads(&self, node: usize) {
        self.lock().nodes[node].stale_reads = true;
    }

    pub fn init_calls(&self) -> u32 {
        self.lock().init_calls
    }

    pub fn unseal_calls(&self) -> u32 {
        self.lock().unseal_calls
    }

    pub fn is_sealed(&self, node: usize) -> bool {
        self.lock().nodes[node].sealed
    }

    fn take_connect_failure(&self, node: usize) -> bool {
        let mut state = self.lock();
        let n = &mut state.nodes[node];
        if n.connect_failures > 0 {
            n.connect_failures -= 1;
            true
        } else {
            false
        }
    }

    fn cluster_name(state: &SimState) -> String {
        let suffix: String = state.root_token.chars().rev().take(8).collect();
        format!("vault-cluster-{}", suffix)
    }

    fn ensure_unsealed(state: &SimState, node: usize) -> std::result::Result<(), SimError> {
        if state.nodes[node].sealed {
            return Err(SimError::new(503, "Vault is sealed"));
        }
        Ok(())
    }

    fn ensure_token(state: &SimState, token: Option<&str>) -> std::result::Result<(), SimError> {
        match token {
            Some(t) if t == state.root_token => Ok(()),
            _ => Err(SimError::new(403, "permission denied")),
        }
    }

    fn current_leader(state: &SimState) -> Option<usize> {
        state
            .leader
            .or_else(|| state.nodes.iter().position(|n| !n.sealed))
    }

    pub fn sim_is_initialized(&self) -> bool {
        self.lock().initialized
    }

    pub fn sim_initialize(
        &self,
        shares: u8,
        threshold: u8,
    ) -> std::result::Result<UnsealMaterial, SimError> {
        let mut state = self.lock();
        state.init_calls += 1;
        if state.initialized {
            return Err(SimError::new(400, "Vault is already initialized"));
        }
        if threshold == 0 || threshold > shares {
            return Err(SimError::new(400, "invalid seal configuration"));
        }

        let keys: Vec<String> = (0..shares)
            .map(|_| uuid::Uuid::new_v4().simple().to_string())
            .collect();
        let root_token = format!("s.{}", uuid::Uuid::new_v4().simple());

        state.initialized = true;
        state.keys = keys.clone();
        state.threshold = threshold;
        state.root_token = root_token.clone();

        Ok(UnsealMaterial {
            keys_base64: keys.clone(),
            keys,
            root_token,
        })
    }

    pub fn sim_seal_status(&self, node: usize) -> SealStatus {
        let state = self.lock();
        let n = &state.nodes[node];
        SealStatus {
            sealed: n.sealed,
            t: state.threshold,
            n: state.keys.len() as u8,
            progress: n.progress.len() as u8,
            cluster_name: (!n.sealed).then(|| Self::cluster_name(&state)),
        }
    }

    pub fn sim_unseal(&self, node: usize, key: &str) -> std::result::Result<SealStatus, SimError> {
        {
            let mut state = self.lock();
            state.unseal_calls += 1;
            if !state.initialized {
                return Err(SimError::new(400, "Vault is not initialized"));
            }
            if !state.keys.iter().any(|k| k == key) {
                return Err(SimError::new(400, "invalid key"));
            }

            let threshold = state.threshold as usize;
            let n = &mut state.nodes[node];
            if n.sealed {
                if !n.progress.iter().any(|k| k == key) {
                    n.progress.push(key.to_string());
                }
                if n.progress.len() >= threshold {
                    n.sealed = false;
                    n.progress.clear();
                }
            }
        }
        Ok(self.sim_seal_status(node))
    }

    pub fn sim_is_authenticated(
        &self,
        node: usize,
        token: Option<&str>,
    ) -> std::result::Result<bool, SimError> {
        let mut state = self.lock();
        Self::ensure_unsealed(&state, node)?;
        let n = &mut state.nodes[node];
        if n.auth_failures > 0 {
            n.auth_failures -= 1;
            return Err(SimError::new(
                500,
                "local node not active but active cluster node not found",
            ));
        }
        Ok(Self::ensure_token(&state, token).is_ok())
    }

    pub fn sim_read(
        &self,
        node: usize,
        token: Option<&str>,
        path: &str,
    ) -> std::result::Result<Option<Secret>, SimError> {
        let state = self.lock();
        Self::ensure_unsealed(&state, node)?;
        Self::ensure_token(&state, token)?;
        if state.nodes[node].stale_reads {
            return Ok(None);
        }

        Ok(state.secrets.get(path).map(|data| {
            let lease_duration = match data.get("lease").and_then(|v| v.as_str()) {
                Some("1h") => 3600,
                _ => 2_764_800,
            };
            Secret {
                data: data.clone(),
                lease_duration,
            }
        }))
    }

    pub fn sim_write(
        &self,
        node: usize,
        token: Option<&str>,
        path: &str,
        fields: &Map<String, Value>,
    ) -> std::result::Result<(), SimError> {
        let mut state = self.lock();
        Self::ensure_unsealed(&state, node)?;
        Self::ensure_token(&state, token)?;
        state.secrets.insert(path.to_string(), fields.clone());
        Ok(())
    }

    pub fn sim_ha_status(&self, node: usize) -> HaStatus {
        let state = self.lock();
        let ha_enabled = state.nodes.len() > 1;
        let leader = Self::current_leader(&state);

        let (leader_address, leader_cluster_address) = match leader {
            Some(l) => (
                format!("http://{}:8200", Self::address(l)),
                format!("https://{}:8201", Self::address(l)),
            ),
            None => (String::new(), String::new()),
        };

        HaStatus {
            ha_enabled,
            is_self: state.split_brain || leader == Some(node),
            leader_address,
            leader_cluster_address,
        }
    }
}

/// `SecretsClient` that talks to a `SimCluster` without any network
pub struct SimClient {
    cluster: SimCluster,
    node: usize,
    address: String,
    token: Option<String>,
}

impl SimClient {
    fn connect(&self) -> Result<()> {
        if self.cluster.take_connect_failure(self.node) {
            return Err(HarnessError::connection(
                &self.address,
                "Connection refused (os error 111)",
            ));
        }
        Ok(())
    }

    fn server_error(&self, e: SimError) -> HarnessError {
        HarnessError::Server {
            address: self.address.clone(),
            status: e.status,
            message: e.message,
        }
    }
}

impl SecretsClient for SimClient {
    fn address(&self) -> &str {
        &self.address
    }

    async fn is_initialized(&self) -> Result<bool> {
        self.connect()?;
        Ok(self.cluster.sim_is_initialized())
    }

    async fn initialize(&self, shares: u8, threshold: u8) -> Result<UnsealMaterial> {
        self.connect()?;
        self.cluster
            .sim_initialize(shares, threshold)
            .map_err(|e| self.server_error(e))
    }

    async fn seal_status(&self) -> Result<SealStatus> {
        self.connect()?;
        Ok(self.cluster.sim_seal_status(self.node))
    }

    async fn unseal(&self, key: &str) -> Result<SealStatus> {
        self.connect()?;
        self.cluster
            .sim_unseal(self.node, key)
            .map_err(|e| self.server_error(e))
    }

    fn set_token(&mut self, token: &str) {
        self.token = Some(token.to_string());
    }

    async fn is_authenticated(&self) -> Result<bool> {
        self.connect()?;
        self.cluster
            .sim_is_authenticated(self.node, self.token.as_deref())
            .map_err(|e| self.server_error(e))
    }

    async fn read(&self, path: &str) -> Result<Option<Secret>> {
        self.connect()?;
        self.cluster
            .sim_read(self.node, self.token.as_deref(), path)
            .map_err(|e| self.server_error(e))
    }

    async fn write(&self, path: &str, fields: &Map<String, Value>) -> Result<()> {
        self.connect()?;
        self.cluster
            .sim_write(self.node, self.token.as_deref(), path, fields)
            .map_err(|e| self.server_error(e))
    }

    async fn ha_status(&self) -> Result<HaStatus> {
        self.connect()?;
        Ok(self.cluster.sim_ha_status(self.node))
    }
}
