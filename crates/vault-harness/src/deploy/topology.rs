//! Deployment topology: which database backs vault and whether HA is on.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Database application vault stores its data in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseKind {
    Mysql,
    #[default]
    Postgresql,
}

impl DatabaseKind {
    /// Application and charm name
    pub fn app_name(&self) -> &'static str {
        match self {
            Self::Mysql => "mysql",
            Self::Postgresql => "postgresql",
        }
    }

    /// Endpoint on the vault side of the database relation
    pub fn vault_endpoint(&self) -> &'static str {
        match self {
            Self::Mysql => "shared-db",
            Self::Postgresql => "db",
        }
    }

    /// `app:endpoint` on the database side of the relation
    pub fn db_endpoint(&self) -> String {
        match self {
            Self::Mysql => "mysql:shared-db".to_string(),
            Self::Postgresql => "postgresql:db".to_string(),
        }
    }
}

/// HA backend for vault
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum HaMode {
    /// etcd coordination store with an easyrsa CA, three vault units
    Etcd,
    /// Single vault unit
    #[default]
    #[value(name = "none")]
    #[serde(rename = "none")]
    Disabled,
}

/// Desired shape of the model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Topology {
    pub database: DatabaseKind,
    pub ha: HaMode,
}

impl Topology {
    pub fn is_ha(&self) -> bool {
        self.ha == HaMode::Etcd
    }

    /// Number of vault units the verifier should be handed
    pub fn vault_units(&self) -> usize {
        if self.is_ha() {
            harness_common::constants::HA_UNIT_COUNT
        } else {
            1
        }
    }
}
