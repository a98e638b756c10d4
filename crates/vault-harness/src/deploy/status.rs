//! Parsed `juju status --format=json` output.
//!
//! Only the fields the coordinator needs are modelled. Relations are accepted
//! in both the Juju 2.x shape (`{"db": ["postgresql"]}`) and the 3.x shape
//! (`{"db": [{"related-application": "postgresql", ...}]}`).

use std::collections::BTreeMap;

use harness_common::constants::status::IDLE;
use serde::{Deserialize, Serialize};

/// Snapshot of the current model
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelStatus {
    #[serde(default)]
    pub applications: BTreeMap<String, ApplicationStatus>,
}

/// `current` / `message` pair used for every status field
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatusInfo {
    #[serde(default)]
    pub current: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApplicationStatus {
    #[serde(rename = "application-status", default)]
    pub application_status: StatusInfo,

    /// Local endpoint name -> related applications
    #[serde(default)]
    pub relations: BTreeMap<String, Vec<RelatedApplication>>,

    #[serde(default)]
    pub units: BTreeMap<String, UnitStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RelatedApplication {
    Name(String),
    Detailed {
        #[serde(rename = "related-application")]
        related_application: String,
    },
}

impl RelatedApplication {
    pub fn name(&self) -> &str {
        match self {
            Self::Name(name) => name,
            Self::Detailed {
                related_application,
            } => related_application,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UnitStatus {
    #[serde(rename = "workload-status", default)]
    pub workload_status: StatusInfo,

    /// Agent status; `idle` when the unit has no pending hooks
    #[serde(rename = "juju-status", default)]
    pub juju_status: StatusInfo,

    #[serde(rename = "public-address", default, skip_serializing_if = "Option::is_none")]
    pub public_address: Option<String>,
}

impl ModelStatus {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn has_application(&self, app: &str) -> bool {
        self.applications.contains_key(app)
    }

    pub fn application_status(&self, app: &str) -> Option<&str> {
        self.applications
            .get(app)
            .map(|a| a.application_status.current.as_str())
    }

    /// Does `app` already relate `endpoint` to `remote_app`?
    pub fn has_relation(&self, app: &str, endpoint: &str, remote_app: &str) -> bool {
        self.applications
            .get(app)
            .and_then(|a| a.relations.get(endpoint))
            .is_some_and(|related| related.iter().any(|r| r.name() == remote_app))
    }

    pub fn unit_count(&self, app: &str) -> usize {
        self.applications.get(app).map_or(0, |a| a.units.len())
    }

    /// True when every unit in the model has an idle agent
    pub fn all_units_idle(&self) -> bool {
        self.applications
            .values()
            .flat_map(|a| a.units.values())
            .all(|u| u.juju_status.current == IDLE)
    }

    /// Public addresses of `app`'s units, ordered by unit number
    pub fn unit_addresses(&self, app: &str) -> Vec<String> {
        let Some(application) = self.applications.get(app) else {
            return Vec::new();
        };

        let mut units: Vec<(u32, &UnitStatus)> = application
            .units
            .iter()
            .map(|(name, unit)| (unit_number(name), unit))
            .collect();
        units.sort_by_key(|(n, _)| *n);

        units
            .into_iter()
            .filter_map(|(_, u)| u.public_address.clone())
            .collect()
    }
}

/// `vault/12` -> 12
fn unit_number(unit: &str) -> u32 {
    unit.rsplit('/')
        .next()
        .and_then(|n| n.parse().ok())
        .unwrap_or(u32::MAX)
}
