//! HA leadership invariant.

use harness_common::{HaStatus, HarnessError, Result};
use std::collections::BTreeSet;
use tracing::info;

/// Check the per-node HA views of a cluster.
///
/// Every node must have HA enabled, exactly one node must claim leadership, and
/// all nodes must agree on the leader's API and cluster addresses. Returns the
/// address of the node that claims leadership.
pub fn check_ha_statuses(statuses: &[(String, HaStatus)]) -> Result<String> {
    let mut leaders = Vec::new();
    let mut leader_addresses = BTreeSet::new();
    let mut leader_cluster_addresses = BTreeSet::new();

    for (address, status) in statuses {
        if !status.ha_enabled {
            return Err(HarnessError::HaViolation(format!(
                "{} reports HA disabled",
                address
            )));
        }

        leader_addresses.insert(status.leader_address.as_str());
        leader_cluster_addresses.insert(status.leader_cluster_address.as_str());

        if status.is_self {
            info!(address = %address, "is leader");
            leaders.push(address.as_str());
        } else {
            info!(address = %address, "is standby");
        }
    }

    if leaders.len() != 1 {
        return Err(HarnessError::HaViolation(format!(
            "expected exactly one leader, found {} ({:?})",
            leaders.len(),
            leaders
        )));
    }
    if leader_addresses.len() != 1 {
        return Err(HarnessError::HaViolation(format!(
            "nodes disagree on leader address: {:?}",
            leader_addresses
        )));
    }
    if leader_cluster_addresses.len() != 1 {
        return Err(HarnessError::HaViolation(format!(
            "nodes disagree on leader cluster address: {:?}",
            leader_cluster_addresses
        )));
    }

    Ok(leaders[0].to_string())
}
