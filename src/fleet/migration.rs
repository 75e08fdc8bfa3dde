//! Legacy per-agent addressing
//!
//! Older deployments gave each agent its own block in `Agent.subnet` and
//! addressed the agent at `.100` of it. Tunnels now carry their own blocks;
//! this module only backfills `virtualIp` for agents still on the old scheme.

use crate::fleet::Fleet;
use crate::ipam::{agent_host, AddressBlock};
use chrono::Utc;
use serde::Serialize;
use std::net::Ipv4Addr;
use tracing::{info, warn};

/// Virtual address derived for one agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VirtualIpUpdate {
    /// Agent id
    pub agent_id: String,
    /// Agent name
    pub agent_name: String,
    /// Previously stored value
    pub previous: Option<String>,
    /// Derived address
    pub virtual_ip: Ipv4Addr,
}

/// Agent left untouched
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedAgent {
    /// Agent id
    pub agent_id: String,
    /// Why the agent was skipped
    pub reason: String,
}

/// Result of a backfill pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    /// Agents whose `virtualIp` changes
    pub updates: Vec<VirtualIpUpdate>,
    /// Agents without a usable legacy block
    pub skipped: Vec<SkippedAgent>,
}

impl MigrationReport {
    /// Write the derived addresses into `fleet`
    pub fn apply(&self, fleet: &mut Fleet) -> usize {
        let now = Utc::now();
        let mut applied = 0;

        for update in &self.updates {
            if let Some(agent) = fleet.agents.iter_mut().find(|a| a.id == update.agent_id) {
                agent.virtual_ip = Some(update.virtual_ip.to_string());
                agent.updated_at = now;
                applied += 1;
            }
        }

        info!("Applied {} virtual IP update(s)", applied);
        applied
    }
}

/// Derive `virtualIp` from each agent's legacy block.
///
/// Agents whose stored value already matches are omitted from the updates.
pub fn backfill_virtual_ips(fleet: &Fleet) -> MigrationReport {
    let mut report = MigrationReport::default();

    for agent in &fleet.agents {
        let Some(subnet) = agent.subnet.as_deref() else {
            report.skipped.push(SkippedAgent {
                agent_id: agent.id.clone(),
                reason: "no legacy subnet".to_string(),
            });
            continue;
        };

        let Some(block) = AddressBlock::parse(subnet) else {
            warn!("Agent {} has malformed subnet '{}'", agent.name, subnet);
            report.skipped.push(SkippedAgent {
                agent_id: agent.id.clone(),
                reason: format!("malformed subnet '{}'", subnet),
            });
            continue;
        };

        let virtual_ip = agent_host(&block);
        if agent.virtual_ip.as_deref() == Some(virtual_ip.to_string().as_str()) {
            continue;
        }

        report.updates.push(VirtualIpUpdate {
            agent_id: agent.id.clone(),
            agent_name: agent.name.clone(),
            previous: agent.virtual_ip.clone(),
            virtual_ip,
        });
    }

    report
}
