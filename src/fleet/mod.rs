//! Fleet state
//!
//! A [`Fleet`] is a consistent snapshot of every Agent, Gateway and Tunnel
//! record supplied by the storage layer. Everything in `ipam` and
//! `wireguard` computes over a snapshot and never re-reads it mid-way.

pub mod identity;
pub mod migration;
mod records;

pub use records::{
    Agent, Gateway, NodeKind, NodeStatus, Tunnel, TunnelAddress, TunnelAddressing,
};

use crate::error::{MeshError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Snapshot of all fleet records
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Fleet {
    /// Edge nodes, in storage listing order
    #[serde(default)]
    pub agents: Vec<Agent>,
    /// Relay nodes, in storage listing order
    #[serde(default)]
    pub gateways: Vec<Gateway>,
    /// Tunnels, in storage listing order
    #[serde(default)]
    pub tunnels: Vec<Tunnel>,
}

impl Fleet {
    /// Create an empty fleet
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a fleet snapshot from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| {
            MeshError::Store(format!("Failed to read fleet file {:?}: {}", path, e))
        })?;
        Self::from_json(&contents)
    }

    /// Parse a fleet snapshot from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Write the snapshot as pretty JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;

        // Write beside the target, then rename over it
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(|e| {
            MeshError::Store(format!("Failed to write fleet file {:?}: {}", tmp, e))
        })?;
        fs::rename(&tmp, path).map_err(|e| {
            MeshError::Store(format!("Failed to replace fleet file {:?}: {}", path, e))
        })?;
        Ok(())
    }

    /// Find an agent by id
    pub fn agent(&self, id: &str) -> Option<&Agent> {
        self.agents.iter().find(|a| a.id == id)
    }

    /// Find a gateway by id
    pub fn gateway(&self, id: &str) -> Option<&Gateway> {
        self.gateways.iter().find(|g| g.id == id)
    }

    /// Find a tunnel by id
    pub fn tunnel(&self, id: &str) -> Option<&Tunnel> {
        self.tunnels.iter().find(|t| t.id == id)
    }

    /// Tunnels owned by `agent_id`, in listing order
    pub fn tunnels_for_agent<'a>(&'a self, agent_id: &'a str) -> impl Iterator<Item = &'a Tunnel> {
        self.tunnels.iter().filter(move |t| t.agent_id == agent_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const FLEET_JSON: &str = r#"{
        "agents": [
            {"id": "a1", "name": "edge-1", "wireguardPublicKey": null, "status": "online"}
        ],
        "gateways": [
            {"id": "g1", "name": "gw-1", "publicIp": "198.51.100.1"}
        ],
        "tunnels": [
            {"id": "t1", "agentId": "a1", "gatewayId": "g1", "subnet": "10.1.0.0/24",
             "gatewayIp": "10.1.0.1", "agentIp": "10.1.0.100", "enabled": false}
        ]
    }"#;

    #[test]
    fn test_parse_storage_export() {
        let fleet = Fleet::from_json(FLEET_JSON).unwrap();
        assert_eq!(fleet.agents.len(), 1);
        assert_eq!(fleet.agents[0].status, NodeStatus::Online);
        assert_eq!(fleet.gateway("g1").unwrap().public_ip.as_deref(), Some("198.51.100.1"));
        assert!(!fleet.tunnel("t1").unwrap().enabled);
        assert_eq!(fleet.agent("a1").unwrap().name, "edge-1");
        assert!(fleet.gateway("missing").is_none());
    }

    #[test]
    fn test_empty_document() {
        let fleet = Fleet::from_json("{}").unwrap();
        assert_eq!(fleet, Fleet::new());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("fleet.json");

        let fleet = Fleet::from_json(FLEET_JSON).unwrap();
        fleet.save(&path).unwrap();

        let reloaded = Fleet::from_file(&path).unwrap();
        assert_eq!(reloaded, fleet);
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn test_missing_file() {
        let err = Fleet::from_file("/nonexistent/fleet.json").unwrap_err();
        assert!(matches!(err, MeshError::Store(_)));
    }

    #[test]
    fn test_tunnels_for_agent() {
        let mut fleet = Fleet::from_json(FLEET_JSON).unwrap();
        fleet.tunnels.push(Tunnel::new("a2", "g1"));
        assert_eq!(fleet.tunnels_for_agent("a1").count(), 1);
        assert_eq!(fleet.tunnels_for_agent("a2").count(), 1);
        assert_eq!(fleet.tunnels_for_agent("a3").count(), 0);
    }
}
