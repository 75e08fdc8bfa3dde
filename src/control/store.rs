//! Fleet storage collaborator
//!
//! The handler reads consistent snapshots and applies single-record
//! mutations through [`FleetStore`]. [`MemoryFleetStore`] keeps the fleet in
//! memory and mirrors it to a JSON file when opened on a path.

use crate::error::{MeshError, Result};
use crate::fleet::{Agent, Fleet, Gateway, NodeKind, NodeStatus, Tunnel};
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tracing::{debug, info};

/// Record storage used by the control handler
#[cfg_attr(test, mockall::automock)]
pub trait FleetStore: Send + Sync {
    /// Consistent copy of every record
    fn snapshot(&self) -> Result<Fleet>;

    /// Add a registered agent
    fn insert_agent(&self, agent: Agent) -> Result<()>;

    /// Add a registered gateway
    fn insert_gateway(&self, gateway: Gateway) -> Result<()>;

    /// Add a tunnel
    fn insert_tunnel(&self, tunnel: Tunnel) -> Result<()>;

    /// Delete a tunnel, returning the removed record
    fn remove_tunnel(&self, tunnel_id: &str) -> Result<Tunnel>;

    /// Record a heartbeat status
    fn update_status(&self, kind: NodeKind, id: &str, status: NodeStatus) -> Result<()>;

    /// Replace a node's WireGuard public key
    fn update_public_key(&self, kind: NodeKind, id: &str, public_key: &str) -> Result<()>;
}

/// In-memory fleet, optionally persisted to a JSON file
#[derive(Debug)]
pub struct MemoryFleetStore {
    fleet: RwLock<Fleet>,
    path: Option<PathBuf>,
}

impl MemoryFleetStore {
    /// Store that never touches disk
    pub fn in_memory(fleet: Fleet) -> Self {
        Self {
            fleet: RwLock::new(fleet),
            path: None,
        }
    }

    /// Load `path`, or start empty if it does not exist yet
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let fleet = if path.exists() {
            Fleet::from_file(path)?
        } else {
            info!("Fleet file {:?} not found, starting with an empty fleet", path);
            Fleet::new()
        };

        debug!(
            "Opened fleet store at {:?} ({} agents, {} gateways, {} tunnels)",
            path,
            fleet.agents.len(),
            fleet.gateways.len(),
            fleet.tunnels.len()
        );

        Ok(Self {
            fleet: RwLock::new(fleet),
            path: Some(path.to_path_buf()),
        })
    }

    /// Backing file, if any
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Apply `f` to a copy and publish it only once it is persisted
    fn mutate<T>(&self, f: impl FnOnce(&mut Fleet) -> Result<T>) -> Result<T> {
        let mut fleet = self
            .fleet
            .write()
            .map_err(|_| MeshError::Store("Fleet lock poisoned".to_string()))?;

        let mut next = fleet.clone();
        let value = f(&mut next)?;

        if let Some(path) = &self.path {
            next.save(path)?;
        }
        *fleet = next;
        Ok(value)
    }
}

impl FleetStore for MemoryFleetStore {
    fn snapshot(&self) -> Result<Fleet> {
        self.fleet
            .read()
            .map(|fleet| fleet.clone())
            .map_err(|_| MeshError::Store("Fleet lock poisoned".to_string()))
    }

    fn insert_agent(&self, agent: Agent) -> Result<()> {
        self.mutate(|fleet| {
            if fleet.agent(&agent.id).is_some() {
                return Err(MeshError::Store(format!("Agent {} already exists", agent.id)));
            }
            fleet.agents.push(agent);
            Ok(())
        })
    }

    fn insert_gateway(&self, gateway: Gateway) -> Result<()> {
        self.mutate(|fleet| {
            if fleet.gateway(&gateway.id).is_some() {
                return Err(MeshError::Store(format!(
                    "Gateway {} already exists",
                    gateway.id
                )));
            }
            fleet.gateways.push(gateway);
            Ok(())
        })
    }

    fn insert_tunnel(&self, tunnel: Tunnel) -> Result<()> {
        self.mutate(|fleet| {
            if fleet.tunnel(&tunnel.id).is_some() {
                return Err(MeshError::Store(format!("Tunnel {} already exists", tunnel.id)));
            }
            fleet.tunnels.push(tunnel);
            Ok(())
        })
    }

    fn remove_tunnel(&self, tunnel_id: &str) -> Result<Tunnel> {
        self.mutate(|fleet| {
            let position = fleet
                .tunnels
                .iter()
                .position(|t| t.id == tunnel_id)
                .ok_or_else(|| MeshError::NotFound(format!("tunnel {}", tunnel_id)))?;
            Ok(fleet.tunnels.remove(position))
        })
    }

    fn update_status(&self, kind: NodeKind, id: &str, status: NodeStatus) -> Result<()> {
        self.mutate(|fleet| {
            let now = Utc::now();
            let seen = (status == NodeStatus::Online).then_some(now);

            match kind {
                NodeKind::Agent => {
                    let agent = fleet
                        .agents
                        .iter_mut()
                        .find(|a| a.id == id)
                        .ok_or_else(|| MeshError::NotFound(format!("agent {}", id)))?;
                    agent.status = status;
                    agent.last_seen_at = seen.or(agent.last_seen_at);
                    agent.updated_at = now;
                }
                NodeKind::Gateway => {
                    let gateway = fleet
                        .gateways
                        .iter_mut()
                        .find(|g| g.id == id)
                        .ok_or_else(|| MeshError::NotFound(format!("gateway {}", id)))?;
                    gateway.status = status;
                    gateway.last_seen_at = seen.or(gateway.last_seen_at);
                    gateway.updated_at = now;
                }
            }
            Ok(())
        })
    }

    fn update_public_key(&self, kind: NodeKind, id: &str, public_key: &str) -> Result<()> {
        self.mutate(|fleet| {
            let now = Utc::now();
            match kind {
                NodeKind::Agent => {
                    let agent = fleet
                        .agents
                        .iter_mut()
                        .find(|a| a.id == id)
                        .ok_or_else(|| MeshError::NotFound(format!("agent {}", id)))?;
                    agent.wireguard_public_key = Some(public_key.to_string());
                    agent.updated_at = now;
                }
                NodeKind::Gateway => {
                    let gateway = fleet
                        .gateways
                        .iter_mut()
                        .find(|g| g.id == id)
                        .ok_or_else(|| MeshError::NotFound(format!("gateway {}", id)))?;
                    gateway.wireguard_public_key = Some(public_key.to_string());
                    gateway.updated_at = now;
                }
            }
            Ok(())
        })
    }
}
