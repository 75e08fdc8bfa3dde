//! Agent, Gateway and Tunnel records
//!
//! Field names follow the camelCase JSON the storage layer exports. Fields
//! that only exist at some lifecycle stages are `Option`s; tunnel addressing
//! is resolved through [`Tunnel::addressing`] so callers branch on a typed
//! state instead of checking strings.

use crate::error::{MeshError, Result};
use crate::fleet::identity::{generate_api_key, AGENT_KEY_PREFIX, GATEWAY_KEY_PREFIX};
use crate::ipam::{AddressBlock, TunnelAllocation};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;
use tracing::warn;
use uuid::Uuid;

/// Kind of mesh node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// Edge node
    Agent,
    /// Relay node
    Gateway,
}

impl NodeKind {
    /// Label used in config comments
    pub fn label(&self) -> &'static str {
        match self {
            Self::Agent => "Agent",
            Self::Gateway => "Gateway",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Agent => write!(f, "agent"),
            Self::Gateway => write!(f, "gateway"),
        }
    }
}

impl FromStr for NodeKind {
    type Err = MeshError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "agent" | "agents" => Ok(Self::Agent),
            "gateway" | "gateways" => Ok(Self::Gateway),
            other => Err(MeshError::Validation(format!(
                "Unknown node kind '{}' (expected 'agent' or 'gateway')",
                other
            ))),
        }
    }
}

/// Reported node status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    /// Heartbeat received recently
    Online,
    /// Never connected or heartbeat lost
    #[default]
    Offline,
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Online => write!(f, "online"),
            Self::Offline => write!(f, "offline"),
        }
    }
}

/// Edge node record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Agent {
    /// Record id
    pub id: String,
    /// Display name
    pub name: String,
    /// Registration API key
    #[serde(default)]
    pub api_key: String,
    /// Legacy per-agent block
    #[serde(default)]
    pub subnet: Option<String>,
    /// Legacy virtual address
    #[serde(default)]
    pub virtual_ip: Option<String>,
    /// Base64 WireGuard public key
    #[serde(default)]
    pub wireguard_public_key: Option<String>,
    /// Heartbeat status
    #[serde(default)]
    pub status: NodeStatus,
    /// Last heartbeat
    #[serde(default)]
    pub last_seen_at: Option<DateTime<Utc>>,
    /// Creation time
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    /// Last modification time
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Agent {
    /// Register a new agent with a fresh id and API key
    pub fn register(name: &str) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            api_key: generate_api_key(AGENT_KEY_PREFIX),
            subnet: None,
            virtual_ip: None,
            wireguard_public_key: None,
            status: NodeStatus::Offline,
            last_seen_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Relay node record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Gateway {
    /// Record id
    pub id: String,
    /// Display name
    pub name: String,
    /// Registration API key
    #[serde(default)]
    pub api_key: String,
    /// Internet-facing address agents connect to
    #[serde(default)]
    pub public_ip: Option<String>,
    /// Base64 WireGuard public key
    #[serde(default)]
    pub wireguard_public_key: Option<String>,
    /// Deployment region
    #[serde(default)]
    pub region: Option<String>,
    /// Heartbeat status
    #[serde(default)]
    pub status: NodeStatus,
    /// Last heartbeat
    #[serde(default)]
    pub last_seen_at: Option<DateTime<Utc>>,
    /// Creation time
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    /// Last modification time
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Gateway {
    /// Register a new gateway with a fresh id and API key
    pub fn register(name: &str, public_ip: Option<String>, region: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            api_key: generate_api_key(GATEWAY_KEY_PREFIX),
            public_ip,
            wireguard_public_key: None,
            region,
            status: NodeStatus::Offline,
            last_seen_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Link between one agent and one gateway
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tunnel {
    /// Record id
    pub id: String,
    /// Owning agent
    pub agent_id: String,
    /// Terminating gateway
    pub gateway_id: String,
    /// Allocated block, absent until allocation
    #[serde(default)]
    pub subnet: Option<String>,
    /// Stored gateway host
    #[serde(default)]
    pub gateway_ip: Option<String>,
    /// Stored agent host
    #[serde(default)]
    pub agent_ip: Option<String>,
    /// Routing switch, has no effect on addressing
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Creation time
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    /// Last modification time
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

/// Addresses of an allocated tunnel, derived from its block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TunnelAddress {
    /// The tunnel's block
    pub block: AddressBlock,
    /// Gateway host `10.N.0.1`
    pub gateway_ip: Ipv4Addr,
    /// Agent host `10.N.0.100`
    pub agent_ip: Ipv4Addr,
}

/// Addressing state of a tunnel record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TunnelAddressing {
    /// Block allocated and valid
    Allocated(TunnelAddress),
    /// No block recorded yet
    Unallocated,
    /// Block recorded but unparsable
    Malformed(String),
}

impl Tunnel {
    /// New tunnel without an address block
    pub fn new(agent_id: &str, gateway_id: &str) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            agent_id: agent_id.to_string(),
            gateway_id: gateway_id.to_string(),
            subnet: None,
            gateway_ip: None,
            agent_ip: None,
            enabled: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// New tunnel occupying `allocation`
    pub fn from_allocation(agent_id: &str, gateway_id: &str, allocation: &TunnelAllocation) -> Self {
        let mut tunnel = Self::new(agent_id, gateway_id);
        tunnel.subnet = Some(allocation.subnet.format());
        tunnel.gateway_ip = Some(allocation.gateway_ip.to_string());
        tunnel.agent_ip = Some(allocation.agent_ip.to_string());
        tunnel
    }

    /// Resolve this tunnel's addresses.
    ///
    /// Host addresses always come from the block; stored values that disagree
    /// are reported and ignored.
    pub fn addressing(&self) -> TunnelAddressing {
        let Some(subnet) = self.subnet.as_deref() else {
            return TunnelAddressing::Unallocated;
        };

        let Some(block) = AddressBlock::parse(subnet) else {
            return TunnelAddressing::Malformed(subnet.to_string());
        };

        let allocation = TunnelAllocation::for_block(block);
        self.check_stored_host("gatewayIp", self.gateway_ip.as_deref(), allocation.gateway_ip);
        self.check_stored_host("agentIp", self.agent_ip.as_deref(), allocation.agent_ip);

        TunnelAddressing::Allocated(TunnelAddress {
            block,
            gateway_ip: allocation.gateway_ip,
            agent_ip: allocation.agent_ip,
        })
    }

    fn check_stored_host(&self, field: &str, stored: Option<&str>, derived: Ipv4Addr) {
        if let Some(stored) = stored {
            if stored.parse::<Ipv4Addr>().ok() != Some(derived) {
                warn!(
                    "Tunnel {} has {} '{}' but its block implies {}; using {}",
                    self.id, field, stored, derived, derived
                );
            }
        }
    }
}

fn default_enabled() -> bool {
    true
}
