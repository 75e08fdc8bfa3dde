//! Peer topology derivation
//!
//! Turns a fleet snapshot into the interface addresses and peer list one node
//! must configure. Output order follows input order (tunnel listing order for
//! gateways, gateway listing order for agents) so identical snapshots always
//! produce identical configs.
//!
//! Inconsistent records never fail a build: tunnels without a valid block,
//! tunnels pointing at deleted nodes and nodes without a usable public key
//! simply contribute nothing.

use crate::error::{MeshError, Result};
use crate::fleet::{Agent, Fleet, Gateway, NodeKind, Tunnel, TunnelAddress, TunnelAddressing};
use crate::ipam::PREFIX_LEN;
use crate::wireguard::{PeerEntry, PublicKey};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::net::{IpAddr, Ipv4Addr};
use tracing::{debug, warn};

/// Default WireGuard UDP port
pub const DEFAULT_LISTEN_PORT: u16 = 51820;

/// Default keepalive agents send towards gateways
pub const DEFAULT_PERSISTENT_KEEPALIVE: u16 = 25;

/// Which tunnels feed a peer's allowed-IPs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllowedIpsScope {
    /// Only tunnels between the two nodes
    #[default]
    PerGateway,
    /// Every tunnel of the agent, whichever gateway terminates it
    Global,
}

/// Knobs for topology derivation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TopologyOptions {
    /// Gateway listen port, also used in agent-side endpoints
    pub listen_port: u16,
    /// Keepalive on agent-side gateway peers, zero disables it
    pub persistent_keepalive: u16,
    /// Allowed-IPs scoping
    pub allowed_ips_scope: AllowedIpsScope,
}

impl Default for TopologyOptions {
    fn default() -> Self {
        Self {
            listen_port: DEFAULT_LISTEN_PORT,
            persistent_keepalive: DEFAULT_PERSISTENT_KEEPALIVE,
            allowed_ips_scope: AllowedIpsScope::default(),
        }
    }
}

/// Everything one node needs for its WireGuard interface
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeTopology {
    /// Role of this node
    pub kind: NodeKind,
    /// Node id
    pub id: String,
    /// Node name
    pub name: String,
    /// UDP port to listen on, gateways only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub listen_port: Option<u16>,
    /// Interface addresses in CIDR form
    pub addresses: Vec<String>,
    /// Remote peers
    pub peers: Vec<PeerEntry>,
}

/// Derives [`NodeTopology`] values from fleet snapshots
#[derive(Debug, Clone, Default)]
pub struct TopologyBuilder {
    options: TopologyOptions,
}

impl TopologyBuilder {
    /// Create a builder
    pub fn new(options: TopologyOptions) -> Self {
        Self { options }
    }

    /// Options in effect
    pub fn options(&self) -> &TopologyOptions {
        &self.options
    }

    /// Build the topology of node `node_id`
    pub fn build(&self, kind: NodeKind, node_id: &str, fleet: &Fleet) -> Result<NodeTopology> {
        match kind {
            NodeKind::Gateway => {
                let gateway = fleet
                    .gateway(node_id)
                    .ok_or_else(|| MeshError::NotFound(format!("gateway '{}'", node_id)))?;
                Ok(self.build_gateway(gateway, fleet))
            }
            NodeKind::Agent => {
                let agent = fleet
                    .agent(node_id)
                    .ok_or_else(|| MeshError::NotFound(format!("agent '{}'", node_id)))?;
                Ok(self.build_agent(agent, fleet))
            }
        }
    }

    fn build_gateway(&self, gateway: &Gateway, fleet: &Fleet) -> NodeTopology {
        let tunnels = allocated_tunnels(fleet.tunnels.iter());

        // One shared interface binds the gateway end of every tunnel
        let mut addresses = Vec::new();
        for (_, addr) in &tunnels {
            push_unique(&mut addresses, host_cidr(addr.gateway_ip, PREFIX_LEN));
        }

        let mut peers: Vec<PeerEntry> = Vec::new();
        let mut peer_index: HashMap<&str, usize> = HashMap::new();
        let mut excluded: HashSet<&str> = HashSet::new();

        for (tunnel, addr) in &tunnels {
            if self.options.allowed_ips_scope == AllowedIpsScope::PerGateway
                && tunnel.gateway_id != gateway.id
            {
                continue;
            }

            let agent_id = tunnel.agent_id.as_str();
            let allowed_ip = host_cidr(addr.agent_ip, 32);

            if let Some(&index) = peer_index.get(agent_id) {
                peers[index].push_allowed_ip(allowed_ip);
                continue;
            }
            if excluded.contains(agent_id) {
                continue;
            }

            let Some(agent) = fleet.agent(agent_id) else {
                warn!("Tunnel {} references unknown agent {}", tunnel.id, agent_id);
                excluded.insert(agent_id);
                continue;
            };
            let Some(public_key) =
                usable_key(NodeKind::Agent, &agent.name, agent.wireguard_public_key.as_deref())
            else {
                excluded.insert(agent_id);
                continue;
            };

            let mut peer = PeerEntry::new(NodeKind::Agent, &agent.id, &agent.name, &public_key);
            peer.push_allowed_ip(allowed_ip);
            peer_index.insert(agent_id, peers.len());
            peers.push(peer);
        }

        debug!(
            "Gateway {} topology: {} address(es), {} peer(s)",
            gateway.name,
            addresses.len(),
            peers.len()
        );

        NodeTopology {
            kind: NodeKind::Gateway,
            id: gateway.id.clone(),
            name: gateway.name.clone(),
            listen_port: Some(self.options.listen_port),
            addresses,
            peers,
        }
    }

    fn build_agent(&self, agent: &Agent, fleet: &Fleet) -> NodeTopology {
        let own = allocated_tunnels(fleet.tunnels_for_agent(&agent.id));

        let mut addresses = Vec::new();
        for (_, addr) in &own {
            push_unique(&mut addresses, host_cidr(addr.agent_ip, PREFIX_LEN));
        }

        let mut peers = Vec::new();
        for gateway in &fleet.gateways {
            let Some(public_key) =
                usable_key(NodeKind::Gateway, &gateway.name, gateway.wireguard_public_key.as_deref())
            else {
                continue;
            };

            let mut peer = PeerEntry::new(NodeKind::Gateway, &gateway.id, &gateway.name, &public_key);
            peer.endpoint = gateway
                .public_ip
                .as_deref()
                .map(|host| format_endpoint(host, self.options.listen_port));
            peer.set_keepalive_secs(self.options.persistent_keepalive);

            for (tunnel, addr) in &own {
                if self.options.allowed_ips_scope == AllowedIpsScope::Global
                    || tunnel.gateway_id == gateway.id
                {
                    peer.push_allowed_ip(host_cidr(addr.gateway_ip, 32));
                }
            }

            peers.push(peer);
        }

        debug!(
            "Agent {} topology: {} address(es), {} peer(s)",
            agent.name,
            addresses.len(),
            peers.len()
        );

        NodeTopology {
            kind: NodeKind::Agent,
            id: agent.id.clone(),
            name: agent.name.clone(),
            listen_port: None,
            addresses,
            peers,
        }
    }
}

/// Build the topology of one node with explicit options
pub fn build_topology(
    kind: NodeKind,
    node_id: &str,
    fleet: &Fleet,
    options: &TopologyOptions,
) -> Result<NodeTopology> {
    TopologyBuilder::new(*options).build(kind, node_id, fleet)
}

/// Tunnels with a valid block, in listing order
fn allocated_tunnels<'a>(
    tunnels: impl Iterator<Item = &'a Tunnel>,
) -> Vec<(&'a Tunnel, TunnelAddress)> {
    tunnels
        .filter_map(|tunnel| match tunnel.addressing() {
            TunnelAddressing::Allocated(addr) => Some((tunnel, addr)),
            TunnelAddressing::Unallocated => {
                debug!("Skipping tunnel {}: no block allocated", tunnel.id);
                None
            }
            TunnelAddressing::Malformed(subnet) => {
                warn!("Skipping tunnel {}: malformed subnet '{}'", tunnel.id, subnet);
                None
            }
        })
        .collect()
}

/// Canonical key text, or `None` when missing or malformed
fn usable_key(kind: NodeKind, name: &str, key: Option<&str>) -> Option<String> {
    let Some(raw) = key else {
        debug!("{} {} has no public key, excluding from peers", kind.label(), name);
        return None;
    };

    match PublicKey::from_base64(raw) {
        Ok(key) => Some(key.to_base64()),
        Err(e) => {
            warn!("{} {} has an unusable public key: {}", kind.label(), name, e);
            None
        }
    }
}

fn host_cidr(ip: Ipv4Addr, prefix: u8) -> String {
    format!("{}/{}", ip, prefix)
}

fn format_endpoint(host: &str, port: u16) -> String {
    match host.parse::<IpAddr>() {
        Ok(IpAddr::V6(v6)) => format!("[{}]:{}", v6, port),
        _ => format!("{}:{}", host, port),
    }
}

fn push_unique(list: &mut Vec<String>, value: String) {
    if list.contains(&value) {
        warn!("Duplicate address {} in topology, emitting once", value);
    } else {
        list.push(value);
    }
}
