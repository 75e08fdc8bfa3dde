//! Structured peer entries
//!
//! A [`PeerEntry`] is one `[Peer]` block a node must configure, kept as data
//! so it can be rendered to text or served as JSON.

use crate::fleet::NodeKind;
use serde::{Deserialize, Serialize};

/// One remote peer of a node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerEntry {
    /// Role of the remote node
    pub role: NodeKind,
    /// Remote node id
    pub id: String,
    /// Remote node name
    pub name: String,
    /// Remote base64 public key
    pub public_key: String,
    /// `host:port` to dial, only for gateways seen from an agent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// Addresses routed to this peer
    pub allowed_ips: Vec<String>,
    /// Keepalive interval in seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub persistent_keepalive: Option<u16>,
}

impl PeerEntry {
    /// Create a peer with no endpoint, routes or keepalive
    pub fn new(role: NodeKind, id: &str, name: &str, public_key: &str) -> Self {
        Self {
            role,
            id: id.to_string(),
            name: name.to_string(),
            public_key: public_key.to_string(),
            endpoint: None,
            allowed_ips: Vec::new(),
            persistent_keepalive: None,
        }
    }

    /// Add a route unless it is already present
    pub fn push_allowed_ip(&mut self, cidr: String) {
        if !self.allowed_ips.contains(&cidr) {
            self.allowed_ips.push(cidr);
        }
    }

    /// Set keepalive in seconds; zero disables it
    pub fn set_keepalive_secs(&mut self, secs: u16) {
        self.persistent_keepalive = (secs > 0).then_some(secs);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_allowed_ip_dedupes() {
        let mut peer = PeerEntry::new(NodeKind::Agent, "a1", "edge-1", "key");
        peer.push_allowed_ip("10.1.0.100/32".to_string());
        peer.push_allowed_ip("10.2.0.100/32".to_string());
        peer.push_allowed_ip("10.1.0.100/32".to_string());
        assert_eq!(peer.allowed_ips, vec!["10.1.0.100/32", "10.2.0.100/32"]);
    }

    #[test]
    fn test_set_keepalive() {
        let mut peer = PeerEntry::new(NodeKind::Gateway, "g1", "gw-1", "key");
        peer.set_keepalive_secs(25);
        assert_eq!(peer.persistent_keepalive, Some(25));
        peer.set_keepalive_secs(0);
        assert_eq!(peer.persistent_keepalive, None);
    }

    #[test]
    fn test_json_shape() {
        let peer = PeerEntry::new(NodeKind::Agent, "a1", "edge-1", "key");
        let json = serde_json::to_value(&peer).unwrap();
        assert_eq!(json["role"], "agent");
        assert_eq!(json["publicKey"], "key");
        assert!(json.get("endpoint").is_none());
    }
}
