//! WireGuard config text rendering
//!
//! Renders a [`NodeTopology`] as `wg-quick` style INI text. The private key
//! is always a placeholder; the node substitutes its own key on delivery.
//! Output is a pure function of the topology, with no timestamps or
//! unordered collections involved.

use crate::fleet::NodeKind;
use crate::wireguard::{NodeTopology, PeerEntry};
use std::fmt::Write as _;

/// Private key placeholder in agent configs
pub const AGENT_PRIVATE_KEY_PLACEHOLDER: &str = "<AGENT_PRIVATE_KEY>";

/// Private key placeholder in gateway configs
pub const GATEWAY_PRIVATE_KEY_PLACEHOLDER: &str = "<GATEWAY_PRIVATE_KEY>";

/// Placeholder substituted for the private key of a node of `kind`
pub fn private_key_placeholder(kind: NodeKind) -> &'static str {
    match kind {
        NodeKind::Agent => AGENT_PRIVATE_KEY_PLACEHOLDER,
        NodeKind::Gateway => GATEWAY_PRIVATE_KEY_PLACEHOLDER,
    }
}

/// Render `topology` as WireGuard config text
pub fn render(topology: &NodeTopology) -> String {
    let mut content = String::new();

    content.push_str("[Interface]\n");
    push_comment(&mut content, topology.kind, &topology.name);
    push_kv_line(&mut content, "PrivateKey", private_key_placeholder(topology.kind));
    if let Some(port) = topology.listen_port {
        push_kv_line(&mut content, "ListenPort", port);
    }
    if !topology.addresses.is_empty() {
        push_kv_line(&mut content, "Address", topology.addresses.join(", "));
    }
    content.push('\n');

    for peer in &topology.peers {
        render_peer(&mut content, peer);
    }

    content
}

fn render_peer(content: &mut String, peer: &PeerEntry) {
    content.push_str("[Peer]\n");
    push_comment(content, peer.role, &peer.name);
    push_kv_line(content, "PublicKey", &peer.public_key);
    if let Some(endpoint) = &peer.endpoint {
        push_kv_line(content, "Endpoint", endpoint);
    }
    if !peer.allowed_ips.is_empty() {
        push_kv_line(content, "AllowedIPs", peer.allowed_ips.join(", "));
    }
    if let Some(keepalive) = peer.persistent_keepalive {
        push_kv_line(content, "PersistentKeepalive", keepalive);
    }
    content.push('\n');
}

fn push_comment(content: &mut String, kind: NodeKind, name: &str) {
    let _ = writeln!(content, "# {}: {}", kind.label(), name);
}

fn push_kv_line(content: &mut String, key: &str, value: impl std::fmt::Display) {
    let _ = writeln!(content, "{key} = {value}");
}

impl NodeTopology {
    /// Render this topology as WireGuard config text
    pub fn render(&self) -> String {
        render(self)
    }
}
