//! WireGuard topology and configuration
//!
//! This module derives, from a fleet snapshot, the structured peer topology
//! each node must run and renders it as WireGuard config text.

mod keys;
mod peer;
mod render;
mod topology;

pub use keys::PublicKey;
pub use peer::PeerEntry;
pub use render::{
    private_key_placeholder, render, AGENT_PRIVATE_KEY_PLACEHOLDER,
    GATEWAY_PRIVATE_KEY_PLACEHOLDER,
};
pub use topology::{
    build_topology, AllowedIpsScope, NodeTopology, TopologyBuilder, TopologyOptions,
    DEFAULT_LISTEN_PORT, DEFAULT_PERSISTENT_KEEPALIVE,
};
