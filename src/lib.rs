//! mesh-control: address allocation and WireGuard topology for an Agent/Gateway mesh
//!
//! This library assigns every Agent↔Gateway tunnel a private `10.N.0.0/24`
//! block and derives, from a snapshot of the fleet, the WireGuard interface
//! and peer configuration each node must run.
//!
//! # Architecture
//!
//! Allocation and topology derivation are pure functions over a [`fleet::Fleet`]
//! snapshot. The daemon wraps them with a fleet store, a control socket for the
//! management plane and an HTTP endpoint from which nodes fetch their configs.
//! Private keys never pass through this crate; rendered configs carry a
//! placeholder the node substitutes locally.
//!
//! # Modules
//!
//! - `ipam`: Address block codec and allocator
//! - `fleet`: Agent, Gateway and Tunnel records, registration and legacy migration
//! - `wireguard`: Topology builder and config renderer
//! - `control`: Fleet store and control API
//! - `config`: Configuration parsing and management
//! - `monitoring`: Metrics
//! - `error`: Error types and handling

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod control;
pub mod error;
pub mod fleet;
pub mod ipam;
pub mod monitoring;
pub mod wireguard;

// Re-export commonly used types
pub use error::{MeshError, Result};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
