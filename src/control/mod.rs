//! Control API for fleet management
//!
//! This module provides the control interface used by the management plane:
//! tunnel allocation, node registration and config retrieval, as JSON lines
//! over a Unix socket.

mod api;
mod handler;
mod server;
mod store;

pub use api::{ApiError, ApiRequest, ApiResponse, ControlAction};
pub use handler::CommandHandler;
pub use server::{ControlServer, DEFAULT_SOCKET_PATH};
pub use store::{FleetStore, MemoryFleetStore};

#[cfg(test)]
pub use store::MockFleetStore;
