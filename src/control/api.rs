//! Control API request and response types
//!
//! Requests and responses are single JSON objects, one per line. The action
//! name and its parameters sit at the top level of the request:
//!
//! ```json
//! {"id": "req-1", "action": "allocate_tunnel", "agent_id": "...", "gateway_id": "..."}
//! ```

use crate::error::MeshError;
use crate::fleet::{NodeKind, NodeStatus};
use serde::{Deserialize, Serialize};

/// Actions accepted by the control API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ControlAction {
    /// Create a tunnel with a fresh address block
    AllocateTunnel {
        /// Owning agent
        agent_id: String,
        /// Relaying gateway
        gateway_id: String,
    },
    /// Delete a tunnel and release its block
    DeleteTunnel {
        /// Tunnel to delete
        tunnel_id: String,
    },
    /// Structured topology for one node
    Topology {
        /// Node role
        node_kind: NodeKind,
        /// Node id
        node_id: String,
    },
    /// Rendered WireGuard config for one node
    RenderConfig {
        /// Node role
        node_kind: NodeKind,
        /// Node id
        node_id: String,
    },
    /// Register a new agent
    RegisterAgent {
        /// Display name
        name: String,
    },
    /// Register a new gateway
    RegisterGateway {
        /// Display name
        name: String,
        /// Reachable address
        #[serde(default)]
        public_ip: Option<String>,
        /// Free-form region label
        #[serde(default)]
        region: Option<String>,
    },
    /// Report a node's liveness
    Heartbeat {
        /// Node role
        node_kind: NodeKind,
        /// Node id
        node_id: String,
        /// Reported status
        status: NodeStatus,
    },
    /// Replace a node's WireGuard public key
    UpdatePublicKey {
        /// Node role
        node_kind: NodeKind,
        /// Node id
        node_id: String,
        /// Base64 public key
        public_key: String,
    },
    /// Fleet and allocation summary
    Status,
}

impl ControlAction {
    /// Wire name of the action
    pub fn name(&self) -> &'static str {
        match self {
            Self::AllocateTunnel { .. } => "allocate_tunnel",
            Self::DeleteTunnel { .. } => "delete_tunnel",
            Self::Topology { .. } => "topology",
            Self::RenderConfig { .. } => "render_config",
            Self::RegisterAgent { .. } => "register_agent",
            Self::RegisterGateway { .. } => "register_gateway",
            Self::Heartbeat { .. } => "heartbeat",
            Self::UpdatePublicKey { .. } => "update_public_key",
            Self::Status => "status",
        }
    }
}

/// API request from client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiRequest {
    /// Request ID for tracking
    #[serde(default = "default_request_id")]
    pub id: String,

    /// Action to perform, with its parameters
    #[serde(flatten)]
    pub action: ControlAction,
}

impl ApiRequest {
    /// Create a new API request
    pub fn new(id: impl Into<String>, action: ControlAction) -> Self {
        Self {
            id: id.into(),
            action,
        }
    }

    /// Parse from JSON string
    pub fn from_json(json: &str) -> Result<Self, ApiError> {
        serde_json::from_str(json).map_err(|e| ApiError::ParseError(e.to_string()))
    }

    /// Convert to JSON string
    pub fn to_json(&self) -> Result<String, ApiError> {
        serde_json::to_string(self).map_err(|e| ApiError::SerializationError(e.to_string()))
    }
}

/// API response to client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse {
    /// Request ID this response corresponds to
    pub id: String,

    /// Whether the request was successful
    pub success: bool,

    /// Optional result data
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,

    /// Optional error information
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,
}

impl ApiResponse {
    /// Create a successful response
    pub fn success(id: String, data: Option<serde_json::Value>) -> Self {
        Self {
            id,
            success: true,
            data,
            error: None,
        }
    }

    /// Create an error response
    pub fn error(id: String, error: ApiError) -> Self {
        Self {
            id,
            success: false,
            data: None,
            error: Some(error),
        }
    }

    /// Convert to JSON string
    pub fn to_json(&self) -> Result<String, ApiError> {
        serde_json::to_string(self).map_err(|e| ApiError::SerializationError(e.to_string()))
    }

    /// Parse from JSON string
    pub fn from_json(json: &str) -> Result<Self, ApiError> {
        serde_json::from_str(json).map_err(|e| ApiError::ParseError(e.to_string()))
    }
}

/// API error types
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "type", content = "message")]
pub enum ApiError {
    /// Failed to parse request
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Failed to serialize response
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Request parameters rejected
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Node or tunnel not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// No free address block
    #[error("Address space exhausted: {0}")]
    Exhausted(String),

    /// Storage failure
    #[error("Store error: {0}")]
    StoreError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl From<MeshError> for ApiError {
    fn from(err: MeshError) -> Self {
        match err {
            MeshError::Validation(msg) => ApiError::ValidationError(msg),
            MeshError::Exhausted(msg) => ApiError::Exhausted(msg),
            MeshError::NotFound(msg) => ApiError::NotFound(msg),
            MeshError::Config(msg) => ApiError::ConfigError(msg),
            MeshError::Store(msg) => ApiError::StoreError(msg),
            MeshError::Serialization(msg) => ApiError::SerializationError(msg),
            _ => ApiError::InternalError(err.to_string()),
        }
    }
}

fn default_request_id() -> String {
    use std::sync::atomic::{AtomicU64, Ordering};
    static COUNTER: AtomicU64 = AtomicU64::new(1);
    format!("req-{}", COUNTER.fetch_add(1, Ordering::SeqCst))
}
