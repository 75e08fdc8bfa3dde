//! TOML configuration file parser
//!
//! Every section and key of the file is optional; anything left out falls
//! back to the defaults of [`Config`].

use crate::config::{
    default_bind_address, default_fleet_path, default_socket_path, Config, ControlSettings,
    HttpSettings, TopologySettings, WireGuardSettings,
};
use crate::error::{MeshError, Result};
use crate::ipam::AllocationPolicy;
use crate::wireguard::{AllowedIpsScope, DEFAULT_LISTEN_PORT, DEFAULT_PERSISTENT_KEEPALIVE};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// TOML configuration file structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TomlConfig {
    /// Fleet snapshot file
    #[serde(default = "default_fleet_path")]
    pub fleet_path: String,

    /// `[wireguard]` section
    #[serde(default)]
    pub wireguard: TomlWireGuardConfig,

    /// `[topology]` section
    #[serde(default)]
    pub topology: TomlTopologyConfig,

    /// `[allocation]` section
    #[serde(default)]
    pub allocation: AllocationPolicy,

    /// `[control]` section
    #[serde(default)]
    pub control: TomlControlConfig,

    /// `[http]` section
    #[serde(default)]
    pub http: TomlHttpConfig,
}

/// TOML `[wireguard]` section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlWireGuardConfig {
    /// Gateway UDP port
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,

    /// Agent keepalive in seconds
    #[serde(default = "default_keepalive")]
    pub persistent_keepalive: u16,
}

/// TOML `[topology]` section
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlTopologyConfig {
    /// Allowed-IPs scoping
    #[serde(default)]
    pub allowed_ips_scope: AllowedIpsScope,
}

/// TOML `[control]` section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlControlConfig {
    /// Unix socket path
    #[serde(default = "default_socket_path")]
    pub socket_path: String,
}

/// TOML `[http]` section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlHttpConfig {
    /// `host:port` to bind
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
}

impl TomlConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| {
            MeshError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        Self::parse(&contents)
    }

    /// Parse configuration from a TOML string
    pub fn parse(toml: &str) -> Result<Self> {
        toml::from_str(toml)
            .map_err(|e| MeshError::Config(format!("Failed to parse TOML config: {}", e)))
    }
}

// Convert TOML config to internal Config
impl From<TomlConfig> for Config {
    fn from(toml: TomlConfig) -> Self {
        Config {
            fleet_path: PathBuf::from(toml.fleet_path),
            wireguard: WireGuardSettings {
                listen_port: toml.wireguard.listen_port,
                persistent_keepalive: toml.wireguard.persistent_keepalive,
            },
            topology: TopologySettings {
                allowed_ips_scope: toml.topology.allowed_ips_scope,
            },
            allocation: toml.allocation,
            control: ControlSettings {
                socket_path: PathBuf::from(toml.control.socket_path),
            },
            http: HttpSettings {
                bind_address: toml.http.bind_address,
            },
        }
    }
}

impl Default for TomlWireGuardConfig {
    fn default() -> Self {
        Self {
            listen_port: default_listen_port(),
            persistent_keepalive: default_keepalive(),
        }
    }
}

impl Default for TomlControlConfig {
    fn default() -> Self {
        Self {
            socket_path: default_socket_path(),
        }
    }
}

impl Default for TomlHttpConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
        }
    }
}

fn default_listen_port() -> u16 {
    DEFAULT_LISTEN_PORT
}

fn default_keepalive() -> u16 {
    DEFAULT_PERSISTENT_KEEPALIVE
}
