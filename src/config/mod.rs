//! Configuration management
//!
//! This module handles parsing and validation of the daemon configuration
//! from a TOML file, with environment variable overrides applied on top.

mod toml_parser;
pub mod validation;

pub use toml_parser::TomlConfig;

use crate::error::{MeshError, Result};
use crate::ipam::AllocationPolicy;
use crate::wireguard::{
    AllowedIpsScope, TopologyOptions, DEFAULT_LISTEN_PORT, DEFAULT_PERSISTENT_KEEPALIVE,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Default configuration file path
pub const DEFAULT_CONFIG_PATH: &str = "/etc/mesh-control/config.toml";

/// Environment variable overriding `fleet_path`
pub const ENV_FLEET_PATH: &str = "MESH_CONTROL_FLEET_PATH";
/// Environment variable overriding `control.socket_path`
pub const ENV_SOCKET_PATH: &str = "MESH_CONTROL_SOCKET";
/// Environment variable overriding `http.bind_address`
pub const ENV_HTTP_BIND: &str = "MESH_CONTROL_HTTP_BIND";
/// Environment variable overriding `wireguard.listen_port`
pub const ENV_LISTEN_PORT: &str = "MESH_CONTROL_LISTEN_PORT";

/// Resolved daemon configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Fleet snapshot file
    pub fleet_path: PathBuf,
    /// WireGuard parameters written into configs
    pub wireguard: WireGuardSettings,
    /// Topology derivation settings
    pub topology: TopologySettings,
    /// Block allocation settings
    pub allocation: AllocationPolicy,
    /// Control socket settings
    pub control: ControlSettings,
    /// HTTP delivery settings
    pub http: HttpSettings,
}

/// WireGuard parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireGuardSettings {
    /// Gateway UDP port
    pub listen_port: u16,
    /// Agent keepalive in seconds, zero disables it
    pub persistent_keepalive: u16,
}

/// Topology derivation settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TopologySettings {
    /// Allowed-IPs scoping
    pub allowed_ips_scope: AllowedIpsScope,
}

/// Control socket settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlSettings {
    /// Unix socket path
    pub socket_path: PathBuf,
}

/// HTTP delivery settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpSettings {
    /// `host:port` to bind
    pub bind_address: String,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let toml_config = TomlConfig::from_file(path)?;
        Ok(toml_config.into())
    }

    /// Load `path` if it exists, otherwise start from defaults
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            debug!("Loading configuration from {:?}", path);
            Self::from_file(path)
        } else {
            info!("No configuration file at {:?}, using defaults", path);
            Ok(Self::default())
        }
    }

    /// Parse configuration from a TOML string
    pub fn parse(toml: &str) -> Result<Self> {
        Ok(TomlConfig::parse(toml)?.into())
    }

    /// Apply `MESH_CONTROL_*` environment overrides
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Some(path) = env_value(ENV_FLEET_PATH) {
            self.fleet_path = PathBuf::from(path);
        }
        if let Some(path) = env_value(ENV_SOCKET_PATH) {
            self.control.socket_path = PathBuf::from(path);
        }
        if let Some(bind) = env_value(ENV_HTTP_BIND) {
            self.http.bind_address = bind;
        }
        if let Some(port) = env_value(ENV_LISTEN_PORT) {
            self.wireguard.listen_port = port.parse().map_err(|_| {
                MeshError::Config(format!("{} must be a port number, got '{}'", ENV_LISTEN_PORT, port))
            })?;
        }
        Ok(())
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<()> {
        validation::validate_listen_port(self.wireguard.listen_port)?;
        validation::validate_keepalive(self.wireguard.persistent_keepalive)?;
        validation::validate_file_path(&self.fleet_path)?;
        validation::validate_file_path(&self.control.socket_path)?;
        validation::validate_bind_address(&self.http.bind_address)?;
        Ok(())
    }

    /// Topology options derived from this configuration
    pub fn topology_options(&self) -> TopologyOptions {
        TopologyOptions {
            listen_port: self.wireguard.listen_port,
            persistent_keepalive: self.wireguard.persistent_keepalive,
            allowed_ips_scope: self.topology.allowed_ips_scope,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            fleet_path: PathBuf::from(default_fleet_path()),
            wireguard: WireGuardSettings::default(),
            topology: TopologySettings::default(),
            allocation: AllocationPolicy::default(),
            control: ControlSettings::default(),
            http: HttpSettings::default(),
        }
    }
}

impl Default for WireGuardSettings {
    fn default() -> Self {
        Self {
            listen_port: DEFAULT_LISTEN_PORT,
            persistent_keepalive: DEFAULT_PERSISTENT_KEEPALIVE,
        }
    }
}

impl Default for ControlSettings {
    fn default() -> Self {
        Self {
            socket_path: PathBuf::from(default_socket_path()),
        }
    }
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
        }
    }
}

fn env_value(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

// Default value functions
pub(crate) fn default_fleet_path() -> String {
    "/var/lib/mesh-control/fleet.json".to_string()
}

pub(crate) fn default_socket_path() -> String {
    crate::control::DEFAULT_SOCKET_PATH.to_string()
}

pub(crate) fn default_bind_address() -> String {
    "127.0.0.1:9090".to_string()
}
