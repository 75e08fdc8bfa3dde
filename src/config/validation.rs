//! Configuration and record validation functions
//!
//! This module validates daemon settings and the user-supplied fields of
//! fleet records (node names, endpoint hosts).

use crate::error::{MeshError, Result};
use std::net::{IpAddr, SocketAddr};
use std::path::Path;

/// Validate the WireGuard listen port
pub fn validate_listen_port(port: u16) -> Result<()> {
    if port == 0 {
        return Err(MeshError::Config("Listen port cannot be 0".to_string()));
    }
    Ok(())
}

/// Validate keepalive timeout
pub fn validate_keepalive(secs: u16) -> Result<()> {
    // Reasonable range: 0 (disabled) or 10-300 seconds
    if secs > 0 && secs < 10 {
        return Err(MeshError::Config(format!(
            "Keepalive interval {} is too short (minimum 10 seconds or 0 to disable)",
            secs
        )));
    }

    if secs > 300 {
        return Err(MeshError::Config(format!(
            "Keepalive interval {} is too long (maximum 300 seconds)",
            secs
        )));
    }

    Ok(())
}

/// Validate a file path is non-empty and valid UTF-8
pub fn validate_file_path(path: &Path) -> Result<()> {
    match path.to_str() {
        Some("") => Err(MeshError::Config("File path cannot be empty".to_string())),
        Some(_) => Ok(()),
        None => Err(MeshError::Config(format!("Invalid file path: {:?}", path))),
    }
}

/// Validate an HTTP bind address (`ip:port`)
pub fn validate_bind_address(addr: &str) -> Result<()> {
    addr.parse::<SocketAddr>().map_err(|_| {
        MeshError::Config(format!(
            "Invalid bind address: {} (expected format: ip:port)",
            addr
        ))
    })?;
    Ok(())
}

/// Validate a node name (1-64 chars, alphanumeric, dash, underscore, dot)
pub fn validate_node_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(MeshError::Validation(
            "Node name cannot be empty".to_string(),
        ));
    }

    if name.len() > 64 {
        return Err(MeshError::Validation(
            "Node name too long (max 64 characters)".to_string(),
        ));
    }

    if !name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_' || c == '.')
    {
        return Err(MeshError::Validation(format!(
            "Invalid node name '{}': only alphanumeric, dash, underscore and dot allowed",
            name
        )));
    }

    Ok(())
}

/// Validate a gateway's public endpoint host (IP address or hostname)
pub fn validate_endpoint_host(host: &str) -> Result<()> {
    if host.is_empty() {
        return Err(MeshError::Validation(
            "Endpoint host cannot be empty".to_string(),
        ));
    }

    if host.parse::<IpAddr>().is_ok() {
        return Ok(());
    }

    let valid_hostname = host.len() <= 253
        && host.split('.').all(|label| {
            !label.is_empty()
                && label.len() <= 63
                && !label.starts_with('-')
                && !label.ends_with('-')
                && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        });

    if !valid_hostname {
        return Err(MeshError::Validation(format!(
            "Invalid endpoint host: {}",
            host
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_listen_port() {
        assert!(validate_listen_port(51820).is_ok());
        assert!(validate_listen_port(0).is_err());
    }

    #[test]
    fn test_validate_keepalive() {
        assert!(validate_keepalive(0).is_ok());
        assert!(validate_keepalive(25).is_ok());
        assert!(validate_keepalive(300).is_ok());
        assert!(validate_keepalive(5).is_err());
        assert!(validate_keepalive(301).is_err());
    }

    #[test]
    fn test_validate_file_path() {
        assert!(validate_file_path(Path::new("/var/lib/fleet.json")).is_ok());
        assert!(validate_file_path(Path::new("")).is_err());
    }

    #[test]
    fn test_validate_bind_address() {
        assert!(validate_bind_address("127.0.0.1:9090").is_ok());
        assert!(validate_bind_address("[::1]:9090").is_ok());
        assert!(validate_bind_address("localhost:9090").is_err());
        assert!(validate_bind_address("127.0.0.1").is_err());
    }

    #[test]
    fn test_validate_node_name() {
        assert!(validate_node_name("edge-tokyo-1").is_ok());
        assert!(validate_node_name("gw_1.eu").is_ok());
        assert!(validate_node_name("").is_err());
        assert!(validate_node_name("bad name").is_err());
        assert!(validate_node_name(&"x".repeat(65)).is_err());
    }

    #[test]
    fn test_validate_endpoint_host() {
        assert!(validate_endpoint_host("203.0.113.5").is_ok());
        assert!(validate_endpoint_host("2001:db8::1").is_ok());
        assert!(validate_endpoint_host("gw1.example.com").is_ok());
        assert!(validate_endpoint_host("").is_err());
        assert!(validate_endpoint_host("-bad.example.com").is_err());
        assert!(validate_endpoint_host("gw1..example.com").is_err());
        assert!(validate_endpoint_host("gw1.example.com:51820").is_err());
    }
}
