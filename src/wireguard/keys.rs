//! WireGuard public keys
//!
//! Only public keys pass through this crate. Private keys are never read,
//! generated or stored here; rendered configs carry a placeholder instead.

use crate::error::{MeshError, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use std::fmt;
use std::str::FromStr;

/// WireGuard public key (32 bytes, x25519)
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct PublicKey {
    key: [u8; 32],
}

impl PublicKey {
    /// Create a public key from raw bytes
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self { key: bytes }
    }

    /// Parse a public key from base64-encoded string
    pub fn from_base64(s: &str) -> Result<Self> {
        let decoded = BASE64
            .decode(s.trim())
            .map_err(|e| MeshError::Validation(format!("Invalid base64 public key: {}", e)))?;

        if decoded.len() != 32 {
            return Err(MeshError::Validation(format!(
                "Invalid public key length: expected 32 bytes, got {}",
                decoded.len()
            )));
        }

        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&decoded);
        Ok(Self::from_bytes(bytes))
    }

    /// Convert to base64-encoded string
    pub fn to_base64(&self) -> String {
        BASE64.encode(self.key)
    }

    /// Get raw bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.key
    }
}

impl FromStr for PublicKey {
    type Err = MeshError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_base64(s)
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", self.to_base64())
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_base64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_key_base64() {
        let public = PublicKey::from_bytes([7u8; 32]);
        let base64_str = public.to_base64();
        assert_eq!(base64_str.len(), 44);

        let restored = PublicKey::from_base64(&base64_str).unwrap();
        assert_eq!(public, restored);
    }

    #[test]
    fn test_trims_whitespace() {
        let encoded = format!("  {}\n", BASE64.encode([1u8; 32]));
        assert!(encoded.parse::<PublicKey>().is_ok());
    }

    #[test]
    fn test_invalid_base64() {
        assert!(PublicKey::from_base64("invalid!@#$").is_err());
    }

    #[test]
    fn test_invalid_length() {
        let short_key = BASE64.encode([0u8; 16]);
        assert!(matches!(
            PublicKey::from_base64(&short_key),
            Err(MeshError::Validation(_))
        ));
    }
}
