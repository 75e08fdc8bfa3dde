//! Registration API keys
//!
//! Keys are a role prefix followed by 32 alphanumeric characters drawn from
//! base64-encoded random bytes.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use rand::RngCore;

/// Prefix of agent API keys
pub const AGENT_KEY_PREFIX: &str = "agt_";

/// Prefix of gateway API keys
pub const GATEWAY_KEY_PREFIX: &str = "gtw_";

const RANDOM_PART_LEN: usize = 32;

/// Generate an API key `<prefix><32 alphanumerics>`
pub fn generate_api_key(prefix: &str) -> String {
    let mut random = String::with_capacity(RANDOM_PART_LEN);
    let mut rng = rand::thread_rng();

    // Stripping '+', '/' and '=' can leave fewer than 32 characters
    while random.len() < RANDOM_PART_LEN {
        let mut bytes = [0u8; RANDOM_PART_LEN];
        rng.fill_bytes(&mut bytes);
        random.extend(
            BASE64
                .encode(bytes)
                .chars()
                .filter(|c| c.is_ascii_alphanumeric()),
        );
    }
    random.truncate(RANDOM_PART_LEN);

    format!("{}{}", prefix, random)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_agent_key() {
        let key = generate_api_key(AGENT_KEY_PREFIX);
        assert!(key.starts_with("agt_"));
        assert_eq!(key.len(), 4 + 32);
        assert!(key[4..].chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_keys_are_unique() {
        let a = generate_api_key(GATEWAY_KEY_PREFIX);
        let b = generate_api_key(GATEWAY_KEY_PREFIX);
        assert_ne!(a, b);
    }
}
