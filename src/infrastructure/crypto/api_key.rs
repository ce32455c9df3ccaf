//! Management api-key hashing and generation.

use rand::distributions::Alphanumeric;
use rand::Rng;
use sha2::{Digest, Sha256};

/// Keys handed out by this connector start with this prefix
pub const API_KEY_PREFIX: &str = "trl_";

/// SHA-256 hex digest of an api key
pub fn hash_api_key(key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    hex::encode(hasher.finalize())
}

/// Compare a presented key against a stored hash without leaking length
/// or position information through timing.
pub fn verify_api_key(presented: &str, expected_hash: &str) -> bool {
    let presented_hash = hash_api_key(presented);
    if presented_hash.len() != expected_hash.len() {
        return false;
    }
    presented_hash
        .bytes()
        .zip(expected_hash.bytes())
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}

/// Generate a fresh management api key
pub fn generate_api_key() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect();
    format!("{}{}", API_KEY_PREFIX, suffix)
}
