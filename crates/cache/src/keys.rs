//! Content-hash cache keys
//!
//! Keys are `namespace:hexdigest` where the digest covers the
//! serialized inputs, so the namespace prefix stays visible for
//! targeted invalidation while the inputs themselves never leak into
//! filenames.

use hooksmith_core::Result;
use serde::Serialize;
use sha2::{Digest, Sha256};

/// Build a cache key from a namespace and any serializable inputs
pub fn cache_key<T: Serialize>(namespace: &str, inputs: &T) -> Result<String> {
    let serialized = serde_json::to_vec(inputs)?;
    let mut hasher = Sha256::new();
    hasher.update(namespace.as_bytes());
    hasher.update(b"\0");
    hasher.update(&serialized);
    let digest = hasher.finalize();
    // 16 bytes of digest is plenty for a per-process cache
    let hex: String = digest[..16].iter().map(|b| format!("{b:02x}")).collect();
    Ok(format!("{namespace}:{hex}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stable_for_same_inputs() {
        let a = cache_key("cmd", &("git", vec!["status"])).unwrap();
        let b = cache_key("cmd", &("git", vec!["status"])).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_differs_across_inputs_and_namespaces() {
        let a = cache_key("cmd", &("git", vec!["status"])).unwrap();
        let b = cache_key("cmd", &("git", vec!["diff"])).unwrap();
        let c = cache_key("lint", &("git", vec!["status"])).unwrap();
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_key_carries_namespace_prefix() {
        let key = cache_key("cmd", &"x").unwrap();
        assert!(key.starts_with("cmd:"));
    }
}
