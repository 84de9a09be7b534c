//! Mapping rich keys onto stable cache key strings.
//!
//! A cache key must be identical in every process that shares the store, so
//! structured keys are reduced to `<namespace>:<blake3 of their JSON form>`.
//! Structs and `BTreeMap`s serialize deterministically; `HashMap` does not
//! and must not be used inside a hashed key.

use cairn_core::CodecError;
use serde::Serialize;

use crate::error::CacheError;

/// A value usable as a cache key.
pub trait CacheKey {
    fn cache_key(&self) -> String;
}

impl CacheKey for str {
    fn cache_key(&self) -> String {
        self.to_string()
    }
}

impl CacheKey for String {
    fn cache_key(&self) -> String {
        self.clone()
    }
}

macro_rules! integer_cache_key {
    ($($ty:ty),*) => {
        $(
            impl CacheKey for $ty {
                fn cache_key(&self) -> String {
                    self.to_string()
                }
            }
        )*
    };
}

integer_cache_key!(u32, u64, i32, i64, usize);

/// Stable key derived from a namespace and any serializable value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HashedKey(String);

impl HashedKey {
    pub fn new<T: Serialize + ?Sized>(namespace: &str, parts: &T) -> Result<Self, CacheError> {
        if namespace.is_empty() {
            return Err(CacheError::InvalidKey {
                reason: "hashed key namespace must not be empty".to_string(),
            });
        }
        let bytes = serde_json::to_vec(parts).map_err(|e| CacheError::Codec {
            key: namespace.to_string(),
            source: CodecError::Encode { reason: e.to_string() },
        })?;
        let digest = blake3::hash(&bytes);
        Ok(Self(format!("{namespace}:{}", digest.to_hex())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl CacheKey for HashedKey {
    fn cache_key(&self) -> String {
        self.0.clone()
    }
}

impl std::fmt::Display for HashedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    #[derive(Serialize)]
    struct Query<'a> {
        tenant: &'a str,
        page: u32,
    }

    #[test]
    fn hashed_key_is_stable() {
        let a = HashedKey::new("search", &Query { tenant: "acme", page: 2 }).unwrap();
        let b = HashedKey::new("search", &Query { tenant: "acme", page: 2 }).unwrap();
        let c = HashedKey::new("search", &Query { tenant: "acme", page: 3 }).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.as_str().starts_with("search:"));
        // namespace + ':' + 64 hex chars
        assert_eq!(a.as_str().len(), "search:".len() + 64);
    }

    #[test]
    fn btree_map_keys_are_order_independent() {
        let mut first = BTreeMap::new();
        first.insert("b", 2);
        first.insert("a", 1);
        let mut second = BTreeMap::new();
        second.insert("a", 1);
        second.insert("b", 2);
        assert_eq!(HashedKey::new("m", &first).unwrap(), HashedKey::new("m", &second).unwrap());
    }

    #[test]
    fn empty_namespace_rejected() {
        assert!(matches!(HashedKey::new("", &1), Err(CacheError::InvalidKey { .. })));
    }

    #[test]
    fn primitive_keys() {
        assert_eq!("user:7".cache_key(), "user:7");
        assert_eq!(42u64.cache_key(), "42");
        assert_eq!((-3i64).cache_key(), "-3");
    }
}
