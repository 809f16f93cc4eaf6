//! Cache key derivation
//!
//! A [`CacheKey`] names a resource independently of who asked for it: the
//! kind, the locator and the variant parameters take part, the reply port and
//! the correlation id do not.

use std::fmt;
use std::hash::Hasher;
use xxhash_rust::xxh3::Xxh3;

use crate::request::{ResourceKind, Variant};

/// Stable identity of a requested resource
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Derive the key of a resource request
///
/// `"{kind}:{locator}"` without variant parameters, otherwise
/// `"{kind}?{hash}:{locator}"`. Kind names never contain `:` or `?`, so the
/// prefix always splits unambiguously.
pub fn derive_key(kind: ResourceKind, locator: &str, variant: &Variant) -> CacheKey {
    if variant.is_empty() {
        return CacheKey(format!("{kind}:{locator}"));
    }

    CacheKey(format!("{kind}?{:016x}:{locator}", hash_variant(variant)))
}

fn hash_variant(variant: &Variant) -> u64 {
    let mut hasher = Xxh3::new();
    for (name, value) in variant.iter() {
        // Length prefixes keep ("ab", "c") and ("a", "bc") apart
        hasher.write_u64(name.len() as u64);
        hasher.write(name.as_bytes());
        hasher.write_u64(value.len() as u64);
        hasher.write(value.as_bytes());
    }
    hasher.finish()
}
