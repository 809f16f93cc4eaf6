//! Request and response types exchanged with a loader service

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::{LoaderError, MalformedRequest};
use crate::key::{derive_key, CacheKey};

/// Kind of resource a request asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    Texture,
    Font,
    Map,
    Model,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 4] = [
        ResourceKind::Texture,
        ResourceKind::Font,
        ResourceKind::Map,
        ResourceKind::Model,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Texture => "texture",
            ResourceKind::Font => "font",
            ResourceKind::Map => "map",
            ResourceKind::Model => "model",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = MalformedRequest;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ResourceKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| MalformedRequest::UnknownKind(s.to_string()))
    }
}

/// Variant parameters of a resource, e.g. `flip_y=true`
///
/// Backed by an ordered map so that iteration is canonical.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Variant(BTreeMap<String, String>);

impl Variant {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.0.insert(name.into(), value.to_string());
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl ToString) {
        self.0.insert(name.into(), value.to_string());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: ToString> FromIterator<(K, V)> for Variant {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.to_string()))
                .collect(),
        )
    }
}

/// Correlation id chosen by the requester and echoed in the reply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Rpc(pub u64);

impl fmt::Display for Rpc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rpc#{}", self.0)
    }
}

/// A single request for a resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadRequest {
    pub kind: ResourceKind,
    pub locator: String,
    pub variant: Variant,
    pub rpc: Rpc,
}

impl LoadRequest {
    pub fn new(kind: ResourceKind, locator: impl Into<String>, rpc: Rpc) -> Self {
        Self {
            kind,
            locator: locator.into(),
            variant: Variant::new(),
            rpc,
        }
    }

    pub fn with_variant(mut self, variant: Variant) -> Self {
        self.variant = variant;
        self
    }

    /// Build a request from an untyped kind name, as received from a foreign context
    pub fn parse(
        kind: &str,
        locator: impl Into<String>,
        variant: Variant,
        rpc: Rpc,
    ) -> Result<Self, MalformedRequest> {
        Ok(Self::new(kind.parse()?, locator, rpc).with_variant(variant))
    }

    /// Identity of the requested resource, excluding per-call metadata
    pub fn cache_key(&self) -> CacheKey {
        derive_key(self.kind, &self.locator, &self.variant)
    }

    /// Reject requests a service with the given kinds can never serve
    pub fn validate(&self, service: &str, kinds: &[ResourceKind]) -> Result<(), MalformedRequest> {
        if self.locator.trim().is_empty() {
            return Err(MalformedRequest::MissingLocator);
        }
        if !kinds.contains(&self.kind) {
            return Err(MalformedRequest::UnsupportedKind {
                kind: self.kind,
                service: service.to_string(),
            });
        }
        Ok(())
    }
}

/// How the payload of a response is handed over
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The receiver is the last outstanding consumer and may take ownership
    Transferred,
    /// Other requesters still read the same data
    Shared,
}

/// Successful response to a [`LoadRequest`]
#[derive(Debug)]
pub struct LoadResponse<T> {
    pub data: Arc<T>,
    pub delivery: Delivery,
}

impl<T> LoadResponse<T> {
    pub fn is_transferred(&self) -> bool {
        self.delivery == Delivery::Transferred
    }
}

impl<T: Clone> LoadResponse<T> {
    /// Take the payload by value, copying only if another holder remains
    pub fn into_owned(self) -> T {
        Arc::try_unwrap(self.data).unwrap_or_else(|shared| (*shared).clone())
    }
}

/// Reply posted to the requester's port, correlated by `rpc`
#[derive(Debug)]
pub struct LoadReply<T> {
    pub rpc: Rpc,
    pub result: Result<LoadResponse<T>, LoaderError>,
}

impl<T> LoadReply<T> {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}
