//! Error types for archetype_loader

use std::sync::Arc;
use thiserror::Error;

use crate::request::ResourceKind;

/// A request that can never be served, reported straight back to its sender
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MalformedRequest {
    #[error("Unknown resource kind: {0:?}")]
    UnknownKind(String),

    #[error("Service {service} does not load {kind} resources")]
    UnsupportedKind { kind: ResourceKind, service: String },

    #[error("Request has no locator")]
    MissingLocator,
}

/// Failure of the underlying fetch, shared by every requester of the same key
#[derive(Error, Debug, Clone)]
#[error("Fetch failed: {reason:#}")]
pub struct FetchError {
    reason: Arc<anyhow::Error>,
}

impl FetchError {
    pub fn new(reason: anyhow::Error) -> Self {
        Self {
            reason: Arc::new(reason),
        }
    }

    /// The error reported by the fetcher
    pub fn reason(&self) -> &anyhow::Error {
        &self.reason
    }
}

impl From<anyhow::Error> for FetchError {
    fn from(reason: anyhow::Error) -> Self {
        Self::new(reason)
    }
}

/// Main error type for loader operations
#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("Malformed request: {0}")]
    Malformed(#[from] MalformedRequest),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("Channel closed: {0}")]
    ChannelClosed(&'static str),
}

/// Result type alias for loader operations
pub type Result<T> = std::result::Result<T, LoaderError>;
