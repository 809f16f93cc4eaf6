//! Fetch collaborators
//!
//! A [`Fetcher`] turns a validated [`LoadRequest`] into a payload. The loader
//! treats it as opaque: any error it returns becomes the fetch failure shared
//! by every requester of the same key.

use std::future::Future;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use crate::request::{LoadRequest, ResourceKind};

/// Loads the payload behind a request
///
/// Uses async-trait for dyn compatibility
#[async_trait::async_trait]
pub trait Fetcher: Send + Sync + 'static {
    type Output: Send + Sync + 'static;

    /// Resource kinds this fetcher understands
    fn kinds(&self) -> &[ResourceKind];

    /// Fetch and decode the resource
    async fn fetch(&self, request: &LoadRequest) -> anyhow::Result<Self::Output>;
}

/// Fetcher backed by an async closure
pub struct FnFetcher<T, F> {
    kinds: Vec<ResourceKind>,
    fetch: F,
    _output: PhantomData<fn() -> T>,
}

impl<T, F, Fut> FnFetcher<T, F>
where
    F: Fn(LoadRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<T>> + Send,
    T: Send + Sync + 'static,
{
    pub fn new(kinds: impl Into<Vec<ResourceKind>>, fetch: F) -> Self {
        Self {
            kinds: kinds.into(),
            fetch,
            _output: PhantomData,
        }
    }
}

#[async_trait::async_trait]
impl<T, F, Fut> Fetcher for FnFetcher<T, F>
where
    F: Fn(LoadRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<T>> + Send,
    T: Send + Sync + 'static,
{
    type Output = T;

    fn kinds(&self) -> &[ResourceKind] {
        &self.kinds
    }

    async fn fetch(&self, request: &LoadRequest) -> anyhow::Result<T> {
        (self.fetch)(request.clone()).await
    }
}

/// Reads raw bytes for fonts, maps and other opaque resources
#[derive(Debug, Clone)]
pub struct FileFetcher {
    base_dir: PathBuf,
    kinds: Vec<ResourceKind>,
}

impl FileFetcher {
    /// Create a file fetcher serving fonts and maps from `base_dir`
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            kinds: vec![ResourceKind::Font, ResourceKind::Map],
        }
    }

    pub fn with_kinds(mut self, kinds: impl Into<Vec<ResourceKind>>) -> Self {
        self.kinds = kinds.into();
        self
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Path of a locator below the base directory
    pub fn resolve(&self, locator: &str) -> PathBuf {
        self.base_dir.join(locator.trim_start_matches('/'))
    }
}

#[async_trait::async_trait]
impl Fetcher for FileFetcher {
    type Output = Vec<u8>;

    fn kinds(&self) -> &[ResourceKind] {
        &self.kinds
    }

    async fn fetch(&self, request: &LoadRequest) -> anyhow::Result<Vec<u8>> {
        let path = self.resolve(&request.locator);
        read_file(&path)
            .await
            .map_err(|err| anyhow::Error::new(err).context(format!("reading {}", path.display())))
    }
}

#[cfg(feature = "runtime-tokio")]
pub(crate) async fn read_file(path: &Path) -> std::io::Result<Vec<u8>> {
    tokio::fs::read(path).await
}

#[cfg(not(feature = "runtime-tokio"))]
pub(crate) async fn read_file(path: &Path) -> std::io::Result<Vec<u8>> {
    std::fs::read(path)
}
