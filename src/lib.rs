//! archetype_loader - Deduplicated, progress-tracked async resource loading
//!
//! # Features
//! - At most one fetch in flight per resource, fanned out to every requester
//! - Resolved results reused for the lifetime of the service
//! - Last-consumer detection for ownership-transferring delivery
//! - Weighted, monotonic progress aggregation over a message channel
//! - Async runtime abstraction (Tokio or mock spawners)
//!
//! # Quick Start
//!
//! ```ignore
//! use archetype_loader::{LoaderConfig, LoaderService, ResourceKind, TextureFetcher, TokioSpawner};
//!
//! let mut service = LoaderService::new(
//!     TextureFetcher::new("assets"),
//!     TokioSpawner::new(),
//!     LoaderConfig::new("textures"),
//! );
//! let mut client = service.client();
//! client.request(ResourceKind::Texture, "wall.png")?;
//! service.update();
//! let reply = client.recv().await;
//! ```
//!
//! # Feature Flags
//!
//! - `runtime-tokio` (default): Tokio spawner and non-blocking file reads

// Core modules
pub mod cache;
pub mod key;
pub mod progress;
pub mod request;
pub mod runtime;
pub mod service;

// Support modules
pub mod config;
pub mod fetch;
pub mod texture;

// Error types
mod error;
pub use error::{FetchError, LoaderError, MalformedRequest, Result};

// Re-export main types from cache
pub use cache::metrics::{ReuseMetrics, ReuseMetricsHandle};
pub use cache::usage::{UsageTicket, UsageTracker};
pub use cache::{EntryState, ReuseCache, Reused};

// Re-export request types
pub use key::{derive_key, CacheKey};
pub use request::{
    Delivery, LoadReply, LoadRequest, LoadResponse, ResourceKind, Rpc, Variant,
};

// Re-export progress types
pub use progress::{
    ItemId, LoadingItem, LoadingManager, LoadingManagerState, ProgressError, ProgressMessage,
    ProgressNotifier, ProgressService,
};

// Re-export service types
pub use config::LoaderConfig;
pub use service::{Envelope, LoaderClient, LoaderService, ReplyPort};

// Re-export fetchers
pub use fetch::{Fetcher, FileFetcher, FnFetcher};
pub use texture::{Texture, TextureDecoder, TextureError, TextureFetcher, TextureFormat};

// Re-export runtime types
pub use runtime::mock::{MockSpawnBehavior, MockSpawner};
#[cfg(feature = "runtime-tokio")]
pub use runtime::tokio_impl::TokioSpawner;
pub use runtime::{AsyncSpawner, JoinHandle};

// Version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
