//! Loader service configuration

/// Settings of a [`LoaderService`](crate::LoaderService)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderConfig {
    /// Name used in logs and in unsupported-kind errors
    pub name: String,
    /// Maximum number of queued requests started per `update`; `None` drains the queue
    pub drain_limit: Option<usize>,
    /// Progress weight reported for each request
    pub item_weight: u32,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            name: "LoaderService".to_string(),
            drain_limit: None,
            item_weight: 1,
        }
    }
}

impl LoaderConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_drain_limit(mut self, limit: usize) -> Self {
        // A zero limit would never start anything.
        self.drain_limit = Some(limit.max(1));
        self
    }

    pub fn with_item_weight(mut self, weight: u32) -> Self {
        self.item_weight = weight;
        self
    }
}
