//! Progress reporting across a message boundary
//!
//! Loaders describe their work with [`ProgressNotifier`], which only sends
//! [`ProgressMessage`]s. The side that owns the [`LoadingManager`] runs a
//! [`ProgressService`] that applies those messages and recomputes the state
//! a UI polls.

pub mod manager;

pub use manager::{LoadingManager, LoadingManagerState};

use futures::channel::mpsc::{self, UnboundedReceiver, UnboundedSender};
use std::fmt;
use std::future::Future;
use thiserror::Error;
use uuid::Uuid;

/// Bookkeeping violations that make the progress signal untrustworthy
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProgressError {
    #[error("More items loaded ({loaded}) than items pending to load ({to_load})")]
    ConsistencyViolation { loaded: u64, to_load: u64 },

    #[error("Item {0} was already marked as loaded")]
    AlreadyLoaded(ItemId),
}

/// Stable identity of a loading item
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemId(String);

impl ItemId {
    /// A fresh, globally unique id
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ItemId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ItemId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A unit of loadable work with its share of the total
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadingItem {
    pub id: ItemId,
    /// Human readable description, e.g. `texture /maps/wall.png`
    pub comment: String,
    pub weight: u32,
}

impl LoadingItem {
    pub fn new(id: impl Into<ItemId>, comment: impl Into<String>, weight: u32) -> Self {
        Self {
            id: id.into(),
            comment: comment.into(),
            weight,
        }
    }
}

/// Messages understood by a [`ProgressService`]
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressMessage {
    WaitFor(LoadingItem),
    Done(LoadingItem),
    ExpectAtLeast(u32),
    Reset,
}

/// Sending half of the progress channel
#[derive(Debug, Clone)]
pub struct ProgressNotifier {
    sender: UnboundedSender<ProgressMessage>,
}

impl ProgressNotifier {
    pub fn wait_for(&self, item: LoadingItem) {
        self.send(ProgressMessage::WaitFor(item));
    }

    pub fn done(&self, item: LoadingItem) {
        self.send(ProgressMessage::Done(item));
    }

    pub fn expect_at_least(&self, weight: u32) {
        self.send(ProgressMessage::ExpectAtLeast(weight));
    }

    pub fn reset(&self) {
        self.send(ProgressMessage::Reset);
    }

    /// Register `item`, await `work`, then report `item` done whatever the outcome
    pub async fn track<F: Future>(&self, item: LoadingItem, work: F) -> F::Output {
        self.wait_for(item.clone());
        let output = work.await;
        self.done(item);
        output
    }

    fn send(&self, message: ProgressMessage) {
        // Progress is advisory for the loader; a gone observer must not fail loads.
        if self.sender.unbounded_send(message).is_err() {
            log::warn!("Progress receiver is gone, dropping progress message");
        }
    }
}

/// Owns a [`LoadingManager`] and feeds it from a progress channel
#[derive(Debug)]
pub struct ProgressService {
    manager: LoadingManager,
    sender: UnboundedSender<ProgressMessage>,
    receiver: UnboundedReceiver<ProgressMessage>,
}

impl Default for ProgressService {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressService {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded();
        Self {
            manager: LoadingManager::new(),
            sender,
            receiver,
        }
    }

    /// A new sending handle for this service
    pub fn notifier(&self) -> ProgressNotifier {
        ProgressNotifier {
            sender: self.sender.clone(),
        }
    }

    pub fn state(&self) -> &LoadingManagerState {
        self.manager.state()
    }

    pub fn manager(&self) -> &LoadingManager {
        &self.manager
    }

    pub fn manager_mut(&mut self) -> &mut LoadingManager {
        &mut self.manager
    }

    /// Apply every queued message, then recompute
    ///
    /// Returns the number of messages applied. A consistency error stops the
    /// drain; remaining messages stay queued.
    pub fn update(&mut self) -> Result<usize, ProgressError> {
        let mut applied = 0;

        while let Ok(Some(message)) = self.receiver.try_next() {
            self.apply(message).inspect_err(|err| {
                log::error!("Progress bookkeeping is corrupt: {err}");
            })?;
            applied += 1;
        }

        self.manager.update().inspect_err(|err| {
            log::error!("Progress bookkeeping is corrupt: {err}");
        })?;

        Ok(applied)
    }

    fn apply(&mut self, message: ProgressMessage) -> Result<(), ProgressError> {
        match message {
            ProgressMessage::WaitFor(item) => self.manager.wait_for(item),
            ProgressMessage::Done(item) => self.manager.done(&item)?,
            ProgressMessage::ExpectAtLeast(weight) => self.manager.expect_at_least(weight)?,
            ProgressMessage::Reset => self.manager.reset(),
        }
        Ok(())
    }
}
