//! Weighted loading progress
//!
//! [`LoadingManager`] tracks items registered for loading and items reported
//! as loaded, each with an integer weight, and derives a progress fraction
//! that never moves backwards even when more items show up later.

use std::collections::HashMap;

use super::{ItemId, LoadingItem, ProgressError};

/// Observable state of a [`LoadingManager`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadingManagerState {
    pub comment: String,
    pub expects_at_least: u32,
    pub progress: f32,
    /// Bumped on every observable change
    pub version: u64,
}

#[derive(Debug)]
struct ItemSlot {
    item: LoadingItem,
    registered: bool,
    loaded: bool,
}

/// Aggregates weighted item completion into a single monotonic progress value
#[derive(Debug, Default)]
pub struct LoadingManager {
    state: LoadingManagerState,
    // Registration order is kept so the comment names the oldest pending item.
    slots: Vec<ItemSlot>,
    index: HashMap<ItemId, usize>,
    previous: Option<(String, f32)>,
    tracking: bool,
}

impl LoadingManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &LoadingManagerState {
        &self.state
    }

    pub fn progress(&self) -> f32 {
        self.state.progress
    }

    pub fn comment(&self) -> &str {
        &self.state.comment
    }

    pub fn version(&self) -> u64 {
        self.state.version
    }

    /// Whether `expect_at_least` has been called since creation or the last reset
    pub fn is_tracking(&self) -> bool {
        self.tracking
    }

    /// Register an item to load. Registering the same id twice has no effect.
    pub fn wait_for(&mut self, item: LoadingItem) {
        match self.index.get(&item.id).copied() {
            Some(slot) => self.slots[slot].registered = true,
            None => self.push_slot(item, true, false),
        }
    }

    /// Mark an item as loaded
    ///
    /// Completing an item twice is an error. Completing an item that was
    /// never registered is recorded as is and fails the next [`update`].
    ///
    /// [`update`]: LoadingManager::update
    pub fn done(&mut self, item: &LoadingItem) -> Result<(), ProgressError> {
        match self.index.get(&item.id).copied() {
            Some(slot) if self.slots[slot].loaded => {
                Err(ProgressError::AlreadyLoaded(item.id.clone()))
            }
            Some(slot) => {
                self.slots[slot].loaded = true;
                Ok(())
            }
            None => {
                self.push_slot(item.clone(), false, true);
                Ok(())
            }
        }
    }

    /// Set a floor for the total weight and start reporting progress
    pub fn expect_at_least(&mut self, weight: u32) -> Result<(), ProgressError> {
        self.state.expects_at_least = weight;
        self.tracking = true;
        self.update()
    }

    /// Recompute comment and progress from the registered and loaded items
    pub fn update(&mut self) -> Result<(), ProgressError> {
        let to_load = self.weight_where(|slot| slot.registered);
        let total = u64::from(self.state.expects_at_least).max(to_load);

        if total < 1 {
            return Ok(());
        }

        let loaded = self.weight_where(|slot| slot.loaded);
        if loaded > to_load {
            return Err(ProgressError::ConsistencyViolation { loaded, to_load });
        }

        self.state.comment = self.loading_comment();

        if self.tracking {
            let fraction = (loaded as f64 / total as f64) as f32;
            self.state.progress = self.state.progress.max(fraction);
        }

        let unchanged = matches!(
            &self.previous,
            Some((comment, progress))
                if *comment == self.state.comment && *progress == self.state.progress
        );
        if unchanged {
            return Ok(());
        }

        self.previous = Some((self.state.comment.clone(), self.state.progress));
        self.state.version += 1;

        Ok(())
    }

    /// Forget every item and return to the idle phase
    pub fn reset(&mut self) {
        self.slots.clear();
        self.index.clear();
        self.previous = None;
        self.tracking = false;
        self.state.comment.clear();
        self.state.expects_at_least = 0;
        self.state.progress = 0.0;
        self.state.version += 1;
    }

    fn push_slot(&mut self, item: LoadingItem, registered: bool, loaded: bool) {
        self.index.insert(item.id.clone(), self.slots.len());
        self.slots.push(ItemSlot {
            item,
            registered,
            loaded,
        });
    }

    fn weight_where(&self, filter: impl Fn(&ItemSlot) -> bool) -> u64 {
        self.slots
            .iter()
            .filter(|slot| filter(slot))
            .map(|slot| u64::from(slot.item.weight))
            .sum()
    }

    fn loading_comment(&self) -> String {
        let registered = self.slots.iter().filter(|slot| slot.registered).count();
        if registered == 0 {
            return String::new();
        }

        let loaded = self
            .slots
            .iter()
            .filter(|slot| slot.registered && slot.loaded)
            .count();

        match self
            .slots
            .iter()
            .find(|slot| slot.registered && !slot.loaded)
        {
            Some(pending) => format!("{} ({loaded}/{registered})", pending.item.comment),
            None => format!("done ({loaded}/{registered})"),
        }
    }
}
