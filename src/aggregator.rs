//! Per-origin change detection over update sets.
//!
//! The notification service call is not free: recreating an identical
//! persistent notification flickers the UI and re-pushes to mobile
//! targets. [`NotificationState`] stores the identity of the last set
//! accepted per origin and only reports a change when the identity
//! actually differs, so the renderer runs exactly when needed.

use crate::update::{Origin, UpdateFact, UpdateKind, UpdateSet};
use std::collections::HashMap;

/// Last-accepted update sets per origin, plus their identity hashes.
///
/// Owned by the notifier task; concurrent source readers are serialized
/// by the channel in front of it rather than a lock.
#[derive(Debug, Default)]
pub struct NotificationState {
    sets: HashMap<Origin, UpdateSet>,
    identities: HashMap<Origin, Vec<u64>>,
}

impl NotificationState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `set` for `origin` if it differs from the last stored set.
    ///
    /// Returns true when a re-render is due: on the first observation of
    /// an origin, and whenever the order-independent identity of the set
    /// changed since the last accepted one. A transition to an empty set
    /// is a change like any other, so the dismiss path stays reachable.
    pub fn update(&mut self, origin: Origin, set: UpdateSet) -> bool {
        let identity = set.identity();
        if self.identities.get(&origin) == Some(&identity) {
            return false;
        }
        self.identities.insert(origin, identity);
        self.sets.insert(origin, set);
        true
    }

    /// Facts across all origins, grouped by kind in render priority order.
    pub fn snapshot(&self) -> Vec<(UpdateKind, Vec<&UpdateFact>)> {
        UpdateKind::ALL
            .iter()
            .map(|&kind| {
                let facts = Origin::ALL
                    .iter()
                    .filter_map(|origin| self.sets.get(origin))
                    .flat_map(UpdateSet::facts)
                    .filter(|fact| fact.kind == kind)
                    .collect();
                (kind, facts)
            })
            .collect()
    }

    /// Total pending updates across all origins.
    pub fn total_facts(&self) -> usize {
        self.sets.values().map(UpdateSet::len).sum()
    }
}
