//! `update.` domain entity reader.
//!
//! Every entity in the `update` domain represents one updatable
//! component: state `on` means an update is pending. The tracker keeps
//! facts keyed by entity id so each event is a single upsert or delete,
//! and emits the full rebuilt set for change detection.

use crate::update::{UpdateFact, UpdateKind, UpdateSet};
use log::debug;
use serde_json::Value;
use std::collections::BTreeMap;

pub fn is_update_entity(entity_id: &str) -> bool {
    entity_id.starts_with("update.")
}

/// Entity-keyed fact store for the Entities origin.
#[derive(Debug, Default)]
pub struct EntityTracker {
    facts: BTreeMap<String, UpdateFact>,
}

impl EntityTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one state change and return the current set.
    ///
    /// `on` upserts the entity's fact; any other state (including a
    /// removed entity) deletes it, which makes a stale fact disappear
    /// from the notification instead of lingering.
    pub fn apply(&mut self, entity_id: &str, state: Option<&str>, attributes: &Value) -> UpdateSet {
        if state == Some("on") {
            self.facts
                .insert(entity_id.to_string(), fact_from_state(entity_id, attributes));
        } else if self.facts.remove(entity_id).is_some() {
            debug!("[Entities] {} cleared", entity_id);
        }
        self.facts.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.facts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }
}

fn fact_from_state(entity_id: &str, attributes: &Value) -> UpdateFact {
    let string_attr = |key: &str| {
        attributes
            .get(key)
            .and_then(Value::as_str)
            .map(str::to_string)
    };
    let name = string_attr("friendly_name").unwrap_or_else(|| entity_id.to_string());
    UpdateFact::new(UpdateKind::Entity, name)
        .versions(string_attr("installed_version"), string_attr("latest_version"))
        .source_id(entity_id)
}
