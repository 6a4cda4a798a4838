//! Update facts and per-origin update sets.
//!
//! One [`UpdateFact`] describes a single pending update (core, add-on,
//! HACS repository, or generic `update.` entity). Facts are value objects:
//! immutable once constructed, compared by their full identity.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// What class of component an update applies to.
///
/// Variant order is the render priority order: platform updates come
/// first in the notification, entity updates last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum UpdateKind {
    /// Home Assistant itself (Core, OS, Supervisor).
    Platform,
    /// A Supervisor-managed add-on.
    Addon,
    /// A HACS repository.
    Plugin,
    /// A generic `update.` domain entity.
    Entity,
}

impl UpdateKind {
    /// All kinds, in render priority order.
    pub const ALL: [UpdateKind; 4] = [
        UpdateKind::Platform,
        UpdateKind::Addon,
        UpdateKind::Plugin,
        UpdateKind::Entity,
    ];
}

/// Which source reader produced a set. Change detection is tracked
/// per origin, not per kind: the Supervisor origin mixes Platform and
/// Addon facts in one set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Origin {
    /// Periodic Supervisor REST poll (Platform + Addon facts).
    Supervisor,
    /// HACS aggregate sensor (Plugin facts).
    Hacs,
    /// `update.` domain entities (Entity facts).
    Entities,
}

impl Origin {
    pub const ALL: [Origin; 3] = [Origin::Supervisor, Origin::Hacs, Origin::Entities];
}

/// One pending update.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UpdateFact {
    pub kind: UpdateKind,
    pub name: String,
    pub current_version: Option<String>,
    pub new_version: Option<String>,
    /// Deep link rendered as a markdown link target when present.
    pub path: Option<String>,
    /// Entity id for entity-keyed sets; facts with the same `source_id`
    /// replace each other on insert.
    pub source_id: Option<String>,
}

impl UpdateFact {
    pub fn new(kind: UpdateKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            current_version: None,
            new_version: None,
            path: None,
            source_id: None,
        }
    }

    pub fn versions(
        mut self,
        current: Option<impl Into<String>>,
        new: Option<impl Into<String>>,
    ) -> Self {
        self.current_version = current.map(Into::into);
        self.new_version = new.map(Into::into);
        self
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn source_id(mut self, id: impl Into<String>) -> Self {
        self.source_id = Some(id.into());
        self
    }

    /// Stable identity hash over all fields, used by the change detector.
    pub fn identity(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.hash(&mut hasher);
        hasher.finish()
    }
}

/// Ordered collection of facts for one origin.
///
/// Insertion is a keyed upsert: a fact whose `source_id` matches an
/// existing fact replaces it in place, so no two facts in a set ever
/// share a `source_id`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateSet {
    facts: Vec<UpdateFact>,
}

impl UpdateSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, fact: UpdateFact) {
        if let Some(id) = &fact.source_id
            && let Some(existing) = self
                .facts
                .iter_mut()
                .find(|f| f.source_id.as_deref() == Some(id.as_str()))
        {
            *existing = fact;
            return;
        }
        self.facts.push(fact);
    }

    pub fn facts(&self) -> &[UpdateFact] {
        &self.facts
    }

    pub fn len(&self) -> usize {
        self.facts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }

    /// Sorted identity hashes; two sets with the same facts in any
    /// order produce the same sequence.
    pub fn identity(&self) -> Vec<u64> {
        let mut hashes: Vec<u64> = self.facts.iter().map(UpdateFact::identity).collect();
        hashes.sort_unstable();
        hashes
    }
}

impl FromIterator<UpdateFact> for UpdateSet {
    fn from_iter<T: IntoIterator<Item = UpdateFact>>(iter: T) -> Self {
        let mut set = UpdateSet::new();
        for fact in iter {
            set.insert(fact);
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fact(name: &str) -> UpdateFact {
        UpdateFact::new(UpdateKind::Addon, name).versions(Some("1.0"), Some("1.1"))
    }

    #[test]
    fn test_identity_ignores_order() {
        let a: UpdateSet = [fact("one"), fact("two")].into_iter().collect();
        let b: UpdateSet = [fact("two"), fact("one")].into_iter().collect();
        assert_eq!(a.identity(), b.identity());
    }

    #[test]
    fn test_identity_differs_on_version_change() {
        let a: UpdateSet = [fact("one")].into_iter().collect();
        let b: UpdateSet = [fact("one").versions(Some("1.0"), Some("1.2"))]
            .into_iter()
            .collect();
        assert_ne!(a.identity(), b.identity());
    }

    #[test]
    fn test_insert_upserts_on_source_id() {
        let mut set = UpdateSet::new();
        set.insert(
            UpdateFact::new(UpdateKind::Entity, "ESPHome")
                .source_id("update.esphome")
                .versions(Some("2024.6.0"), Some("2024.7.0")),
        );
        set.insert(
            UpdateFact::new(UpdateKind::Entity, "ESPHome")
                .source_id("update.esphome")
                .versions(Some("2024.6.0"), Some("2024.8.0")),
        );
        assert_eq!(set.len(), 1);
        assert_eq!(set.facts()[0].new_version.as_deref(), Some("2024.8.0"));
    }

    #[test]
    fn test_insert_without_source_id_appends() {
        let mut set = UpdateSet::new();
        set.insert(fact("one"));
        set.insert(fact("one"));
        assert_eq!(set.len(), 2);
    }
}
