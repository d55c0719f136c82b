//! Per-identity state entry.

use crate::model::lifecycle::{transition, LifecycleEvent, LifecycleState};
use crate::model::value::AttrValue;
use std::collections::BTreeMap;

/// Tri-state attribute maps plus lifecycle state for one identity.
#[derive(Debug, Clone)]
pub(crate) struct StateEntry {
    pub(crate) type_name: String,
    pub(crate) canonical: BTreeMap<String, AttrValue>,
    /// Only keys overridden locally.
    pub(crate) dirty: BTreeMap<String, AttrValue>,
    /// Only populated while a commit is pending.
    pub(crate) in_flight: BTreeMap<String, AttrValue>,
    pub(crate) lifecycle: LifecycleState,
}

impl StateEntry {
    pub(crate) fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            canonical: BTreeMap::new(),
            dirty: BTreeMap::new(),
            in_flight: BTreeMap::new(),
            lifecycle: LifecycleState::Empty,
        }
    }

    pub(crate) fn starting_with(type_name: impl Into<String>, event: LifecycleEvent) -> Self {
        let mut entry = Self::new(type_name);
        entry.apply(event);
        entry
    }

    /// Visible value: dirty, then in-flight, then canonical.
    pub(crate) fn current(&self, key: &str) -> Option<&AttrValue> {
        self.dirty
            .get(key)
            .or_else(|| self.in_flight.get(key))
            .or_else(|| self.canonical.get(key))
    }

    /// Value local edits are diffed against: in-flight, then canonical.
    pub(crate) fn original(&self, key: &str) -> Option<&AttrValue> {
        self.in_flight.get(key).or_else(|| self.canonical.get(key))
    }

    pub(crate) fn has_value(&self, key: &str) -> bool {
        self.current(key).is_some()
    }

    pub(crate) fn apply(&mut self, event: LifecycleEvent) {
        self.lifecycle = transition(self.lifecycle, event);
    }

    /// Feeds the current dirty/clean condition into the state machine.
    pub(crate) fn sync_lifecycle(&mut self) {
        let event = if self.dirty.is_empty() {
            LifecycleEvent::BecameClean
        } else {
            LifecycleEvent::BecameDirty
        };
        self.apply(event);
    }
}

#[cfg(test)]
mod tests {
    use super::StateEntry;
    use crate::model::lifecycle::{LifecycleEvent, LifecycleState};
    use crate::model::value::AttrValue;
    use serde_json::json;

    #[test]
    fn current_prefers_dirty_then_in_flight() {
        let mut entry = StateEntry::new("name");
        entry
            .canonical
            .insert("first".to_string(), AttrValue::Plain(json!("Eddard")));
        assert_eq!(entry.current("first"), Some(&AttrValue::Plain(json!("Eddard"))));

        entry
            .in_flight
            .insert("first".to_string(), AttrValue::Plain(json!("Ned")));
        assert_eq!(entry.current("first"), Some(&AttrValue::Plain(json!("Ned"))));
        assert_eq!(entry.original("first"), Some(&AttrValue::Plain(json!("Ned"))));

        entry
            .dirty
            .insert("first".to_string(), AttrValue::Plain(json!("Arya")));
        assert_eq!(entry.current("first"), Some(&AttrValue::Plain(json!("Arya"))));
        assert_eq!(entry.original("first"), Some(&AttrValue::Plain(json!("Ned"))));
    }

    #[test]
    fn sync_lifecycle_tracks_dirty_map() {
        let mut entry = StateEntry::new("name");
        entry.apply(LifecycleEvent::Loaded);
        entry
            .dirty
            .insert("first".to_string(), AttrValue::Plain(json!("Arya")));
        entry.sync_lifecycle();
        assert_eq!(entry.lifecycle, LifecycleState::Updated);
        entry.dirty.clear();
        entry.sync_lifecycle();
        assert_eq!(entry.lifecycle, LifecycleState::Saved);
    }
}
