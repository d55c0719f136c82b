//! Per-kind attribute behavior strategies.
//!
//! # Responsibility
//! - Decide defaults, normalization, merge and dirtiness for one attribute kind.
//! - Recurse into owned fragments through the store for commit transitions.
//!
//! # Invariants
//! - Strategies are stateless; all state lives in the store.
//! - Array merges are positional: index `i` of new data updates the fragment
//!   at index `i` when its type matches.

mod fragment;
mod fragment_array;
mod plain;
mod plain_array;

use crate::model::identity::Identity;
use crate::model::schema::{AttributeDefinition, AttributeKind};
use crate::model::value::{AttrValue, JsonValue, Payload};
use crate::store::{StateStore, StoreResult};
use fragment::FragmentBehavior;
use fragment_array::FragmentArrayBehavior;
use plain::PlainBehavior;
use plain_array::PlainArrayBehavior;

pub(crate) trait AttributeBehavior {
    /// Value used when the key has never been set or loaded.
    fn default_value(&self, store: &mut StateStore, owner: Identity, definition: &AttributeDefinition) -> StoreResult<AttrValue>;

    /// Converts validated plain data into a shaped value for a local write.
    fn normalize(
        &self,
        store: &mut StateStore,
        owner: Identity,
        definition: &AttributeDefinition,
        current: &AttrValue,
        data: &JsonValue,
    ) -> StoreResult<AttrValue>;

    /// Merges validated server data into the canonical value.
    fn push_data(
        &self,
        store: &mut StateStore,
        owner: Identity,
        definition: &AttributeDefinition,
        canonical: Option<&AttrValue>,
        data: &JsonValue,
    ) -> StoreResult<AttrValue>;

    /// Resolves a committed value against the optional server response.
    fn did_commit(
        &self,
        store: &mut StateStore,
        owner: Identity,
        definition: &AttributeDefinition,
        committed: &AttrValue,
        server: Option<&JsonValue>,
    ) -> StoreResult<AttrValue>;

    fn will_commit(&self, _store: &mut StateStore, _value: &AttrValue) -> StoreResult<()> {
        Ok(())
    }

    fn commit_was_rejected(&self, _store: &mut StateStore, _value: &AttrValue) -> StoreResult<()> {
        Ok(())
    }

    fn rollback(&self, _store: &mut StateStore, _original: &AttrValue) -> StoreResult<()> {
        Ok(())
    }

    fn is_dirty(&self, store: &StateStore, value: &AttrValue, original: &AttrValue) -> bool;

    fn current_state(&self, store: &StateStore, definition: &AttributeDefinition, value: &AttrValue) -> JsonValue;

    fn canonical_state(&self, store: &StateStore, definition: &AttributeDefinition, value: &AttrValue) -> JsonValue;
}

pub(crate) fn behavior_for(kind: AttributeKind) -> &'static dyn AttributeBehavior {
    match kind {
        AttributeKind::Plain => &PlainBehavior,
        AttributeKind::Fragment => &FragmentBehavior,
        AttributeKind::FragmentArray => &FragmentArrayBehavior,
        AttributeKind::PlainArray => &PlainArrayBehavior,
    }
}

/// Returns whether `fragment` is loaded with type `type_name`.
fn has_type(store: &StateStore, fragment: Identity, type_name: &str) -> bool {
    store
        .type_of(fragment)
        .map_or(false, |actual| actual == type_name)
}

/// Settles the pending commit of fragments a server response dropped, so they
/// leave the in-flight state before the orphan policy decides on them.
fn settle_dropped(store: &mut StateStore, previous: &[Identity], resolved: &AttrValue) -> StoreResult<()> {
    let kept = resolved.fragment_ids();
    for &fragment in previous {
        if kept.contains(&fragment) || !store.contains(fragment) {
            continue;
        }
        if store.is_saving(fragment)? {
            store.commit_payload(fragment, None, None)?;
        }
    }
    Ok(())
}

/// How a positional merge treats one incoming element.
pub(super) trait ElementMerge {
    fn update(&self, store: &mut StateStore, fragment: Identity, data: &Payload, skip: Option<&str>) -> StoreResult<()>;
    fn create(&self, store: &mut StateStore, type_name: &str, data: &Payload, skip: Option<&str>) -> StoreResult<Identity>;
}

/// Local write: in-place dirty updates, detached new fragments.
pub(super) struct LocalMerge;

/// Server push: canonical updates, new fragments linked under the owner.
pub(super) struct PushMerge<'a> {
    pub(super) owner: Identity,
    pub(super) key: &'a str,
}

/// Commit acknowledgement: resolves each fragment's pending commit.
pub(super) struct CommitMerge<'a> {
    pub(super) owner: Identity,
    pub(super) key: &'a str,
}

impl ElementMerge for LocalMerge {
    fn update(&self, store: &mut StateStore, fragment: Identity, data: &Payload, skip: Option<&str>) -> StoreResult<()> {
        store.assign_payload(fragment, data, skip)
    }

    fn create(&self, store: &mut StateStore, type_name: &str, data: &Payload, skip: Option<&str>) -> StoreResult<Identity> {
        store.create_local_fragment(type_name, data, skip)
    }
}

impl ElementMerge for PushMerge<'_> {
    fn update(&self, store: &mut StateStore, fragment: Identity, data: &Payload, skip: Option<&str>) -> StoreResult<()> {
        store.push_payload(fragment, data, skip)
    }

    fn create(&self, store: &mut StateStore, type_name: &str, data: &Payload, skip: Option<&str>) -> StoreResult<Identity> {
        store.create_canonical_fragment(self.owner, self.key, type_name, data, skip)
    }
}

impl ElementMerge for CommitMerge<'_> {
    fn update(&self, store: &mut StateStore, fragment: Identity, data: &Payload, skip: Option<&str>) -> StoreResult<()> {
        store.commit_payload(fragment, Some(data), skip)
    }

    fn create(&self, store: &mut StateStore, type_name: &str, data: &Payload, skip: Option<&str>) -> StoreResult<Identity> {
        store.create_canonical_fragment(self.owner, self.key, type_name, data, skip)
    }
}
