//! Tri-state attribute store for records and their fragments.
//!
//! # Responsibility
//! - Hold canonical, dirty and in-flight attribute maps per identity.
//! - Run get/set, commit, rejection and rollback transitions.
//! - Propagate dirty and reset events up the ownership chain.
//!
//! # Invariants
//! - A key present in `dirty` is dirty against its original under the key's
//!   behavior strategy.
//! - Every fragment referenced by a stored value has an ownership link to the
//!   identity and key that hold it.
//! - At most one commit is in flight per identity.

mod entry;
mod error;
mod graph;
mod notify;
mod ownership;
mod propagation;
mod transaction;
mod validate;

pub use error::{StoreError, StoreResult, ValidationError};
pub use notify::{ChangeNotify, NoopNotify};
pub use ownership::OwnershipLink;
pub(crate) use validate::{check_primitive, unexpected_shape};

use crate::behavior::behavior_for;
use crate::collection::ProjectionState;
use crate::config::{StoreConfig, StoreOptions};
use crate::model::identity::{Identity, IdentityRegistry, UuidIdentityRegistry};
use crate::model::lifecycle::LifecycleState;
use crate::model::schema::{AttributeDefinition, AttributeKind, SchemaSource, TypeSchema};
use crate::model::value::{AttrValue, JsonValue, Payload};
use entry::StateEntry;
use log::{debug, trace};
use ownership::OwnershipTable;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Deep diff per dirty key: `(canonical, current)`.
pub type ChangedAttributes = BTreeMap<String, (JsonValue, JsonValue)>;

/// Which of the tri-state maps a deep snapshot reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StateView {
    Current,
    Canonical,
}

/// Per-identity state cache with fragment-aware dirty tracking.
pub struct StateStore {
    schema: Arc<dyn SchemaSource>,
    identities: Box<dyn IdentityRegistry>,
    notifier: Box<dyn ChangeNotify>,
    options: StoreOptions,
    entries: HashMap<Identity, StateEntry>,
    links: OwnershipTable,
    projections: HashMap<Identity, HashMap<String, ProjectionState>>,
}

impl StateStore {
    /// Creates a store with a UUID identity registry and no change hook.
    pub fn new(schema: impl SchemaSource + 'static) -> Self {
        Self::with_shared_schema(Arc::new(schema))
    }

    pub fn with_shared_schema(schema: Arc<dyn SchemaSource>) -> Self {
        Self {
            schema,
            identities: Box::new(UuidIdentityRegistry::new()),
            notifier: Box::new(NoopNotify),
            options: StoreOptions::default(),
            entries: HashMap::new(),
            links: OwnershipTable::default(),
            projections: HashMap::new(),
        }
    }

    /// Creates a store configured from a loaded config document.
    pub fn from_config(schema: impl SchemaSource + 'static, config: &StoreConfig) -> Self {
        Self::new(schema).with_options(config.store.clone())
    }

    pub fn with_notifier(mut self, notifier: impl ChangeNotify + 'static) -> Self {
        self.notifier = Box::new(notifier);
        self
    }

    pub fn with_identity_registry(mut self, registry: impl IdentityRegistry + 'static) -> Self {
        self.identities = Box::new(registry);
        self
    }

    pub fn with_options(mut self, options: StoreOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    /// Number of loaded identities, records and fragments alike.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: Identity) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn type_of(&self, id: Identity) -> StoreResult<&str> {
        Ok(self.entry(id)?.type_name.as_str())
    }

    pub fn lifecycle(&self, id: Identity) -> StoreResult<LifecycleState> {
        Ok(self.entry(id)?.lifecycle)
    }

    /// Returns whether the identity was created locally and never committed.
    pub fn is_new(&self, id: Identity) -> StoreResult<bool> {
        Ok(self.entry(id)?.lifecycle.is_new())
    }

    /// Returns whether a commit is pending for the identity.
    pub fn is_saving(&self, id: Identity) -> StoreResult<bool> {
        Ok(!self.entry(id)?.in_flight.is_empty())
    }

    /// Owner link of a fragment. `None` for roots and detached fragments.
    pub fn owner_of(&self, id: Identity) -> Option<&OwnershipLink> {
        self.links.owner_of(id)
    }

    /// Returns the visible value, computing and caching the default on first read.
    pub fn get_value(&mut self, id: Identity, key: &str) -> StoreResult<AttrValue> {
        if let Some(value) = self.entry(id)?.current(key) {
            return Ok(value.clone());
        }
        self.original_value(id, key)
    }

    /// Returns the visible value without computing defaults.
    pub fn peek_value(&self, id: Identity, key: &str) -> StoreResult<Option<AttrValue>> {
        let entry = self.entry(id)?;
        if entry.current(key).is_none() {
            self.definition(id, key)?;
        }
        Ok(entry.current(key).cloned())
    }

    /// Returns whether any state map holds the key, including a cached default.
    pub fn has_value(&self, id: Identity, key: &str) -> bool {
        self.entries
            .get(&id)
            .map_or(false, |entry| entry.has_value(key))
    }

    /// Reads a scalar fragment attribute.
    pub fn fragment(&mut self, id: Identity, key: &str) -> StoreResult<Option<Identity>> {
        let definition = self.definition(id, key)?;
        if definition.kind != AttributeKind::Fragment {
            return Err(StoreError::InvalidKind {
                key: key.to_string(),
                expected: AttributeKind::Fragment.as_str(),
                actual: definition.kind,
            });
        }
        Ok(self.get_value(id, key)?.as_fragment())
    }

    /// Writes a shaped value, tracking dirtiness against the original.
    ///
    /// Fragments referenced by `value` are attached under `id.key`; a fragment
    /// owned elsewhere is rejected with `OwnershipViolation`.
    pub fn set_value(&mut self, id: Identity, key: &str, value: AttrValue) -> StoreResult<()> {
        let definition = self.definition(id, key)?;
        check_shape(&definition, &value)?;
        self.attach_fragments(id, &definition, &value)?;

        let original = self.original_value(id, key)?;
        let previous = self.get_value(id, key)?;
        let is_dirty = behavior_for(definition.kind).is_dirty(self, &value, &original);

        let entry = self.entry_mut(id)?;
        let was_dirty = if is_dirty {
            entry.dirty.insert(key.to_string(), value.clone()).is_some()
        } else {
            entry.dirty.remove(key).is_some()
        };
        entry.sync_lifecycle();
        self.invalidate_projection(id, key);

        if was_dirty != is_dirty || previous != value {
            self.notify_change(id, key);
        }
        debug!(
            "event=attribute_set module=store status=ok identity={} key={} dirty={}",
            id, key, is_dirty
        );

        match (was_dirty, is_dirty) {
            (false, true) => self.propagate_dirty(id, key),
            (true, false) => self.propagate_reset(id, key),
            _ => Ok(()),
        }
    }

    /// Writes plain data, normalizing objects into fragments.
    ///
    /// An object written over an existing fragment of the same type updates
    /// that fragment in place.
    pub fn set_data(&mut self, id: Identity, key: &str, data: &JsonValue) -> StoreResult<()> {
        let definition = self.definition(id, key)?;
        self.validate_data(&definition, data, false)?;
        self.assign_data(id, key, data)
    }

    /// Returns whether the identity has any locally dirty attribute.
    pub fn has_changed_attributes(&self, id: Identity) -> bool {
        self.entries
            .get(&id)
            .map_or(false, |entry| !entry.dirty.is_empty())
    }

    /// Returns whether one attribute is locally dirty.
    pub fn is_attribute_dirty(&self, id: Identity, key: &str) -> StoreResult<bool> {
        Ok(self.entry(id)?.dirty.contains_key(key))
    }

    /// Deep `(canonical, current)` pairs for every dirty key.
    pub fn changed_attributes(&self, id: Identity) -> StoreResult<ChangedAttributes> {
        let entry = self.entry(id)?;
        let mut changes = ChangedAttributes::new();
        for (key, current) in &entry.dirty {
            let definition = self.definition(id, key)?;
            let behavior = behavior_for(definition.kind);
            let canonical = entry
                .canonical
                .get(key)
                .map(|value| behavior.canonical_state(self, &definition, value))
                .unwrap_or(JsonValue::Null);
            let current = behavior.current_state(self, &definition, current);
            changes.insert(key.clone(), (canonical, current));
        }
        Ok(changes)
    }

    /// Deep plain-data snapshot of every visible attribute.
    pub fn current_state(&self, id: Identity) -> StoreResult<Payload> {
        self.state_payload(id, StateView::Current)
    }

    /// Deep plain-data snapshot of the canonical attributes.
    pub fn canonical_state(&self, id: Identity) -> StoreResult<Payload> {
        self.state_payload(id, StateView::Canonical)
    }

    pub(crate) fn state_payload(&self, id: Identity, view: StateView) -> StoreResult<Payload> {
        let entry = self.entry(id)?;
        let mut payload = Payload::new();
        for definition in self.type_schema(&entry.type_name)?.attributes() {
            let value = match view {
                StateView::Current => entry.current(&definition.key),
                StateView::Canonical => entry.canonical.get(&definition.key),
            };
            let Some(value) = value else {
                continue;
            };
            let behavior = behavior_for(definition.kind);
            let state = match view {
                StateView::Current => behavior.current_state(self, definition, value),
                StateView::Canonical => behavior.canonical_state(self, definition, value),
            };
            payload.insert(definition.key.clone(), state);
        }
        Ok(payload)
    }

    /// Snapshot of a nested fragment, tagged with its type for polymorphic keys.
    pub(crate) fn fragment_state(&self, id: Identity, view: StateView, type_key: Option<&str>) -> JsonValue {
        let Ok(mut payload) = self.state_payload(id, view) else {
            return JsonValue::Null;
        };
        if let (Some(type_key), Ok(type_name)) = (type_key, self.type_of(id)) {
            payload.insert(type_key.to_string(), JsonValue::String(type_name.to_string()));
        }
        JsonValue::Object(payload)
    }

    pub(crate) fn entry(&self, id: Identity) -> StoreResult<&StateEntry> {
        self.entries.get(&id).ok_or(StoreError::UnknownIdentity(id))
    }

    pub(crate) fn entry_mut(&mut self, id: Identity) -> StoreResult<&mut StateEntry> {
        self.entries
            .get_mut(&id)
            .ok_or(StoreError::UnknownIdentity(id))
    }

    pub(crate) fn type_schema(&self, type_name: &str) -> StoreResult<&TypeSchema> {
        self.schema
            .type_schema(type_name)
            .ok_or_else(|| StoreError::UnknownType(type_name.to_string()))
    }

    pub(crate) fn definition(&self, id: Identity, key: &str) -> StoreResult<AttributeDefinition> {
        let type_name = self.type_of(id)?;
        self.type_schema(type_name)?
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::UnknownAttribute {
                type_name: type_name.to_string(),
                key: key.to_string(),
            })
    }

    pub(crate) fn definitions(&self, id: Identity) -> StoreResult<Vec<AttributeDefinition>> {
        let type_name = self.type_of(id)?;
        Ok(self.type_schema(type_name)?.attributes().cloned().collect())
    }

    /// In-flight, then canonical, then the computed default (cached as canonical).
    pub(crate) fn original_value(&mut self, id: Identity, key: &str) -> StoreResult<AttrValue> {
        if let Some(value) = self.entry(id)?.original(key) {
            return Ok(value.clone());
        }
        let definition = self.definition(id, key)?;
        let value = behavior_for(definition.kind).default_value(self, id, &definition)?;
        self.entry_mut(id)?
            .canonical
            .insert(key.to_string(), value.clone());
        trace!(
            "event=default_cached module=store status=ok identity={} key={}",
            id,
            key
        );
        Ok(value)
    }

    /// Normalizes already validated data and writes it.
    pub(crate) fn assign_data(&mut self, id: Identity, key: &str, data: &JsonValue) -> StoreResult<()> {
        let definition = self.definition(id, key)?;
        let current = self.get_value(id, key)?;
        let value = behavior_for(definition.kind).normalize(self, id, &definition, &current, data)?;
        self.set_value(id, key, value)
    }

    pub(crate) fn assign_payload(&mut self, id: Identity, payload: &Payload, skip_key: Option<&str>) -> StoreResult<()> {
        for (key, data) in payload {
            if skip_key == Some(key.as_str()) {
                continue;
            }
            self.assign_data(id, key, data)?;
        }
        Ok(())
    }

    pub(crate) fn notify_change(&self, id: Identity, key: &str) {
        trace!(
            "event=change_notify module=store status=ok identity={} key={}",
            id,
            key
        );
        self.notifier.notify(id, key);
    }

    pub(crate) fn projection(&self, id: Identity, key: &str) -> Option<&ProjectionState> {
        self.projections.get(&id).and_then(|by_key| by_key.get(key))
    }

    pub(crate) fn ensure_projection(&mut self, id: Identity, key: &str) -> &mut ProjectionState {
        self.projections
            .entry(id)
            .or_default()
            .entry(key.to_string())
            .or_insert_with(ProjectionState::new)
    }

    pub(crate) fn invalidate_projection(&mut self, id: Identity, key: &str) {
        if let Some(projection) = self.projections.get_mut(&id).and_then(|by_key| by_key.get_mut(key)) {
            projection.invalidate();
        }
    }

    pub(crate) fn invalidate_projections(&mut self, id: Identity) {
        if let Some(by_key) = self.projections.get_mut(&id) {
            by_key.values_mut().for_each(ProjectionState::invalidate);
        }
    }

    /// Links every fragment in `value` to `owner.key` after checking type,
    /// cycles and single ownership for all of them.
    fn attach_fragments(&mut self, owner: Identity, definition: &AttributeDefinition, value: &AttrValue) -> StoreResult<()> {
        let fragments = value.fragment_ids();
        self.check_attachable(owner, definition, &fragments)?;
        for fragment in fragments {
            self.link_fragment(fragment, owner, &definition.key)?;
        }
        Ok(())
    }

    /// Checks that `fragments` may all sit under `owner.key` at once without
    /// touching any state: declared type, no duplicates, no cycles, no second owner.
    pub(crate) fn check_attachable(&self, owner: Identity, definition: &AttributeDefinition, fragments: &[Identity]) -> StoreResult<()> {
        for (index, &fragment) in fragments.iter().enumerate() {
            let fragment_type = self.type_of(fragment)?;
            if let (false, Some(expected)) = (definition.is_polymorphic(), definition.element_type.as_deref()) {
                if fragment_type != expected {
                    return Err(ValidationError::FragmentType {
                        key: definition.key.clone(),
                        expected: expected.to_string(),
                        actual: fragment_type.to_string(),
                    }
                    .into());
                }
            }
            if fragments[..index].contains(&fragment) {
                return Err(ValidationError::DuplicateFragment {
                    key: definition.key.clone(),
                    fragment,
                }
                .into());
            }
            if self.links.is_self_or_ancestor(fragment, owner) {
                return Err(StoreError::OwnershipCycle { fragment, owner });
            }
            if let Err(existing) = self.links.check(fragment, owner, &definition.key) {
                log::warn!(
                    "event=ownership_violation module=store status=error fragment={} owner={} key={}",
                    fragment,
                    owner,
                    definition.key
                );
                return Err(StoreError::OwnershipViolation {
                    fragment,
                    existing,
                    requested: OwnershipLink::new(owner, definition.key.clone()),
                });
            }
        }
        Ok(())
    }

    pub(crate) fn link_fragment(&mut self, fragment: Identity, owner: Identity, key: &str) -> StoreResult<()> {
        self.links
            .link(fragment, owner, key)
            .map_err(|existing| StoreError::OwnershipViolation {
                fragment,
                existing,
                requested: OwnershipLink::new(owner, key),
            })
    }
}

fn check_shape(definition: &AttributeDefinition, value: &AttrValue) -> StoreResult<()> {
    if value.kind() == definition.kind {
        if let AttrValue::PlainArray(items) = value {
            return items.iter().try_for_each(|item| check_primitive(definition, item));
        }
        return Ok(());
    }
    Err(ValidationError::UnexpectedShape {
        key: definition.key.clone(),
        expected: definition.kind.as_str(),
        actual: value.kind().as_str(),
    }
    .into())
}
