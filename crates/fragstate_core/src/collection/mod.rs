//! Live ordered-sequence views over array attributes.
//!
//! # Responsibility
//! - Expose array attributes as mutable sequences.
//! - Route every mutation through a single `replace` that writes the owner.
//!
//! # Invariants
//! - A projection re-reads its owner whenever it is stale.
//! - Every external change to the owning key bumps the version and marks the
//!   projection stale.

use crate::model::identity::Identity;
use crate::model::schema::{AttributeDefinition, AttributeKind};
use crate::model::value::{AttrValue, CollectionItem, JsonValue};
use crate::store::{check_primitive, unexpected_shape, StateStore, StoreError, StoreResult, ValidationError};
use log::debug;

/// Cached items for one `(owner, key)` pair.
#[derive(Debug, Clone)]
pub(crate) struct ProjectionState {
    items: Vec<CollectionItem>,
    version: u64,
    stale: bool,
}

impl ProjectionState {
    pub(crate) fn new() -> Self {
        Self {
            items: Vec::new(),
            version: 0,
            stale: true,
        }
    }

    pub(crate) fn invalidate(&mut self) {
        self.version += 1;
        self.stale = true;
    }
}

/// Element handed to a collection mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum ItemInput {
    /// Existing fragment, attached as-is.
    Fragment(Identity),
    /// Plain data. Objects become fragments in fragment arrays.
    Data(JsonValue),
}

impl From<Identity> for ItemInput {
    fn from(value: Identity) -> Self {
        Self::Fragment(value)
    }
}

impl From<JsonValue> for ItemInput {
    fn from(value: JsonValue) -> Self {
        Self::Data(value)
    }
}

impl From<CollectionItem> for ItemInput {
    fn from(value: CollectionItem) -> Self {
        match value {
            CollectionItem::Fragment(id) => Self::Fragment(id),
            CollectionItem::Plain(value) => Self::Data(value),
        }
    }
}

impl StateStore {
    /// Opens a sequence view over an array attribute.
    pub fn collection(&mut self, owner: Identity, key: &str) -> StoreResult<CollectionView<'_>> {
        let definition = self.definition(owner, key)?;
        if !definition.kind.is_array() {
            return Err(StoreError::InvalidKind {
                key: key.to_string(),
                expected: "array attribute",
                actual: definition.kind,
            });
        }
        self.ensure_projection(owner, key);
        Ok(CollectionView {
            store: self,
            owner,
            definition,
        })
    }
}

/// Mutable sequence view bound to one owner and array key.
pub struct CollectionView<'a> {
    store: &'a mut StateStore,
    owner: Identity,
    definition: AttributeDefinition,
}

impl CollectionView<'_> {
    pub fn owner(&self) -> Identity {
        self.owner
    }

    pub fn key(&self) -> &str {
        &self.definition.key
    }

    pub fn kind(&self) -> AttributeKind {
        self.definition.kind
    }

    /// Bumped on every change to the owning key.
    pub fn version(&self) -> u64 {
        self.store
            .projection(self.owner, &self.definition.key)
            .map_or(0, |projection| projection.version)
    }

    pub fn is_stale(&self) -> bool {
        self.store
            .projection(self.owner, &self.definition.key)
            .map_or(true, |projection| projection.stale)
    }

    fn items(&mut self) -> StoreResult<&[CollectionItem]> {
        if self.is_stale() {
            let value = self.store.get_value(self.owner, &self.definition.key)?;
            let projection = self.store.ensure_projection(self.owner, &self.definition.key);
            projection.items = value.items().unwrap_or_default();
            projection.stale = false;
        }
        Ok(self
            .store
            .projection(self.owner, &self.definition.key)
            .map(|projection| projection.items.as_slice())
            .unwrap_or_default())
    }

    pub fn len(&mut self) -> StoreResult<usize> {
        Ok(self.items()?.len())
    }

    pub fn is_empty(&mut self) -> StoreResult<bool> {
        Ok(self.items()?.is_empty())
    }

    pub fn get(&mut self, index: usize) -> StoreResult<Option<CollectionItem>> {
        Ok(self.items()?.get(index).cloned())
    }

    pub fn to_vec(&mut self) -> StoreResult<Vec<CollectionItem>> {
        Ok(self.items()?.to_vec())
    }

    /// Fragment identities in order. Empty for plain arrays.
    pub fn fragments(&mut self) -> StoreResult<Vec<Identity>> {
        Ok(self
            .items()?
            .iter()
            .filter_map(CollectionItem::as_fragment)
            .collect())
    }

    pub fn contains(&mut self, item: &CollectionItem) -> StoreResult<bool> {
        Ok(self.items()?.contains(item))
    }

    pub fn index_of(&mut self, item: &CollectionItem) -> StoreResult<Option<usize>> {
        Ok(self.items()?.iter().position(|candidate| candidate == item))
    }

    /// Removes `delete_count` items at `start` and inserts `items` there.
    ///
    /// Object data placed over a removed fragment of the same type updates that
    /// fragment in place. Returns the removed items.
    pub fn replace(&mut self, start: usize, delete_count: usize, items: Vec<ItemInput>) -> StoreResult<Vec<CollectionItem>> {
        let current = self.to_vec()?;
        if start > current.len() {
            return Err(StoreError::IndexOutOfBounds {
                index: start,
                len: current.len(),
            });
        }
        for item in &items {
            self.validate_input(item)?;
        }

        let end = start.saturating_add(delete_count).min(current.len());
        let mut planned = Vec::with_capacity(items.len());
        for (offset, item) in items.iter().enumerate() {
            let slot = start + offset;
            let reusable = if slot < end {
                current[slot].as_fragment()
            } else {
                None
            };
            planned.push(self.planned_fragment(item, reusable)?);
        }
        let attached: Vec<Identity> = current[..start]
            .iter()
            .chain(&current[end..])
            .filter_map(CollectionItem::as_fragment)
            .chain(planned.iter().flatten().copied())
            .collect();
        self.store.check_attachable(self.owner, &self.definition, &attached)?;

        let mut inserted = Vec::with_capacity(items.len());
        for (item, fragment) in items.into_iter().zip(planned) {
            inserted.push(self.resolve_input(item, fragment)?);
        }

        let mut next = current;
        let removed: Vec<CollectionItem> = next.splice(start..end, inserted).collect();
        let value = match self.definition.kind {
            AttributeKind::FragmentArray => {
                AttrValue::FragmentArray(next.iter().filter_map(CollectionItem::as_fragment).collect())
            }
            _ => AttrValue::PlainArray(
                next.iter()
                    .filter_map(CollectionItem::as_plain)
                    .cloned()
                    .collect(),
            ),
        };
        self.store.set_value(self.owner, &self.definition.key, value)?;
        debug!(
            "event=collection_replace module=collection status=ok owner={} key={} start={} removed={}",
            self.owner,
            self.definition.key,
            start,
            removed.len()
        );
        Ok(removed)
    }

    pub fn push(&mut self, item: impl Into<ItemInput>) -> StoreResult<()> {
        let len = self.len()?;
        self.replace(len, 0, vec![item.into()]).map(|_| ())
    }

    pub fn unshift(&mut self, item: impl Into<ItemInput>) -> StoreResult<()> {
        self.replace(0, 0, vec![item.into()]).map(|_| ())
    }

    pub fn insert_at(&mut self, index: usize, item: impl Into<ItemInput>) -> StoreResult<()> {
        self.replace(index, 0, vec![item.into()]).map(|_| ())
    }

    pub fn remove_at(&mut self, index: usize) -> StoreResult<CollectionItem> {
        let len = self.len()?;
        if index >= len {
            return Err(StoreError::IndexOutOfBounds { index, len });
        }
        let mut removed = self.replace(index, 1, Vec::new())?;
        Ok(removed.remove(0))
    }

    pub fn pop(&mut self) -> StoreResult<Option<CollectionItem>> {
        match self.len()? {
            0 => Ok(None),
            len => self.remove_at(len - 1).map(Some),
        }
    }

    pub fn shift(&mut self) -> StoreResult<Option<CollectionItem>> {
        if self.is_empty()? {
            return Ok(None);
        }
        self.remove_at(0).map(Some)
    }

    pub fn clear(&mut self) -> StoreResult<()> {
        let len = self.len()?;
        self.replace(0, len, Vec::new()).map(|_| ())
    }

    /// Replaces the whole sequence, reusing fragments position by position.
    pub fn set_items(&mut self, items: Vec<ItemInput>) -> StoreResult<()> {
        let len = self.len()?;
        self.replace(0, len, items).map(|_| ())
    }

    /// Dirty when the key itself is dirty or any element fragment is.
    pub fn has_dirty_attributes(&mut self) -> StoreResult<bool> {
        if self.store.is_attribute_dirty(self.owner, &self.definition.key)? {
            return Ok(true);
        }
        let fragments = self.fragments()?;
        Ok(fragments
            .into_iter()
            .any(|fragment| self.store.has_changed_attributes(fragment)))
    }

    fn validate_input(&self, item: &ItemInput) -> StoreResult<()> {
        match (self.definition.kind, item) {
            (AttributeKind::FragmentArray, ItemInput::Fragment(id)) => {
                self.store.type_of(*id)?;
                Ok(())
            }
            (AttributeKind::FragmentArray, ItemInput::Data(JsonValue::Object(data))) => {
                self.store.validate_fragment_data(&self.definition, data)
            }
            (AttributeKind::FragmentArray, ItemInput::Data(other)) => {
                Err(unexpected_shape(&self.definition, "object", other))
            }
            (_, ItemInput::Data(value)) => check_primitive(&self.definition, value),
            (_, ItemInput::Fragment(_)) => Err(ValidationError::UnexpectedShape {
                key: self.definition.key.clone(),
                expected: "plain value",
                actual: "fragment",
            }
            .into()),
        }
    }

    /// Fragment an input will occupy once resolved: the given fragment, or the
    /// removed fragment at its slot when object data of the same type is
    /// written over it. `None` when a new fragment or a plain value results.
    fn planned_fragment(&self, item: &ItemInput, reusable: Option<Identity>) -> StoreResult<Option<Identity>> {
        match (self.definition.kind, item) {
            (_, ItemInput::Fragment(id)) => Ok(Some(*id)),
            (AttributeKind::FragmentArray, ItemInput::Data(JsonValue::Object(data))) => {
                let Some(fragment) = reusable else {
                    return Ok(None);
                };
                let type_name = self.store.resolve_fragment_type(&self.definition, data)?;
                Ok((self.store.type_of(fragment)? == type_name).then_some(fragment))
            }
            _ => Ok(None),
        }
    }

    fn resolve_input(&mut self, item: ItemInput, planned: Option<Identity>) -> StoreResult<CollectionItem> {
        let data = match (self.definition.kind, item) {
            (AttributeKind::FragmentArray, ItemInput::Data(JsonValue::Object(data))) => data,
            (_, ItemInput::Fragment(id)) => return Ok(CollectionItem::Fragment(id)),
            (_, ItemInput::Data(value)) => return Ok(CollectionItem::Plain(value)),
        };
        let type_key = self.definition.options.polymorphic_type_key.as_deref();
        if let Some(fragment) = planned {
            self.store.assign_payload(fragment, &data, type_key)?;
            return Ok(CollectionItem::Fragment(fragment));
        }
        let type_name = self.store.resolve_fragment_type(&self.definition, &data)?;
        let fragment = self.store.create_local_fragment(&type_name, &data, type_key)?;
        Ok(CollectionItem::Fragment(fragment))
    }
}
