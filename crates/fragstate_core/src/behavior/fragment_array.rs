use super::{has_type, settle_dropped, AttributeBehavior, CommitMerge, ElementMerge, LocalMerge, PushMerge};
use crate::model::identity::Identity;
use crate::model::schema::AttributeDefinition;
use crate::model::value::{AttrValue, JsonValue};
use crate::store::{unexpected_shape, StateStore, StateView, StoreResult};

/// Ordered owned fragments, merged by position.
pub(crate) struct FragmentArrayBehavior;

impl FragmentArrayBehavior {
    /// Element `i` of `items` updates `existing[i]` when the types match;
    /// other elements become new fragments. Extra existing fragments are dropped.
    fn merge_positional(
        store: &mut StateStore,
        definition: &AttributeDefinition,
        existing: &[Identity],
        items: &[JsonValue],
        merge: &dyn ElementMerge,
    ) -> StoreResult<AttrValue> {
        let type_key = definition.options.polymorphic_type_key.as_deref();
        let mut merged = Vec::with_capacity(items.len());
        for (index, item) in items.iter().enumerate() {
            let JsonValue::Object(data) = item else {
                return Err(unexpected_shape(definition, "object", item));
            };
            let type_name = store.resolve_fragment_type(definition, data)?;
            match existing.get(index) {
                Some(&fragment) if has_type(store, fragment, &type_name) => {
                    merge.update(store, fragment, data, type_key)?;
                    merged.push(fragment);
                }
                _ => merged.push(merge.create(store, &type_name, data, type_key)?),
            }
        }
        Ok(AttrValue::FragmentArray(merged))
    }
}

impl AttributeBehavior for FragmentArrayBehavior {
    fn default_value(&self, store: &mut StateStore, owner: Identity, definition: &AttributeDefinition) -> StoreResult<AttrValue> {
        match definition.options.default.produce() {
            None | Some(JsonValue::Null) => Ok(AttrValue::FragmentArray(Vec::new())),
            Some(data) => {
                store.validate_data(definition, &data, true)?;
                let items = data.as_array().map(Vec::as_slice).unwrap_or_default();
                let merge = PushMerge {
                    owner,
                    key: &definition.key,
                };
                Self::merge_positional(store, definition, &[], items, &merge)
            }
        }
    }

    fn normalize(
        &self,
        store: &mut StateStore,
        _owner: Identity,
        definition: &AttributeDefinition,
        current: &AttrValue,
        data: &JsonValue,
    ) -> StoreResult<AttrValue> {
        match data {
            JsonValue::Array(items) => {
                let existing = current.as_fragments().unwrap_or_default().to_vec();
                Self::merge_positional(store, definition, &existing, items, &LocalMerge)
            }
            other => Err(unexpected_shape(definition, "array of objects", other)),
        }
    }

    fn push_data(
        &self,
        store: &mut StateStore,
        owner: Identity,
        definition: &AttributeDefinition,
        canonical: Option<&AttrValue>,
        data: &JsonValue,
    ) -> StoreResult<AttrValue> {
        match data {
            JsonValue::Null => Ok(AttrValue::FragmentArray(Vec::new())),
            JsonValue::Array(items) => {
                let existing = canonical
                    .and_then(AttrValue::as_fragments)
                    .unwrap_or_default()
                    .to_vec();
                let merge = PushMerge {
                    owner,
                    key: &definition.key,
                };
                Self::merge_positional(store, definition, &existing, items, &merge)
            }
            other => Err(unexpected_shape(definition, "array of objects", other)),
        }
    }

    fn did_commit(
        &self,
        store: &mut StateStore,
        owner: Identity,
        definition: &AttributeDefinition,
        committed: &AttrValue,
        server: Option<&JsonValue>,
    ) -> StoreResult<AttrValue> {
        let existing = committed.as_fragments().unwrap_or_default().to_vec();
        match server {
            None => {
                for fragment in &existing {
                    store.commit_payload(*fragment, None, None)?;
                }
                Ok(committed.clone())
            }
            Some(JsonValue::Null) => {
                let resolved = AttrValue::FragmentArray(Vec::new());
                settle_dropped(store, &existing, &resolved)?;
                Ok(resolved)
            }
            Some(JsonValue::Array(items)) => {
                let merge = CommitMerge {
                    owner,
                    key: &definition.key,
                };
                let resolved = Self::merge_positional(store, definition, &existing, items, &merge)?;
                settle_dropped(store, &existing, &resolved)?;
                Ok(resolved)
            }
            Some(other) => Err(unexpected_shape(definition, "array of objects", other)),
        }
    }

    fn will_commit(&self, store: &mut StateStore, value: &AttrValue) -> StoreResult<()> {
        for fragment in value.fragment_ids() {
            store.begin_commit(fragment)?;
        }
        Ok(())
    }

    fn commit_was_rejected(&self, store: &mut StateStore, value: &AttrValue) -> StoreResult<()> {
        for fragment in value.fragment_ids() {
            store.commit_rejected(fragment)?;
        }
        Ok(())
    }

    fn rollback(&self, store: &mut StateStore, original: &AttrValue) -> StoreResult<()> {
        for fragment in original.fragment_ids() {
            if store.contains(fragment) {
                store.rollback(fragment)?;
            }
        }
        Ok(())
    }

    fn is_dirty(&self, store: &StateStore, value: &AttrValue, original: &AttrValue) -> bool {
        if value != original {
            return true;
        }
        value
            .fragment_ids()
            .into_iter()
            .any(|fragment| store.has_changed_attributes(fragment))
    }

    fn current_state(&self, store: &StateStore, definition: &AttributeDefinition, value: &AttrValue) -> JsonValue {
        array_snapshot(store, definition, value, StateView::Current)
    }

    fn canonical_state(&self, store: &StateStore, definition: &AttributeDefinition, value: &AttrValue) -> JsonValue {
        array_snapshot(store, definition, value, StateView::Canonical)
    }
}

fn array_snapshot(store: &StateStore, definition: &AttributeDefinition, value: &AttrValue, view: StateView) -> JsonValue {
    let type_key = definition.options.polymorphic_type_key.as_deref();
    JsonValue::Array(
        value
            .fragment_ids()
            .into_iter()
            .map(|fragment| store.fragment_state(fragment, view, type_key))
            .collect(),
    )
}
