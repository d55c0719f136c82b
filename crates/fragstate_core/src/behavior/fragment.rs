use super::{has_type, settle_dropped, AttributeBehavior, CommitMerge, ElementMerge, LocalMerge, PushMerge};
use crate::model::identity::Identity;
use crate::model::schema::AttributeDefinition;
use crate::model::value::{AttrValue, JsonValue, Payload};
use crate::store::{unexpected_shape, StateStore, StateView, StoreResult};

/// Single owned fragment, dirty when replaced or when the fragment itself is dirty.
pub(crate) struct FragmentBehavior;

impl FragmentBehavior {
    /// Reuses `existing` when it has the payload's type, otherwise creates a
    /// new fragment.
    fn merge_object(
        store: &mut StateStore,
        definition: &AttributeDefinition,
        existing: Option<Identity>,
        data: &Payload,
        merge: &dyn ElementMerge,
    ) -> StoreResult<AttrValue> {
        let type_name = store.resolve_fragment_type(definition, data)?;
        let type_key = definition.options.polymorphic_type_key.as_deref();
        let reusable = match existing {
            Some(id) if has_type(store, id, &type_name) => Some(id),
            _ => None,
        };
        if let Some(existing) = reusable {
            merge.update(store, existing, data, type_key)?;
            return Ok(AttrValue::Fragment(Some(existing)));
        }
        let created = merge.create(store, &type_name, data, type_key)?;
        Ok(AttrValue::Fragment(Some(created)))
    }
}

impl AttributeBehavior for FragmentBehavior {
    fn default_value(&self, store: &mut StateStore, owner: Identity, definition: &AttributeDefinition) -> StoreResult<AttrValue> {
        match definition.options.default.produce() {
            None | Some(JsonValue::Null) => Ok(AttrValue::Fragment(None)),
            Some(JsonValue::Object(data)) => {
                store.validate_fragment_data(definition, &data)?;
                let type_name = store.resolve_fragment_type(definition, &data)?;
                let type_key = definition.options.polymorphic_type_key.as_deref();
                let fragment = store.create_canonical_fragment(owner, &definition.key, &type_name, &data, type_key)?;
                Ok(AttrValue::Fragment(Some(fragment)))
            }
            Some(other) => Err(unexpected_shape(definition, "object or null", &other)),
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
            JsonValue::Null => Ok(AttrValue::Fragment(None)),
            JsonValue::Object(map) => Self::merge_object(
                store,
                definition,
                current.as_fragment(),
                map,
                &LocalMerge,
            ),
            other => Err(unexpected_shape(definition, "object or null", other)),
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
            JsonValue::Null => Ok(AttrValue::Fragment(None)),
            JsonValue::Object(map) => Self::merge_object(
                store,
                definition,
                canonical.and_then(AttrValue::as_fragment),
                map,
                &PushMerge {
                    owner,
                    key: &definition.key,
                },
            ),
            other => Err(unexpected_shape(definition, "object or null", other)),
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
        match server {
            None => {
                if let Some(fragment) = committed.as_fragment() {
                    store.commit_payload(fragment, None, None)?;
                }
                Ok(committed.clone())
            }
            Some(JsonValue::Null) => {
                let resolved = AttrValue::Fragment(None);
                settle_dropped(store, &committed.fragment_ids(), &resolved)?;
                Ok(resolved)
            }
            Some(JsonValue::Object(map)) => {
                let resolved = Self::merge_object(
                    store,
                    definition,
                    committed.as_fragment(),
                    map,
                    &CommitMerge {
                        owner,
                        key: &definition.key,
                    },
                )?;
                settle_dropped(store, &committed.fragment_ids(), &resolved)?;
                Ok(resolved)
            }
            Some(other) => Err(unexpected_shape(definition, "object or null", other)),
        }
    }

    fn will_commit(&self, store: &mut StateStore, value: &AttrValue) -> StoreResult<()> {
        match value.as_fragment() {
            Some(fragment) => store.begin_commit(fragment),
            None => Ok(()),
        }
    }

    fn commit_was_rejected(&self, store: &mut StateStore, value: &AttrValue) -> StoreResult<()> {
        match value.as_fragment() {
            Some(fragment) => store.commit_rejected(fragment),
            None => Ok(()),
        }
    }

    fn rollback(&self, store: &mut StateStore, original: &AttrValue) -> StoreResult<()> {
        match original.as_fragment() {
            Some(fragment) if store.contains(fragment) => store.rollback(fragment),
            _ => Ok(()),
        }
    }

    fn is_dirty(&self, store: &StateStore, value: &AttrValue, original: &AttrValue) -> bool {
        if value != original {
            return true;
        }
        value
            .as_fragment()
            .map_or(false, |fragment| store.has_changed_attributes(fragment))
    }

    fn current_state(&self, store: &StateStore, definition: &AttributeDefinition, value: &AttrValue) -> JsonValue {
        fragment_snapshot(store, definition, value, StateView::Current)
    }

    fn canonical_state(&self, store: &StateStore, definition: &AttributeDefinition, value: &AttrValue) -> JsonValue {
        fragment_snapshot(store, definition, value, StateView::Canonical)
    }
}

fn fragment_snapshot(store: &StateStore, definition: &AttributeDefinition, value: &AttrValue, view: StateView) -> JsonValue {
    match value.as_fragment() {
        Some(fragment) => store.fragment_state(
            fragment,
            view,
            definition.options.polymorphic_type_key.as_deref(),
        ),
        None => JsonValue::Null,
    }
}
