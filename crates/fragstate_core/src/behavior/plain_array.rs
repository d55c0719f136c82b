use super::AttributeBehavior;
use crate::model::identity::Identity;
use crate::model::schema::AttributeDefinition;
use crate::model::value::{AttrValue, JsonValue};
use crate::store::{check_primitive, unexpected_shape, StateStore, StoreResult};

/// Ordered primitive values compared element-wise.
pub(crate) struct PlainArrayBehavior;

impl PlainArrayBehavior {
    fn from_data(definition: &AttributeDefinition, data: &JsonValue, allow_null: bool) -> StoreResult<AttrValue> {
        match data {
            JsonValue::Array(items) => {
                items.iter().try_for_each(|item| check_primitive(definition, item))?;
                Ok(AttrValue::PlainArray(items.clone()))
            }
            JsonValue::Null if allow_null => Ok(AttrValue::PlainArray(Vec::new())),
            other => Err(unexpected_shape(definition, "array of primitives", other)),
        }
    }
}

impl AttributeBehavior for PlainArrayBehavior {
    fn default_value(&self, _store: &mut StateStore, _owner: Identity, definition: &AttributeDefinition) -> StoreResult<AttrValue> {
        match definition.options.default.produce() {
            Some(data) => Self::from_data(definition, &data, true),
            None => Ok(AttrValue::PlainArray(Vec::new())),
        }
    }

    fn normalize(
        &self,
        _store: &mut StateStore,
        _owner: Identity,
        definition: &AttributeDefinition,
        _current: &AttrValue,
        data: &JsonValue,
    ) -> StoreResult<AttrValue> {
        Self::from_data(definition, data, false)
    }

    fn push_data(
        &self,
        _store: &mut StateStore,
        _owner: Identity,
        definition: &AttributeDefinition,
        _canonical: Option<&AttrValue>,
        data: &JsonValue,
    ) -> StoreResult<AttrValue> {
        Self::from_data(definition, data, true)
    }

    fn did_commit(
        &self,
        _store: &mut StateStore,
        _owner: Identity,
        definition: &AttributeDefinition,
        committed: &AttrValue,
        server: Option<&JsonValue>,
    ) -> StoreResult<AttrValue> {
        match server {
            Some(data) => Self::from_data(definition, data, true),
            None => Ok(committed.clone()),
        }
    }

    fn is_dirty(&self, _store: &StateStore, value: &AttrValue, original: &AttrValue) -> bool {
        value != original
    }

    fn current_state(&self, _store: &StateStore, _definition: &AttributeDefinition, value: &AttrValue) -> JsonValue {
        JsonValue::Array(value.as_plain_array().map(<[JsonValue]>::to_vec).unwrap_or_default())
    }

    fn canonical_state(&self, store: &StateStore, definition: &AttributeDefinition, value: &AttrValue) -> JsonValue {
        self.current_state(store, definition, value)
    }
}
