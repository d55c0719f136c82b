use super::AttributeBehavior;
use crate::model::identity::Identity;
use crate::model::schema::AttributeDefinition;
use crate::model::value::{AttrValue, JsonValue};
use crate::store::{StateStore, StoreResult};

/// Primitive values compared by equality.
pub(crate) struct PlainBehavior;

impl AttributeBehavior for PlainBehavior {
    fn default_value(&self, _store: &mut StateStore, _owner: Identity, definition: &AttributeDefinition) -> StoreResult<AttrValue> {
        Ok(AttrValue::Plain(
            definition.options.default.produce().unwrap_or(JsonValue::Null),
        ))
    }

    fn normalize(
        &self,
        _store: &mut StateStore,
        _owner: Identity,
        _definition: &AttributeDefinition,
        _current: &AttrValue,
        data: &JsonValue,
    ) -> StoreResult<AttrValue> {
        Ok(AttrValue::Plain(data.clone()))
    }

    fn push_data(
        &self,
        _store: &mut StateStore,
        _owner: Identity,
        _definition: &AttributeDefinition,
        _canonical: Option<&AttrValue>,
        data: &JsonValue,
    ) -> StoreResult<AttrValue> {
        Ok(AttrValue::Plain(data.clone()))
    }

    fn did_commit(
        &self,
        _store: &mut StateStore,
        _owner: Identity,
        _definition: &AttributeDefinition,
        committed: &AttrValue,
        server: Option<&JsonValue>,
    ) -> StoreResult<AttrValue> {
        Ok(server.map_or_else(|| committed.clone(), |data| AttrValue::Plain(data.clone())))
    }

    fn is_dirty(&self, _store: &StateStore, value: &AttrValue, original: &AttrValue) -> bool {
        value != original
    }

    fn current_state(&self, _store: &StateStore, _definition: &AttributeDefinition, value: &AttrValue) -> JsonValue {
        value.as_plain().cloned().unwrap_or(JsonValue::Null)
    }

    fn canonical_state(&self, store: &StateStore, definition: &AttributeDefinition, value: &AttrValue) -> JsonValue {
        self.current_state(store, definition, value)
    }
}
