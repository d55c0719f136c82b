//! Payload validation ahead of mutation.
//!
//! # Invariants
//! - Load, push, commit and `set_data` validate the whole payload tree before
//!   touching any state, so a rejected payload leaves the store unchanged.

use super::{StateStore, StoreError, StoreResult, ValidationError};
use crate::model::schema::{AttributeDefinition, AttributeKind};
use crate::model::value::{json_shape, JsonValue, Payload};

impl StateStore {
    /// Checks every payload key against the type schema, recursing into fragments.
    pub(crate) fn validate_payload(&self, type_name: &str, payload: &Payload, skip_key: Option<&str>) -> StoreResult<()> {
        let schema = self.type_schema(type_name)?;
        for (key, data) in payload {
            if skip_key == Some(key.as_str()) {
                continue;
            }
            let definition = schema.get(key).ok_or_else(|| StoreError::UnknownAttribute {
                type_name: type_name.to_string(),
                key: key.clone(),
            })?;
            self.validate_data(definition, data, true)?;
        }
        Ok(())
    }

    /// Checks one attribute's plain data. Server data may send `null` for arrays.
    pub(crate) fn validate_data(&self, definition: &AttributeDefinition, data: &JsonValue, from_server: bool) -> StoreResult<()> {
        match (definition.kind, data) {
            (AttributeKind::Plain, _) => Ok(()),
            (AttributeKind::PlainArray, JsonValue::Array(items)) => {
                items.iter().try_for_each(|item| check_primitive(definition, item))
            }
            (AttributeKind::Fragment, JsonValue::Null) => Ok(()),
            (AttributeKind::Fragment, JsonValue::Object(map)) => self.validate_fragment_data(definition, map),
            (AttributeKind::FragmentArray, JsonValue::Array(items)) => {
                for item in items {
                    match item {
                        JsonValue::Object(map) => self.validate_fragment_data(definition, map)?,
                        other => return Err(unexpected_shape(definition, "object", other)),
                    }
                }
                Ok(())
            }
            (AttributeKind::PlainArray | AttributeKind::FragmentArray, JsonValue::Null) if from_server => Ok(()),
            (kind, other) => Err(unexpected_shape(definition, expected_shape(kind), other)),
        }
    }

    pub(crate) fn validate_fragment_data(&self, definition: &AttributeDefinition, data: &Payload) -> StoreResult<()> {
        let type_name = self.resolve_fragment_type(definition, data)?;
        self.validate_payload(&type_name, data, definition.options.polymorphic_type_key.as_deref())
    }

    /// Fragment type for a nested payload: the polymorphic type key when
    /// present, otherwise the declared element type.
    pub(crate) fn resolve_fragment_type(&self, definition: &AttributeDefinition, data: &Payload) -> StoreResult<String> {
        let type_key = definition.options.polymorphic_type_key.as_deref();
        let named = type_key.and_then(|type_key| data.get(type_key)).and_then(JsonValue::as_str);
        let type_name = named
            .or(definition.element_type.as_deref())
            .ok_or_else(|| ValidationError::MissingFragmentType {
                key: definition.key.clone(),
                type_key: type_key.map(str::to_string),
            })?;
        self.type_schema(type_name)?;
        Ok(type_name.to_string())
    }
}

fn expected_shape(kind: AttributeKind) -> &'static str {
    match kind {
        AttributeKind::Plain => "any value",
        AttributeKind::Fragment => "object or null",
        AttributeKind::FragmentArray => "array of objects",
        AttributeKind::PlainArray => "array of primitives",
    }
}

pub(crate) fn unexpected_shape(definition: &AttributeDefinition, expected: &'static str, data: &JsonValue) -> StoreError {
    ValidationError::UnexpectedShape {
        key: definition.key.clone(),
        expected,
        actual: json_shape(data),
    }
    .into()
}

/// Plain-array elements must be primitives.
pub(crate) fn check_primitive(definition: &AttributeDefinition, item: &JsonValue) -> StoreResult<()> {
    match item {
        JsonValue::Array(_) | JsonValue::Object(_) => Err(unexpected_shape(definition, "array of primitives", item)),
        _ => Ok(()),
    }
}
