//! Attribute values held by the state store.

use crate::model::identity::Identity;
use crate::model::schema::AttributeKind;

/// Plain JSON value as produced by the serialization layer.
pub type JsonValue = serde_json::Value;

/// Opaque key -> value payload handed to pushes and commits.
pub type Payload = serde_json::Map<String, JsonValue>;

/// Shaped attribute value, one variant per attribute kind.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    /// Primitive (or opaque JSON) attribute.
    Plain(JsonValue),
    /// Owned nested fragment, or `None` when unset.
    Fragment(Option<Identity>),
    /// Ordered sequence of owned fragments.
    FragmentArray(Vec<Identity>),
    /// Ordered sequence of primitive values.
    PlainArray(Vec<JsonValue>),
}

impl AttrValue {
    /// Returns the attribute kind this value shape belongs to.
    pub fn kind(&self) -> AttributeKind {
        match self {
            Self::Plain(_) => AttributeKind::Plain,
            Self::Fragment(_) => AttributeKind::Fragment,
            Self::FragmentArray(_) => AttributeKind::FragmentArray,
            Self::PlainArray(_) => AttributeKind::PlainArray,
        }
    }

    pub fn as_plain(&self) -> Option<&JsonValue> {
        match self {
            Self::Plain(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_fragment(&self) -> Option<Identity> {
        match self {
            Self::Fragment(value) => *value,
            _ => None,
        }
    }

    pub fn as_fragments(&self) -> Option<&[Identity]> {
        match self {
            Self::FragmentArray(values) => Some(values.as_slice()),
            _ => None,
        }
    }

    pub fn as_plain_array(&self) -> Option<&[JsonValue]> {
        match self {
            Self::PlainArray(values) => Some(values.as_slice()),
            _ => None,
        }
    }

    /// Every fragment identity referenced by this value, in order.
    pub fn fragment_ids(&self) -> Vec<Identity> {
        match self {
            Self::Fragment(Some(id)) => vec![*id],
            Self::FragmentArray(ids) => ids.clone(),
            _ => Vec::new(),
        }
    }

    /// Returns whether `identity` is referenced by this value.
    pub fn references(&self, identity: Identity) -> bool {
        match self {
            Self::Fragment(value) => *value == Some(identity),
            Self::FragmentArray(ids) => ids.contains(&identity),
            _ => false,
        }
    }

    /// Projects array values into collection items. `None` for scalar kinds.
    pub fn items(&self) -> Option<Vec<CollectionItem>> {
        match self {
            Self::FragmentArray(ids) => Some(ids.iter().copied().map(CollectionItem::Fragment).collect()),
            Self::PlainArray(values) => Some(values.iter().cloned().map(CollectionItem::Plain).collect()),
            _ => None,
        }
    }
}

/// One element of an array-typed attribute.
#[derive(Debug, Clone, PartialEq)]
pub enum CollectionItem {
    Fragment(Identity),
    Plain(JsonValue),
}

impl CollectionItem {
    pub fn as_fragment(&self) -> Option<Identity> {
        match self {
            Self::Fragment(id) => Some(*id),
            Self::Plain(_) => None,
        }
    }

    pub fn as_plain(&self) -> Option<&JsonValue> {
        match self {
            Self::Plain(value) => Some(value),
            Self::Fragment(_) => None,
        }
    }
}

/// Short shape name of a JSON value, used in validation messages.
pub fn json_shape(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}
