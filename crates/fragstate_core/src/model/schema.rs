//! Attribute schema declarations and in-memory registry.
//!
//! # Responsibility
//! - Describe, per type, which attribute keys exist and which kind each is.
//! - Validate declarations before the store starts using them.
//!
//! # Invariants
//! - Type names and attribute keys match the identifier patterns below.
//! - Fragment kinds name an element type unless they are polymorphic.
//! - Element types referenced by fragment kinds are registered.

use crate::model::value::JsonValue;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::sync::Arc;

static TYPE_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z][a-z0-9]*(?:[-_/][a-z0-9]+)*$").expect("valid type name regex"));
static ATTRIBUTE_KEY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_$][A-Za-z0-9_$]*$").expect("valid attribute key regex"));

/// Attribute kind, which selects the behavior strategy for a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeKind {
    /// Primitive value owned directly by the record.
    Plain,
    /// Single nested fragment.
    Fragment,
    /// Ordered sequence of nested fragments.
    FragmentArray,
    /// Ordered sequence of primitive values.
    PlainArray,
}

impl AttributeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Plain => "plain",
            Self::Fragment => "fragment",
            Self::FragmentArray => "fragment_array",
            Self::PlainArray => "plain_array",
        }
    }

    pub fn is_array(self) -> bool {
        matches!(self, Self::FragmentArray | Self::PlainArray)
    }

    pub fn holds_fragments(self) -> bool {
        matches!(self, Self::Fragment | Self::FragmentArray)
    }
}

impl Display for AttributeKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Default value source for one attribute.
#[derive(Clone, Default)]
pub enum DefaultValue {
    #[default]
    None,
    Static(JsonValue),
    Factory(Arc<dyn Fn() -> JsonValue + Send + Sync>),
}

impl DefaultValue {
    /// Produces the default payload, or `None` when no default is declared.
    pub fn produce(&self) -> Option<JsonValue> {
        match self {
            Self::None => None,
            Self::Static(value) => Some(value.clone()),
            Self::Factory(factory) => Some(factory()),
        }
    }
}

impl Debug for DefaultValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "None"),
            Self::Static(value) => write!(f, "Static({value})"),
            Self::Factory(_) => write!(f, "Factory(..)"),
        }
    }
}

/// Per-attribute options.
#[derive(Debug, Clone, Default)]
pub struct AttributeOptions {
    pub default: DefaultValue,
    /// Payload key naming the concrete fragment type for polymorphic kinds.
    pub polymorphic_type_key: Option<String>,
}

/// Metadata for one (type, key) pair.
#[derive(Debug, Clone)]
pub struct AttributeDefinition {
    pub key: String,
    pub kind: AttributeKind,
    /// Fragment type name for fragment kinds.
    pub element_type: Option<String>,
    pub options: AttributeOptions,
}

impl AttributeDefinition {
    pub fn new(key: impl Into<String>, kind: AttributeKind, element_type: Option<String>) -> Self {
        Self {
            key: key.into(),
            kind,
            element_type,
            options: AttributeOptions::default(),
        }
    }

    pub fn plain(key: impl Into<String>) -> Self {
        Self::new(key, AttributeKind::Plain, None)
    }

    pub fn fragment(key: impl Into<String>, element_type: impl Into<String>) -> Self {
        Self::new(key, AttributeKind::Fragment, Some(element_type.into()))
    }

    pub fn fragment_array(key: impl Into<String>, element_type: impl Into<String>) -> Self {
        Self::new(key, AttributeKind::FragmentArray, Some(element_type.into()))
    }

    pub fn plain_array(key: impl Into<String>) -> Self {
        Self::new(key, AttributeKind::PlainArray, None)
    }

    /// Sets a static default payload.
    pub fn with_default(mut self, value: JsonValue) -> Self {
        self.options.default = DefaultValue::Static(value);
        self
    }

    /// Sets a default-producing function, called once per identity.
    pub fn with_default_fn(mut self, factory: impl Fn() -> JsonValue + Send + Sync + 'static) -> Self {
        self.options.default = DefaultValue::Factory(Arc::new(factory));
        self
    }

    /// Marks a fragment kind as polymorphic on `type_key`.
    pub fn polymorphic(mut self, type_key: impl Into<String>) -> Self {
        self.options.polymorphic_type_key = Some(type_key.into());
        self
    }

    pub fn is_polymorphic(&self) -> bool {
        self.options.polymorphic_type_key.is_some()
    }
}

/// Attribute declarations for one record or fragment type.
#[derive(Debug, Clone)]
pub struct TypeSchema {
    pub name: String,
    attributes: BTreeMap<String, AttributeDefinition>,
}

impl TypeSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: BTreeMap::new(),
        }
    }

    /// Adds one attribute declaration, replacing any previous one for the key.
    pub fn attribute(mut self, definition: AttributeDefinition) -> Self {
        self.attributes.insert(definition.key.clone(), definition);
        self
    }

    pub fn get(&self, key: &str) -> Option<&AttributeDefinition> {
        self.attributes.get(key)
    }

    /// Attribute declarations in key order.
    pub fn attributes(&self) -> impl Iterator<Item = &AttributeDefinition> {
        self.attributes.values()
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }
}

/// Schema lookup consumed by the state store.
pub trait SchemaSource {
    fn type_schema(&self, type_name: &str) -> Option<&TypeSchema>;
}

/// In-memory schema registry.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    types: BTreeMap<String, TypeSchema>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers one type after declaration-level validation.
    ///
    /// Element type references are checked by [`SchemaRegistry::validate_references`]
    /// since fragment types may be registered after their owners.
    pub fn register(&mut self, schema: TypeSchema) -> Result<(), SchemaError> {
        if !TYPE_NAME_RE.is_match(schema.name.as_str()) {
            return Err(SchemaError::InvalidTypeName(schema.name));
        }
        if self.types.contains_key(schema.name.as_str()) {
            return Err(SchemaError::DuplicateType(schema.name));
        }
        for definition in schema.attributes() {
            if !ATTRIBUTE_KEY_RE.is_match(definition.key.as_str()) {
                return Err(SchemaError::InvalidAttributeKey {
                    type_name: schema.name.clone(),
                    key: definition.key.clone(),
                });
            }
            if definition.kind.holds_fragments()
                && definition.element_type.is_none()
                && !definition.is_polymorphic()
            {
                return Err(SchemaError::MissingElementType {
                    type_name: schema.name.clone(),
                    key: definition.key.clone(),
                });
            }
        }
        self.types.insert(schema.name.clone(), schema);
        Ok(())
    }

    /// Registers one type and returns the registry, for builder-style setup.
    pub fn with_type(mut self, schema: TypeSchema) -> Result<Self, SchemaError> {
        self.register(schema)?;
        Ok(self)
    }

    /// Checks that every referenced element type is registered.
    pub fn validate_references(&self) -> Result<(), SchemaError> {
        for schema in self.types.values() {
            for definition in schema.attributes() {
                let Some(element_type) = definition.element_type.as_deref() else {
                    continue;
                };
                if !definition.kind.holds_fragments() {
                    continue;
                }
                if !self.types.contains_key(element_type) {
                    return Err(SchemaError::UnknownElementType {
                        type_name: schema.name.clone(),
                        key: definition.key.clone(),
                        element_type: element_type.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.types.contains_key(type_name)
    }

    /// Registered type names in sorted order.
    pub fn type_names(&self) -> Vec<String> {
        self.types.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Builds a registry from a JSON schema document.
    ///
    /// ```json
    /// { "types": [ { "name": "person", "attributes": {
    ///     "name": { "kind": "fragment", "type": "name" },
    ///     "titles": { "kind": "plain_array", "default": [] } } } ] }
    /// ```
    pub fn from_json_str(input: &str) -> Result<Self, SchemaError> {
        let document: SchemaDocument =
            serde_json::from_str(input).map_err(|err| SchemaError::Parse(err.to_string()))?;
        let mut registry = Self::new();
        for declaration in document.types {
            let mut schema = TypeSchema::new(declaration.name);
            for (key, attribute) in declaration.attributes {
                let mut definition = AttributeDefinition::new(key, attribute.kind, attribute.element_type);
                if let Some(default) = attribute.default {
                    definition = definition.with_default(default);
                }
                if let Some(type_key) = attribute.polymorphic_type_key {
                    definition = definition.polymorphic(type_key);
                }
                schema = schema.attribute(definition);
            }
            registry.register(schema)?;
        }
        registry.validate_references()?;
        Ok(registry)
    }
}

impl SchemaSource for SchemaRegistry {
    fn type_schema(&self, type_name: &str) -> Option<&TypeSchema> {
        self.types.get(type_name)
    }
}

#[derive(Debug, Deserialize)]
struct SchemaDocument {
    types: Vec<TypeDeclaration>,
}

#[derive(Debug, Deserialize)]
struct TypeDeclaration {
    name: String,
    #[serde(default)]
    attributes: BTreeMap<String, AttributeDeclaration>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct AttributeDeclaration {
    kind: AttributeKind,
    #[serde(default, rename = "type")]
    element_type: Option<String>,
    #[serde(default)]
    default: Option<JsonValue>,
    #[serde(default)]
    polymorphic_type_key: Option<String>,
}

/// Schema declaration errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    InvalidTypeName(String),
    DuplicateType(String),
    InvalidAttributeKey {
        type_name: String,
        key: String,
    },
    MissingElementType {
        type_name: String,
        key: String,
    },
    UnknownElementType {
        type_name: String,
        key: String,
        element_type: String,
    },
    Parse(String),
}

impl Display for SchemaError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidTypeName(name) => write!(f, "invalid type name `{name}`"),
            Self::DuplicateType(name) => write!(f, "type already registered: {name}"),
            Self::InvalidAttributeKey { type_name, key } => {
                write!(f, "invalid attribute key `{key}` on type `{type_name}`")
            }
            Self::MissingElementType { type_name, key } => write!(
                f,
                "fragment attribute `{type_name}.{key}` must declare an element type"
            ),
            Self::UnknownElementType {
                type_name,
                key,
                element_type,
            } => write!(
                f,
                "attribute `{type_name}.{key}` references unregistered type `{element_type}`"
            ),
            Self::Parse(message) => write!(f, "invalid schema document: {message}"),
        }
    }
}

impl Error for SchemaError {}

#[cfg(test)]
mod tests {
    use super::{AttributeDefinition, AttributeKind, SchemaError, SchemaRegistry, SchemaSource, TypeSchema};
    use serde_json::json;

    #[test]
    fn register_rejects_invalid_key() {
        let mut registry = SchemaRegistry::new();
        let err = registry
            .register(TypeSchema::new("person").attribute(AttributeDefinition::plain("first name")))
            .expect_err("keys with spaces must be rejected");
        assert!(matches!(err, SchemaError::InvalidAttributeKey { .. }));
    }

    #[test]
    fn register_rejects_duplicate_type() {
        let mut registry = SchemaRegistry::new();
        registry
            .register(TypeSchema::new("name"))
            .expect("first registration should succeed");
        let err = registry
            .register(TypeSchema::new("name"))
            .expect_err("duplicate registration must fail");
        assert_eq!(err, SchemaError::DuplicateType("name".to_string()));
    }

    #[test]
    fn fragment_without_element_type_is_rejected_unless_polymorphic() {
        let mut registry = SchemaRegistry::new();
        let err = registry
            .register(
                TypeSchema::new("zoo")
                    .attribute(AttributeDefinition::new("star", AttributeKind::Fragment, None)),
            )
            .expect_err("missing element type must fail");
        assert!(matches!(err, SchemaError::MissingElementType { .. }));

        registry
            .register(TypeSchema::new("zoo").attribute(
                AttributeDefinition::new("star", AttributeKind::Fragment, None).polymorphic("$type"),
            ))
            .expect("polymorphic fragment may omit element type");
    }

    #[test]
    fn validate_references_reports_missing_fragment_type() {
        let registry = SchemaRegistry::new()
            .with_type(TypeSchema::new("person").attribute(AttributeDefinition::fragment("name", "name")))
            .expect("person registers");
        let err = registry
            .validate_references()
            .expect_err("name type is not registered");
        assert!(matches!(err, SchemaError::UnknownElementType { element_type, .. } if element_type == "name"));
    }

    #[test]
    fn from_json_str_builds_registry() {
        let document = json!({
            "types": [
                {
                    "name": "person",
                    "attributes": {
                        "name": { "kind": "fragment", "type": "name" },
                        "titles": { "kind": "plain_array", "default": ["Lord"] }
                    }
                },
                {
                    "name": "name",
                    "attributes": {
                        "first": { "kind": "plain" },
                        "last": { "kind": "plain" }
                    }
                }
            ]
        });
        let registry =
            SchemaRegistry::from_json_str(&document.to_string()).expect("schema document should load");
        assert_eq!(registry.type_names(), vec!["name".to_string(), "person".to_string()]);

        let person = registry.type_schema("person").expect("person registered");
        let titles = person.get("titles").expect("titles declared");
        assert_eq!(titles.kind, AttributeKind::PlainArray);
        assert_eq!(titles.options.default.produce(), Some(json!(["Lord"])));
    }

    #[test]
    fn from_json_str_rejects_unknown_attribute_fields() {
        let err = SchemaRegistry::from_json_str(
            r#"{"types":[{"name":"name","attributes":{"first":{"kind":"plain","size":3}}}]}"#,
        )
        .expect_err("unknown declaration fields must fail");
        assert!(matches!(err, SchemaError::Parse(_)));
    }
}
