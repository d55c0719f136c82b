#![allow(dead_code)]

use fragstate_core::{
    AttributeDefinition, Identity, Payload, SchemaRegistry, StateStore, TypeSchema,
};
use serde_json::Value;
use std::cell::RefCell;
use std::rc::Rc;

pub type NotifyLog = Rc<RefCell<Vec<(Identity, String)>>>;

pub fn registry() -> SchemaRegistry {
    SchemaRegistry::new()
        .with_type(
            TypeSchema::new("person")
                .attribute(AttributeDefinition::plain("title"))
                .attribute(AttributeDefinition::fragment("name", "name"))
                .attribute(AttributeDefinition::fragment_array("addresses", "address"))
                .attribute(AttributeDefinition::plain_array("nicknames"))
                .attribute(AttributeDefinition::fragment("pet", "dog").polymorphic("$type")),
        )
        .unwrap()
        .with_type(
            TypeSchema::new("name")
                .attribute(AttributeDefinition::plain("first"))
                .attribute(AttributeDefinition::plain("last")),
        )
        .unwrap()
        .with_type(
            TypeSchema::new("address")
                .attribute(AttributeDefinition::plain("street"))
                .attribute(AttributeDefinition::plain("city"))
                .attribute(AttributeDefinition::fragment("geo", "geo")),
        )
        .unwrap()
        .with_type(
            TypeSchema::new("geo")
                .attribute(AttributeDefinition::plain("lat"))
                .attribute(AttributeDefinition::plain("lng")),
        )
        .unwrap()
        .with_type(
            TypeSchema::new("dog")
                .attribute(AttributeDefinition::plain("name"))
                .attribute(AttributeDefinition::plain("bark")),
        )
        .unwrap()
        .with_type(
            TypeSchema::new("cat")
                .attribute(AttributeDefinition::plain("name"))
                .attribute(AttributeDefinition::plain("meow")),
        )
        .unwrap()
        .with_type(TypeSchema::new("node").attribute(AttributeDefinition::fragment("child", "node")))
        .unwrap()
}

pub fn store() -> StateStore {
    StateStore::new(registry())
}

/// Store whose notifications are recorded in the returned log.
pub fn recording_store() -> (StateStore, NotifyLog) {
    let log: NotifyLog = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&log);
    let store = StateStore::new(registry()).with_notifier(move |id: Identity, key: &str| {
        sink.borrow_mut().push((id, key.to_string()));
    });
    (store, log)
}

pub fn payload(value: Value) -> Payload {
    match value {
        Value::Object(map) => map,
        other => panic!("payload must be an object, got {other}"),
    }
}

pub fn count_for(log: &NotifyLog, id: Identity, key: &str) -> usize {
    log.borrow()
        .iter()
        .filter(|(identity, k)| *identity == id && k == key)
        .count()
}
