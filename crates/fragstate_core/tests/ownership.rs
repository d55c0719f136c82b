mod common;

use common::{payload, registry, store};
use fragstate_core::{
    AttrValue, IdentityRegistry, OrphanPolicy, OwnershipLink, StateStore, StoreConfig,
    StoreError, UuidIdentityRegistry,
};
use serde_json::json;
use std::cell::RefCell;
use std::rc::Rc;

#[test]
fn fragment_cannot_be_attached_to_second_owner() {
    let mut store = store();
    let ned = store
        .load_record("person", &payload(json!({"name": {"first": "Eddard"}})))
        .unwrap();
    let jon = store.create_record("person").unwrap();
    let name = store.fragment(ned, "name").unwrap().unwrap();

    let err = store
        .set_value(jon, "name", AttrValue::Fragment(Some(name)))
        .unwrap_err();
    assert_eq!(
        err,
        StoreError::OwnershipViolation {
            fragment: name,
            existing: OwnershipLink::new(ned, "name"),
            requested: OwnershipLink::new(jon, "name"),
        }
    );
    assert!(!store.has_changed_attributes(jon));
}

#[test]
fn copied_fragment_can_be_attached_elsewhere() {
    let mut store = store();
    let ned = store
        .load_record(
            "person",
            &payload(json!({"name": {"first": "Eddard", "last": "Stark"}})),
        )
        .unwrap();
    let jon = store.create_record("person").unwrap();
    let name = store.fragment(ned, "name").unwrap().unwrap();

    let copy = store.copy_fragment(name).unwrap();
    assert_ne!(copy, name);
    assert!(store.owner_of(copy).is_none());
    assert_eq!(
        store.current_state(copy).unwrap(),
        store.current_state(name).unwrap()
    );

    store
        .set_value(jon, "name", AttrValue::Fragment(Some(copy)))
        .unwrap();
    assert_eq!(store.owner_of(copy), Some(&OwnershipLink::new(jon, "name")));
    assert!(store.has_changed_attributes(jon));
    assert!(!store.has_changed_attributes(ned));
}

#[test]
fn detached_fragment_attaches_on_first_write() {
    let mut store = store();
    let person = store.create_record("person").unwrap();
    let name = store
        .create_fragment("name", &payload(json!({"first": "Arya"})))
        .unwrap();
    assert!(store.is_new(name).unwrap());
    assert!(store.has_changed_attributes(name));

    store
        .set_value(person, "name", AttrValue::Fragment(Some(name)))
        .unwrap();
    assert_eq!(store.owner_of(name), Some(&OwnershipLink::new(person, "name")));
}

#[test]
fn fragment_type_must_match_declaration() {
    let mut store = store();
    let person = store.create_record("person").unwrap();
    let geo = store.create_fragment("geo", &payload(json!({}))).unwrap();
    let err = store
        .set_value(person, "name", AttrValue::Fragment(Some(geo)))
        .unwrap_err();
    assert!(matches!(err, StoreError::Validation(_)));
    assert!(store.owner_of(geo).is_none());
}

#[test]
fn ownership_cycles_are_rejected() {
    let mut store = store();
    let outer = store.create_fragment("node", &payload(json!({}))).unwrap();
    let inner = store.create_fragment("node", &payload(json!({}))).unwrap();

    store
        .set_value(outer, "child", AttrValue::Fragment(Some(inner)))
        .unwrap();
    assert_eq!(
        store
            .set_value(inner, "child", AttrValue::Fragment(Some(outer)))
            .unwrap_err(),
        StoreError::OwnershipCycle {
            fragment: outer,
            owner: inner,
        }
    );
    assert!(matches!(
        store.set_value(outer, "child", AttrValue::Fragment(Some(outer))),
        Err(StoreError::OwnershipCycle { .. })
    ));
}

#[test]
fn unload_recurses_into_owned_fragments() {
    let mut store = store();
    let person = store
        .load_record(
            "person",
            &payload(json!({
                "name": {"first": "Eddard"},
                "addresses": [{"street": "Castle", "geo": {"lat": 1}}]
            })),
        )
        .unwrap();
    let name = store.fragment(person, "name").unwrap().unwrap();
    let address = store.collection(person, "addresses").unwrap().fragments().unwrap()[0];
    let geo = store.fragment(address, "geo").unwrap().unwrap();
    assert_eq!(store.len(), 4);

    store.unload(person).unwrap();

    for id in [person, name, address, geo] {
        assert!(!store.contains(id));
        assert!(store.owner_of(id).is_none());
    }
    assert!(store.is_empty());
    assert_eq!(store.unload(person).unwrap_err(), StoreError::UnknownIdentity(person));
}

#[derive(Clone, Default)]
struct SharedRegistry(Rc<RefCell<UuidIdentityRegistry>>);

impl IdentityRegistry for SharedRegistry {
    fn create_identity(&mut self, type_name: &str) -> fragstate_core::Identity {
        self.0.borrow_mut().create_identity(type_name)
    }

    fn destroy_identity(&mut self, identity: fragstate_core::Identity) {
        self.0.borrow_mut().destroy_identity(identity)
    }
}

#[test]
fn unload_destroys_identities() {
    let identities = SharedRegistry::default();
    let mut store = StateStore::new(registry()).with_identity_registry(identities.clone());
    let person = store
        .load_record("person", &payload(json!({"name": {"first": "Eddard"}})))
        .unwrap();
    let name = store.fragment(person, "name").unwrap().unwrap();
    assert_eq!(identities.0.borrow().live_count(), 2);

    store.unload(person).unwrap();
    assert!(identities.0.borrow().is_retired(person));
    assert!(identities.0.borrow().is_retired(name));
    assert_eq!(identities.0.borrow().live_count(), 0);
}

#[test]
fn retain_policy_keeps_dropped_fragments_loaded() {
    let config = StoreConfig::from_json_str(r#"{"store":{"orphan_policy":"retain"}}"#).unwrap();
    let mut store = StateStore::from_config(registry(), &config);
    assert_eq!(store.options().orphan_policy, OrphanPolicy::Retain);
    let person = store
        .load_record("person", &payload(json!({"name": {"first": "Eddard"}})))
        .unwrap();
    let name = store.fragment(person, "name").unwrap().unwrap();

    store.push_data(person, &payload(json!({"name": null}))).unwrap();

    assert_eq!(store.fragment(person, "name").unwrap(), None);
    assert!(store.contains(name));
    assert_eq!(store.owner_of(name), Some(&OwnershipLink::new(person, "name")));
}

#[test]
fn release_policy_unloads_fragments_dropped_by_push() {
    let mut store = store();
    let person = store
        .load_record("person", &payload(json!({"name": {"first": "Eddard"}})))
        .unwrap();
    let name = store.fragment(person, "name").unwrap().unwrap();

    store.push_data(person, &payload(json!({"name": null}))).unwrap();

    assert_eq!(store.fragment(person, "name").unwrap(), None);
    assert!(!store.contains(name));
}
