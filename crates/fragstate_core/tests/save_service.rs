mod common;

use common::{payload, store};
use fragstate_core::{
    AdapterError, AttrValue, AttributeCache, Payload, SaveOutcome, SaveRequest, SaveService,
    StoreError,
};
use serde_json::json;

fn echo(request: &SaveRequest) -> Result<Option<Payload>, AdapterError> {
    Ok(Some(request.snapshot.clone()))
}

#[test]
fn successful_save_commits_snapshot() {
    let mut store = store();
    let person = store
        .load_record(
            "person",
            &payload(json!({"title": "Lord", "name": {"first": "Eddard"}})),
        )
        .unwrap();
    let name = store.fragment(person, "name").unwrap().unwrap();
    store.set_data(name, "first", &json!("Ned")).unwrap();

    let mut requests = Vec::new();
    let mut service = SaveService::new(store, |request: &SaveRequest| {
        requests.push(request.clone());
        echo(request)
    });
    assert_eq!(service.save(person).unwrap(), SaveOutcome::Committed);
    let (store, _) = service.into_parts();

    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].type_name, "person");
    assert_eq!(
        requests[0].snapshot.get("name"),
        Some(&json!({"first": "Ned"}))
    );
    assert!(!store.has_changed_attributes(person));
    assert!(!store.is_saving(name).unwrap());
    assert_eq!(
        store.canonical_state(name).unwrap(),
        payload(json!({"first": "Ned"}))
    );
}

#[test]
fn adapter_failure_rejects_and_restores_dirty_state() {
    let mut store = store();
    let person = store
        .load_record("person", &payload(json!({"title": "Lord"})))
        .unwrap();
    store.set_data(person, "title", &json!("King")).unwrap();

    let mut service = SaveService::new(store, |_: &SaveRequest| -> Result<Option<Payload>, AdapterError> {
        Err(AdapterError::new("timeout"))
    });
    let outcome = service.save(person).unwrap();
    assert_eq!(outcome, SaveOutcome::Rejected(AdapterError::new("timeout")));

    let cache = service.cache_mut();
    assert!(cache.has_changed_attributes(person));
    assert_eq!(
        AttributeCache::get_value(cache, person, "title").unwrap(),
        AttrValue::Plain(json!("King"))
    );
}

#[test]
fn save_while_pending_is_rejected() {
    let mut store = store();
    let person = store
        .load_record("person", &payload(json!({"title": "Lord"})))
        .unwrap();
    store.set_data(person, "title", &json!("King")).unwrap();
    store.will_commit(person).unwrap();
    store.set_data(person, "title", &json!("Hand")).unwrap();

    let mut service = SaveService::new(store, echo);
    assert_eq!(
        service.save(person).unwrap_err(),
        StoreError::CommitInProgress(person)
    );
    assert!(service.cache().is_saving(person).unwrap());
}

#[test]
fn server_normalized_payload_wins() {
    let mut store = store();
    let person = store.create_record("person").unwrap();
    store.set_data(person, "title", &json!("  hand ")).unwrap();

    let mut service = SaveService::new(store, |_: &SaveRequest| -> Result<Option<Payload>, AdapterError> {
        Ok(Some(payload(json!({"title": "Hand"}))))
    });
    service.save(person).unwrap();

    let store = service.cache();
    assert!(!store.is_new(person).unwrap());
    assert_eq!(
        store.current_state(person).unwrap(),
        payload(json!({"title": "Hand"}))
    );
}

#[test]
fn invalid_server_response_rejects_the_commit() {
    let mut store = store();
    let person = store
        .load_record("person", &payload(json!({"title": "Lord"})))
        .unwrap();
    store.set_data(person, "title", &json!("King")).unwrap();

    let mut calls = 0;
    let mut service = SaveService::new(store, |request: &SaveRequest| -> Result<Option<Payload>, AdapterError> {
        calls += 1;
        if calls == 1 {
            return Ok(Some(payload(json!({"bogus": 1}))));
        }
        echo(request)
    });
    assert_eq!(
        service.save(person).unwrap_err(),
        StoreError::UnknownAttribute {
            type_name: "person".to_string(),
            key: "bogus".to_string(),
        }
    );
    assert!(!service.cache().is_saving(person).unwrap());
    assert!(service.cache().has_changed_attributes(person));

    assert_eq!(service.save(person).unwrap(), SaveOutcome::Committed);
    let store = service.cache();
    assert!(!store.has_changed_attributes(person));
    assert_eq!(
        store.canonical_state(person).unwrap(),
        payload(json!({"title": "King"}))
    );
}
