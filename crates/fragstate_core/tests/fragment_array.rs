mod common;

use common::{payload, store};
use fragstate_core::{CollectionItem, ItemInput, StoreError, ValidationError};
use serde_json::json;

#[test]
fn push_adds_fragment_and_dirties_owner() {
    let mut store = store();
    let person = store
        .load_record("person", &payload(json!({"addresses": [{"street": "Castle"}]})))
        .unwrap();

    let mut view = store.collection(person, "addresses").unwrap();
    assert_eq!(view.len().unwrap(), 1);
    assert!(!view.has_dirty_attributes().unwrap());
    let version = view.version();

    view.push(json!({"street": "Tower", "city": "Winterfell"})).unwrap();
    assert!(view.version() > version);
    assert!(view.is_stale());
    assert_eq!(view.len().unwrap(), 2);
    assert!(!view.is_stale());
    assert!(view.has_dirty_attributes().unwrap());
    let added = view.get(1).unwrap().and_then(|item| item.as_fragment()).unwrap();
    drop(view);

    assert_eq!(store.type_of(added).unwrap(), "address");
    assert_eq!(store.owner_of(added).map(|link| link.owner), Some(person));
    assert!(store.has_changed_attributes(person));
    assert_eq!(
        store.current_state(person).unwrap().get("addresses"),
        Some(&json!([
            {"street": "Castle"},
            {"street": "Tower", "city": "Winterfell"}
        ]))
    );
}

#[test]
fn set_items_reuses_fragments_by_position() {
    let mut store = store();
    let person = store
        .load_record(
            "person",
            &payload(json!({"addresses": [{"street": "Castle"}, {"street": "Tower"}]})),
        )
        .unwrap();
    let mut view = store.collection(person, "addresses").unwrap();
    let original = view.fragments().unwrap();

    view.set_items(vec![ItemInput::Data(json!({"street": "Gate"}))])
        .unwrap();
    assert_eq!(view.fragments().unwrap(), vec![original[0]]);
    drop(view);

    assert_eq!(
        store.current_state(original[0]).unwrap(),
        payload(json!({"street": "Gate"}))
    );
    assert!(store.is_attribute_dirty(original[0], "street").unwrap());
}

#[test]
fn remove_and_reinsert_round_trips_to_clean() {
    let mut store = store();
    let person = store
        .load_record(
            "person",
            &payload(json!({"addresses": [{"street": "Castle"}, {"street": "Tower"}]})),
        )
        .unwrap();
    let mut view = store.collection(person, "addresses").unwrap();

    let removed = view.shift().unwrap().unwrap();
    assert_eq!(view.len().unwrap(), 1);
    assert!(view.has_dirty_attributes().unwrap());

    view.unshift(removed.clone()).unwrap();
    assert_eq!(view.index_of(&removed).unwrap(), Some(0));
    assert!(!view.has_dirty_attributes().unwrap());
    drop(view);
    assert!(!store.has_changed_attributes(person));
}

#[test]
fn out_of_bounds_index_is_rejected() {
    let mut store = store();
    let person = store.create_record("person").unwrap();
    let mut view = store.collection(person, "addresses").unwrap();

    assert!(view.is_empty().unwrap());
    assert_eq!(view.pop().unwrap(), None);
    assert_eq!(view.shift().unwrap(), None);
    assert_eq!(
        view.remove_at(0).unwrap_err(),
        StoreError::IndexOutOfBounds { index: 0, len: 0 }
    );
    assert_eq!(
        view.insert_at(2, json!({"street": "x"})).unwrap_err(),
        StoreError::IndexOutOfBounds { index: 2, len: 0 }
    );
}

#[test]
fn scalar_keys_have_no_collection() {
    let mut store = store();
    let person = store.create_record("person").unwrap();
    assert!(matches!(
        store.collection(person, "title").err(),
        Some(StoreError::InvalidKind { .. })
    ));
    assert!(matches!(
        store.collection(person, "name").err(),
        Some(StoreError::InvalidKind { .. })
    ));
}

#[test]
fn plain_array_view_supports_sequence_operations() {
    let mut store = store();
    let person = store
        .load_record("person", &payload(json!({"nicknames": ["Ned"]})))
        .unwrap();
    let mut view = store.collection(person, "nicknames").unwrap();

    view.push(json!("Quiet Wolf")).unwrap();
    view.insert_at(1, json!("Lord")).unwrap();
    assert_eq!(
        view.to_vec().unwrap(),
        vec![
            CollectionItem::Plain(json!("Ned")),
            CollectionItem::Plain(json!("Lord")),
            CollectionItem::Plain(json!("Quiet Wolf")),
        ]
    );
    assert!(view.contains(&CollectionItem::Plain(json!("Lord"))).unwrap());
    assert_eq!(
        view.remove_at(1).unwrap(),
        CollectionItem::Plain(json!("Lord"))
    );
    assert_eq!(view.pop().unwrap(), Some(CollectionItem::Plain(json!("Quiet Wolf"))));
    assert!(!view.has_dirty_attributes().unwrap());

    let person_id = view.owner();
    let err = view.push(person_id).unwrap_err();
    assert!(matches!(
        err,
        StoreError::Validation(ValidationError::UnexpectedShape { .. })
    ));
}

#[test]
fn external_writes_bump_projection_version() {
    let mut store = store();
    let person = store
        .load_record("person", &payload(json!({"nicknames": ["Ned"]})))
        .unwrap();
    let version = {
        let mut view = store.collection(person, "nicknames").unwrap();
        assert_eq!(view.len().unwrap(), 1);
        view.version()
    };

    store
        .push_data(person, &payload(json!({"nicknames": ["Ned", "Eddard"]})))
        .unwrap();

    let mut view = store.collection(person, "nicknames").unwrap();
    assert!(view.version() > version);
    assert!(view.is_stale());
    assert_eq!(view.len().unwrap(), 2);
}

#[test]
fn non_object_data_is_rejected_for_fragment_arrays() {
    let mut store = store();
    let person = store.create_record("person").unwrap();
    let mut view = store.collection(person, "addresses").unwrap();
    let err = view.push(json!("Castle")).unwrap_err();
    assert!(matches!(err, StoreError::Validation(_)));
    assert!(view.is_empty().unwrap());
}

#[test]
fn clear_empties_and_dirties_the_array() {
    let mut store = store();
    let person = store
        .load_record("person", &payload(json!({"addresses": [{"street": "Castle"}]})))
        .unwrap();
    let mut view = store.collection(person, "addresses").unwrap();
    view.clear().unwrap();
    assert!(view.is_empty().unwrap());
    drop(view);

    assert!(store.is_attribute_dirty(person, "addresses").unwrap());
    store.rollback(person).unwrap();
    assert_eq!(store.collection(person, "addresses").unwrap().len().unwrap(), 1);
}

#[test]
fn failed_replace_leaves_store_untouched() {
    let mut store = store();
    let ned = store
        .load_record("person", &payload(json!({"addresses": [{"street": "Old"}]})))
        .unwrap();
    let jon = store
        .load_record("person", &payload(json!({"addresses": [{"street": "Wall"}]})))
        .unwrap();
    let kept = store.collection(ned, "addresses").unwrap().fragments().unwrap()[0];
    let foreign = store.collection(jon, "addresses").unwrap().fragments().unwrap()[0];
    let loaded = store.len();

    let err = store
        .collection(ned, "addresses")
        .unwrap()
        .replace(
            0,
            1,
            vec![
                ItemInput::Data(json!({"street": "New"})),
                ItemInput::Fragment(foreign),
            ],
        )
        .unwrap_err();
    assert!(matches!(err, StoreError::OwnershipViolation { .. }));

    let err = store
        .collection(ned, "addresses")
        .unwrap()
        .replace(1, 0, vec![ItemInput::Data(json!({"street": "Gate"})), ItemInput::Fragment(kept)])
        .unwrap_err();
    assert!(matches!(
        err,
        StoreError::Validation(ValidationError::DuplicateFragment { .. })
    ));

    assert_eq!(
        store.current_state(kept).unwrap(),
        payload(json!({"street": "Old"}))
    );
    assert!(!store.has_changed_attributes(kept));
    assert!(!store.has_changed_attributes(ned));
    assert_eq!(store.len(), loaded);
    assert_eq!(
        store.collection(ned, "addresses").unwrap().fragments().unwrap(),
        vec![kept]
    );
}

#[test]
fn rollback_releases_fragments_added_locally() {
    let mut store = store();
    let person = store
        .load_record("person", &payload(json!({"addresses": [{"street": "Castle"}]})))
        .unwrap();
    let castle = store.collection(person, "addresses").unwrap().fragments().unwrap()[0];
    let mut view = store.collection(person, "addresses").unwrap();
    view.push(json!({"street": "Tower"})).unwrap();
    let added = view.fragments().unwrap()[1];
    drop(view);
    assert!(store.contains(added));

    store.rollback(person).unwrap();

    assert!(!store.contains(added));
    assert!(store.owner_of(added).is_none());
    assert!(store.contains(castle));
    assert_eq!(
        store.collection(person, "addresses").unwrap().fragments().unwrap(),
        vec![castle]
    );
    assert_eq!(store.len(), 2);
}
