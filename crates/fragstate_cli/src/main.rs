//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `fragstate_core` linkage.
//! - Run one edit, save and rollback cycle with deterministic output.

use fragstate_core::{
    AdapterError, Payload, SaveOutcome, SaveRequest, SaveService, SchemaRegistry, StateStore,
};
use serde_json::json;
use std::process::ExitCode;

const DEMO_SCHEMA: &str = r#"{
  "types": [
    { "name": "person", "attributes": {
        "title": { "kind": "plain" },
        "name": { "kind": "fragment", "type": "name" } } },
    { "name": "name", "attributes": {
        "first": { "kind": "plain" },
        "last": { "kind": "plain" } } }
  ]
}"#;

fn main() -> ExitCode {
    println!("fragstate_core ping={}", fragstate_core::ping());
    println!("fragstate_core version={}", fragstate_core::core_version());

    match run_demo() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("demo failed: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run_demo() -> Result<(), Box<dyn std::error::Error>> {
    let registry = SchemaRegistry::from_json_str(DEMO_SCHEMA)?;
    let mut store = StateStore::new(registry);
    let loaded = json!({"title": "Lord", "name": {"first": "Eddard", "last": "Stark"}});
    let Some(payload) = loaded.as_object() else {
        return Err("demo payload must be an object".into());
    };
    let person = store.load_record("person", payload)?;

    let name = store.fragment(person, "name")?.ok_or("name fragment missing")?;
    store.set_data(name, "first", &json!("Arya"))?;
    println!("dirty after edit={}", store.has_changed_attributes(person));
    for (key, (before, after)) in store.changed_attributes(person)? {
        println!("changed {key}: {before} -> {after}");
    }

    store.rollback(person)?;
    println!("dirty after rollback={}", store.has_changed_attributes(person));

    store.set_data(person, "title", &json!("Hand"))?;
    let echo = |request: &SaveRequest| -> Result<Option<Payload>, AdapterError> {
        Ok(Some(request.snapshot.clone()))
    };
    let mut service = SaveService::new(store, echo);
    let outcome = service.save(person)?;
    println!("save committed={}", outcome == SaveOutcome::Committed);
    println!(
        "state={}",
        serde_json::Value::Object(service.cache().current_state(person)?)
    );
    Ok(())
}
