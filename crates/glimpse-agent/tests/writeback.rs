mod common;

use std::sync::Arc;

use glimpse_agent::{
    AgentConfig, BreakpointStatus, InterceptionEngine, LiveValue, MemoryBreakpointStorage,
    StatementHook,
};

use common::{capture_spec, store_over, wait_for, CollectingSink, TestScope};

#[test]
fn outcomes_reach_storage_off_the_hot_path() {
    let storage = Arc::new(MemoryBreakpointStorage::new());
    let config = AgentConfig::default();
    let store = store_over(&storage, &config);
    let engine = InterceptionEngine::new(store.clone(), &config, CollectingSink::new());

    storage.set_specs(vec![capture_spec("bp-1", 34)]);
    store.refresh().unwrap();
    let file = store.resolver().index().file_id("web/index.php").unwrap();

    let scope = TestScope::at(34, vec![("msg", LiveValue::Str("hello there".into()))]);
    engine.on_statement(file, 34, &scope);

    wait_for("fulfilled outcome", || {
        storage
            .outcomes()
            .iter()
            .any(|o| o.id.as_str() == "bp-1" && o.status == BreakpointStatus::Fulfilled)
    });
    let outcome = storage.outcomes().into_iter().next().unwrap();
    let snapshot = outcome.snapshot.unwrap();
    assert_eq!(snapshot.frames.len(), 1);
    assert_eq!(snapshot.frames[0].function.as_deref(), Some("handler"));
}

#[test]
fn write_back_retries_transient_failures() {
    let storage = Arc::new(MemoryBreakpointStorage::new());
    let config = AgentConfig::default();
    let store = store_over(&storage, &config);
    let engine = InterceptionEngine::new(store.clone(), &config, CollectingSink::new());

    storage.set_specs(vec![capture_spec("bp-1", 34)]);
    store.refresh().unwrap();
    let file = store.resolver().index().file_id("web/index.php").unwrap();

    storage.fail_next_saves(2);
    let scope = TestScope::at(34, vec![("msg", LiveValue::Str("hello there".into()))]);
    engine.on_statement(file, 34, &scope);

    wait_for("outcome after retries", || !storage.outcomes().is_empty());
}

#[test]
fn dropping_the_store_drains_pending_outcomes() {
    let storage = Arc::new(MemoryBreakpointStorage::new());
    let config = AgentConfig::default();
    {
        let store = store_over(&storage, &config);
        let engine = InterceptionEngine::new(store.clone(), &config, CollectingSink::new());
        storage.set_specs(vec![capture_spec("bp-1", 34)]);
        store.refresh().unwrap();
        let file = store.resolver().index().file_id("web/index.php").unwrap();
        let scope = TestScope::at(34, vec![("msg", LiveValue::Str("hello there".into()))]);
        engine.on_statement(file, 34, &scope);
        // store and engine drop here; the worker joins after draining.
    }
    assert!(!storage.outcomes().is_empty());
}
