//! Integration tests for Pantry

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};

use pantry::notification::DEFAULT_GREETING;
use pantry::{
    create_persistent_store, AppConfig, AppContext, FileStorage, KeyValueStorage, MemoryStorage,
    Notification, PersistentStore, Store,
};
use rstest::rstest;
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
struct Todo {
    id: u32,
    title: String,
    done: bool,
}

fn todo(id: u32, title: &str, done: bool) -> Todo {
    Todo {
        id,
        title: title.to_string(),
        done,
    }
}

fn shared(storage: &MemoryStorage) -> Arc<dyn KeyValueStorage> {
    Arc::new(storage.clone())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[test]
fn notification_observers_see_latest_message() {
    let notification = Notification::new();
    let received = Arc::new(Mutex::new(Vec::new()));

    let received_clone = received.clone();
    let _before = notification.subscribe(move |message| {
        received_clone.lock().unwrap().push(message.to_string())
    });

    notification.set("Task completed");

    let late = Arc::new(Mutex::new(String::new()));
    let late_clone = late.clone();
    let _after = notification.subscribe(move |message| {
        *late_clone.lock().unwrap() = message.to_string();
    });

    assert_eq!(
        *received.lock().unwrap(),
        vec![DEFAULT_GREETING.to_string(), "Task completed".to_string()]
    );
    assert_eq!(*late.lock().unwrap(), "Task completed");
}

#[rstest]
#[case(json!(null))]
#[case(json!(7))]
#[case(json!("text with \"quotes\""))]
#[case(json!([1, "two", {"three": 3}]))]
#[case(json!({"nested": {"list": [true, false]}}))]
fn empty_storage_persists_initial(#[case] initial: serde_json::Value) {
    init_tracing();
    let storage = MemoryStorage::new();

    let store = create_persistent_store(shared(&storage), "value", initial.clone()).unwrap();

    assert_eq!(store.get(), initial);
    assert_eq!(
        storage.get_item("value").unwrap(),
        Some(serde_json::to_string(&initial).unwrap())
    );
}

#[test]
fn set_persists_new_value() {
    let storage = MemoryStorage::new();
    let todos = create_persistent_store(shared(&storage), "todos", Vec::<Todo>::new()).unwrap();

    let updated = vec![todo(1, "write tests", false), todo(2, "ship", false)];
    todos.set(updated.clone()).unwrap();

    assert_eq!(
        storage.get_item("todos").unwrap(),
        Some(serde_json::to_string(&updated).unwrap())
    );
}

#[test]
fn stored_value_takes_precedence_over_initial() {
    let storage = MemoryStorage::new();
    let stored = vec![todo(3, "from last session", true)];
    let raw = serde_json::to_string(&stored).unwrap();
    storage.set_item("todos", &raw).unwrap();

    let todos =
        create_persistent_store(shared(&storage), "todos", vec![todo(1, "default", false)]).unwrap();

    assert_eq!(todos.get(), stored);
    assert_eq!(storage.get_item("todos").unwrap(), Some(raw));
}

#[test]
fn reset_restores_initial_not_persisted_value() {
    let storage = MemoryStorage::new();
    storage.set_item("filter", "\"done\"").unwrap();
    let filter = create_persistent_store(shared(&storage), "filter", "all".to_string()).unwrap();
    assert_eq!(filter.get(), "done");

    filter.set("active".to_string()).unwrap();
    filter.update(|filter| filter.push_str("!")).unwrap();
    filter.reset().unwrap();

    assert_eq!(filter.get(), "all");
    assert_eq!(storage.get_item("filter").unwrap().as_deref(), Some("\"all\""));
}

#[test]
fn reset_twice_is_idempotent() {
    let storage = MemoryStorage::new();
    let count = create_persistent_store(Arc::new(storage.clone()), "count", 10).unwrap();
    count.set(99).unwrap();

    count.reset().unwrap();
    let after_first = (count.get(), storage.get_item("count").unwrap());
    count.reset().unwrap();
    let after_second = (count.get(), storage.get_item("count").unwrap());

    assert_eq!(after_first, (10, Some("10".to_string())));
    assert_eq!(after_second, after_first);
}

#[test]
fn subscribers_of_persistent_store_are_notified() {
    let count = create_persistent_store(Arc::new(MemoryStorage::new()), "count", 0).unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    let last = Arc::new(AtomicUsize::new(usize::MAX));

    let calls_clone = calls.clone();
    let last_clone = last.clone();
    let _subscription = count.subscribe(move |value: &usize| {
        calls_clone.fetch_add(1, Ordering::SeqCst);
        last_clone.store(*value, Ordering::SeqCst);
    });

    count.set(3).unwrap();
    count.reset().unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(last.load(Ordering::SeqCst), 0);
}

#[test]
fn handles_on_same_key_last_write_wins() {
    let storage = MemoryStorage::new();
    let first = create_persistent_store(Arc::new(storage.clone()), "shared", 0).unwrap();
    let second = create_persistent_store(Arc::new(storage.clone()), "shared", 0).unwrap();

    first.set(1).unwrap();
    second.set(2).unwrap();

    // Handles are independent in memory.
    assert_eq!(first.get(), 1);
    assert_eq!(storage.get_item("shared").unwrap().as_deref(), Some("2"));
}

#[test]
fn file_storage_survives_restart() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("local_storage.json");

    {
        let storage = FileStorage::open(&path).unwrap();
        let todos = PersistentStore::new(Arc::new(storage), "todos", Vec::<Todo>::new()).unwrap();
        todos.update(|todos| todos.push(todo(1, "persist me", false))).unwrap();
    }

    let storage = FileStorage::open(&path).unwrap();
    let todos = PersistentStore::new(Arc::new(storage), "todos", Vec::<Todo>::new()).unwrap();

    assert_eq!(todos.get(), vec![todo(1, "persist me", false)]);
    todos.reset().unwrap();

    let reopened = FileStorage::open(&path).unwrap();
    assert_eq!(reopened.get_item("todos").unwrap().as_deref(), Some("[]"));
}

#[test]
fn context_from_config_wires_everything() {
    let config = AppConfig::from_toml_str(
        r#"
        [persist]
        format_version = 1

        [notification]
        greeting = "Ready"
        "#,
    )
    .unwrap();
    let context = AppContext::from_config(&config).unwrap();

    let theme = context.persistent_store("theme", "light".to_string()).unwrap();
    theme.set("dark".to_string()).unwrap();

    assert_eq!(context.notification().get(), "Ready");
    assert_eq!(
        context.storage().get_item("theme").unwrap().as_deref(),
        Some(r#"{"version":1,"value":"dark"}"#)
    );
}

#[test]
fn store_feeds_persistent_store() {
    let storage = MemoryStorage::new();
    let source = Store::new(1u32);
    let mirror = create_persistent_store(Arc::new(storage.clone()), "mirror", 0u32).unwrap();

    let sink = mirror.clone();
    let _subscription = source.subscribe(move |value| {
        sink.set(*value * 10).unwrap();
    });
    source.set(4);

    assert_eq!(mirror.get(), 40);
    assert_eq!(storage.get_item("mirror").unwrap().as_deref(), Some("40"));
}
