//! Session store tests

use std::time::Duration;

use launchpad::errors::LaunchError;
use launchpad::models::session::LogEntry;
use launchpad::session::store::{SessionStore, StoreSettings};
use tokio_test::{assert_err, assert_ok};

use crate::support::config;

fn store(idle_secs: u64) -> SessionStore {
    SessionStore::new(StoreSettings {
        idle_timeout: Duration::from_secs(idle_secs),
    })
}

#[tokio::test(start_paused = true)]
async fn test_idle_session_disappears() {
    let store = store(60);
    let id = store.create(config(), None).unwrap();

    tokio::time::advance(Duration::from_secs(59)).await;
    assert!(store.contains(&id));

    tokio::time::advance(Duration::from_secs(2)).await;
    assert!(!store.contains(&id));
    assert!(store.list_all().is_empty());
    assert!(matches!(store.snapshot(&id), Err(LaunchError::SessionNotFound(_))));

    assert_eq!(store.purge_expired(), 1);
    assert_eq!(store.purge_expired(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_update_resets_the_deadline() {
    let store = store(60);
    let id = store.create(config(), None).unwrap();

    tokio::time::advance(Duration::from_secs(50)).await;
    assert_ok!(store.append_log(&id, LogEntry::info("still working")));

    // past the original deadline, inside the refreshed one
    tokio::time::advance(Duration::from_secs(50)).await;
    assert_eq!(store.purge_expired(), 0);
    assert!(store.contains(&id));
    assert_eq!(store.get(&id).unwrap().log_entries.len(), 1);

    tokio::time::advance(Duration::from_secs(11)).await;
    assert_eq!(store.purge_expired(), 1);
    assert!(!store.contains(&id));
}

#[tokio::test(start_paused = true)]
async fn test_deadline_is_reset_not_extended() {
    let store = store(60);
    let id = store.create(config(), None).unwrap();

    // many quick updates must not stack up idle time
    for _ in 0..10 {
        tokio::time::advance(Duration::from_secs(1)).await;
        assert_ok!(store.touch(&id));
    }

    tokio::time::advance(Duration::from_secs(61)).await;
    assert!(!store.contains(&id));
}

#[tokio::test(start_paused = true)]
async fn test_expired_session_rejects_updates_and_frees_its_id() {
    let store = store(60);
    let id = store
        .create(config(), Some("dep-1".to_string()))
        .unwrap();

    tokio::time::advance(Duration::from_secs(61)).await;
    assert_err!(store.set_address(&id, "203.0.113.10"));

    let again = store.create(config(), Some("dep-1".to_string()));
    assert_eq!(again.unwrap(), "dep-1");
    assert!(store.get("dep-1").unwrap().address.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_delete_is_immediate() {
    let store = store(60);
    let id = store.create(config(), None).unwrap();
    assert!(store.delete(&id).is_some());
    assert!(store.delete(&id).is_none());
    assert!(store.is_empty());
    assert_eq!(store.purge_expired(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_log_entries_keep_append_order() {
    let store = store(60);
    let id = store.create(config(), None).unwrap();
    for i in 0..5 {
        store
            .append_log(&id, LogEntry::info(format!("step {}", i)))
            .unwrap();
    }

    let messages: Vec<String> = store
        .snapshot(&id)
        .unwrap()
        .log_entries
        .into_iter()
        .map(|e| e.message)
        .collect();
    assert_eq!(messages, vec!["step 0", "step 1", "step 2", "step 3", "step 4"]);
}
