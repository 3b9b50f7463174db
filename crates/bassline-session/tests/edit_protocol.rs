//! Edit-session protocol integration tests.
//!
//! These drive [`EditSession`] against the in-memory store and directory with
//! a manual clock:
//!
//! 1. Two users racing for an unclaimed theme
//! 2. A holder going idle past the grace window
//! 3. Unreadable stored tokens
//! 4. Lock timeouts and validation failures

use std::sync::Arc;
use std::time::Duration;

use bassline_core::fixtures::ManualClock;
use bassline_core::save_token::RESERVE_SECONDS;
use bassline_core::{BasslineError, ErrorCategory, Reservations, SaveToken};
use bassline_session::{
    EditOutcome, EditSession, Fields, MemoryStore, ResourceKey, ResourceKind, ResourceStore,
    StoreDirectory, UNKNOWN_HOLDER,
};
use serde_json::json;

const ALICE: i64 = 1;
const BOB: i64 = 2;

struct Harness {
    clock: Arc<ManualClock>,
    store: Arc<MemoryStore>,
    session: EditSession,
}

fn harness() -> Harness {
    harness_with_store(MemoryStore::new())
}

fn harness_with_store(store: MemoryStore) -> Harness {
    let clock = Arc::new(ManualClock::new(1_700_000_000));
    for (id, name) in [(ALICE, "A"), (BOB, "B")] {
        store.insert(
            ResourceKey::new(ResourceKind::User, id),
            fields(json!({ "username": name })),
        );
    }
    let store = Arc::new(store);
    let directory = Arc::new(StoreDirectory::new(store.clone()));

    let session = EditSession::new(
        store.clone(),
        directory,
        Reservations::new(clock.clone(), RESERVE_SECONDS),
    );
    Harness {
        clock,
        store,
        session,
    }
}

fn fields(value: serde_json::Value) -> Fields {
    value.as_object().cloned().unwrap_or_default()
}

async fn new_theme(h: &Harness) -> ResourceKey {
    h.store
        .create(ResourceKind::Theme, fields(json!({"name": "Dark"})))
        .await
        .unwrap()
}

fn granted_key(outcome: EditOutcome) -> String {
    match outcome {
        EditOutcome::Granted { key, .. } => key,
        EditOutcome::Conflict(conflict) => panic!("unexpected conflict: {}", conflict.message),
    }
}

fn conflict_holder(outcome: EditOutcome) -> String {
    match outcome {
        EditOutcome::Conflict(conflict) => conflict.holder_name,
        EditOutcome::Granted { .. } => panic!("expected a conflict"),
    }
}

fn rename(name: &'static str) -> impl FnOnce(&Fields) -> Result<Fields, BasslineError> + Send {
    move |current| {
        let mut next = current.clone();
        next.insert("name".into(), name.into());
        Ok(next)
    }
}

#[tokio::test]
async fn test_scenario_racing_editors() {
    let h = harness();
    let theme = new_theme(&h).await;

    // A opens the unclaimed theme
    let k1 = granted_key(h.session.open(theme, ALICE).await.unwrap());

    // B opens within a second and is refused
    h.clock.advance(1);
    let outcome = h.session.open(theme, BOB).await.unwrap();
    assert_eq!(conflict_holder(outcome), "A");

    // A saves with K1 and gets K2
    let saved = h.session.save(theme, ALICE, &k1, rename("Light")).await.unwrap();
    let k2 = granted_key(saved);
    assert_ne!(k1, k2);
    assert_eq!(h.store.peek(theme).unwrap()["name"], "Light");

    // A saves again with the stale K1
    let stale = h.session.save(theme, ALICE, &k1, rename("Other")).await.unwrap();
    match stale {
        EditOutcome::Conflict(conflict) => {
            assert_eq!(conflict.holder_id, Some(ALICE));
            assert!(conflict.message.contains("recently edited by 'A'"));
        }
        EditOutcome::Granted { .. } => panic!("stale key accepted"),
    }
    assert_eq!(h.store.peek(theme).unwrap()["name"], "Light");
}

#[tokio::test]
async fn test_scenario_idle_holder_is_overtaken() {
    let h = harness();
    let theme = new_theme(&h).await;

    let alice_key = granted_key(h.session.open(theme, ALICE).await.unwrap());

    h.clock.advance(11);
    granted_key(h.session.open(theme, BOB).await.unwrap());

    let outcome = h
        .session
        .save(theme, ALICE, &alice_key, rename("Mine"))
        .await
        .unwrap();
    assert_eq!(conflict_holder(outcome), "B");
    assert_eq!(h.store.peek(theme).unwrap()["name"], "Dark");
}

#[tokio::test]
async fn test_open_persists_token_with_unchanged_fields() {
    let h = harness();
    let theme = new_theme(&h).await;

    let key = granted_key(h.session.open(theme, ALICE).await.unwrap());

    let stored = SaveToken::decode(&h.store.raw_token(theme).unwrap()).unwrap();
    assert_eq!(stored.key(), key);
    assert_eq!(stored.holder_id(), ALICE);
    assert_eq!(h.store.peek(theme).unwrap()["name"], "Dark");
}

#[tokio::test]
async fn test_holder_may_reopen_immediately() {
    let h = harness();
    let theme = new_theme(&h).await;

    let first = granted_key(h.session.open(theme, ALICE).await.unwrap());
    let second = granted_key(h.session.open(theme, ALICE).await.unwrap());
    assert_ne!(first, second);
}

#[tokio::test]
async fn test_malformed_token_fails_closed() {
    let h = harness();
    let theme = new_theme(&h).await;
    h.store.set_raw_token(theme, Some("{not json".into()));

    let outcome = h.session.open(theme, ALICE).await.unwrap();
    match outcome {
        EditOutcome::Conflict(conflict) => {
            assert_eq!(conflict.holder_id, None);
            assert_eq!(conflict.holder_name, UNKNOWN_HOLDER);
        }
        EditOutcome::Granted { .. } => panic!("malformed token treated as unclaimed"),
    }

    let saved = h.session.save(theme, ALICE, "anything", rename("X")).await.unwrap();
    assert_eq!(conflict_holder(saved), UNKNOWN_HOLDER);

    // nothing overwritten
    assert_eq!(h.store.raw_token(theme).as_deref(), Some("{not json"));
    assert_eq!(h.store.peek(theme).unwrap()["name"], "Dark");
}

#[tokio::test]
async fn test_unknown_holder_name() {
    let h = harness();
    let theme = new_theme(&h).await;
    h.store
        .set_raw_token(theme, Some(SaveToken::issue(99, 1_700_000_000).encode().unwrap()));

    let outcome = h.session.open(theme, ALICE).await.unwrap();
    assert_eq!(conflict_holder(outcome), UNKNOWN_HOLDER);
}

#[tokio::test]
async fn test_failed_validation_writes_nothing() {
    let h = harness();
    let theme = new_theme(&h).await;
    let key = granted_key(h.session.open(theme, ALICE).await.unwrap());
    let token_before = h.store.raw_token(theme);

    let err = h
        .session
        .save(theme, ALICE, &key, |_| Err(BasslineError::validation("bad name")))
        .await
        .unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Validation);
    assert_eq!(h.store.raw_token(theme), token_before);

    // the key is still valid
    granted_key(h.session.save(theme, ALICE, &key, rename("Good")).await.unwrap());
}

#[tokio::test]
async fn test_missing_resource_is_not_found() {
    let h = harness();
    let err = h
        .session
        .open(ResourceKey::new(ResourceKind::Theme, 404), ALICE)
        .await
        .unwrap_err();
    assert_eq!(err.category(), ErrorCategory::NotFound);
}

#[tokio::test]
async fn test_locked_row_is_unavailable() {
    let h = harness_with_store(MemoryStore::with_lock_timeout(Duration::from_millis(20), 5));
    let theme = new_theme(&h).await;

    let _held = h.store.acquire(theme).await.unwrap();
    let err = h.session.open(theme, ALICE).await.unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Unavailable);
    assert_eq!(err.retry_after(), Some(5));
}

#[tokio::test]
async fn test_auth_config_singleton_session() {
    let h = harness();
    let key = granted_key(h.session.open(ResourceKey::auth_config(), BOB).await.unwrap());

    let outcome = h.session.open(ResourceKey::auth_config(), ALICE).await.unwrap();
    match outcome {
        EditOutcome::Conflict(conflict) => {
            assert!(conflict.message.starts_with("This configuration is being edited by 'B'"));
        }
        EditOutcome::Granted { .. } => panic!("expected a conflict"),
    }

    granted_key(
        h.session
            .save(ResourceKey::auth_config(), BOB, &key, |_| {
                Ok(fields(json!({"plugins": []})))
            })
            .await
            .unwrap(),
    );
}

#[tokio::test]
async fn test_concurrent_opens_grant_exactly_one() {
    let h = harness();
    let theme = new_theme(&h).await;
    let session = Arc::new(h.session.clone());

    let mut tasks = Vec::new();
    for user in 1..=8 {
        let session = Arc::clone(&session);
        tasks.push(tokio::spawn(async move { session.open(theme, user).await }));
    }

    let mut granted = 0;
    for task in tasks {
        if matches!(task.await.unwrap().unwrap(), EditOutcome::Granted { .. }) {
            granted += 1;
        }
    }
    assert_eq!(granted, 1);
}
