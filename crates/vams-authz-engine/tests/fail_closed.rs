mod common;

use common::{FlakyStore, RETRY_DELAY, facade_over, seeded_store, test_config};
use std::sync::Arc;
use std::time::Duration;
use vams_authz::ResourceObject;
use vams_authz_engine::Claims;

fn db1_asset() -> ResourceObject {
    ResourceObject::new("asset").with("databaseId", "db1")
}

#[tokio::test]
async fn exhausted_retries_deny_everything() {
    let store = FlakyStore::new(seeded_store().await);
    store.set_failing(true);
    let config = test_config();
    let facade = facade_over(Arc::new(store.clone()), &config);
    let alice = Claims::for_user("alice");

    assert!(!facade.enforce(&alice, &db1_asset(), "GET").await);
    assert_eq!(store.attempts(), config.policy_retry_attempts as usize);
    assert!(facade.cache().is_empty());

    for action in ["GET", "PUT", "DELETE", ""] {
        assert!(!facade.enforce(&alice, &db1_asset(), action).await, "{action}");
    }
}

#[tokio::test]
async fn next_call_recompiles_after_recovery() {
    let store = FlakyStore::new(seeded_store().await);
    store.set_failing(true);
    let config = test_config();
    let facade = facade_over(Arc::new(store.clone()), &config);
    let alice = Claims::for_user("alice");

    assert!(!facade.enforce(&alice, &db1_asset(), "GET").await);
    let failed_attempts = store.attempts();

    store.set_failing(false);
    assert!(facade.enforce(&alice, &db1_asset(), "GET").await);
    assert_eq!(store.attempts(), failed_attempts + 1);
    assert_eq!(facade.cache().len(), 1);

    // served from cache now
    assert!(facade.enforce(&alice, &db1_asset(), "GET").await);
    assert_eq!(store.attempts(), failed_attempts + 1);
}

#[tokio::test(start_paused = true)]
async fn stale_entry_is_dropped_when_refresh_fails() {
    let store = FlakyStore::new(seeded_store().await);
    let config = test_config();
    let facade = facade_over(Arc::new(store.clone()), &config);
    let alice = Claims::for_user("alice");

    assert!(facade.enforce(&alice, &db1_asset(), "GET").await);
    assert_eq!(facade.cache().len(), 1);

    store.set_failing(true);
    tokio::time::advance(config.refresh_interval + Duration::from_secs(1)).await;
    assert!(!facade.enforce(&alice, &db1_asset(), "GET").await);
    assert!(facade.cache().is_empty());
}

#[tokio::test(start_paused = true)]
async fn retries_wait_between_attempts_only() {
    let store = FlakyStore::new(seeded_store().await);
    store.set_failing(true);
    let config = test_config();
    let facade = facade_over(Arc::new(store.clone()), &config);

    let started = tokio::time::Instant::now();
    assert!(!facade.enforce(&Claims::for_user("alice"), &db1_asset(), "GET").await);
    let elapsed = started.elapsed();

    let gaps = config.policy_retry_attempts - 1;
    assert!(elapsed >= RETRY_DELAY * gaps, "{elapsed:?}");
    assert!(elapsed < RETRY_DELAY * (gaps + 1), "{elapsed:?}");
}

#[tokio::test]
async fn healthy_principals_are_unaffected_by_failures_elsewhere() {
    let store = FlakyStore::new(seeded_store().await);
    store.inner().assign_role("carol", "viewer").await;
    let config = test_config();
    let facade = facade_over(Arc::new(store.clone()), &config);
    let alice = Claims::for_user("alice");

    assert!(facade.enforce(&alice, &db1_asset(), "GET").await);
    store.set_failing(true);
    assert!(!facade.enforce(&Claims::for_user("carol"), &db1_asset(), "GET").await);
    assert!(facade.enforce(&alice, &db1_asset(), "GET").await);
}
