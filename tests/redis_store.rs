//! Integration tests for the Redis counter store.
//!
//! These tests require a Redis instance at `redis://127.0.0.1/` and are
//! ignored by default: `cargo test --test redis_store -- --ignored`

use std::sync::Arc;
use std::time::Duration;

use ratewarden::ratelimit::{FixedWindowLimiter, WindowConfig};
use ratewarden::store::{CounterStore, RedisStore, StoreError};

const REDIS_URL: &str = "redis://127.0.0.1/";

async fn connect() -> Option<RedisStore> {
    match RedisStore::connect(REDIS_URL).await {
        Ok(store) => Some(store),
        Err(e) => {
            eprintln!("Skipping test: Redis not available ({})", e);
            None
        }
    }
}

/// Unique key per test and run, removed before use.
async fn fresh_key(store: &RedisStore, test_name: &str) -> String {
    let key = format!("ratewarden-test:{}:{}", test_name, std::process::id());
    store.delete(&key).await.unwrap();
    key
}

#[tokio::test]
#[ignore] // Requires Redis
async fn test_get_set_increment() {
    let Some(store) = connect().await else { return };
    let key = fresh_key(&store, "primitives").await;

    assert_eq!(store.get(&key).await.unwrap(), None);

    store.set(&key, 1, Duration::from_secs(60)).await.unwrap();
    assert_eq!(store.get(&key).await.unwrap(), Some(1));

    assert_eq!(store.increment(&key).await.unwrap(), 2);
    let ttl = store.ttl(&key).await.unwrap().unwrap();
    assert!(ttl <= Duration::from_secs(60));
    assert!(ttl > Duration::from_secs(55));

    store.delete(&key).await.unwrap();
}

#[tokio::test]
#[ignore] // Requires Redis
async fn test_admit_script_enforces_limit() {
    let Some(store) = connect().await else { return };
    let key = fresh_key(&store, "admit").await;
    let window = Duration::from_secs(60);

    for expected in 1..=3 {
        let admission = store.admit(&key, 3, window).await.unwrap();
        assert!(admission.allowed);
        assert_eq!(admission.count, expected);
    }

    let denied = store.admit(&key, 3, window).await.unwrap();
    assert!(!denied.allowed);
    assert_eq!(denied.count, 3);
    assert_eq!(store.get(&key).await.unwrap(), Some(3));

    store.delete(&key).await.unwrap();
}

#[tokio::test]
#[ignore] // Requires Redis
async fn test_window_expires() {
    let Some(store) = connect().await else { return };
    let key = fresh_key(&store, "expiry").await;
    let limiter =
        FixedWindowLimiter::new(Arc::new(store.clone()), WindowConfig::new(key.as_str(), 1, 1))
            .unwrap();

    assert!(limiter.is_allowed().await.unwrap());
    assert!(!limiter.is_allowed().await.unwrap());

    tokio::time::sleep(Duration::from_millis(1100)).await;
    assert!(limiter.is_allowed().await.unwrap());

    store.delete(&key).await.unwrap();
}

#[tokio::test]
#[ignore] // Requires Redis
async fn test_concurrent_admissions_are_atomic() {
    let Some(store) = connect().await else { return };
    let key = fresh_key(&store, "concurrent").await;
    let limiter = Arc::new(
        FixedWindowLimiter::new(Arc::new(store.clone()), WindowConfig::new(key.as_str(), 10, 60))
            .unwrap(),
    );

    let attempts = (0..50).map(|_| {
        let limiter = Arc::clone(&limiter);
        async move { limiter.is_allowed().await.unwrap() }
    });
    let admitted = futures::future::join_all(attempts)
        .await
        .into_iter()
        .filter(|allowed| *allowed)
        .count();

    assert_eq!(admitted, 10);
    store.delete(&key).await.unwrap();
}

#[tokio::test]
#[ignore] // Requires Redis
async fn test_non_integer_value_is_invalid() {
    let Some(store) = connect().await else { return };
    let key = fresh_key(&store, "invalid").await;

    let client = redis::Client::open(REDIS_URL).unwrap();
    let mut conn = client.get_multiplexed_async_connection().await.unwrap();
    let _: () = redis::cmd("SET")
        .arg(&key)
        .arg("not-a-number")
        .query_async(&mut conn)
        .await
        .unwrap();

    assert!(matches!(
        store.get(&key).await,
        Err(StoreError::InvalidValue { .. })
    ));
    assert!(matches!(
        store.admit(&key, 5, Duration::from_secs(60)).await,
        Err(StoreError::InvalidValue { .. })
    ));

    store.delete(&key).await.unwrap();
}
