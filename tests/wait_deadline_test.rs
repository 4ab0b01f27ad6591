use smartlock::{AcquireError, LockArbiter, LockConfig, LockError, LockStore, MemoryStore};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{self, Instant};

const KEY: &str = "resourceName";

fn arbiter() -> LockArbiter {
    LockArbiter::new(Arc::new(MemoryStore::new()), LockConfig::default())
}

#[tokio::test]
async fn test_zero_wait_fails_immediately_when_held() {
    let arbiter = arbiter();
    let _holder = arbiter.try_acquire(KEY).await.unwrap();

    let err = arbiter.try_acquire(KEY).await.unwrap_err();
    assert_eq!(err.acquire_error(), Some(AcquireError::WillNotWait));
    assert_eq!(
        err.to_string(),
        "Failed to acquire lock on resourceName: will not wait"
    );

    let state = arbiter.inspect(KEY).await.unwrap();
    assert_eq!(state.holder, Some(1));
    assert!(state.waiting.is_empty());
}

#[tokio::test]
async fn test_lock_uses_configured_defaults() {
    let config = LockConfig::new().with_default_lease(Duration::from_secs(3));
    let arbiter = LockArbiter::new(Arc::new(MemoryStore::new()), config);

    let first = arbiter.lock(KEY).await.unwrap();
    assert_eq!(first.lease(), Duration::from_secs(3));

    // Default wait is zero.
    let err = arbiter.lock(KEY).await.unwrap_err();
    assert_eq!(err.acquire_error(), Some(AcquireError::WillNotWait));
}

#[tokio::test]
async fn test_zero_wait_fails_when_key_taken_remotely() {
    let store = Arc::new(MemoryStore::new());
    store
        .conditional_set(KEY, "other-process", Duration::from_secs(30))
        .await
        .unwrap();
    let arbiter = LockArbiter::new(store, LockConfig::default());

    let err = arbiter.try_acquire(KEY).await.unwrap_err();
    assert_eq!(err.acquire_error(), Some(AcquireError::WillNotWait));
}

#[tokio::test(start_paused = true)]
async fn test_waiter_gets_lock_when_holder_releases_in_time() {
    let arbiter = arbiter();
    let holder = arbiter.try_acquire(KEY).await.unwrap();
    let waiter = arbiter.acquire(KEY, Duration::from_millis(1100));

    let releaser = tokio::spawn(async move {
        time::sleep(Duration::from_millis(1000)).await;
        holder.release().await.unwrap();
    });

    let lock = waiter.await.unwrap();
    assert_eq!(lock.id(), 2);
    releaser.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_waiter_expires_when_holder_keeps_lock() {
    let arbiter = arbiter();
    let _holder = arbiter.try_acquire(KEY).await.unwrap();

    let start = Instant::now();
    let err = arbiter
        .acquire(KEY, Duration::from_millis(900))
        .await
        .unwrap_err();
    let elapsed = start.elapsed();

    assert_eq!(err.acquire_error(), Some(AcquireError::Expired));
    assert!(elapsed >= Duration::from_millis(900));
    assert!(elapsed < Duration::from_millis(1000));

    let state = arbiter.inspect(KEY).await.unwrap();
    assert_eq!(state.holder, Some(1));
    assert!(state.waiting.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_expired_waiter_is_skipped_for_later_one() {
    let arbiter = arbiter();
    let holder = arbiter.try_acquire(KEY).await.unwrap();

    let short = arbiter.acquire(KEY, Duration::from_millis(100));
    let long = arbiter.acquire(KEY, Duration::from_secs(5));

    let err = short.await.unwrap_err();
    assert_eq!(err.acquire_error(), Some(AcquireError::Expired));

    holder.release().await.unwrap();
    assert_eq!(long.await.unwrap().id(), 3);
}

#[tokio::test]
async fn test_zero_lease_is_rejected() {
    let arbiter = arbiter();
    let err = arbiter
        .acquire_with_lease(KEY, Duration::ZERO, Duration::ZERO)
        .await
        .unwrap_err();

    assert!(matches!(err, LockError::InvalidLease { .. }));
    assert!(!arbiter.inspect(KEY).await.unwrap().is_held());
}
