use smartlock::{KeyState, LockArbiter, LockConfig, LockError, MemoryStore};
use std::sync::Arc;
use std::time::Duration;

const KEY: &str = "resourceName";

#[tokio::test]
async fn test_clear_empties_state_and_restarts_ids() {
    let store = Arc::new(MemoryStore::new());
    let arbiter = LockArbiter::new(store.clone(), LockConfig::default());

    let held = arbiter.try_acquire(KEY).await.unwrap();
    let queued = arbiter.acquire(KEY, Duration::from_secs(5));
    let _other = arbiter.try_acquire("other").await.unwrap();

    arbiter.clear().await.unwrap();

    // Pending callers are dropped, not resolved with a reason.
    assert!(matches!(queued.await, Err(LockError::Cancelled)));
    assert_eq!(arbiter.inspect(KEY).await.unwrap(), KeyState::default());
    assert_eq!(arbiter.inspect("other").await.unwrap(), KeyState::default());

    // The store is outside the arbiter's reach; wipe it like a test harness would.
    store.remove(KEY).unwrap();
    let fresh = arbiter.try_acquire(KEY).await.unwrap();
    assert_eq!(fresh.id(), 1);

    // A handle from before the reset cannot free the new holder.
    held.release().await.unwrap();
    assert_eq!(arbiter.inspect(KEY).await.unwrap().holder, Some(1));
    assert_eq!(store.holder(KEY).unwrap().as_deref(), Some(fresh.token()));
}

#[tokio::test]
async fn test_clones_share_one_arbiter() {
    let arbiter = LockArbiter::new(Arc::new(MemoryStore::new()), LockConfig::default());
    let clone = arbiter.clone();

    let _held = arbiter.try_acquire(KEY).await.unwrap();
    let err = clone.try_acquire(KEY).await.unwrap_err();
    assert!(err.is_acquire_error());

    clone.clear().await.unwrap();
    assert!(!arbiter.inspect(KEY).await.unwrap().is_held());
}
