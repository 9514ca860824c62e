//! Per-key async mutex registry.
//!
//! Each key maps to its own `tokio::sync::Mutex`. Entries are created on first
//! use and removed once the last holder or waiter is gone, so the registry
//! only grows with the number of keys under contention.

use std::{
    collections::HashMap,
    fmt::{self, Debug},
    hash::Hash,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};
use thiserror::Error;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Keyed lock errors
#[derive(Debug, Error)]
pub enum LockError {
    /// Lock not acquired in time
    #[error("Timed out after {timeout:?} waiting for lock on {key}")]
    Timeout { key: String, timeout: Duration },
}

type Slots<K> = Arc<Mutex<HashMap<K, Arc<AsyncMutex<()>>>>>;

/// Registry of per-key mutexes
pub struct KeyedMutex<K> {
    slots: Slots<K>,
}

impl<K> Clone for KeyedMutex<K> {
    fn clone(&self) -> Self {
        Self {
            slots: self.slots.clone(),
        }
    }
}

impl<K: Eq + Hash + Clone + Debug> Default for KeyedMutex<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Eq + Hash + Clone + Debug> KeyedMutex<K> {
    pub fn new() -> Self {
        Self {
            slots: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Acquire the lock for `key`, waiting at most `timeout`.
    ///
    /// The lock is held until the returned guard is dropped.
    pub async fn acquire(&self, key: K, timeout: Duration) -> Result<KeyedGuard<K>, LockError> {
        let slot = lock_slots(&self.slots)
            .entry(key.clone())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone();

        match tokio::time::timeout(timeout, slot.lock_owned()).await {
            Ok(guard) => Ok(KeyedGuard {
                key,
                guard: Some(guard),
                slots: self.slots.clone(),
            }),
            Err(_) => {
                // Our clone of the slot went away with the timed-out future
                release_if_idle(&self.slots, &key);
                log::warn!("Lock acquisition for {:?} timed out after {:?}", key, timeout);
                Err(LockError::Timeout {
                    key: format!("{key:?}"),
                    timeout,
                })
            }
        }
    }

    /// Whether someone currently holds `key`
    pub fn is_locked(&self, key: &K) -> bool {
        lock_slots(&self.slots)
            .get(key)
            .is_some_and(|slot| slot.try_lock().is_err())
    }

    /// Number of keys with a holder or waiter
    pub fn active_keys(&self) -> usize {
        lock_slots(&self.slots).len()
    }
}

/// Held lock for one key; released on drop
pub struct KeyedGuard<K: Eq + Hash> {
    key: K,
    guard: Option<OwnedMutexGuard<()>>,
    slots: Slots<K>,
}

impl<K: Eq + Hash> KeyedGuard<K> {
    pub fn key(&self) -> &K {
        &self.key
    }
}

impl<K: Eq + Hash + Debug> fmt::Debug for KeyedGuard<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyedGuard").field("key", &self.key).finish()
    }
}

impl<K: Eq + Hash> Drop for KeyedGuard<K> {
    fn drop(&mut self) {
        drop(self.guard.take());
        release_if_idle(&self.slots, &self.key);
    }
}

fn lock_slots<K>(slots: &Slots<K>) -> MutexGuard<'_, HashMap<K, Arc<AsyncMutex<()>>>> {
    slots.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Drop the registry entry when only the registry still references it.
///
/// Waiters clone the slot under the registry lock, so the count cannot grow
/// while we hold it.
fn release_if_idle<K: Eq + Hash>(slots: &Slots<K>, key: &K) {
    let mut map = lock_slots(slots);
    if map.get(key).is_some_and(|slot| Arc::strong_count(slot) == 1) {
        map.remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const WAIT: Duration = Duration::from_secs(2);

    #[tokio::test]
    async fn test_acquire_and_release() {
        let locks: KeyedMutex<i64> = KeyedMutex::new();
        {
            let guard = locks.acquire(1, WAIT).await.unwrap();
            assert_eq!(*guard.key(), 1);
            assert!(locks.is_locked(&1));
            assert_eq!(locks.active_keys(), 1);
        }
        assert!(!locks.is_locked(&1));
        assert_eq!(locks.active_keys(), 0);
    }

    #[tokio::test]
    async fn test_distinct_keys_do_not_block() {
        let locks: KeyedMutex<i64> = KeyedMutex::new();
        let _a = locks.acquire(1, WAIT).await.unwrap();
        let b = locks.acquire(2, Duration::from_millis(50)).await;
        assert!(b.is_ok());
        assert_eq!(locks.active_keys(), 2);
    }

    #[tokio::test]
    async fn test_timeout_when_held() {
        let locks: KeyedMutex<i64> = KeyedMutex::new();
        let _held = locks.acquire(7, WAIT).await.unwrap();

        let err = locks
            .acquire(7, Duration::from_millis(20))
            .await
            .unwrap_err();
        let LockError::Timeout { key, timeout } = err;
        assert_eq!(key, "7");
        assert_eq!(timeout, Duration::from_millis(20));
        // The holder's entry survives the failed attempt
        assert_eq!(locks.active_keys(), 1);
    }

    #[tokio::test]
    async fn test_entry_removed_after_timeout_and_release() {
        let locks: KeyedMutex<i64> = KeyedMutex::new();
        let held = locks.acquire(3, WAIT).await.unwrap();
        assert!(locks.acquire(3, Duration::from_millis(10)).await.is_err());
        drop(held);
        assert_eq!(locks.active_keys(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_serializes_read_modify_write() {
        let locks: KeyedMutex<i64> = KeyedMutex::new();
        let counter = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..32 {
            let locks = locks.clone();
            let counter = counter.clone();
            handles.push(tokio::spawn(async move {
                let _guard = locks.acquire(1, WAIT).await.unwrap();
                let value = counter.load(Ordering::SeqCst);
                tokio::task::yield_now().await;
                counter.store(value + 1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(counter.load(Ordering::SeqCst), 32);
        assert_eq!(locks.active_keys(), 0);
    }
}
