//! Per-key async mutexes.
//!
//! [`KeyedLocks`] keeps a `HashMap` from key to an individually lockable
//! entry, the same layout as a registry of per-entry locks: operations on
//! the same key are serialized, operations on different keys run
//! concurrently. Used to serialize admission per `(tenant, gig, requester)`,
//! gig start per tenant, and order creation and capture per tip intent.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

/// Number of entries above which idle entries are pruned on the next lock.
const PRUNE_THRESHOLD: usize = 1024;

/// A set of async mutexes addressed by key.
#[derive(Debug)]
pub struct KeyedLocks<K> {
    entries: RwLock<HashMap<K, Arc<Mutex<()>>>>,
}

impl<K> KeyedLocks<K>
where
    K: Eq + Hash + Clone,
{
    /// Creates an empty lock set.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Acquires the lock for `key`, waiting for any current holder.
    ///
    /// The returned guard releases the lock on drop.
    pub async fn lock(&self, key: K) -> OwnedMutexGuard<()> {
        let existing = {
            let map = self.entries.read().await;
            map.get(&key).map(Arc::clone)
        };
        let entry = match existing {
            Some(entry) => entry,
            None => {
                let mut map = self.entries.write().await;
                if map.len() >= PRUNE_THRESHOLD {
                    // Only this map holds a reference to an idle entry.
                    map.retain(|_, entry| Arc::strong_count(entry) > 1);
                }
                Arc::clone(map.entry(key).or_default())
            }
        };
        entry.lock_owned().await
    }

    /// Number of tracked keys.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Returns `true` when no key is tracked.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

impl<K> Default for KeyedLocks<K>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn same_key_is_serialized() {
        let locks = Arc::new(KeyedLocks::<u32>::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let locks = Arc::clone(&locks);
            let inside = Arc::clone(&inside);
            let max_seen = Arc::clone(&max_seen);
            handles.push(tokio::spawn(async move {
                let _guard = locks.lock(1).await;
                let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                max_seen.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(2)).await;
                inside.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            let _ = handle.await;
        }
        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn different_keys_do_not_block() {
        let locks = KeyedLocks::<&'static str>::new();
        let _a = locks.lock("a").await;
        let b = tokio::time::timeout(Duration::from_millis(50), locks.lock("b")).await;
        assert!(b.is_ok());
        assert_eq!(locks.len().await, 2);
    }

    #[tokio::test]
    async fn starts_empty() {
        let locks = KeyedLocks::<u8>::default();
        assert!(locks.is_empty().await);
    }
}
