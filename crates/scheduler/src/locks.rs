//! Per-user async locks.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Registry of one async mutex per user.
///
/// Everything that mutates a user's session or reminders holds that user's
/// guard. The outer map lock is only held for the lookup.
#[derive(Debug, Clone, Default)]
pub struct UserLocks {
    inner: Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>,
}

impl UserLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to a user's state.
    pub async fn lock(&self, user_id: &str) -> OwnedMutexGuard<()> {
        let mutex = {
            let mut map = self.inner.lock().unwrap_or_else(|p| p.into_inner());
            map.entry(user_id.to_string()).or_default().clone()
        };
        mutex.lock_owned().await
    }

    /// Drop a user's entry once no guard or waiter refers to it.
    ///
    /// Returns false and keeps the entry while the lock is held or awaited,
    /// so a later `lock` still queues behind them.
    pub fn forget(&self, user_id: &str) -> bool {
        let mut map = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        match map.get(user_id) {
            Some(mutex) if Arc::strong_count(mutex) == 1 => {
                map.remove(user_id);
                true
            }
            _ => false,
        }
    }

    /// Number of users with a registered lock.
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(|p| p.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_user_is_exclusive() {
        let locks = UserLocks::new();
        let _held = locks.lock("U1").await;

        let second = tokio::time::timeout(Duration::from_millis(50), locks.lock("U1")).await;
        assert!(second.is_err());
    }

    #[tokio::test]
    async fn test_users_are_independent() {
        let locks = UserLocks::new();
        let _u1 = locks.lock("U1").await;

        let u2 = tokio::time::timeout(Duration::from_millis(50), locks.lock("U2")).await;
        assert!(u2.is_ok());
        assert_eq!(locks.len(), 2);
    }

    #[tokio::test]
    async fn test_released_guard_allows_relock() {
        let locks = UserLocks::new();
        drop(locks.lock("U1").await);
        drop(locks.lock("U1").await);

        assert!(locks.forget("U1"));
        assert!(locks.is_empty());
        assert!(!locks.forget("U1"));
    }

    #[tokio::test]
    async fn test_forget_keeps_contended_lock() {
        let locks = UserLocks::new();
        let held = locks.lock("U1").await;

        let waiter = tokio::spawn({
            let locks = locks.clone();
            async move {
                let _guard = locks.lock("U1").await;
            }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        assert!(!locks.forget("U1"));
        assert_eq!(locks.len(), 1);

        // A new caller still queues behind the held guard and the waiter
        let fresh = tokio::time::timeout(Duration::from_millis(50), locks.lock("U1")).await;
        assert!(fresh.is_err());

        drop(held);
        waiter.await.unwrap();
        assert!(locks.forget("U1"));
        assert!(locks.is_empty());
    }
}
