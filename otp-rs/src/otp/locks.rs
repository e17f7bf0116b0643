//! Per-principal serialization
//!
//! Issue and validate for the same principal take the same async mutex;
//! different principals never wait on each other. Idle entries are pruned
//! once the table grows past [`PRUNE_THRESHOLD`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Table size above which unused locks are dropped on the next acquire
pub const PRUNE_THRESHOLD: usize = 1024;

/// Held while a principal's record is being read or replaced
pub type PrincipalGuard = OwnedMutexGuard<()>;

#[derive(Debug, Default)]
pub struct PrincipalLocks {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl PrincipalLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `principal_id`
    pub async fn lock(&self, principal_id: &str) -> PrincipalGuard {
        let mutex = {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());

            if locks.len() >= PRUNE_THRESHOLD {
                // Only the table holds an idle lock; holders and waiters keep a clone
                locks.retain(|_, m| Arc::strong_count(m) > 1);
            }

            Arc::clone(locks.entry(principal_id.to_string()).or_default())
        };

        mutex.lock_owned().await
    }

    /// Number of principals currently tracked
    pub fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(|e| e.into_inner()).len()
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
    async fn test_same_principal_is_serialized() {
        let locks = Arc::new(PrincipalLocks::new());
        let guard = locks.lock("alice").await;

        let waiter = {
            let locks = Arc::clone(&locks);
            tokio::spawn(async move {
                let _guard = locks.lock("alice").await;
            })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());

        drop(guard);
        waiter.await.unwrap();
    }

    #[tokio::test]
    async fn test_different_principals_do_not_block() {
        let locks = PrincipalLocks::new();
        let _alice = locks.lock("alice").await;

        let bob = tokio::time::timeout(Duration::from_secs(1), locks.lock("bob")).await;
        assert!(bob.is_ok());
    }

    #[tokio::test]
    async fn test_idle_locks_are_pruned() {
        let locks = PrincipalLocks::new();

        for i in 0..PRUNE_THRESHOLD {
            let _guard = locks.lock(&format!("user-{}", i)).await;
        }
        assert_eq!(locks.len(), PRUNE_THRESHOLD);

        let _guard = locks.lock("one-more").await;
        assert_eq!(locks.len(), 1);
    }
}
