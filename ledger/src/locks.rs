use std::collections::HashMap;
use std::sync::Arc;

use accrue_types::AccountId;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Idle locks are swept once the registry grows past this many entries.
const SWEEP_THRESHOLD: usize = 4096;

/// Per-account mutual exclusion for ledger mutations.
/// Operations on different accounts run concurrently.
/// Operations on the same account are serialized.
#[derive(Default)]
pub struct AccountLocks {
    locks: Mutex<HashMap<AccountId, Arc<Mutex<()>>>>,
}

impl AccountLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `account`. Held until the guard drops.
    pub async fn acquire(&self, account: &AccountId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            if locks.len() >= SWEEP_THRESHOLD {
                locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            }
            locks
                .entry(account.clone())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }

    /// Number of accounts with a registered lock.
    pub async fn tracked_accounts(&self) -> usize {
        self.locks.lock().await.len()
    }

    /// Drop locks nobody is holding or waiting on.
    pub async fn cleanup(&self) {
        let mut locks = self.locks.lock().await;
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::{Duration, Instant};

    fn account(name: &str) -> AccountId {
        AccountId::new(name).unwrap()
    }

    #[tokio::test]
    async fn test_same_account_serialized() {
        let locks = Arc::new(AccountLocks::new());
        let inside = Arc::new(AtomicU64::new(0));
        let max_seen = Arc::new(AtomicU64::new(0));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let locks = Arc::clone(&locks);
            let inside = Arc::clone(&inside);
            let max_seen = Arc::clone(&max_seen);
            handles.push(tokio::spawn(async move {
                let _guard = locks.acquire(&account("same")).await;
                let current = inside.fetch_add(1, Ordering::SeqCst) + 1;
                max_seen.fetch_max(current, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                inside.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_different_accounts_run_in_parallel() {
        let locks = Arc::new(AccountLocks::new());
        let start = Instant::now();

        let mut handles = Vec::new();
        for i in 0..4 {
            let locks = Arc::clone(&locks);
            handles.push(tokio::spawn(async move {
                let _guard = locks.acquire(&account(&format!("acct_{i}"))).await;
                tokio::time::sleep(Duration::from_millis(50)).await;
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        let elapsed = start.elapsed();
        assert!(
            elapsed < Duration::from_millis(180),
            "Expected parallel execution, took {elapsed:?}"
        );
    }

    #[tokio::test]
    async fn test_cleanup_removes_idle_locks() {
        let locks = AccountLocks::new();
        drop(locks.acquire(&account("a")).await);
        let held = locks.acquire(&account("b")).await;
        assert_eq!(locks.tracked_accounts().await, 2);

        locks.cleanup().await;
        assert_eq!(locks.tracked_accounts().await, 1);
        drop(held);
    }
}
