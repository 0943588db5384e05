// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-exchange mutual exclusion.
//!
//! Every `create*`/`process*` operation holds the guard for its exchange while
//! it reads, asserts and writes the record, so two messages for the same
//! thread can never both pass the state check. Different exchanges never
//! contend. Entries are evicted once no task holds or waits on them.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Registry of async mutexes keyed by `(record type, thread id, connection id)`.
#[derive(Debug, Clone, Default)]
pub struct ExchangeLocks {
    inner: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl ExchangeLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive access to one exchange.
    pub async fn lock(
        &self,
        record_type: &str,
        thread_id: &str,
        connection_id: Option<&str>,
    ) -> ExchangeGuard {
        let key = format!("{record_type}|{thread_id}|{}", connection_id.unwrap_or("-"));
        let mutex = self.inner.entry(key.clone()).or_default().clone();
        let guard = mutex.lock_owned().await;
        ExchangeGuard {
            key,
            locks: Arc::clone(&self.inner),
            guard: Some(guard),
        }
    }

    /// Number of exchanges currently locked or awaited.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

/// Held for the duration of one state transition.
#[derive(Debug)]
pub struct ExchangeGuard {
    key: String,
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for ExchangeGuard {
    fn drop(&mut self) {
        // Release first so the map holds the last reference when nobody waits.
        self.guard.take();
        self.locks
            .remove_if(&self.key, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn same_exchange_is_serialized() {
        let locks = ExchangeLocks::new();
        let first = locks.lock("CredentialRecord", "t1", Some("c1")).await;

        let contender = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.lock("CredentialRecord", "t1", Some("c1")).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(first);
        contender.await.unwrap();
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn different_threads_do_not_contend() {
        let locks = ExchangeLocks::new();
        let _a = locks.lock("CredentialRecord", "t1", Some("c1")).await;
        let b = tokio::time::timeout(
            Duration::from_millis(50),
            locks.lock("CredentialRecord", "t2", Some("c1")),
        )
        .await;
        assert!(b.is_ok());
        assert_eq!(locks.len(), 2);
    }

    #[tokio::test]
    async fn released_entries_are_evicted() {
        let locks = ExchangeLocks::new();
        drop(locks.lock("ProofRecord", "t1", None).await);
        assert!(locks.is_empty());
    }
}
