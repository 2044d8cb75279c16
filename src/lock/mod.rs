//! Lease-based mutual exclusion over a shared key-value store.
//!
//! A lease is taken with a single atomic `SET key token EX ttl NX`. It is never
//! renewed or released; it simply expires after `ttl`. This makes it a boot-time
//! gate rather than a long-lived leader election.

pub mod memory_store;
pub mod redis_store;
pub mod store;

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use store::expiry_secs;

pub use memory_store::MemoryStore;
pub use redis_store::RedisStore;
pub use store::{KeyValueStore, StoreError};

#[derive(Debug, Error)]
pub enum LockError {
    #[error("Lock store unavailable: {0}")]
    Unavailable(String),

    #[error("Lock TTL must be at least one second, got {0:?}")]
    InvalidTtl(Duration),
}

impl From<StoreError> for LockError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::InvalidExpiry(ttl) => LockError::InvalidTtl(ttl),
            other => LockError::Unavailable(other.to_string()),
        }
    }
}

/// A successfully acquired lease.
#[derive(Debug, Clone, PartialEq)]
pub struct Lease {
    pub key: String,
    pub owner_token: String,
    pub ttl: Duration,
}

/// Single-shot, non-blocking lease acquisition against an injected store.
#[derive(Clone)]
pub struct DistributedLock {
    store: Arc<dyn KeyValueStore>,
}

impl DistributedLock {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Attempt to take the lease on `key`. `Ok(None)` means another holder owns it.
    ///
    /// Fractional TTLs are rounded up to whole seconds; the returned lease
    /// carries the TTL actually applied.
    pub async fn try_acquire(&self, key: &str, ttl: Duration) -> Result<Option<Lease>, LockError> {
        let ttl = Duration::from_secs(expiry_secs(ttl)?);

        let owner_token = Uuid::new_v4().to_string();
        let created = self.store.set_nx_ex(key, &owner_token, ttl).await?;

        if !created {
            debug!(%key, "Lease already held by another process");
            return Ok(None);
        }

        info!(%key, ttl_secs = ttl.as_secs(), %owner_token, "Lease acquired");
        Ok(Some(Lease {
            key: key.to_string(),
            owner_token,
            ttl,
        }))
    }

    /// True iff this call created the lease. Store failures count as not acquired.
    pub async fn acquire(&self, key: &str, ttl: Duration) -> bool {
        match self.try_acquire(key, ttl).await {
            Ok(lease) => lease.is_some(),
            Err(e) => {
                warn!(%key, error = %e, "Could not confirm lease ownership; treating as not acquired");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct DownStore;

    #[async_trait]
    impl KeyValueStore for DownStore {
        async fn set_nx_ex(&self, _key: &str, _value: &str, _expiry: Duration) -> Result<bool, StoreError> {
            Err(StoreError::Connection("connection refused".to_string()))
        }
    }

    #[tokio::test]
    async fn lease_carries_owner_token_written_to_store() {
        let store = Arc::new(MemoryStore::new());
        let lock = DistributedLock::new(store.clone());

        let lease = lock
            .try_acquire("jobs", Duration::from_secs(10))
            .await
            .unwrap()
            .expect("fresh key should be acquired");

        assert_eq!(lease.key, "jobs");
        assert_eq!(store.get("jobs"), Some(lease.owner_token.clone()));
        assert!(lock.try_acquire("jobs", Duration::from_secs(10)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unavailable_store_is_not_acquired() {
        let lock = DistributedLock::new(Arc::new(DownStore));

        let err = lock.try_acquire("jobs", Duration::from_secs(1)).await.unwrap_err();
        assert!(matches!(err, LockError::Unavailable(_)));
        assert!(!lock.acquire("jobs", Duration::from_secs(1)).await);
    }

    #[tokio::test(start_paused = true)]
    async fn fractional_ttl_is_rounded_up_and_reported() {
        let store = Arc::new(MemoryStore::new());
        let lock = DistributedLock::new(store.clone());

        let lease = lock
            .try_acquire("jobs", Duration::from_millis(1900))
            .await
            .unwrap()
            .expect("fresh key should be acquired");
        assert_eq!(lease.ttl, Duration::from_secs(2));

        tokio::time::advance(Duration::from_millis(1950)).await;
        assert!(store.get("jobs").is_some());
        tokio::time::advance(Duration::from_millis(100)).await;
        assert!(store.get("jobs").is_none());
    }

    #[tokio::test]
    async fn sub_second_ttl_is_rejected() {
        let lock = DistributedLock::new(Arc::new(MemoryStore::new()));
        let err = lock.try_acquire("jobs", Duration::from_millis(500)).await.unwrap_err();
        assert!(matches!(err, LockError::InvalidTtl(_)));
    }
}
