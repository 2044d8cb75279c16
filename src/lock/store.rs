use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Errors from a key-value store backend
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store connection error: {0}")]
    Connection(String),

    #[error("Store command error: {0}")]
    Command(String),

    #[error("Expiry must be at least one second, got {0:?}")]
    InvalidExpiry(Duration),
}

impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_connection_refusal() || err.is_connection_dropped() || err.is_io_error() || err.is_timeout() {
            StoreError::Connection(err.to_string())
        } else {
            StoreError::Command(err.to_string())
        }
    }
}

/// Shared store exposing an atomic conditional set with expiry.
///
/// `set_nx_ex` has the semantics of `SET key value EX <seconds> NX`: the value is
/// written only when the key is absent, and the key expires after `expiry`.
/// Returns `true` when this call created the key.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn set_nx_ex(&self, key: &str, value: &str, expiry: Duration) -> Result<bool, StoreError>;
}

/// Whole seconds for the `EX` argument. Fractions round up so the key never
/// lives shorter than asked; sub-second expiries are rejected.
pub(crate) fn expiry_secs(expiry: Duration) -> Result<u64, StoreError> {
    match expiry.as_secs() {
        0 => Err(StoreError::InvalidExpiry(expiry)),
        secs if expiry.subsec_nanos() > 0 => Ok(secs + 1),
        secs => Ok(secs),
    }
}
