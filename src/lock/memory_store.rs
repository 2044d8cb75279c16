use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use super::store::{expiry_secs, KeyValueStore, StoreError};

/// In-process store with per-key expiry.
///
/// Expiry is measured with `tokio::time::Instant`, so tests running on a paused
/// clock can advance past a TTL without sleeping.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, (String, Instant)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value of `key` if present and unexpired.
    pub fn get(&self, key: &str) -> Option<String> {
        let entries = self.entries.lock().ok()?;
        entries
            .get(key)
            .filter(|(_, expires_at)| *expires_at > Instant::now())
            .map(|(value, _)| value.clone())
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn set_nx_ex(&self, key: &str, value: &str, expiry: Duration) -> Result<bool, StoreError> {
        let secs = expiry_secs(expiry)?;
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| StoreError::Connection("memory store lock poisoned".to_string()))?;

        let now = Instant::now();
        if let Some((_, expires_at)) = entries.get(key) {
            if *expires_at > now {
                return Ok(false);
            }
        }
        entries.insert(key.to_string(), (value.to_string(), now + Duration::from_secs(secs)));
        Ok(true)
    }
}
