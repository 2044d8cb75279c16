use std::time::Duration;

use async_trait::async_trait;
use redis::IntoConnectionInfo;
use tracing::debug;

use super::store::{expiry_secs, KeyValueStore, StoreError};
use crate::config::RedisConfig;

/// Redis-backed store. Constructed once by the composition root and shared
/// behind an `Arc`. Opening it does not touch the network; each command connects
/// with a bounded timeout, so an unreachable server surfaces as
/// [`StoreError::Connection`] at the call site instead of at startup.
#[derive(Clone)]
pub struct RedisStore {
    client: redis::Client,
    connect_timeout: Duration,
}

impl RedisStore {
    pub fn open(config: &RedisConfig) -> Result<Self, StoreError> {
        Self::open_target(config.connection_info(), Duration::from_secs(config.connect_timeout_secs))
    }

    /// Open from a `redis://` URL, e.g. one taken verbatim from the environment.
    pub fn open_url(url: &str, connect_timeout: Duration) -> Result<Self, StoreError> {
        Self::open_target(url, connect_timeout)
    }

    fn open_target(target: impl IntoConnectionInfo, connect_timeout: Duration) -> Result<Self, StoreError> {
        let client = redis::Client::open(target).map_err(|e| StoreError::Connection(e.to_string()))?;
        Ok(Self { client, connect_timeout })
    }

    async fn connection(&self) -> Result<redis::aio::MultiplexedConnection, StoreError> {
        tokio::time::timeout(self.connect_timeout, self.client.get_multiplexed_async_connection())
            .await
            .map_err(|_| StoreError::Connection(format!("connect timed out after {:?}", self.connect_timeout)))?
            .map_err(StoreError::from)
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn set_nx_ex(&self, key: &str, value: &str, expiry: Duration) -> Result<bool, StoreError> {
        let secs = expiry_secs(expiry)?;
        let mut conn = self.connection().await?;

        // Reply is "OK" when the key was set, nil when it already existed
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("EX")
            .arg(secs)
            .arg("NX")
            .query_async(&mut conn)
            .await?;

        debug!(%key, ttl_secs = secs, acquired = reply.is_some(), "SET NX EX");
        Ok(reply.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    #[tokio::test]
    async fn unreachable_server_is_a_connection_error() {
        let store = RedisStore::open_url("redis://127.0.0.1:1/0", Duration::from_secs(1)).unwrap();
        let err = store
            .set_nx_ex("scheduler-lock", "token", Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Connection(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn password_with_url_metacharacters_opens() {
        let mut config = AppConfig::development().redis;
        config.host = "127.0.0.1".to_string();
        config.port = 1;
        config.connect_timeout_secs = 1;

        for password in ["p@ss#word", "p@ss/w", "a:b?c"] {
            config.password = Some(password.to_string());
            let store = RedisStore::open(&config).unwrap();

            // Reaches the connect step rather than failing on the target itself
            let err = store
                .set_nx_ex("scheduler-lock", "token", Duration::from_secs(1))
                .await
                .unwrap_err();
            assert!(matches!(err, StoreError::Connection(_)), "{password}: got {err:?}");
        }
    }
}
