use std::time::Instant;

use anyhow::Context;
use async_trait::async_trait;
use tracing::info;

use crate::database::DatabaseManager;
use crate::scheduler::JobBody;

/// Periodic model refresh. Requires the model data source to be reachable;
/// a failed check fails this run only.
pub struct ModelRefreshJob {
    database: DatabaseManager,
}

impl ModelRefreshJob {
    pub fn new(database: DatabaseManager) -> Self {
        Self { database }
    }
}

#[async_trait]
impl JobBody for ModelRefreshJob {
    async fn run(&self) -> anyhow::Result<()> {
        let started = Instant::now();
        info!("Model refresh started");

        self.database
            .health_check()
            .await
            .context("model data source unavailable")?;

        info!(elapsed_ms = started.elapsed().as_millis() as u64, "Model refresh finished");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    #[tokio::test]
    async fn fails_when_data_source_is_down() {
        let mut config = AppConfig::development().database;
        config.host = "127.0.0.1".to_string();
        config.port = 1;
        config.min_connections = 0;
        config.connection_timeout_secs = 1;

        let job = ModelRefreshJob::new(DatabaseManager::connect_lazy(&config));
        let err = job.run().await.unwrap_err();
        assert!(format!("{err:#}").contains("model data source unavailable"));
    }
}
