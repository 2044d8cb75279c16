use std::path::PathBuf;
use std::sync::OnceLock;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::ServiceConfig;

// Keeps the non-blocking file writer flushing for the life of the process
static FILE_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Host label used in the log file name; containers set HOSTNAME.
fn host_name(service: &ServiceConfig) -> String {
    std::env::var("HOSTNAME")
        .ok()
        .filter(|h| !h.trim().is_empty())
        .unwrap_or_else(|| service.system_name.clone())
}

/// Daily-rotated `{log_file_path}/{host}-access.log.YYYY-MM-DD`.
pub fn log_file_prefix(service: &ServiceConfig) -> String {
    format!("{}-access.log", host_name(service))
}

/// Console plus daily-rotating file output. `RUST_LOG` takes precedence over
/// the configured level.
pub fn init_tracing(service: &ServiceConfig) -> anyhow::Result<()> {
    let log_dir = PathBuf::from(&service.log_file_path);
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(log_file_prefix(service))
        .build(&log_dir)?;
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let _ = FILE_GUARD.set(guard);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&service.log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true).with_thread_names(true))
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false).with_thread_names(true))
        .try_init()?;

    tracing::info!(system = %service.system_name, log_dir = %log_dir.display(), "Logging initialised");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    #[test]
    fn file_prefix_names_the_host() {
        let service = AppConfig::development().service;
        assert!(log_file_prefix(&service).ends_with("-access.log"));
    }
}
