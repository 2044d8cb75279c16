use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use uuid::Uuid;

use ems_enterprise_ai::app::{app, AppState};
use ems_enterprise_ai::auth::{issue_access_token, Authority, TokenSubject};
use ems_enterprise_ai::config::AppConfig;
use ems_enterprise_ai::database::DatabaseManager;
use ems_enterprise_ai::jobs::ModelRefreshJob;
use ems_enterprise_ai::lock::{DistributedLock, RedisStore};
use ems_enterprise_ai::logging;
use ems_enterprise_ai::scheduler::{CronRegistrar, GateState, SchedulerGate};

#[derive(Parser)]
#[command(name = "ems-enterprise-ai")]
#[command(about = "Energy-management backend API with a Redis-gated job scheduler")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Run the HTTP server (default)")]
    Serve {
        #[arg(long, help = "Bind address, overrides HOST")]
        host: Option<String>,

        #[arg(long, help = "Bind port, overrides PORT")]
        port: Option<u16>,
    },

    #[command(about = "Sign an access token with the configured secret")]
    Token {
        #[arg(long)]
        email: String,

        #[arg(long)]
        account: String,

        #[arg(long, default_value = "MEMBER_USER", help = "SYS_ADMIN or MEMBER_USER")]
        authority: Authority,

        #[arg(long, help = "Defaults to a random UUID")]
        user_id: Option<Uuid>,

        #[arg(long, help = "Defaults to ACCESS_TOKEN_EXPIRE_MINUTES")]
        expires_minutes: Option<i64>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let mut config = AppConfig::from_env();

    match cli.command.unwrap_or(Commands::Serve { host: None, port: None }) {
        Commands::Serve { host, port } => {
            if let Some(host) = host {
                config.service.host = host;
            }
            if let Some(port) = port {
                config.service.port = port;
            }
            config.validate()?;
            serve(config).await
        }
        Commands::Token {
            email,
            account,
            authority,
            user_id,
            expires_minutes,
        } => {
            config.validate()?;
            let subject = TokenSubject {
                email_address: email,
                account,
                user_id: user_id.unwrap_or_else(Uuid::new_v4),
                authority,
            };
            let token = issue_access_token(&subject, expires_minutes.map(chrono::Duration::minutes), &config.security)?;
            println!("{}", token);
            Ok(())
        }
    }
}

async fn serve(config: AppConfig) -> anyhow::Result<()> {
    logging::init_tracing(&config.service)?;
    tracing::info!("Starting {} in {:?} mode", config.service.system_name, config.environment);

    let database = DatabaseManager::connect_lazy(&config.database);

    let store = RedisStore::open(&config.redis).context("invalid Redis configuration")?;
    let lock = DistributedLock::new(Arc::new(store));
    let gate = Arc::new(SchedulerGate::new(
        lock,
        config.scheduler.lock_key.clone(),
        config.scheduler.lock_ttl(),
    ));

    let registrar = Arc::new(
        CronRegistrar::new(config.scheduler.timezone()?).with_job(
            config.scheduler.model_refresh_job_id.clone(),
            config.scheduler.model_refresh_cron.clone(),
            Arc::new(ModelRefreshJob::new(database.clone())),
        ),
    );

    if config.scheduler.enabled {
        match gate.maybe_start(registrar.as_ref()).await {
            GateState::Running => tracing::info!("Background jobs running in this process"),
            state => tracing::info!(?state, "Background jobs not started in this process"),
        }
    } else {
        tracing::info!("Scheduler disabled by configuration");
    }

    let bind_addr = format!("{}:{}", config.service.host, config.service.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;
    tracing::info!("{} listening on http://{}", config.service.system_name, bind_addr);

    let state = AppState {
        config: Arc::new(config),
        database: database.clone(),
        gate,
        registrar: registrar.clone(),
    };

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    registrar.shutdown().await;
    database.close().await;
    tracing::info!("Shutdown complete");
    Ok(())
}

/// Resolves on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install SIGINT handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received SIGINT, initiating graceful shutdown"),
        _ = terminate => tracing::info!("Received SIGTERM, initiating graceful shutdown"),
    }
}
