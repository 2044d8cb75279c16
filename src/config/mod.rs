use std::env;
use std::str::FromStr;
use std::time::Duration;

use chrono_tz::Tz;
use jsonwebtoken::Algorithm;
use redis::{ConnectionAddr, ConnectionInfo, RedisConnectionInfo};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgConnectOptions;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("SECRET_KEY must be set")]
    MissingSecretKey,

    #[error("Unsupported JWT algorithm: {0}")]
    InvalidAlgorithm(String),

    #[error("Unknown timezone: {0}")]
    InvalidTimezone(String),

    #[error("Invalid cron expression '{expression}': {reason}")]
    InvalidCron { expression: String, reason: String },

    #[error("Scheduler lock TTL must be at least one second")]
    InvalidLockTtl,

    #[error("Database min_connections ({min}) exceeds max_connections ({max})")]
    InvalidPoolSize { min: u32, max: u32 },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub service: ServiceConfig,
    pub security: SecurityConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub scheduler: SchedulerConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub system_name: String,
    pub host: String,
    pub port: u16,
    pub log_file_path: String,
    pub log_level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    #[serde(skip_serializing)]
    pub secret_key: String,
    pub algorithm: String,
    pub access_token_expire_minutes: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub database: String,
    pub min_connections: u32,
    pub max_connections: u32,
    pub connection_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    pub host: String,
    pub port: u16,
    #[serde(skip_serializing)]
    pub password: Option<String>,
    pub db: i64,
    pub connect_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    pub enabled: bool,
    pub lock_key: String,
    pub lock_ttl_secs: u64,
    pub timezone: String,
    pub model_refresh_job_id: String,
    pub model_refresh_cron: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Environment presets first, then per-field overrides
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    /// Check every field that would otherwise fail later at first use.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.security.secret_key.is_empty() {
            return Err(ConfigError::MissingSecretKey);
        }
        self.security.algorithm()?;
        self.scheduler.timezone()?;
        if let Err(e) = cron::Schedule::from_str(&self.scheduler.model_refresh_cron) {
            return Err(ConfigError::InvalidCron {
                expression: self.scheduler.model_refresh_cron.clone(),
                reason: e.to_string(),
            });
        }
        if self.scheduler.lock_ttl_secs == 0 {
            return Err(ConfigError::InvalidLockTtl);
        }
        if self.database.min_connections > self.database.max_connections {
            return Err(ConfigError::InvalidPoolSize {
                min: self.database.min_connections,
                max: self.database.max_connections,
            });
        }
        Ok(())
    }

    fn with_env_overrides(mut self) -> Self {
        // Service overrides
        if let Ok(v) = env::var("SYSTEM_NAME") {
            self.service.system_name = v.trim().to_string();
        }
        if let Ok(v) = env::var("HOST") {
            self.service.host = v;
        }
        self.service.port = env_parsed("PORT", self.service.port);
        if let Ok(v) = env::var("LOG_FILE_PATH") {
            self.service.log_file_path = v;
        }
        if let Ok(v) = env::var("LOG_LEVEL") {
            self.service.log_level = v;
        }

        // Security overrides
        if let Ok(v) = env::var("SECRET_KEY") {
            self.security.secret_key = v;
        }
        if let Ok(v) = env::var("ALGORITHM") {
            self.security.algorithm = v;
        }
        self.security.access_token_expire_minutes =
            env_parsed("ACCESS_TOKEN_EXPIRE_MINUTES", self.security.access_token_expire_minutes);

        // Database overrides
        if let Ok(v) = env::var("CONTAINER_POSTGRESQL_HOST") {
            self.database.host = v;
        }
        self.database.port = env_parsed("CONTAINER_POSTGRESQL_PORT", self.database.port);
        if let Ok(v) = env::var("CONTAINER_POSTGRESQL_USER") {
            self.database.user = v;
        }
        if let Ok(v) = env::var("CONTAINER_POSTGRESQL_PASSWORD") {
            self.database.password = v;
        }
        if let Ok(v) = env::var("CONTAINER_POSTGRESQL_DATABASE") {
            self.database.database = v;
        }
        self.database.min_connections =
            env_parsed("DATABASE_MIN_CONNECTIONS", self.database.min_connections);
        self.database.max_connections =
            env_parsed("DATABASE_MAX_CONNECTIONS", self.database.max_connections);
        self.database.connection_timeout_secs =
            env_parsed("DATABASE_CONNECTION_TIMEOUT", self.database.connection_timeout_secs);

        // Redis overrides
        if let Ok(v) = env::var("REDIS_HOST") {
            self.redis.host = v;
        }
        self.redis.port = env_parsed("REDIS_PORT", self.redis.port);
        if let Ok(v) = env::var("REDIS_PASSWORD") {
            self.redis.password = if v.is_empty() { None } else { Some(v) };
        }
        self.redis.db = env_parsed("REDIS_DB", self.redis.db);
        self.redis.connect_timeout_secs =
            env_parsed("REDIS_CONNECT_TIMEOUT", self.redis.connect_timeout_secs);

        // Scheduler overrides
        self.scheduler.enabled = env_flag("SCHEDULER_ENABLED", self.scheduler.enabled);
        if let Ok(v) = env::var("SCHEDULER_LOCK_KEY") {
            self.scheduler.lock_key = v;
        }
        self.scheduler.lock_ttl_secs =
            env_parsed("SCHEDULER_LOCK_TTL_SECS", self.scheduler.lock_ttl_secs);
        if let Ok(v) = env::var("SCHEDULER_TIMEZONE") {
            self.scheduler.timezone = v;
        }
        if let Ok(v) = env::var("MODEL_REFRESH_JOB_ID") {
            self.scheduler.model_refresh_job_id = v;
        }
        if let Ok(v) = env::var("MODEL_REFRESH_CRON") {
            self.scheduler.model_refresh_cron = v;
        }

        self
    }

    pub fn development() -> Self {
        Self {
            environment: Environment::Development,
            service: ServiceConfig {
                system_name: "ems-enterprise-ai".to_string(),
                host: "0.0.0.0".to_string(),
                port: 8000,
                log_file_path: "data/logs/".to_string(),
                log_level: "debug".to_string(),
            },
            security: SecurityConfig {
                secret_key: "development-only-secret".to_string(),
                algorithm: "HS256".to_string(),
                access_token_expire_minutes: 30,
            },
            database: DatabaseConfig {
                host: "localhost".to_string(),
                port: 5432,
                user: "postgres".to_string(),
                password: String::new(),
                database: "ems".to_string(),
                min_connections: 1,
                max_connections: 10,
                connection_timeout_secs: 30,
            },
            redis: RedisConfig {
                host: "localhost".to_string(),
                port: 6379,
                password: None,
                db: 0,
                connect_timeout_secs: 5,
            },
            scheduler: SchedulerConfig::default(),
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            service: ServiceConfig {
                system_name: "ems-enterprise-ai".to_string(),
                host: "0.0.0.0".to_string(),
                port: 8000,
                log_file_path: "data/logs/".to_string(),
                log_level: "info".to_string(),
            },
            security: SecurityConfig {
                secret_key: String::new(),
                algorithm: "HS256".to_string(),
                access_token_expire_minutes: 30,
            },
            database: DatabaseConfig {
                host: String::new(),
                port: 5432,
                user: String::new(),
                password: String::new(),
                database: String::new(),
                min_connections: 10,
                max_connections: 20,
                connection_timeout_secs: 10,
            },
            redis: RedisConfig {
                host: "redis".to_string(),
                port: 6379,
                password: None,
                db: 0,
                connect_timeout_secs: 5,
            },
            scheduler: SchedulerConfig::default(),
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            service: ServiceConfig {
                system_name: "ems-enterprise-ai".to_string(),
                host: "0.0.0.0".to_string(),
                port: 8000,
                log_file_path: "data/logs/".to_string(),
                log_level: "warn".to_string(),
            },
            security: SecurityConfig {
                secret_key: String::new(),
                algorithm: "HS256".to_string(),
                access_token_expire_minutes: 30,
            },
            database: DatabaseConfig {
                host: String::new(),
                port: 5432,
                user: String::new(),
                password: String::new(),
                database: String::new(),
                min_connections: 10,
                max_connections: 20,
                connection_timeout_secs: 5,
            },
            redis: RedisConfig {
                host: "redis".to_string(),
                port: 6379,
                password: None,
                db: 0,
                connect_timeout_secs: 5,
            },
            scheduler: SchedulerConfig::default(),
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            lock_key: "apscheduler".to_string(),
            // Boot-race guard only; the lease is never renewed
            lock_ttl_secs: 1,
            timezone: "Asia/Taipei".to_string(),
            model_refresh_job_id: "auto_update_model".to_string(),
            // sec min hour day-of-month month day-of-week
            model_refresh_cron: "0 0 0 1 * *".to_string(),
        }
    }
}

impl SchedulerConfig {
    pub fn timezone(&self) -> Result<Tz, ConfigError> {
        self.timezone
            .parse::<Tz>()
            .map_err(|_| ConfigError::InvalidTimezone(self.timezone.clone()))
    }

    pub fn lock_ttl(&self) -> Duration {
        Duration::from_secs(self.lock_ttl_secs)
    }
}

impl SecurityConfig {
    pub fn algorithm(&self) -> Result<Algorithm, ConfigError> {
        let algorithm = Algorithm::from_str(&self.algorithm)
            .map_err(|_| ConfigError::InvalidAlgorithm(self.algorithm.clone()))?;
        // Only shared-secret algorithms fit a single secret_key
        match algorithm {
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => Ok(algorithm),
            _ => Err(ConfigError::InvalidAlgorithm(self.algorithm.clone())),
        }
    }
}

impl DatabaseConfig {
    pub fn connect_options(&self) -> PgConnectOptions {
        let mut options = PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .database(&self.database);
        if !self.password.is_empty() {
            options = options.password(&self.password);
        }
        options
    }
}

impl RedisConfig {
    /// Connection target built field by field, so the password is never
    /// embedded in a URL and needs no escaping.
    pub fn connection_info(&self) -> ConnectionInfo {
        ConnectionInfo {
            addr: ConnectionAddr::Tcp(self.host.clone(), self.port),
            redis: RedisConnectionInfo {
                db: self.db,
                password: self.password.clone(),
                ..Default::default()
            },
        }
    }
}

/// Parse an override, keeping `current` (with a warning) when the value is malformed.
fn env_parsed<T: FromStr>(name: &str, current: T) -> T {
    match env::var(name) {
        Ok(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                warn!(variable = name, value = %raw, "Ignoring unparsable environment override");
                current
            }
        },
        Err(_) => current,
    }
}

fn env_flag(name: &str, current: bool) -> bool {
    match env::var(name) {
        Ok(raw) => parse_flag(&raw).unwrap_or_else(|| {
            warn!(variable = name, value = %raw, "Ignoring unparsable boolean override");
            current
        }),
        Err(_) => current,
    }
}

/// Accepts the usual spellings of a boolean, case-insensitively.
fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "t" | "yes" | "y" | "on" => Some(true),
        "0" | "false" | "f" | "no" | "n" | "off" => Some(false),
        _ => None,
    }
}
