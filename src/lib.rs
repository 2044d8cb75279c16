pub mod app;
pub mod auth;
pub mod config;
pub mod database;
pub mod error;
pub mod handlers;
pub mod jobs;
pub mod lock;
pub mod logging;
pub mod middleware;
pub mod scheduler;
