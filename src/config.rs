// src/config.rs

use std::env;
use std::net::SocketAddr;
use std::time::Duration;

use dotenvy::dotenv;

/// Where comments, counters and notifications are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Postgres,
    /// Process-local and empty at startup; everything is lost on restart.
    /// Only meant for tests and local tooling, which seed it through `MemoryStore`.
    Memory,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub storage: StorageBackend,
    pub database_url: Option<String>,
    pub jwt_secret: String,
    pub rust_log: String,
    pub bind_addr: SocketAddr,
    pub outbox_poll_interval: Duration,
    pub outbox_max_attempts: i32,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let storage = match env::var("STORAGE_BACKEND").as_deref() {
            Ok("memory") => StorageBackend::Memory,
            Ok("postgres") | Err(_) => StorageBackend::Postgres,
            Ok(other) => panic!("STORAGE_BACKEND must be 'postgres' or 'memory', got '{}'", other),
        };

        let database_url = env::var("DATABASE_URL").ok();
        if storage == StorageBackend::Postgres && database_url.is_none() {
            panic!("DATABASE_URL must be set");
        }

        let jwt_secret = env::var("JWT_SECRET")
            .expect("JWT_SECRET must be set");

        let rust_log = env::var("RUST_LOG")
            .unwrap_or_else(|_| "info".to_string());

        let bind_addr = env::var("BIND_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:3000".to_string())
            .parse()
            .expect("BIND_ADDR must be a socket address");

        let outbox_poll_interval = env::var("OUTBOX_POLL_INTERVAL_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_millis)
            .unwrap_or(Duration::from_secs(2));

        let outbox_max_attempts = env::var("OUTBOX_MAX_ATTEMPTS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(5);

        Self {
            storage,
            database_url,
            jwt_secret,
            rust_log,
            bind_addr,
            outbox_poll_interval,
            outbox_max_attempts,
        }
    }

    /// In-memory configuration for tests and local tooling.
    pub fn for_memory(jwt_secret: &str) -> Self {
        Self {
            storage: StorageBackend::Memory,
            database_url: None,
            jwt_secret: jwt_secret.to_string(),
            rust_log: "error".to_string(),
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            outbox_poll_interval: Duration::from_millis(50),
            outbox_max_attempts: 5,
        }
    }
}
