//! Handles settings for the application. Configuration is read from
//! `settings.toml` (or the file named by `APP_CONFIG`) and can be overridden
//! with `APP__SECTION__KEY` variables.
//!
//! See `settings.toml` for the configuration.
use std::{net::SocketAddr, time::Duration};

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct App {
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default = "default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,
}

impl Default for App {
    fn default() -> Self {
        Self {
            level: default_level(),
            shutdown_grace_secs: default_shutdown_grace_secs(),
        }
    }
}

impl App {
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Database {
    Memory,
    Sqlite(String),
}

#[derive(Debug, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum CacheBackend {
    Memory,
    Redis { url: String },
}

#[derive(Debug, Deserialize)]
pub struct Cache {
    #[serde(flatten)]
    pub backend: CacheBackend,
    #[serde(default = "default_cache_ttl_secs")]
    pub ttl_secs: u64,
}

impl Default for Cache {
    fn default() -> Self {
        Self {
            backend: CacheBackend::Memory,
            ttl_secs: default_cache_ttl_secs(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Queue {
    #[serde(default = "default_topic")]
    pub topic: String,
    #[serde(default = "default_partitions")]
    pub partitions: i32,
}

impl Default for Queue {
    fn default() -> Self {
        Self {
            topic: default_topic(),
            partitions: default_partitions(),
        }
    }
}

/// Chat side of the report RPC.
#[derive(Debug, Deserialize)]
pub struct Rpc {
    pub listen: SocketAddr,
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

/// Prometheus scrape endpoint for the command metrics.
#[derive(Debug, Deserialize)]
pub struct Metrics {
    pub listen: SocketAddr,
}

#[derive(Debug, Deserialize)]
pub struct Telegram {
    pub token: String,
    #[serde(default)]
    pub allowed_users: Vec<u64>,
}

#[derive(Debug, Deserialize)]
pub struct ReportService {
    /// Base URL of the chat side's RPC server.
    pub rpc_url: String,
    #[serde(default = "default_group")]
    pub group: String,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_lease_secs")]
    pub lease_secs: u64,
    #[serde(default = "default_batch_size")]
    pub batch_size: u64,
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub app: App,
    pub database: Database,
    #[serde(default)]
    pub cache: Cache,
    #[serde(default)]
    pub queue: Queue,
    pub rpc: Option<Rpc>,
    pub metrics: Option<Metrics>,
    pub telegram: Option<Telegram>,
    pub report_service: Option<ReportService>,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let path = std::env::var("APP_CONFIG").unwrap_or_else(|_| "settings".to_string());
        let settings = Config::builder()
            .add_source(File::with_name(&path).required(false))
            .add_source(Environment::with_prefix("APP").separator("__"))
            .build()?;

        let settings: Settings = settings.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.telegram.is_some() && self.rpc.is_none() {
            return Err(ConfigError::Message(
                "[rpc] is required when [telegram] is set".to_string(),
            ));
        }
        if self.rpc.as_ref().is_some_and(|rpc| rpc.channel_capacity == 0) {
            return Err(ConfigError::Message(
                "rpc.channel_capacity must be at least 1".to_string(),
            ));
        }
        if self.queue.partitions < 1 {
            return Err(ConfigError::Message(
                "queue.partitions must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_level() -> String {
    "info".to_string()
}

fn default_shutdown_grace_secs() -> u64 {
    10
}

fn default_cache_ttl_secs() -> u64 {
    engine::DEFAULT_REPORT_TTL.as_secs()
}

fn default_topic() -> String {
    queue::REPORT_TOPIC.to_string()
}

fn default_partitions() -> i32 {
    4
}

fn default_channel_capacity() -> usize {
    10
}

fn default_group() -> String {
    queue::ConsumerConfig::default().group
}

fn default_poll_interval_ms() -> u64 {
    500
}

fn default_lease_secs() -> u64 {
    30
}

fn default_batch_size() -> u64 {
    16
}

#[cfg(test)]
mod tests {
    use config::FileFormat;

    use super::*;

    fn parse(toml: &str) -> Result<Settings, ConfigError> {
        Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?
            .try_deserialize()
    }

    #[test]
    fn defaults_fill_optional_sections() {
        let settings = parse(
            r#"
            database = "memory"
            "#,
        )
        .unwrap();

        assert!(matches!(settings.database, Database::Memory));
        assert!(matches!(settings.cache.backend, CacheBackend::Memory));
        assert_eq!(settings.cache.ttl_secs, 3600);
        assert_eq!(settings.queue.partitions, 4);
        assert_eq!(settings.app.level, "info");
        assert!(settings.telegram.is_none());
        assert!(settings.report_service.is_none());
    }

    #[test]
    fn full_settings() {
        let settings = parse(
            r#"
            [app]
            level = "debug"
            [database]
            sqlite = "budget.db"
            [cache]
            backend = "redis"
            url = "redis://127.0.0.1/"
            ttl_secs = 60
            [rpc]
            listen = "127.0.0.1:50051"
            [metrics]
            listen = "127.0.0.1:8080"
            [telegram]
            token = "t"
            allowed_users = [1, 2]
            [report_service]
            rpc_url = "http://127.0.0.1:50051"
            "#,
        )
        .unwrap();

        assert!(matches!(settings.database, Database::Sqlite(ref p) if p == "budget.db"));
        assert!(matches!(settings.cache.backend, CacheBackend::Redis { ref url } if url == "redis://127.0.0.1/"));
        assert!(settings.validate().is_ok());
        assert_eq!(settings.rpc.unwrap().channel_capacity, 10);
        assert_eq!(settings.metrics.unwrap().listen.port(), 8080);
        assert_eq!(settings.telegram.unwrap().allowed_users, vec![1, 2]);
        assert_eq!(settings.report_service.unwrap().batch_size, 16);
    }

    #[test]
    fn zero_channel_capacity_is_rejected() {
        let settings = parse(
            r#"
            database = "memory"
            [rpc]
            listen = "127.0.0.1:50051"
            channel_capacity = 0
            "#,
        )
        .unwrap();

        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("channel_capacity"));
    }

    #[test]
    fn telegram_without_rpc_is_rejected() {
        let settings = parse(
            r#"
            database = "memory"
            [telegram]
            token = "t"
            "#,
        )
        .unwrap();

        assert!(settings.validate().is_err());
    }

    #[test]
    fn database_is_mandatory() {
        assert!(parse("[app]\nlevel = \"debug\"\n").is_err());
    }
}
