use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl Environment {
    #[must_use]
    pub fn is_development(self) -> bool {
        self == Environment::Development
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    pub platforms_path: Option<PathBuf>,
    pub media_url: String,
    pub grader_url: String,
    pub ledger_url: String,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    pub http_timeout_secs: u64,
    pub frame_concurrency: usize,
    pub frame_max_retries: u32,
    pub retry_backoff_base_ms: u64,
    pub sweep_cron: String,
    pub sweep_batch: i64,
    pub sweep_concurrency: usize,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field("platforms_path", &self.platforms_path)
            .field("database_url", &"[redacted]")
            .field("media_url", &self.media_url)
            .field("grader_url", &self.grader_url)
            .field("ledger_url", &self.ledger_url)
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field("http_timeout_secs", &self.http_timeout_secs)
            .field("frame_concurrency", &self.frame_concurrency)
            .field("frame_max_retries", &self.frame_max_retries)
            .field("retry_backoff_base_ms", &self.retry_backoff_base_ms)
            .field("sweep_cron", &self.sweep_cron)
            .field("sweep_batch", &self.sweep_batch)
            .field("sweep_concurrency", &self.sweep_concurrency)
            .finish()
    }
}
