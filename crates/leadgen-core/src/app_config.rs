use std::net::SocketAddr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
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
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    /// Firecrawl credentials. Scrape jobs fail fast when this is unset.
    pub firecrawl_api_key: Option<String>,
    pub firecrawl_base_url: String,
    /// Shared secret used to verify `X-Signature` on crawler callbacks.
    pub crawler_webhook_secret: Option<String>,
    pub rate_limit_max_tokens: u32,
    pub rate_limit_refill_ms: u64,
    pub scraper_request_timeout_secs: u64,
    pub scraper_max_retries: u32,
    pub scraper_retry_backoff_base_secs: u64,
    pub webhook_delivery_timeout_secs: u64,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field("database_url", &"[redacted]")
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field(
                "firecrawl_api_key",
                &self.firecrawl_api_key.as_ref().map(|_| "[redacted]"),
            )
            .field("firecrawl_base_url", &self.firecrawl_base_url)
            .field(
                "crawler_webhook_secret",
                &self.crawler_webhook_secret.as_ref().map(|_| "[redacted]"),
            )
            .field("rate_limit_max_tokens", &self.rate_limit_max_tokens)
            .field("rate_limit_refill_ms", &self.rate_limit_refill_ms)
            .field(
                "scraper_request_timeout_secs",
                &self.scraper_request_timeout_secs,
            )
            .field("scraper_max_retries", &self.scraper_max_retries)
            .field(
                "scraper_retry_backoff_base_secs",
                &self.scraper_retry_backoff_base_secs,
            )
            .field(
                "webhook_delivery_timeout_secs",
                &self.webhook_delivery_timeout_secs,
            )
            .finish()
    }
}
