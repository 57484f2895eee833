use crate::app_config::{AppConfig, Environment};
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the process environment so tests can drive it with a
/// plain `HashMap`.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::net::SocketAddr;

    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var).map_err(|_| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let optional = |var: &str| -> Option<String> {
        lookup(var).ok().filter(|v| !v.trim().is_empty())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_addr = |var: &str, default: &str| -> Result<SocketAddr, ConfigError> {
        or_default(var, default)
            .parse::<SocketAddr>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        or_default(var, default)
            .parse::<u32>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .parse::<u64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let database_url = require("DATABASE_URL")?;
    let env = parse_environment(&or_default("LEADGEN_ENV", "development"))?;
    let bind_addr = parse_addr("LEADGEN_BIND_ADDR", "0.0.0.0:3000")?;
    let log_level = or_default("LEADGEN_LOG_LEVEL", "info");

    let db_max_connections = parse_u32("LEADGEN_DB_MAX_CONNECTIONS", "10")?;
    let db_min_connections = parse_u32("LEADGEN_DB_MIN_CONNECTIONS", "1")?;
    if db_min_connections > db_max_connections {
        return Err(invalid(
            "LEADGEN_DB_MIN_CONNECTIONS",
            format!(
                "min connections ({db_min_connections}) exceeds max connections ({db_max_connections})"
            ),
        ));
    }
    let db_acquire_timeout_secs = parse_u64("LEADGEN_DB_ACQUIRE_TIMEOUT_SECS", "10")?;

    let firecrawl_api_key = optional("FIRECRAWL_API_KEY");
    let firecrawl_base_url = or_default("FIRECRAWL_BASE_URL", "https://api.firecrawl.dev")
        .trim_end_matches('/')
        .to_string();
    let crawler_webhook_secret = optional("LEADGEN_CRAWLER_WEBHOOK_SECRET");

    let rate_limit_max_tokens = parse_u32("LEADGEN_RATE_LIMIT_MAX_TOKENS", "2")?;
    if rate_limit_max_tokens == 0 {
        return Err(invalid(
            "LEADGEN_RATE_LIMIT_MAX_TOKENS",
            "must be at least 1".to_string(),
        ));
    }
    let rate_limit_refill_ms = parse_u64("LEADGEN_RATE_LIMIT_REFILL_MS", "1000")?;
    if rate_limit_refill_ms == 0 {
        return Err(invalid(
            "LEADGEN_RATE_LIMIT_REFILL_MS",
            "must be at least 1".to_string(),
        ));
    }

    let scraper_request_timeout_secs = parse_u64("LEADGEN_SCRAPER_REQUEST_TIMEOUT_SECS", "60")?;
    let scraper_max_retries = parse_u32("LEADGEN_SCRAPER_MAX_RETRIES", "3")?;
    let scraper_retry_backoff_base_secs =
        parse_u64("LEADGEN_SCRAPER_RETRY_BACKOFF_BASE_SECS", "2")?;
    let webhook_delivery_timeout_secs = parse_u64("LEADGEN_WEBHOOK_DELIVERY_TIMEOUT_SECS", "10")?;

    Ok(AppConfig {
        database_url,
        env,
        bind_addr,
        log_level,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
        firecrawl_api_key,
        firecrawl_base_url,
        crawler_webhook_secret,
        rate_limit_max_tokens,
        rate_limit_refill_ms,
        scraper_request_timeout_secs,
        scraper_max_retries,
        scraper_retry_backoff_base_secs,
        webhook_delivery_timeout_secs,
    })
}

/// Parse a string into an `Environment` variant.
///
/// # Errors
///
/// Returns `ConfigError::InvalidEnvVar` for anything other than
/// `development`, `test`, or `production`.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "LEADGEN_ENV".to_string(),
            reason: format!("unknown environment {other:?}"),
        }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
