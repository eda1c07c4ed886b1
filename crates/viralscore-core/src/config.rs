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
/// Decoupled from the process environment so tests can drive it from a
/// `HashMap` without `set_var`/`remove_var`.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::net::SocketAddr;
    use std::path::PathBuf;

    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
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

    let parse_positive_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        let value = or_default(var, default)
            .parse::<usize>()
            .map_err(|e| invalid(var, e.to_string()))?;
        if value == 0 {
            return Err(invalid(var, "must be at least 1".to_string()));
        }
        Ok(value)
    };

    let database_url = require("DATABASE_URL")?;
    let media_url = require("VIRALSCORE_MEDIA_URL")?;
    let grader_url = require("VIRALSCORE_GRADER_URL")?;
    let ledger_url = require("VIRALSCORE_LEDGER_URL")?;

    let env = parse_environment(&or_default("VIRALSCORE_ENV", "development"))?;

    let bind_addr = parse_addr("VIRALSCORE_BIND_ADDR", "0.0.0.0:3000")?;
    let log_level = or_default("VIRALSCORE_LOG_LEVEL", "info");
    let platforms_path = lookup("VIRALSCORE_PLATFORMS_PATH")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(PathBuf::from);

    let db_max_connections = parse_u32("VIRALSCORE_DB_MAX_CONNECTIONS", "10")?;
    let db_min_connections = parse_u32("VIRALSCORE_DB_MIN_CONNECTIONS", "1")?;
    let db_acquire_timeout_secs = parse_u64("VIRALSCORE_DB_ACQUIRE_TIMEOUT_SECS", "10")?;
    if db_min_connections > db_max_connections {
        return Err(invalid(
            "VIRALSCORE_DB_MIN_CONNECTIONS",
            format!("must not exceed VIRALSCORE_DB_MAX_CONNECTIONS ({db_max_connections})"),
        ));
    }

    let http_timeout_secs = parse_u64("VIRALSCORE_HTTP_TIMEOUT_SECS", "30")?;
    let frame_concurrency = parse_positive_usize("VIRALSCORE_FRAME_CONCURRENCY", "4")?;
    let frame_max_retries = parse_u32("VIRALSCORE_FRAME_MAX_RETRIES", "2")?;
    let retry_backoff_base_ms = parse_u64("VIRALSCORE_RETRY_BACKOFF_BASE_MS", "500")?;

    let sweep_cron = or_default("VIRALSCORE_SWEEP_CRON", "0 * * * * *");
    let sweep_batch = i64::from(parse_u32("VIRALSCORE_SWEEP_BATCH", "20")?);
    let sweep_concurrency = parse_positive_usize("VIRALSCORE_SWEEP_CONCURRENCY", "2")?;

    Ok(AppConfig {
        database_url,
        env,
        bind_addr,
        log_level,
        platforms_path,
        media_url,
        grader_url,
        ledger_url,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
        http_timeout_secs,
        frame_concurrency,
        frame_max_retries,
        retry_backoff_base_ms,
        sweep_cron,
        sweep_batch,
        sweep_concurrency,
    })
}

/// Parse a string into an `Environment` variant.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s.trim() {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "VIRALSCORE_ENV".to_string(),
            reason: format!("expected development, test or production, got '{other}'"),
        }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
