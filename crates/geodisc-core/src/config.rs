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
/// Parsing and validation live here, decoupled from the process environment,
/// so tests can drive it with a plain `HashMap`.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::path::PathBuf;

    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var).map_err(|_| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
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

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        or_default(var, default)
            .parse::<usize>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let api_base_url = require("GEODISC_API_BASE_URL")?;
    if !(api_base_url.starts_with("http://") || api_base_url.starts_with("https://")) {
        return Err(invalid(
            "GEODISC_API_BASE_URL",
            format!("\"{api_base_url}\" must start with http:// or https://"),
        ));
    }
    let api_base_url = api_base_url.trim_end_matches('/').to_string();

    let env = parse_environment(&or_default("GEODISC_ENV", "development"))?;
    let log_level = or_default("GEODISC_LOG_LEVEL", "info");
    let categories_path = lookup("GEODISC_CATEGORIES_PATH")
        .ok()
        .filter(|p| !p.trim().is_empty())
        .map(PathBuf::from);

    let page_size = parse_usize("GEODISC_PAGE_SIZE", "60")?;
    if page_size == 0 {
        return Err(invalid("GEODISC_PAGE_SIZE", "must be at least 1".to_string()));
    }

    let search_debounce_ms = parse_u64("GEODISC_SEARCH_DEBOUNCE_MS", "500")?;
    let settle_ms = parse_u64("GEODISC_SETTLE_MS", "320")?;

    let default_radius_meters = or_default("GEODISC_DEFAULT_RADIUS_METERS", "1000")
        .parse::<f64>()
        .map_err(|e| invalid("GEODISC_DEFAULT_RADIUS_METERS", e.to_string()))?;
    if !default_radius_meters.is_finite() || default_radius_meters <= 0.0 {
        return Err(invalid(
            "GEODISC_DEFAULT_RADIUS_METERS",
            "must be a positive number of meters".to_string(),
        ));
    }

    let request_timeout_secs = parse_u64("GEODISC_REQUEST_TIMEOUT_SECS", "30")?;
    let user_agent = or_default("GEODISC_USER_AGENT", "geodisc/0.1");
    let max_retries = parse_u32("GEODISC_MAX_RETRIES", "2")?;
    let retry_backoff_base_secs = parse_u64("GEODISC_RETRY_BACKOFF_BASE_SECS", "1")?;

    Ok(AppConfig {
        api_base_url,
        env,
        log_level,
        categories_path,
        page_size,
        search_debounce_ms,
        settle_ms,
        default_radius_meters,
        request_timeout_secs,
        user_agent,
        max_retries,
        retry_backoff_base_secs,
    })
}

fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "GEODISC_ENV".to_string(),
            reason: format!("unknown environment \"{other}\""),
        }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
