use crate::app_config::{AppConfig, Environment};
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if a value fails to parse or the delay bounds are inverted.
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
/// Returns `ConfigError` if a value fails to parse or the delay bounds are inverted.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Every variable has a default, so an empty environment yields a usable config.
///
/// # Errors
///
/// Returns `ConfigError::InvalidEnvVar` if a value fails to parse or the delay
/// bounds are inverted.
pub fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::path::PathBuf;

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

    let parse_bool = |var: &str, default: bool| -> Result<bool, ConfigError> {
        match lookup(var) {
            Err(_) => Ok(default),
            Ok(raw) => parse_flag(&raw).ok_or_else(|| invalid(var, format!("not a boolean: {raw}"))),
        }
    };

    let env = parse_environment(&or_default("PBS_ENV", "development"))?;
    let log_level = or_default("PBS_LOG_LEVEL", "info");
    let database_path = PathBuf::from(or_default("PBS_DATABASE_PATH", "data/poe_builds.db"));
    let cache_dir = PathBuf::from(or_default("PBS_CACHE_DIR", "data/cache"));

    let allowed_patches = parse_patch_list(&or_default("PBS_ALLOWED_PATCHES", "3.27,3.26"));
    let default_patch = or_default("PBS_DEFAULT_PATCH", "3.27");

    let db_max_connections = parse_u32("PBS_DB_MAX_CONNECTIONS", "5")?;
    let db_acquire_timeout_secs = parse_u64("PBS_DB_ACQUIRE_TIMEOUT_SECS", "10")?;

    let scraper_request_timeout_secs = parse_u64("PBS_REQUEST_TIMEOUT_SECS", "30")?;
    let scraper_user_agent = or_default(
        "PBS_USER_AGENT",
        "Mozilla/5.0 (compatible; poe-build-scout/0.1)",
    );
    let scraper_delay_min_ms = parse_u64("PBS_DELAY_MIN_MS", "2000")?;
    let scraper_delay_max_ms = parse_u64("PBS_DELAY_MAX_MS", "5000")?;
    if scraper_delay_min_ms > scraper_delay_max_ms {
        return Err(invalid(
            "PBS_DELAY_MIN_MS",
            format!("{scraper_delay_min_ms} exceeds PBS_DELAY_MAX_MS ({scraper_delay_max_ms})"),
        ));
    }
    let scraper_max_retries = parse_u32("PBS_MAX_RETRIES", "3")?;
    let scraper_retry_backoff_base_secs = parse_u64("PBS_RETRY_BACKOFF_BASE_SECS", "5")?;
    let scraper_max_pages = match lookup("PBS_MAX_PAGES") {
        Err(_) => None,
        Ok(raw) => Some(
            raw.parse::<usize>()
                .map_err(|e| invalid("PBS_MAX_PAGES", e.to_string()))?,
        ),
    };

    let cache_ttl_hours = parse_u64("PBS_CACHE_TTL_HOURS", "24")?;

    let llm_command = or_default("PBS_LLM_COMMAND", "claude");
    let llm_model = or_default("PBS_LLM_MODEL", "sonnet");
    let llm_timeout_secs = parse_u64("PBS_LLM_TIMEOUT_SECS", "90")?;
    let semantic_validation = parse_bool("PBS_SEMANTIC_VALIDATION", true)?;

    Ok(AppConfig {
        env,
        log_level,
        database_path,
        cache_dir,
        allowed_patches,
        default_patch,
        db_max_connections,
        db_acquire_timeout_secs,
        scraper_request_timeout_secs,
        scraper_user_agent,
        scraper_delay_min_ms,
        scraper_delay_max_ms,
        scraper_max_retries,
        scraper_retry_backoff_base_secs,
        scraper_max_pages,
        cache_ttl_hours,
        llm_command,
        llm_model,
        llm_timeout_secs,
        semantic_validation,
    })
}

fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "PBS_ENV".to_string(),
            reason: format!("unknown environment: {other}"),
        }),
    }
}

/// Split a comma-separated patch list, dropping blanks.
fn parse_patch_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
