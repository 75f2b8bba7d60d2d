use std::collections::HashMap;
use std::env::VarError;

use super::*;

fn lookup_from_map<'a>(
    map: &'a HashMap<&'a str, &'a str>,
) -> impl Fn(&str) -> Result<String, VarError> + 'a {
    move |key| {
        map.get(key)
            .map(|v| (*v).to_string())
            .ok_or(VarError::NotPresent)
    }
}

#[test]
fn parse_environment_known_values() {
    assert_eq!(
        parse_environment("development").unwrap(),
        Environment::Development
    );
    assert_eq!(parse_environment("test").unwrap(), Environment::Test);
    assert_eq!(
        parse_environment("production").unwrap(),
        Environment::Production
    );
}

#[test]
fn parse_environment_unknown_fails() {
    let err = parse_environment("staging").unwrap_err();
    assert!(matches!(err, ConfigError::InvalidEnvVar { ref var, .. } if var == "PBS_ENV"));
}

#[test]
fn build_app_config_defaults_from_empty_env() {
    let map: HashMap<&str, &str> = HashMap::new();
    let result = build_app_config(lookup_from_map(&map));
    assert!(result.is_ok(), "expected Ok, got: {result:?}");
    let cfg = result.unwrap();
    assert_eq!(cfg.env, Environment::Development);
    assert_eq!(cfg.log_level, "info");
    assert_eq!(cfg.database_path.to_str(), Some("data/poe_builds.db"));
    assert_eq!(cfg.cache_dir.to_str(), Some("data/cache"));
    assert_eq!(cfg.allowed_patches, vec!["3.27", "3.26"]);
    assert_eq!(cfg.default_patch, "3.27");
    assert_eq!(cfg.scraper_delay_min_ms, 2000);
    assert_eq!(cfg.scraper_delay_max_ms, 5000);
    assert_eq!(cfg.scraper_request_timeout_secs, 30);
    assert_eq!(cfg.scraper_max_pages, None);
    assert_eq!(cfg.cache_ttl_hours, 24);
    assert_eq!(cfg.llm_command, "claude");
    assert_eq!(cfg.llm_model, "sonnet");
    assert_eq!(cfg.llm_timeout_secs, 90);
    assert!(cfg.semantic_validation);
    assert_eq!(cfg.db_max_connections, 5);
}

#[test]
fn allowed_patches_are_trimmed_and_blanks_dropped() {
    let mut map = HashMap::new();
    map.insert("PBS_ALLOWED_PATCHES", " 3.25 , ,3.24");
    let cfg = build_app_config(lookup_from_map(&map)).unwrap();
    assert_eq!(cfg.allowed_patches, vec!["3.25", "3.24"]);
}

#[test]
fn empty_allowed_patches_disables_filter() {
    let mut map = HashMap::new();
    map.insert("PBS_ALLOWED_PATCHES", "");
    let cfg = build_app_config(lookup_from_map(&map)).unwrap();
    assert!(cfg.allowed_patches.is_empty());
}

#[test]
fn inverted_delay_bounds_are_rejected() {
    let mut map = HashMap::new();
    map.insert("PBS_DELAY_MIN_MS", "6000");
    map.insert("PBS_DELAY_MAX_MS", "1000");
    let result = build_app_config(lookup_from_map(&map));
    assert!(
        matches!(result, Err(ConfigError::InvalidEnvVar { ref var, .. }) if var == "PBS_DELAY_MIN_MS"),
        "expected InvalidEnvVar(PBS_DELAY_MIN_MS), got: {result:?}"
    );
}

#[test]
fn equal_delay_bounds_are_accepted() {
    let mut map = HashMap::new();
    map.insert("PBS_DELAY_MIN_MS", "0");
    map.insert("PBS_DELAY_MAX_MS", "0");
    let cfg = build_app_config(lookup_from_map(&map)).unwrap();
    assert_eq!(cfg.scraper_delay_min_ms, 0);
    assert_eq!(cfg.scraper_delay_max_ms, 0);
}

#[test]
fn max_pages_override() {
    let mut map = HashMap::new();
    map.insert("PBS_MAX_PAGES", "3");
    let cfg = build_app_config(lookup_from_map(&map)).unwrap();
    assert_eq!(cfg.scraper_max_pages, Some(3));
}

#[test]
fn max_pages_invalid() {
    let mut map = HashMap::new();
    map.insert("PBS_MAX_PAGES", "lots");
    let result = build_app_config(lookup_from_map(&map));
    assert!(
        matches!(result, Err(ConfigError::InvalidEnvVar { ref var, .. }) if var == "PBS_MAX_PAGES"),
        "expected InvalidEnvVar(PBS_MAX_PAGES), got: {result:?}"
    );
}

#[test]
fn request_timeout_invalid() {
    let mut map = HashMap::new();
    map.insert("PBS_REQUEST_TIMEOUT_SECS", "not-a-number");
    let result = build_app_config(lookup_from_map(&map));
    assert!(
        matches!(result, Err(ConfigError::InvalidEnvVar { ref var, .. }) if var == "PBS_REQUEST_TIMEOUT_SECS"),
        "expected InvalidEnvVar(PBS_REQUEST_TIMEOUT_SECS), got: {result:?}"
    );
}

#[test]
fn semantic_validation_accepts_common_flags() {
    for (raw, expected) in [("false", false), ("0", false), ("YES", true), ("on", true)] {
        let mut map = HashMap::new();
        map.insert("PBS_SEMANTIC_VALIDATION", raw);
        let cfg = build_app_config(lookup_from_map(&map)).unwrap();
        assert_eq!(cfg.semantic_validation, expected, "flag {raw}");
    }
}

#[test]
fn semantic_validation_rejects_garbage() {
    let mut map = HashMap::new();
    map.insert("PBS_SEMANTIC_VALIDATION", "maybe");
    let result = build_app_config(lookup_from_map(&map));
    assert!(
        matches!(result, Err(ConfigError::InvalidEnvVar { ref var, .. }) if var == "PBS_SEMANTIC_VALIDATION"),
        "expected InvalidEnvVar(PBS_SEMANTIC_VALIDATION), got: {result:?}"
    );
}

#[test]
fn llm_overrides() {
    let mut map = HashMap::new();
    map.insert("PBS_LLM_COMMAND", "/usr/local/bin/claude");
    map.insert("PBS_LLM_MODEL", "haiku");
    map.insert("PBS_LLM_TIMEOUT_SECS", "30");
    let cfg = build_app_config(lookup_from_map(&map)).unwrap();
    assert_eq!(cfg.llm_command, "/usr/local/bin/claude");
    assert_eq!(cfg.llm_model, "haiku");
    assert_eq!(cfg.llm_timeout_secs, 30);
}
