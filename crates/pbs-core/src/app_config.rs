use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
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

#[derive(Debug, Clone)]
#[allow(clippy::struct_excessive_bools)]
pub struct AppConfig {
    pub env: Environment,
    pub log_level: String,
    pub database_path: PathBuf,
    pub cache_dir: PathBuf,
    /// `major.minor` versions a build must match to be kept, e.g. `["3.27", "3.26"]`.
    /// Empty disables the filter.
    pub allowed_patches: Vec<String>,
    /// Patch assumed when a source exposes none.
    pub default_patch: String,
    pub db_max_connections: u32,
    pub db_acquire_timeout_secs: u64,
    pub scraper_request_timeout_secs: u64,
    pub scraper_user_agent: String,
    /// Politeness delay bounds between consecutive network operations.
    pub scraper_delay_min_ms: u64,
    pub scraper_delay_max_ms: u64,
    pub scraper_max_retries: u32,
    pub scraper_retry_backoff_base_secs: u64,
    /// Listing page cap; `None` walks until the source reports no next page.
    pub scraper_max_pages: Option<usize>,
    pub cache_ttl_hours: u64,
    pub llm_command: String,
    pub llm_model: String,
    pub llm_timeout_secs: u64,
    pub semantic_validation: bool,
}
