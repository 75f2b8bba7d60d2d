use thiserror::Error;

pub mod app_config;
pub mod builds;
pub mod config;

pub use app_config::{AppConfig, Environment};
pub use builds::{
    parse_json_list, to_json_list, BuildRating, BuildRecord, CombatStyle, CostTier, Source,
    Specialties, Specialty, TranslationStatus,
};
pub use config::{build_app_config, load_app_config, load_app_config_from_env};

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("unknown {kind}: {value}")]
    UnknownLabel { kind: &'static str, value: String },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}
