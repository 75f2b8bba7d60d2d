//! Text generation backend used by the field extractor and semantic validator.
//!
//! The production backend shells out to the `claude` CLI. Tests substitute a
//! stub implementing [`TextGenerator`].

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("failed to spawn {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("generation timed out after {0:?}")]
    Timeout(Duration),

    #[error("generator exited with status {code:?}: {stderr}")]
    NonZeroExit { code: Option<i32>, stderr: String },

    #[error("generator returned empty output")]
    EmptyOutput,
}

/// Black-box prompt-to-text generator.
///
/// Implementations must honor `timeout` and report every failure as an
/// error; callers decide how to degrade.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str, timeout: Duration) -> Result<String, GenerateError>;
}

/// Runs `<command> --model <model> -p <prompt>` as a subprocess.
///
/// Environment variables starting with `CLAUDE` are removed from the child so
/// a surrounding agent session does not leak into the call.
#[derive(Debug, Clone)]
pub struct ClaudeCli {
    command: String,
    model: String,
}

impl ClaudeCli {
    pub fn new(command: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            model: model.into(),
        }
    }

    #[must_use]
    pub fn from_app_config(config: &pbs_core::AppConfig) -> Self {
        Self::new(config.llm_command.clone(), config.llm_model.clone())
    }
}

#[async_trait]
impl TextGenerator for ClaudeCli {
    async fn generate(&self, prompt: &str, timeout: Duration) -> Result<String, GenerateError> {
        let mut command = tokio::process::Command::new(&self.command);
        command
            .args(["--model", self.model.as_str(), "-p", prompt])
            .env_clear()
            .envs(std::env::vars().filter(|(key, _)| !key.starts_with("CLAUDE")))
            .stdin(std::process::Stdio::null())
            .kill_on_drop(true);

        let output = match tokio::time::timeout(timeout, command.output()).await {
            Err(_) => return Err(GenerateError::Timeout(timeout)),
            Ok(result) => result.map_err(|source| GenerateError::Spawn {
                command: self.command.clone(),
                source,
            })?,
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(GenerateError::NonZeroExit {
                code: output.status.code(),
                stderr: crate::html::truncate_chars(stderr.trim(), 300).to_string(),
            });
        }

        let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if text.is_empty() {
            return Err(GenerateError::EmptyOutput);
        }
        Ok(text)
    }
}
