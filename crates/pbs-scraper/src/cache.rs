//! On-disk cache of normalized builds, one JSON file per source.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use pbs_core::{BuildRecord, Source};
use serde::{Deserialize, Serialize};

use crate::error::ScraperError;

#[derive(Debug, Serialize, Deserialize)]
struct CacheFile {
    scraped_at: DateTime<Utc>,
    count: usize,
    builds: Vec<BuildRecord>,
}

/// Cache rooted at a directory; entries older than `ttl` are ignored.
#[derive(Debug, Clone)]
pub struct BuildCache {
    dir: PathBuf,
    ttl: Duration,
}

impl BuildCache {
    pub fn new(dir: impl Into<PathBuf>, ttl_hours: u64) -> Self {
        let ttl = i64::try_from(ttl_hours)
            .ok()
            .and_then(Duration::try_hours)
            .unwrap_or(Duration::MAX);
        Self {
            dir: dir.into(),
            ttl,
        }
    }

    /// `{dir}/{source}_builds.json`
    #[must_use]
    pub fn path_for(&self, source: Source) -> PathBuf {
        self.dir.join(format!("{source}_builds.json"))
    }

    /// Cached builds for `source` when a readable, unexpired entry exists.
    ///
    /// Unreadable or malformed files are treated as a miss.
    pub async fn load(&self, source: Source) -> Option<Vec<BuildRecord>> {
        self.load_at(source, Utc::now()).await
    }

    async fn load_at(&self, source: Source, now: DateTime<Utc>) -> Option<Vec<BuildRecord>> {
        let path = self.path_for(source);
        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "cache unreadable");
                return None;
            }
        };

        let file: CacheFile = match serde_json::from_str(&raw) {
            Ok(file) => file,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "cache malformed; ignoring");
                return None;
            }
        };

        if now - file.scraped_at > self.ttl {
            tracing::info!(
                source = %source,
                scraped_at = %file.scraped_at,
                "cache expired"
            );
            return None;
        }

        tracing::info!(
            source = %source,
            count = file.count,
            scraped_at = %file.scraped_at,
            "using cached builds"
        );
        Some(file.builds)
    }

    /// Write `builds` for `source`, replacing any previous entry.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::CacheIo`] if the directory or file cannot be written.
    pub async fn save(&self, source: Source, builds: &[BuildRecord]) -> Result<PathBuf, ScraperError> {
        let path = self.path_for(source);
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| cache_io(&self.dir, e))?;

        let file = CacheFile {
            scraped_at: Utc::now(),
            count: builds.len(),
            builds: builds.to_vec(),
        };
        let body = serde_json::to_string_pretty(&file).map_err(|e| ScraperError::Deserialize {
            context: format!("cache for {source}"),
            source: e,
        })?;

        tokio::fs::write(&path, body)
            .await
            .map_err(|e| cache_io(&path, e))?;
        tracing::debug!(path = %path.display(), count = builds.len(), "cache written");
        Ok(path)
    }
}

fn cache_io(path: &Path, source: std::io::Error) -> ScraperError {
    ScraperError::CacheIo {
        path: path.display().to_string(),
        source,
    }
}
