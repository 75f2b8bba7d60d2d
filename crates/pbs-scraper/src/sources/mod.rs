//! Per-source collectors and normalizers.
//!
//! Each guide source produces its own raw shape; [`normalize`] is the single
//! entry point that turns any of them into a [`BuildRecord`] or drops it.

pub mod maxroll;
pub mod mobalytics;
pub mod reddit;
mod reddit_helpers;
pub mod youtube;

use std::sync::LazyLock;

use pbs_core::{BuildRecord, CostTier};
use regex::Regex;

use crate::error::ScraperError;

pub use maxroll::MaxrollBuild;
pub use mobalytics::MobalyticsBuild;
pub use youtube::VideoBuild;

static PATCH_PREFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)\.(\d+)").expect("valid patch prefix regex"));

/// Raw scraped payload, tagged by source family.
#[derive(Debug, Clone)]
pub enum RawBuild {
    SiteA(MaxrollBuild),
    SiteB(MobalyticsBuild),
    Video(VideoBuild),
}

impl RawBuild {
    fn source_id(&self) -> &str {
        match self {
            Self::SiteA(raw) => &raw.source_id,
            Self::SiteB(raw) => &raw.source_id,
            Self::Video(raw) => &raw.video_id,
        }
    }
}

/// Patch policy shared by every normalizer.
#[derive(Debug, Clone)]
pub struct NormalizeContext {
    /// `major.minor` versions to keep; empty keeps everything.
    pub allowed_patches: Vec<String>,
    /// Patch assumed when a source does not report one.
    pub default_patch: String,
}

impl NormalizeContext {
    #[must_use]
    pub fn from_app_config(config: &pbs_core::AppConfig) -> Self {
        Self {
            allowed_patches: config.allowed_patches.clone(),
            default_patch: config.default_patch.clone(),
        }
    }

    /// The patch a record will carry: the raw value when present, else the default.
    #[must_use]
    pub fn effective_patch(&self, raw: Option<&str>) -> String {
        raw.map(str::trim)
            .filter(|p| !p.is_empty())
            .unwrap_or(&self.default_patch)
            .to_string()
    }

    /// Whether `patch` passes the allow-list, compared by `major.minor` prefix.
    #[must_use]
    pub fn accepts_patch(&self, patch: &str) -> bool {
        if self.allowed_patches.is_empty() {
            return true;
        }
        patch_prefix(patch).is_some_and(|prefix| self.allowed_patches.iter().any(|p| p == prefix))
    }
}

impl Default for NormalizeContext {
    fn default() -> Self {
        Self {
            allowed_patches: vec!["3.27".to_string(), "3.26".to_string()],
            default_patch: "3.27".to_string(),
        }
    }
}

/// Normalize any raw payload. Drops are logged and yield `None`.
#[must_use]
pub fn normalize(raw: RawBuild, ctx: &NormalizeContext) -> Option<BuildRecord> {
    let source_id = raw.source_id().to_string();
    let result = match raw {
        RawBuild::SiteA(build) => maxroll::normalize(build, ctx),
        RawBuild::SiteB(build) => mobalytics::normalize(build, ctx),
        RawBuild::Video(build) => youtube::normalize(build, ctx),
    };
    match result {
        Ok(Some(record)) => Some(record),
        Ok(None) => {
            tracing::debug!(source_id = %source_id, "dropped by normalizer filter");
            None
        }
        Err(e) => {
            tracing::warn!(source_id = %source_id, error = %e, "normalization failed");
            None
        }
    }
}

/// The leading `major.minor` of a version string, e.g. `3.25` for `3.25.1`.
#[must_use]
pub fn patch_prefix(patch: &str) -> Option<&str> {
    PATCH_PREFIX_RE.find(patch.trim()).map(|m| m.as_str())
}

/// `poe-` prefix stripped, dashes to spaces, each word capitalized.
#[must_use]
pub fn title_case_slug(slug: &str) -> String {
    title_case_words(&slug.replace("poe-", ""))
}

/// Title-case a dash-separated tag as-is, keeping any `poe-` prefix.
#[must_use]
pub fn title_case_words(slug: &str) -> String {
    slug.split(['-', ' '])
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// Base class for an ascendancy name.
#[must_use]
pub fn class_for_ascendancy(ascendancy: &str) -> Option<&'static str> {
    let class = match ascendancy.trim() {
        "Deadeye" | "Raider" | "Pathfinder" => "Ranger",
        "Elementalist" | "Necromancer" | "Occultist" => "Witch",
        "Juggernaut" | "Berserker" | "Chieftain" => "Marauder",
        "Assassin" | "Trickster" | "Saboteur" => "Shadow",
        "Slayer" | "Gladiator" | "Champion" => "Duelist",
        "Inquisitor" | "Hierophant" | "Guardian" => "Templar",
        "Ascendant" => "Scion",
        _ => return None,
    };
    Some(class)
}

/// Cost tier implied by misc tags. The last matching tag wins.
#[must_use]
pub fn cost_tier_from_tags(tags: &[String]) -> Option<CostTier> {
    tags.iter().fold(None, |tier, tag| {
        let lower = tag.to_lowercase();
        if lower.contains("budget") || lower.contains("cheap") {
            Some(CostTier::Budget)
        } else if lower.contains("expensive") || lower.contains("high") {
            Some(CostTier::Expensive)
        } else {
            tier
        }
    })
}

/// Order-preserving dedup of non-empty trimmed strings.
pub(crate) fn dedup_nonempty<I>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut seen = std::collections::HashSet::new();
    items
        .into_iter()
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty() && seen.insert(item.clone()))
        .collect()
}

pub(crate) fn missing_field(source_id: &str, field: &str) -> ScraperError {
    ScraperError::Normalization {
        source_id: source_id.to_string(),
        reason: format!("missing {field}"),
    }
}
