//! `YouTube` build-guide videos.
//!
//! Candidates come from the search feed, are filtered and ranked on
//! metadata, and the best ones are turned into builds from their English
//! transcripts.

use chrono::{DateTime, Utc};
use pbs_core::{BuildRecord, Source};
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use quick_xml::events::Event;
use quick_xml::Reader;

use super::{class_for_ascendancy, missing_field, NormalizeContext};
use crate::classify::{classify_combat_style, classify_specialty};
use crate::error::ScraperError;
use crate::extract::DraftFields;
use crate::html::{clean_text, truncate_chars};

pub const SEARCH_QUERIES: &[&str] = &[
    "PoE 3.27 build guide",
    "Path of Exile 3.27 build",
    "PoE Keepers of the Flame build guide",
    "PoE 3.27 league starter",
    "PoE 3.27 starter build guide",
];

/// Videos kept after scoring.
pub const TOP_SCORED: usize = 50;
/// Videos whose transcripts are fetched.
pub const TOP_PROCESSED: usize = 30;

const MIN_DURATION_SECS: u64 = 300;
const MAX_AGE_DAYS: i64 = 180;
const FRESH_DAYS: i64 = 7;
const FRESH_BONUS: f64 = 500.0;
const MAX_TRANSCRIPT_CHARS: usize = 15_000;

/// Titles that announce several builds at once.
const MULTI_BUILD_KEYWORDS: &[&str] = &[
    "tier list",
    "top 10",
    "top 5",
    "top tier",
    "best builds",
    "best starters",
    "best league",
    "ranking",
    "flowchart",
];

/// Metadata for one search result.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VideoCandidate {
    pub video_id: String,
    pub title: String,
    pub channel: String,
    pub published: Option<DateTime<Utc>>,
    pub views: u64,
    pub duration_secs: Option<u64>,
    pub subscribers: Option<u64>,
}

/// A video with its transcript extraction, ready for [`normalize`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VideoBuild {
    pub video_id: String,
    pub title: String,
    pub channel: String,
    pub views: u64,
    pub draft: DraftFields,
}

impl VideoBuild {
    #[must_use]
    pub fn from_candidate(candidate: VideoCandidate, draft: DraftFields) -> Self {
        Self {
            video_id: candidate.video_id,
            title: candidate.title,
            channel: candidate.channel,
            views: candidate.views,
            draft,
        }
    }
}

#[must_use]
pub fn search_feed_url(query: &str) -> String {
    let encoded = utf8_percent_encode(query, NON_ALPHANUMERIC).to_string();
    format!("https://www.youtube.com/feeds/videos.xml?search_query={encoded}")
}

#[must_use]
pub fn transcript_url(video_id: &str) -> String {
    let encoded = utf8_percent_encode(video_id, NON_ALPHANUMERIC).to_string();
    format!("https://video.google.com/timedtext?lang=en&v={encoded}")
}

#[must_use]
pub fn watch_url(video_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={video_id}")
}

/// Parse a search feed into candidates. Entries without a video id are skipped.
///
/// # Errors
///
/// Returns [`ScraperError::Xml`] for malformed feed content.
pub fn parse_feed(xml: &str) -> Result<Vec<VideoCandidate>, ScraperError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut in_entry = false;
    let mut in_author = false;
    let mut current_tag = String::new();
    let mut current = VideoCandidate::default();
    let mut candidates = Vec::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                match name.as_str() {
                    "entry" => {
                        in_entry = true;
                        current = VideoCandidate::default();
                    }
                    "author" if in_entry => in_author = true,
                    _ => {}
                }
                current_tag = name;
            }
            Event::Empty(e) if in_entry => {
                if e.name().as_ref() == b"media:statistics" {
                    for attr in e.attributes().flatten() {
                        if attr.key.as_ref() == b"views" {
                            current.views = String::from_utf8_lossy(attr.value.as_ref())
                                .parse()
                                .unwrap_or(0);
                        }
                    }
                }
            }
            Event::Text(e) if in_entry => {
                let text = e.unescape().unwrap_or_default().into_owned();
                match current_tag.as_str() {
                    "yt:videoId" => current.video_id = text,
                    "title" if !in_author => current.title = text,
                    "name" if in_author => current.channel = text,
                    "published" => {
                        current.published = DateTime::parse_from_rfc3339(&text)
                            .ok()
                            .map(|d| d.with_timezone(&Utc));
                    }
                    _ => {}
                }
            }
            Event::End(e) => match e.name().as_ref() {
                b"entry" => {
                    in_entry = false;
                    if !current.video_id.is_empty() {
                        candidates.push(std::mem::take(&mut current));
                    }
                }
                b"author" => in_author = false,
                _ => current_tag.clear(),
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(candidates)
}

/// Plain text of a timed-text transcript, truncated to 15000 characters.
///
/// # Errors
///
/// Returns [`ScraperError::Xml`] for malformed transcript content.
pub fn parse_transcript(xml: &str) -> Result<String, ScraperError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut in_text = false;
    let mut pieces = Vec::new();
    loop {
        match reader.read_event()? {
            Event::Start(e) if e.name().as_ref() == b"text" => in_text = true,
            Event::End(e) if e.name().as_ref() == b"text" => in_text = false,
            Event::Text(e) if in_text => {
                pieces.push(e.unescape().unwrap_or_default().into_owned());
            }
            Event::Eof => break,
            _ => {}
        }
    }

    // Caption bodies are entity-escaped twice.
    let text = clean_text(&pieces.join(" "));
    Ok(truncate_chars(&text, MAX_TRANSCRIPT_CHARS).to_string())
}

/// Duration (when known), age and multi-build title filters.
#[must_use]
pub fn passes_filters(candidate: &VideoCandidate, now: DateTime<Utc>) -> bool {
    if candidate
        .duration_secs
        .is_some_and(|secs| secs < MIN_DURATION_SECS)
    {
        return false;
    }
    if candidate
        .published
        .is_some_and(|published| (now - published).num_days() > MAX_AGE_DAYS)
    {
        return false;
    }
    let title = candidate.title.to_lowercase();
    !MULTI_BUILD_KEYWORDS.iter().any(|kw| title.contains(kw))
}

/// Ranking score from view velocity, estimated engagement, channel size and freshness.
///
/// Likes and comments are estimated at 5% and 0.5% of views.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn metadata_score(candidate: &VideoCandidate, now: DateTime<Utc>) -> f64 {
    let days = candidate
        .published
        .map_or(1, |published| (now - published).num_days())
        .max(1);
    let views = candidate.views as f64;
    let likes = (views * 0.05).floor();
    let comments = (views * 0.005).floor();

    let view_velocity = views / days as f64;
    let like_ratio = likes / views.max(1.0);
    let comment_density = comments / views.max(1.0);
    let channel_factor = (candidate.subscribers.unwrap_or(0).max(1) as f64).log10() / 7.0;

    let mut score = view_velocity * 0.35
        + like_ratio * 0.25 * 10_000.0
        + comment_density * 0.20 * 10_000.0
        + channel_factor * 0.20 * 1_000.0;
    if days <= FRESH_DAYS {
        score += FRESH_BONUS;
    }
    score
}

/// Filter, score and keep the `top_n` best candidates, best first.
#[must_use]
pub fn rank_candidates(
    candidates: Vec<VideoCandidate>,
    now: DateTime<Utc>,
    top_n: usize,
) -> Vec<VideoCandidate> {
    let before = candidates.len();
    let mut scored: Vec<(f64, VideoCandidate)> = candidates
        .into_iter()
        .filter(|c| passes_filters(c, now))
        .map(|c| (metadata_score(&c, now), c))
        .collect();
    tracing::info!(
        candidates = before,
        kept = scored.len(),
        "filtered video candidates"
    );
    scored.sort_by(|a, b| b.0.total_cmp(&a.0));
    scored.into_iter().take(top_n).map(|(_, c)| c).collect()
}

/// # Errors
///
/// Returns [`ScraperError::Normalization`] when the video id is missing.
pub fn normalize(
    build: VideoBuild,
    ctx: &NormalizeContext,
) -> Result<Option<BuildRecord>, ScraperError> {
    if build.title.trim().is_empty() {
        return Ok(None);
    }
    let Some(description) = build.draft.description else {
        tracing::debug!(video_id = %build.video_id, "no description extracted from transcript");
        return Ok(None);
    };
    let patch = ctx.effective_patch(None);
    if !ctx.accepts_patch(&patch) {
        return Ok(None);
    }
    if build.video_id.is_empty() {
        return Err(missing_field(&build.title, "video id"));
    }

    let ascendancy = build.draft.ascendancy.unwrap_or_default();
    let class = build
        .draft
        .class
        .or_else(|| class_for_ascendancy(&ascendancy).map(str::to_string))
        .unwrap_or_else(|| "Unknown".to_string());

    let combat_style = classify_combat_style(&build.title, &[], &description);
    let specialty = classify_specialty(&[], &description);
    let source_url = watch_url(&build.video_id);

    Ok(Some(BuildRecord {
        class_en: class,
        ascendancy_en: ascendancy,
        description_en: Some(description),
        pros_cons_en: build.draft.pros_cons,
        core_equipment_en: build.draft.core_equipment,
        author: Some(build.channel).filter(|c| !c.is_empty()),
        favorites: i64::try_from(build.views).unwrap_or(i64::MAX),
        patch: Some(patch),
        combat_style,
        specialty,
        scraped_at: Utc::now(),
        ..BuildRecord::new(Source::Youtube, build.video_id, source_url, build.title)
    }))
}
