//! maxroll.gg build guides.
//!
//! Listing pages embed the search results in `window.__remixContext`; each
//! hit points at a guide page whose HTML is mined for skills, pros/cons and
//! equipment.

use std::sync::LazyLock;

use chrono::Utc;
use pbs_core::{to_json_list, BuildRecord, Source};
use regex::Regex;
use serde_json::{Map, Value};

use super::{
    class_for_ascendancy, cost_tier_from_tags, dedup_nonempty, missing_field, title_case_slug,
    title_case_words, NormalizeContext,
};
use crate::classify::{classify_combat_style, classify_specialty};
use crate::error::ScraperError;
use crate::html::{
    anchor_texts_matching, assigned_json_object, extract_first_paragraph, extract_h1, has_next_link,
    page_text, texts_by_class, truncate_chars,
};
use crate::walker::{at_path, collect_objects, first_str, names_in_list};

pub const BASE_URL: &str = "https://maxroll.gg/poe/build-guides";
const SITE_ORIGIN: &str = "https://maxroll.gg";
const REMIX_MARKER: &str = "window.__remixContext";

const MAX_SKILLS: usize = 20;
const MAX_DESCRIPTION_CHARS: usize = 500;
const PROS_CONS_WINDOW_CHARS: usize = 500;
const EQUIPMENT_CANDIDATES: usize = 30;
const MAX_EQUIPMENT: usize = 15;
const CLASSIFIER_PAGE_CHARS: usize = 1000;

const CONS_DELIMITERS: &[&str] = &[
    "Equipment",
    "Gear",
    "Passive",
    "Skills",
    "Leveling",
    "Build Overview",
];
const EQUIPMENT_HREFS: &[&str] = &["/poe/items/", "/poe/unique/"];
const EQUIPMENT_SECTION_SKIP: &[&str] = &["gear", "equipment", "slot", "type", "item"];

static BODY_PATCH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:patch|version|update)\s*(\d+\.\d+)").expect("valid body patch regex")
});
static LOOSE_PATCH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"3\.\d+").expect("valid loose patch regex"));

/// One search hit from a listing page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingHit {
    pub permalink: String,
    pub title: String,
    pub excerpt: String,
    pub author: Option<String>,
    pub classes: Vec<String>,
    pub misc: Vec<String>,
    pub num: Vec<String>,
    pub metas: Vec<String>,
    pub damage_type: Vec<String>,
}

impl ListingHit {
    fn from_json(hit: &Map<String, Value>) -> Option<Self> {
        let permalink = first_str(hit, &["post_permalink", "permalink"])?.to_string();
        let taxonomies = hit.get("taxonomies");
        let taxonomy = |key: &str| names_in_list(taxonomies.and_then(|t| t.get(key)));

        Some(Self {
            title: first_str(hit, &["post_title", "title"])
                .unwrap_or_default()
                .to_string(),
            excerpt: first_str(hit, &["post_excerpt"]).unwrap_or_default().to_string(),
            author: hit
                .get("post_author")
                .and_then(|a| a.get("display_name"))
                .and_then(Value::as_str)
                .map(str::to_string),
            classes: taxonomy("classes"),
            misc: taxonomy("misc"),
            num: taxonomy("num"),
            metas: taxonomy("metas"),
            damage_type: taxonomy("damage_type"),
            permalink,
        })
    }

    /// `source_id`: the last path segment of the permalink.
    #[must_use]
    pub fn source_id(&self) -> &str {
        let trimmed = self.permalink.trim_end_matches('/');
        trimmed.rsplit('/').next().filter(|s| !s.is_empty()).unwrap_or(trimmed)
    }

    #[must_use]
    pub fn detail_url(&self) -> String {
        if self.permalink.starts_with("http") {
            self.permalink.clone()
        } else {
            format!("{SITE_ORIGIN}{}", self.permalink)
        }
    }
}

/// A parsed guide page, ready for [`normalize`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MaxrollBuild {
    pub source_id: String,
    pub source_url: String,
    pub name: String,
    pub class: String,
    pub ascendancy: String,
    pub skills: Vec<String>,
    pub description: String,
    pub patch: Option<String>,
    pub build_types: Vec<String>,
    pub playstyle: Vec<String>,
    pub activities: Vec<String>,
    pub damage_types: Vec<String>,
    pub author: Option<String>,
    pub pros_cons: Option<String>,
    pub core_equipment: Option<String>,
    /// Opening text of the page, used only as extra classifier input.
    pub page_excerpt: String,
}

/// URL of listing page `page` (1-based).
#[must_use]
pub fn listing_url(page: usize) -> String {
    if page <= 1 {
        BASE_URL.to_string()
    } else {
        format!("{BASE_URL}/page/{page}")
    }
}

/// Whether a listing page links to another page.
#[must_use]
pub fn has_next_page(html: &str) -> bool {
    has_next_link(html)
}

/// Path of Exile 1 hits embedded in a listing page.
///
/// A page without the Remix context yields no hits.
///
/// # Errors
///
/// Returns [`ScraperError::Deserialize`] when the embedded context is not valid JSON.
pub fn parse_listing(html: &str) -> Result<Vec<ListingHit>, ScraperError> {
    let Some(raw) = assigned_json_object(html, REMIX_MARKER) else {
        tracing::debug!("listing page has no remix context");
        return Ok(Vec::new());
    };
    let context: Value = serde_json::from_str(raw).map_err(|source| ScraperError::Deserialize {
        context: "maxroll remix context".to_string(),
        source,
    })?;

    Ok(hits_in_context(&context)
        .into_iter()
        .filter(|hit| !is_poe2(hit))
        .filter_map(ListingHit::from_json)
        .collect())
}

/// Hit objects from the known loader-data paths, or from a bounded walk of
/// the whole context when none of those paths exist.
fn hits_in_context(context: &Value) -> Vec<&Map<String, Value>> {
    if let Some(Value::Object(routes)) = at_path(context, &["state", "loaderData"]) {
        for route in routes.values().filter(|r| r.is_object()) {
            let candidates = [
                at_path(route, &["searchData", "initialSearchResponse", "hits"]),
                at_path(route, &["searchData", "initialResults"]),
                route.get("initialResults"),
            ];
            if let Some(Value::Array(hits)) = candidates.into_iter().flatten().find(|v| v.is_array()) {
                return hits.iter().filter_map(Value::as_object).collect();
            }
        }
    }

    tracing::debug!("no known hit path in remix context; walking payload");
    collect_objects(context, |map| {
        map.contains_key("post_permalink") && map.contains_key("post_title")
    })
}

fn is_poe2(hit: &Map<String, Value>) -> bool {
    let game = first_str(hit, &["game", "post_game"])
        .unwrap_or_default()
        .to_lowercase();
    if game.contains("poe2") || game.contains("path of exile 2") {
        return true;
    }
    let permalink = first_str(hit, &["post_permalink", "permalink"]).unwrap_or_default();
    permalink.contains("/poe2/") || permalink.contains("/path-of-exile-2/")
}

/// Assemble a [`MaxrollBuild`] from a guide page and its listing hit.
#[must_use]
pub fn parse_detail(html: &str, hit: &ListingHit) -> MaxrollBuild {
    let url = hit.detail_url();
    let text = page_text(html);

    let name = Some(extract_h1(html))
        .filter(|h1| !h1.is_empty())
        .unwrap_or_else(|| hit.title.clone());

    let classes: Vec<String> = hit.classes.iter().map(|c| title_case_slug(c)).collect();
    let (ascendancy, class) = match classes.as_slice() {
        [] => (String::new(), String::new()),
        [ascendancy] => (ascendancy.clone(), String::new()),
        [ascendancy, class, ..] => (ascendancy.clone(), class.clone()),
    };

    let skills: Vec<String> = dedup_nonempty(
        texts_by_class(html, "poe-item")
            .into_iter()
            .take(MAX_SKILLS),
    );

    let description = if hit.excerpt.is_empty() {
        truncate_chars(&extract_first_paragraph(html), MAX_DESCRIPTION_CHARS).to_string()
    } else {
        hit.excerpt.clone()
    };

    let patch = detect_patch(&text, &name, &url);

    MaxrollBuild {
        source_id: hit.source_id().to_string(),
        source_url: url,
        name,
        class,
        ascendancy,
        skills,
        description,
        patch,
        build_types: hit.misc.iter().map(|m| title_case_slug(m)).collect(),
        playstyle: hit.num.iter().map(|n| title_case_slug(n)).collect(),
        activities: hit.metas.iter().map(|m| title_case_slug(m)).collect(),
        damage_types: hit.damage_type.iter().map(|d| title_case_words(d)).collect(),
        author: hit.author.clone(),
        pros_cons: extract_pros_cons(&text),
        core_equipment: extract_core_equipment(html, &text),
        page_excerpt: truncate_chars(&text, CLASSIFIER_PAGE_CHARS).to_string(),
    }
}

fn detect_patch(text: &str, name: &str, url: &str) -> Option<String> {
    if let Some(cap) = BODY_PATCH_RE.captures(&text.to_lowercase()) {
        return cap.get(1).map(|m| m.as_str().to_string());
    }
    LOOSE_PATCH_RE
        .find(&format!("{name}{url}"))
        .map(|m| m.as_str().to_string())
}

/// Pros/cons windows from readable page text, trying "pros"/"cons" then
/// "strengths"/"weaknesses".
#[must_use]
pub fn extract_pros_cons(text: &str) -> Option<String> {
    // ASCII lowercasing keeps byte offsets aligned with `text`.
    let lower = text.to_ascii_lowercase();

    for (pros_kw, cons_kw) in [("pros", "cons"), ("strengths", "weaknesses")] {
        let pros_idx = lower.find(pros_kw);
        let cons_idx = lower.find(cons_kw);
        let mut parts = Vec::new();

        if let Some(start) = pros_idx {
            let tail = &text[start..];
            let mut snippet = truncate_chars(tail, PROS_CONS_WINDOW_CHARS);
            if let Some(end) = cons_idx.filter(|c| *c > start).map(|c| c - start) {
                if end < snippet.len() {
                    snippet = &tail[..end];
                }
            }
            let snippet = snippet.trim();
            if !snippet.is_empty() {
                parts.push(format!("Pros: {snippet}"));
            }
        }

        if let Some(start) = cons_idx {
            let mut snippet = truncate_chars(&text[start..], PROS_CONS_WINDOW_CHARS);
            for delimiter in CONS_DELIMITERS {
                if let Some(at) = snippet.find(delimiter).filter(|at| *at > cons_kw.len()) {
                    snippet = &snippet[..at];
                    break;
                }
            }
            parts.push(format!("Cons: {}", snippet.trim()));
        }

        if !parts.is_empty() {
            return Some(parts.join("\n"));
        }
    }
    None
}

/// Item names linked from the page, or failing that, lines under the first
/// gear/equipment heading.
#[must_use]
pub fn extract_core_equipment(html: &str, text: &str) -> Option<String> {
    let mut items: Vec<String> = anchor_texts_matching(html, EQUIPMENT_HREFS)
        .into_iter()
        .chain(texts_by_class(html, "poe-item"))
        .take(EQUIPMENT_CANDIDATES)
        .filter(|item| item.chars().count() > 2)
        .collect();

    if items.is_empty() {
        items = equipment_section_lines(text);
    }

    let unique: Vec<String> = dedup_nonempty(items).into_iter().take(MAX_EQUIPMENT).collect();
    if unique.is_empty() {
        None
    } else {
        Some(unique.join(", "))
    }
}

fn equipment_section_lines(text: &str) -> Vec<String> {
    let lower = text.to_ascii_lowercase();
    for keyword in ["gear", "equipment", "items"] {
        let Some(idx) = lower.find(keyword) else {
            continue;
        };
        let lines: Vec<String> = truncate_chars(&text[idx..], 2000)
            .lines()
            .skip(1)
            .take(29)
            .map(str::trim)
            .filter(|line| {
                let len = line.chars().count();
                let lower_line = line.to_lowercase();
                len > 3
                    && len < 80
                    && !EQUIPMENT_SECTION_SKIP
                        .iter()
                        .any(|prefix| lower_line.starts_with(prefix))
            })
            .map(str::to_string)
            .collect();
        if !lines.is_empty() {
            return lines;
        }
    }
    Vec::new()
}

/// # Errors
///
/// Returns [`ScraperError::Normalization`] when the guide has no `source_id`.
pub fn normalize(
    build: MaxrollBuild,
    ctx: &NormalizeContext,
) -> Result<Option<BuildRecord>, ScraperError> {
    if build.name.trim().is_empty() {
        return Ok(None);
    }
    let patch = ctx.effective_patch(build.patch.as_deref());
    if !ctx.accepts_patch(&patch) {
        tracing::debug!(source_id = %build.source_id, patch = %patch, "maxroll patch not allowed");
        return Ok(None);
    }
    if build.source_id.is_empty() {
        return Err(missing_field(&build.name, "source_id"));
    }

    let class = if build.class.is_empty() {
        class_for_ascendancy(&build.ascendancy)
            .unwrap_or_default()
            .to_string()
    } else {
        build.class
    };

    let mut description = build.description;
    let leading: Vec<&String> = build.skills.iter().take(3).collect();
    let lower_description = description.to_lowercase();
    if !leading.is_empty()
        && !leading
            .iter()
            .any(|skill| lower_description.contains(&skill.to_lowercase()))
    {
        let named: Vec<&str> = build.skills.iter().take(5).map(String::as_str).collect();
        description = format!("Main skills: {}. {description}", named.join(", "));
    }

    let combat_style = classify_combat_style(
        &build.name,
        &build.skills,
        &format!("{description} {}", build.page_excerpt),
    );
    let tags: Vec<String> = build
        .build_types
        .iter()
        .chain(&build.playstyle)
        .chain(&build.activities)
        .cloned()
        .collect();
    let specialty = classify_specialty(&tags, &description);

    Ok(Some(BuildRecord {
        class_en: class,
        ascendancy_en: build.ascendancy,
        skills_en: to_json_list(&build.skills),
        description_en: Some(description).filter(|d| !d.trim().is_empty()),
        pros_cons_en: build.pros_cons,
        core_equipment_en: build.core_equipment,
        author: build.author.filter(|a| !a.is_empty()),
        cost_tier: cost_tier_from_tags(&build.build_types),
        patch: Some(patch),
        build_types: to_json_list(&build.build_types),
        playstyle: to_json_list(&build.playstyle),
        activities: to_json_list(&build.activities),
        damage_types: to_json_list(&build.damage_types),
        combat_style,
        specialty,
        scraped_at: Utc::now(),
        ..BuildRecord::new(Source::Maxroll, build.source_id, build.source_url, build.name)
    }))
}

#[cfg(test)]
#[path = "maxroll_test.rs"]
mod tests;
