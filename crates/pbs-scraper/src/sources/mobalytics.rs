//! mobalytics.gg build listings.
//!
//! Listing pages ship their data as a Next.js payload or an Apollo cache
//! dump. Build objects are located by known paths first and by a bounded
//! walk otherwise; the detail page is only read for LLM enrichment.

use chrono::Utc;
use pbs_core::{to_json_list, BuildRecord, Source};
use serde_json::{Map, Value};

use super::{class_for_ascendancy, cost_tier_from_tags, dedup_nonempty, missing_field, NormalizeContext};
use crate::classify::{classify_combat_style, classify_specialty};
use crate::error::ScraperError;
use crate::extract::DraftFields;
use crate::html::{assigned_json_object, script_by_id, truncate_chars};
use crate::walker::{at_path, collect_objects, first_str, first_value, names_in_list};

pub const BASE_URL: &str = "https://mobalytics.gg/poe/builds";
pub const TABS: &[&str] = &["verified", "creator", "community"];

const CLASSIFIER_PAGE_CHARS: usize = 2000;
const MAIN_SKILL_KEYS: &[&str] = &["mainSkillName", "primarySkillName", "mainSkill"];
const KNOWN_BUILD_PATHS: &[&[&str]] = &[
    &["props", "pageProps", "builds"],
    &["props", "pageProps", "data", "builds"],
];

/// One build object lifted from a listing payload.
#[derive(Debug, Clone, PartialEq)]
pub struct MobalyticsBuild {
    pub source_id: String,
    pub slug: String,
    pub tab: String,
    pub fields: Map<String, Value>,
}

impl MobalyticsBuild {
    fn from_json(fields: &Map<String, Value>, tab: &str) -> Option<Self> {
        let name = first_str(fields, &["name", "title"])?;
        let id = first_value(fields, &["id"]).and_then(scalar_string);
        let slug = first_str(fields, &["slug"])
            .map(str::to_string)
            .or_else(|| id.clone())
            .unwrap_or_else(|| name.to_lowercase().replace(' ', "-"));
        Some(Self {
            source_id: id.unwrap_or_else(|| slug.clone()),
            slug,
            tab: tab.to_string(),
            fields: fields.clone(),
        })
    }

    #[must_use]
    pub fn detail_url(&self) -> String {
        format!("{BASE_URL}/{}", self.slug)
    }
}

#[must_use]
pub fn listing_url(tab: &str) -> String {
    format!("{BASE_URL}?tab={tab}")
}

/// Build objects embedded in one tab's listing page.
///
/// # Errors
///
/// Returns [`ScraperError::Deserialize`] when an embedded payload is present
/// but is not valid JSON.
pub fn parse_listing(html: &str, tab: &str) -> Result<Vec<MobalyticsBuild>, ScraperError> {
    let payload = if let Some(raw) = script_by_id(html, "__NEXT_DATA__") {
        parse_payload(raw, "mobalytics next data")?
    } else if let Some(raw) = assigned_json_object(html, "window.__APOLLO_STATE__") {
        parse_payload(raw, "mobalytics apollo state")?
    } else {
        tracing::debug!(tab, "listing page has no embedded payload");
        return Ok(Vec::new());
    };

    Ok(builds_in_payload(&payload)
        .into_iter()
        .filter_map(|fields| MobalyticsBuild::from_json(fields, tab))
        .collect())
}

fn parse_payload(raw: &str, context: &str) -> Result<Value, ScraperError> {
    serde_json::from_str(raw).map_err(|source| ScraperError::Deserialize {
        context: context.to_string(),
        source,
    })
}

fn looks_like_build(map: &Map<String, Value>) -> bool {
    map.contains_key("name")
        && (map.contains_key("className")
            || map.contains_key("class")
            || map.contains_key("ascendancyName"))
}

fn builds_in_payload(payload: &Value) -> Vec<&Map<String, Value>> {
    for path in KNOWN_BUILD_PATHS {
        if let Some(Value::Array(items)) = at_path(payload, path) {
            let builds: Vec<_> = items
                .iter()
                .filter_map(Value::as_object)
                .filter(|m| looks_like_build(m))
                .collect();
            if !builds.is_empty() {
                return builds;
            }
        }
    }
    tracing::debug!("no known build path in payload; walking");
    collect_objects(payload, looks_like_build)
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn truthy(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(Value::String(s)) => !matches!(s.trim().to_lowercase().as_str(), "" | "0" | "false"),
        _ => false,
    }
}

/// # Errors
///
/// Returns [`ScraperError::Normalization`] when the build has no usable id.
pub fn normalize(
    build: MobalyticsBuild,
    ctx: &NormalizeContext,
) -> Result<Option<BuildRecord>, ScraperError> {
    let fields = &build.fields;
    let Some(name) = first_str(fields, &["name", "title"]).map(str::to_string) else {
        return Ok(None);
    };

    let patch = first_value(fields, &["patchVersion", "patch"])
        .and_then(scalar_string)
        .map(|p| p.trim().to_string())
        .unwrap_or_default();
    if !ctx.accepts_patch(&patch) {
        tracing::debug!(source_id = %build.source_id, patch = %patch, "mobalytics patch not allowed");
        return Ok(None);
    }
    if build.source_id.is_empty() || build.slug.is_empty() {
        return Err(missing_field(&name, "id or slug"));
    }

    let ascendancy = first_str(fields, &["ascendancyName", "ascendancy"])
        .unwrap_or_default()
        .to_string();
    let class = first_str(fields, &["className", "class"])
        .map(str::to_string)
        .or_else(|| class_for_ascendancy(&ascendancy).map(str::to_string))
        .unwrap_or_default();

    let main_skill = first_str(fields, MAIN_SKILL_KEYS).map(str::to_string);
    let gems = names_in_list(first_value(fields, &["skillGems", "gems"]));
    let skills = dedup_nonempty(main_skill.into_iter().chain(gems));

    let tags = names_in_list(first_value(fields, &["tags", "buildTags"]));
    let description = first_str(fields, &["description", "summary"])
        .unwrap_or_default()
        .to_string();

    let author = fields
        .get("author")
        .and_then(|a| a.get("name"))
        .and_then(Value::as_str)
        .or_else(|| first_str(fields, &["authorName"]))
        .map(str::to_string);
    let favorites = first_value(fields, &["likesCount", "favorites"])
        .and_then(Value::as_i64)
        .unwrap_or(0)
        .max(0);

    let combat_style = classify_combat_style(&name, &skills, &description);
    let specialty = classify_specialty(&tags, &description);
    let source_url = build.detail_url();

    Ok(Some(BuildRecord {
        class_en: class,
        ascendancy_en: ascendancy,
        skills_en: to_json_list(&skills),
        description_en: Some(description).filter(|d| !d.trim().is_empty()),
        author,
        favorites,
        verified: build.tab == "verified",
        hardcore: truthy(first_value(fields, &["isHardcore", "hardcore"])),
        ssf: truthy(first_value(fields, &["isSsf", "ssf"])),
        cost_tier: cost_tier_from_tags(&tags),
        patch: Some(patch),
        build_types: to_json_list(&tags),
        combat_style,
        specialty,
        scraped_at: Utc::now(),
        ..BuildRecord::new(Source::Mobalytics, build.source_id, source_url, name)
    }))
}

/// Merge LLM-extracted detail fields into a listing record, then
/// re-classify combat style against the page text.
pub fn enrich(record: &mut BuildRecord, draft: DraftFields, page_text: &str) {
    if let Some(description) = draft.description {
        let current = record.description_en.as_deref().map_or(0, |d| d.chars().count());
        if description.chars().count() > current {
            record.description_en = Some(description);
        }
    }
    if draft.pros_cons.is_some() {
        record.pros_cons_en = draft.pros_cons;
    }
    if draft.core_equipment.is_some() {
        record.core_equipment_en = draft.core_equipment;
    }
    if record.class_en.is_empty() {
        if let Some(class) = draft.class {
            record.class_en = class;
        }
    }
    if record.ascendancy_en.is_empty() {
        if let Some(ascendancy) = draft.ascendancy {
            record.ascendancy_en = ascendancy;
        }
    }

    record.combat_style = classify_combat_style(
        &record.name_en,
        &record.skills(),
        truncate_chars(page_text, CLASSIFIER_PAGE_CHARS),
    );
}

#[cfg(test)]
mod tests {
    use pbs_core::{CombatStyle, Specialty};
    use serde_json::json;

    use super::*;

    fn build_from(value: &Value, tab: &str) -> MobalyticsBuild {
        MobalyticsBuild::from_json(value.as_object().unwrap(), tab).unwrap()
    }

    fn next_data_page(payload: &Value) -> String {
        format!(
            r#"<html><body><script id="__NEXT_DATA__" type="application/json">{payload}</script></body></html>"#
        )
    }

    #[test]
    fn known_path_builds_are_read() {
        let payload = json!({"props": {"pageProps": {"builds": [
            {"id": 42, "slug": "rf-jugg", "name": "RF Jugg", "className": "Marauder", "patchVersion": "3.27.1"},
            {"name": "no class here"}
        ]}}});
        let builds = parse_listing(&next_data_page(&payload), "verified").unwrap();
        assert_eq!(builds.len(), 1);
        assert_eq!(builds[0].source_id, "42");
        assert_eq!(builds[0].slug, "rf-jugg");
        assert_eq!(builds[0].detail_url(), "https://mobalytics.gg/poe/builds/rf-jugg");
    }

    #[test]
    fn apollo_state_is_walked() {
        let html = r#"<script>window.__APOLLO_STATE__ = {"ROOT_QUERY":{"builds({\"tab\":1})":{"items":[{"__typename":"Build","name":"Toxic Rain","ascendancyName":"Pathfinder","slug":"tr-pf"}]}}};</script>"#;
        let builds = parse_listing(html, "community").unwrap();
        assert_eq!(builds.len(), 1);
        assert_eq!(builds[0].source_id, "tr-pf");
        assert_eq!(builds[0].tab, "community");
    }

    #[test]
    fn page_without_payload_is_empty() {
        assert!(parse_listing("<html></html>", "creator").unwrap().is_empty());
    }

    #[test]
    fn slug_falls_back_to_name() {
        let build = build_from(&json!({"name": "Cold Dot Occultist", "class": "Witch"}), "creator");
        assert_eq!(build.slug, "cold-dot-occultist");
        assert_eq!(build.source_id, "cold-dot-occultist");
    }

    #[test]
    fn normalize_reads_aliases() {
        let build = build_from(
            &json!({
                "id": "b1",
                "slug": "cyclone-slayer",
                "title": "Cyclone Slayer",
                "ascendancy": "Slayer",
                "patch": "3.26",
                "mainSkill": "Cyclone",
                "gems": [{"name": "Fortify Support"}, "Cyclone", {"id": "melee-physical"}],
                "buildTags": [{"name": "Budget"}, "Boss Killer"],
                "summary": "A spinning melee build.",
                "authorName": "Goratha",
                "favorites": 17,
                "hardcore": 1,
                "isSsf": "false"
            }),
            "verified",
        );
        let record = normalize(build, &NormalizeContext::default()).unwrap().unwrap();
        assert_eq!(record.name_en, "Cyclone Slayer");
        assert_eq!(record.class_en, "Duelist");
        assert_eq!(record.ascendancy_en, "Slayer");
        assert_eq!(
            record.skills_en.as_deref(),
            Some(r#"["Cyclone","Fortify Support","melee-physical"]"#)
        );
        assert_eq!(record.build_types.as_deref(), Some(r#"["Budget","Boss Killer"]"#));
        assert_eq!(record.author.as_deref(), Some("Goratha"));
        assert_eq!(record.favorites, 17);
        assert!(record.verified);
        assert!(record.hardcore);
        assert!(!record.ssf);
        assert_eq!(record.cost_tier, Some(pbs_core::CostTier::Budget));
        assert_eq!(record.combat_style, CombatStyle::Melee);
        assert!(record.specialty.contains(Specialty::BossKiller));
        assert_eq!(record.source_url, "https://mobalytics.gg/poe/builds/cyclone-slayer");
    }

    #[test]
    fn normalize_drops_old_patch() {
        let build = build_from(
            &json!({"id": 1, "name": "Old", "className": "Witch", "patchVersion": "3.25.1"}),
            "community",
        );
        assert!(normalize(build, &NormalizeContext::default()).unwrap().is_none());
    }

    #[test]
    fn negative_likes_clamp_to_zero() {
        let build = build_from(
            &json!({"id": 1, "name": "Odd", "className": "Witch", "likesCount": -4, "patchVersion": "3.27.0"}),
            "community",
        );
        let record = normalize(build, &NormalizeContext::default()).unwrap().unwrap();
        assert_eq!(record.favorites, 0);
        assert!(!record.verified);
        assert_eq!(record.patch.as_deref(), Some("3.27.0"));
    }

    #[test]
    fn normalize_drops_build_without_patch() {
        let ctx = NormalizeContext::default();
        let missing = build_from(
            &json!({"id": 1, "name": "No Patch", "className": "Witch"}),
            "community",
        );
        assert!(normalize(missing, &ctx).unwrap().is_none());

        let blank = build_from(
            &json!({"id": 2, "name": "Blank Patch", "className": "Witch", "patchVersion": "  "}),
            "community",
        );
        assert!(normalize(blank, &ctx).unwrap().is_none());
    }

    #[test]
    fn enrich_fills_missing_fields() {
        let build = build_from(
            &json!({"id": 7, "name": "Spark Inquisitor", "ascendancyName": "", "className": "", "description": "Short.", "patchVersion": "3.27"}),
            "creator",
        );
        let mut record = normalize(build, &NormalizeContext::default()).unwrap().unwrap();
        let draft = DraftFields {
            description: Some("Spark projectiles bounce around the screen while the caster stays safe.".to_string()),
            pros_cons: Some("Pros:\n- Clear\n\nCons:\n- Bosses".to_string()),
            core_equipment: Some("Inpulsa's Broken Heart".to_string()),
            class: Some("Templar".to_string()),
            ascendancy: Some("Inquisitor".to_string()),
        };
        enrich(&mut record, draft, "Spark spell caster guide. Spark everywhere.");
        assert!(record.description_en.as_deref().unwrap().starts_with("Spark projectiles"));
        assert_eq!(record.class_en, "Templar");
        assert_eq!(record.ascendancy_en, "Inquisitor");
        assert_eq!(record.core_equipment_en.as_deref(), Some("Inpulsa's Broken Heart"));
        assert_eq!(record.combat_style, CombatStyle::Caster);
    }

    #[test]
    fn enrich_keeps_longer_description() {
        let build = build_from(
            &json!({"id": 8, "name": "RF", "className": "Marauder", "description": "A long and detailed description of the build.", "patchVersion": "3.26"}),
            "creator",
        );
        let mut record = normalize(build, &NormalizeContext::default()).unwrap().unwrap();
        let draft = DraftFields {
            description: Some("Short.".to_string()),
            ..DraftFields::default()
        };
        enrich(&mut record, draft, "");
        assert_eq!(
            record.description_en.as_deref(),
            Some("A long and detailed description of the build.")
        );
        assert_eq!(record.class_en, "Marauder");
    }
}
