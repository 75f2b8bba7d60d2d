use std::collections::BTreeSet;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::CoreError;

/// Upstream source family a build record was scraped from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    /// Guide site with a Remix-rendered listing (site A).
    Maxroll,
    /// Guide site with a GraphQL-backed listing (site B).
    Mobalytics,
    /// Video platform; records come from transcripts.
    Youtube,
    /// Community forum; produces ratings for existing builds.
    Reddit,
}

impl Source {
    pub const ALL: [Source; 4] = [
        Source::Maxroll,
        Source::Mobalytics,
        Source::Youtube,
        Source::Reddit,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Source::Maxroll => "maxroll",
            Source::Mobalytics => "mobalytics",
            Source::Youtube => "youtube",
            Source::Reddit => "reddit",
        }
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Source {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Source::ALL
            .into_iter()
            .find(|source| source.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| CoreError::UnknownLabel {
                kind: "source",
                value: s.to_string(),
            })
    }
}

/// Primary combat approach of a build. Exactly one per record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CombatStyle {
    Melee,
    Ranged,
    Caster,
    Summoner,
    Hybrid,
}

impl CombatStyle {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            CombatStyle::Melee => "melee",
            CombatStyle::Ranged => "ranged",
            CombatStyle::Caster => "caster",
            CombatStyle::Summoner => "summoner",
            CombatStyle::Hybrid => "hybrid",
        }
    }
}

impl std::fmt::Display for CombatStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CombatStyle {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "melee" => Ok(CombatStyle::Melee),
            "ranged" => Ok(CombatStyle::Ranged),
            "caster" => Ok(CombatStyle::Caster),
            "summoner" => Ok(CombatStyle::Summoner),
            "hybrid" => Ok(CombatStyle::Hybrid),
            _ => Err(CoreError::UnknownLabel {
                kind: "combat style",
                value: s.to_string(),
            }),
        }
    }
}

/// Situational strength of a build. A record carries one or more.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Specialty {
    LeagueStarter,
    BossKiller,
    MapFarmer,
    AllRounder,
    SpeedFarmer,
    Tanky,
}

impl Specialty {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Specialty::LeagueStarter => "league_starter",
            Specialty::BossKiller => "boss_killer",
            Specialty::MapFarmer => "map_farmer",
            Specialty::AllRounder => "all_rounder",
            Specialty::SpeedFarmer => "speed_farmer",
            Specialty::Tanky => "tanky",
        }
    }
}

impl std::fmt::Display for Specialty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Non-empty set of [`Specialty`] labels.
///
/// Constructing from an empty collection yields `{all_rounder}`, so a record
/// never carries an empty specialty set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<Specialty>", into = "Vec<Specialty>")]
pub struct Specialties(BTreeSet<Specialty>);

impl Specialties {
    pub fn from_labels<I>(labels: I) -> Self
    where
        I: IntoIterator<Item = Specialty>,
    {
        let set: BTreeSet<Specialty> = labels.into_iter().collect();
        if set.is_empty() {
            Self::default()
        } else {
            Self(set)
        }
    }

    #[must_use]
    pub fn contains(&self, label: Specialty) -> bool {
        self.0.contains(&label)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the set holds no labels. Constructors never produce an empty
    /// set, so this only reports `true` if that guarantee is broken.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Specialty> + '_ {
        self.0.iter().copied()
    }

    /// Serialized form stored in the `specialty` column, e.g. `["boss_killer","tanky"]`.
    #[must_use]
    pub fn to_json(&self) -> String {
        let labels: Vec<&str> = self.iter().map(Specialty::as_str).collect();
        serde_json::to_string(&labels).unwrap_or_else(|_| "[\"all_rounder\"]".to_string())
    }
}

impl Default for Specialties {
    fn default() -> Self {
        Self(BTreeSet::from([Specialty::AllRounder]))
    }
}

impl From<Vec<Specialty>> for Specialties {
    fn from(labels: Vec<Specialty>) -> Self {
        Self::from_labels(labels)
    }
}

impl From<Specialties> for Vec<Specialty> {
    fn from(set: Specialties) -> Self {
        set.0.into_iter().collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CostTier {
    Budget,
    Expensive,
}

impl CostTier {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            CostTier::Budget => "Budget",
            CostTier::Expensive => "Expensive",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranslationStatus {
    #[default]
    Pending,
    Completed,
    Failed,
}

impl TranslationStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            TranslationStatus::Pending => "pending",
            TranslationStatus::Completed => "completed",
            TranslationStatus::Failed => "failed",
        }
    }
}

/// A build guide normalized from any source, ready for validation and storage.
///
/// Text fields come in `*_en` / `*_ja` pairs; the Japanese side is filled in
/// later by the translation step. List-shaped fields hold a serialized JSON
/// array, or `None` when the source supplied nothing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildRecord {
    pub source: Source,
    pub source_id: String,
    pub source_url: String,

    pub name_en: String,
    #[serde(default)]
    pub name_ja: Option<String>,
    #[serde(default)]
    pub class_en: String,
    #[serde(default)]
    pub class_ja: Option<String>,
    #[serde(default)]
    pub ascendancy_en: String,
    #[serde(default)]
    pub ascendancy_ja: Option<String>,
    #[serde(default)]
    pub skills_en: Option<String>,
    #[serde(default)]
    pub skills_ja: Option<String>,
    #[serde(default)]
    pub description_en: Option<String>,
    #[serde(default)]
    pub description_ja: Option<String>,
    #[serde(default)]
    pub pros_cons_en: Option<String>,
    #[serde(default)]
    pub pros_cons_ja: Option<String>,
    #[serde(default)]
    pub core_equipment_en: Option<String>,
    #[serde(default)]
    pub core_equipment_ja: Option<String>,
    #[serde(default)]
    pub author: Option<String>,

    #[serde(default)]
    pub favorites: i64,
    #[serde(default)]
    pub verified: bool,
    #[serde(default)]
    pub hardcore: bool,
    #[serde(default)]
    pub ssf: bool,
    #[serde(default)]
    pub cost_tier: Option<CostTier>,
    #[serde(default)]
    pub patch: Option<String>,
    #[serde(default)]
    pub build_types: Option<String>,
    #[serde(default)]
    pub playstyle: Option<String>,
    #[serde(default)]
    pub activities: Option<String>,
    #[serde(default)]
    pub damage_types: Option<String>,

    pub combat_style: CombatStyle,
    #[serde(default)]
    pub specialty: Specialties,

    #[serde(default)]
    pub translation_status: TranslationStatus,
    pub scraped_at: DateTime<Utc>,
    #[serde(default)]
    pub translated_at: Option<DateTime<Utc>>,
}

impl BuildRecord {
    /// A record with identity and name set and everything else empty.
    ///
    /// Combat style starts as `hybrid` and specialty as `{all_rounder}`;
    /// normalizers overwrite both after classification.
    pub fn new(
        source: Source,
        source_id: impl Into<String>,
        source_url: impl Into<String>,
        name_en: impl Into<String>,
    ) -> Self {
        Self {
            source,
            source_id: source_id.into(),
            source_url: source_url.into(),
            name_en: name_en.into(),
            name_ja: None,
            class_en: String::new(),
            class_ja: None,
            ascendancy_en: String::new(),
            ascendancy_ja: None,
            skills_en: None,
            skills_ja: None,
            description_en: None,
            description_ja: None,
            pros_cons_en: None,
            pros_cons_ja: None,
            core_equipment_en: None,
            core_equipment_ja: None,
            author: None,
            favorites: 0,
            verified: false,
            hardcore: false,
            ssf: false,
            cost_tier: None,
            patch: None,
            build_types: None,
            playstyle: None,
            activities: None,
            damage_types: None,
            combat_style: CombatStyle::Hybrid,
            specialty: Specialties::default(),
            translation_status: TranslationStatus::Pending,
            scraped_at: Utc::now(),
            translated_at: None,
        }
    }

    /// Decoded `skills_en`; malformed JSON reads as no skills.
    #[must_use]
    pub fn skills(&self) -> Vec<String> {
        parse_json_list(self.skills_en.as_deref())
    }

    /// `(source, source_id)` rendered for log lines.
    #[must_use]
    pub fn key(&self) -> String {
        format!("{}:{}", self.source, self.source_id)
    }
}

/// Aggregated forum sentiment for one stored build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildRating {
    pub build_source: Source,
    pub build_source_id: String,
    pub build_name_matched: String,
    pub score: i64,
    pub weighted_score: f64,
    pub mention_count: i64,
    pub comment_count: i64,
    pub summary_en: String,
    /// JSON array of post URLs.
    pub source_urls: String,
}

/// Serialize a list field for storage: a JSON array when non-empty, else `None`.
///
/// An empty collection is never stored as `[]`; "no data" is always NULL.
#[must_use]
pub fn to_json_list(items: &[String]) -> Option<String> {
    if items.is_empty() {
        return None;
    }
    serde_json::to_string(items).ok()
}

/// Decode a stored list field. Absent or malformed input yields an empty list.
#[must_use]
pub fn parse_json_list(raw: Option<&str>) -> Vec<String> {
    raw.and_then(|s| serde_json::from_str::<Vec<String>>(s).ok())
        .unwrap_or_default()
}
