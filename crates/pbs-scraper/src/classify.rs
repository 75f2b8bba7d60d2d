//! Keyword classifiers for combat style and specialty.
//!
//! Both classifiers lowercase their input and count substring hits against
//! static keyword tables. The `*_with` variants take the tables as arguments
//! so tests can exercise the scoring rules with small synthetic vocabularies.

use pbs_core::{CombatStyle, Specialties, Specialty};

pub type StyleTable<'a> = &'a [(CombatStyle, &'a [&'a str])];
pub type SpecialtyTable<'a> = &'a [(Specialty, &'a [&'a str])];

const MELEE: &[&str] = &[
    "cyclone",
    "boneshatter",
    "earthquake",
    "sunder",
    "lacerate",
    "blade flurry",
    "flicker strike",
    "lightning strike",
    "molten strike",
    "smite",
    "double strike",
    "reave",
    "ground slam",
    "tectonic slam",
    "frost blades",
    "perforate",
    "bladestorm",
    "rage vortex",
    "melee",
];

const RANGED: &[&str] = &[
    "tornado shot",
    "lightning arrow",
    "ice shot",
    "rain of arrows",
    "toxic rain",
    "caustic arrow",
    "scourge arrow",
    "split arrow",
    "barrage",
    "galvanic arrow",
    "elemental hit",
    "kinetic blast",
    "power siphon",
    "spectral throw",
    "bow",
    "ranged",
];

const CASTER: &[&str] = &[
    "spark",
    "fireball",
    "ball lightning",
    "ice nova",
    "freezing pulse",
    "storm brand",
    "penance brand",
    "armageddon brand",
    "blade vortex",
    "cold snap",
    "essence drain",
    "contagion",
    "bane",
    "forbidden rite",
    "ethereal knives",
    "kinetic bolt",
    "lightning conduit",
    "crackling lance",
    "righteous fire",
    "spell",
    "caster",
    "self-cast",
];

const SUMMONER: &[&str] = &[
    "raise zombie",
    "raise spectre",
    "summon skeletons",
    "summon raging spirit",
    "animate guardian",
    "animate weapon",
    "srs",
    "golem",
    "spectre",
    "minion",
    "summoner",
    "herald of purity",
    "absolution",
    "dominating blow",
    "holy relic",
];

pub const COMBAT_STYLE_KEYWORDS: &[(CombatStyle, &[&str])] = &[
    (CombatStyle::Melee, MELEE),
    (CombatStyle::Ranged, RANGED),
    (CombatStyle::Caster, CASTER),
    (CombatStyle::Summoner, SUMMONER),
];

pub const SPECIALTY_KEYWORDS: &[(Specialty, &[&str])] = &[
    (
        Specialty::LeagueStarter,
        &["league start", "starter", "budget", "cheap", "ssf"],
    ),
    (
        Specialty::BossKiller,
        &["boss", "uber", "pinnacle", "single target"],
    ),
    (
        Specialty::MapFarmer,
        &["mapping", "map farm", "farm", "clear speed", "atlas"],
    ),
    (
        Specialty::AllRounder,
        &["all-round", "all round", "allround", "versatile", "all content"],
    ),
    (Specialty::SpeedFarmer, &["speed", "fast", "zoom"]),
    (
        Specialty::Tanky,
        &["tank", "defensive", "durable", "survivab", "ehp"],
    ),
];

/// Classify a build's combat style from its name, skills and description.
#[must_use]
pub fn classify_combat_style(name: &str, skills: &[String], description: &str) -> CombatStyle {
    classify_combat_style_with(COMBAT_STYLE_KEYWORDS, name, skills, description)
}

/// Count keyword hits per style and return the unique top scorer.
///
/// No hits at all, or a tie for the top score, yields [`CombatStyle::Hybrid`].
#[must_use]
pub fn classify_combat_style_with(
    table: StyleTable<'_>,
    name: &str,
    skills: &[String],
    description: &str,
) -> CombatStyle {
    let text = format!("{name} {} {description}", skills.join(" ")).to_lowercase();

    let mut best: Option<(CombatStyle, usize)> = None;
    let mut tied = false;
    for (style, keywords) in table {
        let hits = count_hits(&text, keywords);
        match best {
            Some((_, top)) if hits > top => {
                best = Some((*style, hits));
                tied = false;
            }
            Some((_, top)) if hits == top => tied = true,
            Some(_) => {}
            None => best = Some((*style, hits)),
        }
    }

    match best {
        Some((style, hits)) if hits > 0 && !tied => style,
        _ => CombatStyle::Hybrid,
    }
}

/// Classify specialties from source tags and description text.
#[must_use]
pub fn classify_specialty(tags: &[String], description: &str) -> Specialties {
    classify_specialty_with(SPECIALTY_KEYWORDS, tags, description)
}

/// Every label with at least one keyword hit; none at all gives `{all_rounder}`.
#[must_use]
pub fn classify_specialty_with(
    table: SpecialtyTable<'_>,
    tags: &[String],
    description: &str,
) -> Specialties {
    let text = format!("{} {description}", tags.join(" ")).to_lowercase();
    Specialties::from_labels(
        table
            .iter()
            .filter(|(_, keywords)| count_hits(&text, keywords) > 0)
            .map(|(label, _)| *label),
    )
}

fn count_hits(text: &str, keywords: &[&str]) -> usize {
    keywords.iter().map(|kw| text.matches(kw).count()).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn skills(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn melee_skill_wins() {
        let style = classify_combat_style(
            "Boneshatter Juggernaut",
            &skills(&["Boneshatter", "Ancestral Warchief"]),
            "",
        );
        assert_eq!(style, CombatStyle::Melee);
    }

    #[test]
    fn summoner_from_minion_text() {
        let style = classify_combat_style(
            "SRS Necromancer",
            &[],
            "Summon raging spirit with minion damage support",
        );
        assert_eq!(style, CombatStyle::Summoner);
    }

    #[test]
    fn no_keywords_is_hybrid() {
        assert_eq!(
            classify_combat_style("Mystery build", &[], "nothing to see here"),
            CombatStyle::Hybrid
        );
    }

    #[test]
    fn tie_is_hybrid() {
        let table: &[(CombatStyle, &[&str])] = &[
            (CombatStyle::Melee, &["alpha"]),
            (CombatStyle::Caster, &["beta"]),
        ];
        assert_eq!(
            classify_combat_style_with(table, "alpha beta", &[], ""),
            CombatStyle::Hybrid
        );
    }

    #[test]
    fn counts_repeated_occurrences() {
        let table: &[(CombatStyle, &[&str])] = &[
            (CombatStyle::Melee, &["alpha"]),
            (CombatStyle::Caster, &["beta"]),
        ];
        assert_eq!(
            classify_combat_style_with(table, "alpha beta", &skills(&["beta"]), ""),
            CombatStyle::Caster
        );
    }

    #[test]
    fn matching_is_case_insensitive() {
        assert_eq!(
            classify_combat_style("TORNADO SHOT Deadeye", &[], ""),
            CombatStyle::Ranged
        );
    }

    #[test]
    fn empty_specialty_defaults_to_all_rounder() {
        let set = classify_specialty(&[], "");
        assert_eq!(set, Specialties::default());
    }

    #[test]
    fn multiple_specialties_are_collected() {
        let set = classify_specialty(
            &skills(&["League Starter"]),
            "Great for uber bosses and very tanky",
        );
        assert!(set.contains(Specialty::LeagueStarter));
        assert!(set.contains(Specialty::BossKiller));
        assert!(set.contains(Specialty::Tanky));
        assert!(!set.contains(Specialty::AllRounder));
    }

    #[test]
    fn injected_specialty_table() {
        let table: &[(Specialty, &[&str])] = &[(Specialty::SpeedFarmer, &["zoomzoom"])];
        let set = classify_specialty_with(table, &[], "ZoomZoom through maps");
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![Specialty::SpeedFarmer]);
    }
}
