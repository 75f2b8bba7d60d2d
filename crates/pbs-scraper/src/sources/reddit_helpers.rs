//! Reddit rating helpers: skill queries, sentiment, build matching and aggregation.

use std::collections::{BTreeMap, HashMap};

use pbs_core::{parse_json_list, BuildRating, Source};
use pbs_db::BuildRef;

use super::reddit::RedditPost;

const POSITIVE_KEYWORDS: &[&str] = &[
    "league starter",
    "strong",
    "broken",
    "recommended",
    "best",
    "top tier",
    "s tier",
    "amazing",
    "great",
    "insane",
    "busted",
];

const NEGATIVE_KEYWORDS: &[&str] = &[
    "dead",
    "gutted",
    "don't play",
    "nerfed",
    "worst",
    "trash",
    "avoid",
    "terrible",
    "bad",
];

/// Skill names that are supports, gear or utility rather than a build's identity.
const SKILL_QUERY_EXCLUDES: &[&str] = &[
    "support",
    "flask",
    "orb",
    "gear",
    "hybrid",
    "divine",
    "cast when",
    "immortal call",
    "frenzy",
    "mark",
    "recall",
    "offering",
];

const MIN_MATCH_CHARS: usize = 4;
const MATCHED_SKILLS: usize = 3;
const SUMMARY_KEYWORDS: usize = 3;
const SUMMARY_TITLE_CHARS: usize = 100;

/// The `top_n` most common skill names across stored builds.
///
/// Ties keep first-seen order.
#[must_use]
pub fn top_skill_queries(builds: &[BuildRef], top_n: usize) -> Vec<String> {
    let mut order: Vec<(String, usize)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for build in builds {
        for skill in parse_json_list(build.skills_en.as_deref()) {
            let lower = skill.to_lowercase();
            if SKILL_QUERY_EXCLUDES.iter().any(|ex| lower.contains(ex))
                || skill.chars().count() < MIN_MATCH_CHARS
            {
                continue;
            }
            if let Some(&slot) = index.get(&skill) {
                order[slot].1 += 1;
            } else {
                index.insert(skill.clone(), order.len());
                order.push((skill, 1));
            }
        }
    }

    order.sort_by(|a, b| b.1.cmp(&a.1));
    order.into_iter().take(top_n).map(|(skill, _)| skill).collect()
}

/// Whether a post reads as a positive rating.
///
/// Negative wording without positive wording drops the post. Positive wording
/// needs ratio > 0.8 and score > 10; without it, score > 50 and ratio > 0.85
/// and no negative wording suffice.
#[must_use]
pub fn is_positive(post: &RedditPost) -> bool {
    let text = format!("{} {}", post.title, post.selftext).to_lowercase();
    let has_positive = POSITIVE_KEYWORDS.iter().any(|kw| text.contains(kw));
    let has_negative = NEGATIVE_KEYWORDS.iter().any(|kw| text.contains(kw));

    if has_negative && !has_positive {
        return false;
    }
    if has_positive && post.upvote_ratio > 0.8 && post.score > 10 {
        return true;
    }
    post.score > 50 && post.upvote_ratio > 0.85 && !has_negative
}

/// Substring match on one of the build's first three skills, else its ascendancy.
fn matches_build(text_lower: &str, skills: &[String], ascendancy: &str) -> bool {
    let long_enough = |s: &str| s.chars().count() >= MIN_MATCH_CHARS;
    let skill_hit = skills
        .iter()
        .take(MATCHED_SKILLS)
        .any(|skill| long_enough(skill) && text_lower.contains(&skill.to_lowercase()));
    skill_hit || (long_enough(ascendancy) && text_lower.contains(&ascendancy.to_lowercase()))
}

struct Aggregate<'a> {
    build: &'a BuildRef,
    posts: Vec<&'a RedditPost>,
    score: i64,
    weighted_score: f64,
    comment_count: i64,
}

/// Match positive posts to builds and fold them into one rating per build.
///
/// Builds whose source is not recognised are skipped.
#[must_use]
pub fn rate_builds(posts: &[RedditPost], builds: &[BuildRef]) -> Vec<BuildRating> {
    let prepared: Vec<(&BuildRef, Vec<String>)> = builds
        .iter()
        .map(|b| (b, parse_json_list(b.skills_en.as_deref())))
        .collect();
    let mut ratings: BTreeMap<i64, Aggregate<'_>> = BTreeMap::new();

    for post in posts.iter().filter(|p| is_positive(p)) {
        let text = format!("{} {}", post.title, post.selftext).to_lowercase();
        for (build, skills) in &prepared {
            if !matches_build(&text, skills, &build.ascendancy_en) {
                continue;
            }
            let entry = ratings.entry(build.id).or_insert_with(|| Aggregate {
                build,
                posts: Vec::new(),
                score: 0,
                weighted_score: 0.0,
                comment_count: 0,
            });
            entry.posts.push(post);
            entry.score += post.score;
            #[allow(clippy::cast_precision_loss)]
            {
                entry.weighted_score += post.score as f64 * post.upvote_ratio;
            }
            entry.comment_count += post.num_comments;
        }
    }

    ratings
        .into_values()
        .filter_map(|agg| {
            let Ok(source) = agg.build.source.parse::<Source>() else {
                tracing::warn!(source = %agg.build.source, "rated build has unknown source");
                return None;
            };
            let urls: Vec<&str> = agg.posts.iter().map(|p| p.url.as_str()).collect();
            Some(BuildRating {
                build_source: source,
                build_source_id: agg.build.source_id.clone(),
                build_name_matched: agg.build.name_en.clone(),
                score: agg.score,
                weighted_score: (agg.weighted_score * 100.0).round() / 100.0,
                mention_count: i64::try_from(agg.posts.len()).unwrap_or(i64::MAX),
                comment_count: agg.comment_count,
                summary_en: summarize(&agg.posts),
                source_urls: serde_json::to_string(&urls).unwrap_or_else(|_| "[]".to_string()),
            })
        })
        .collect()
}

/// One-paragraph summary of the posts that mention a build.
#[must_use]
pub fn summarize(posts: &[&RedditPost]) -> String {
    let Some(top) = posts
        .iter()
        .copied()
        .fold(None::<&RedditPost>, |best, p| match best {
            Some(b) if b.score >= p.score => Some(b),
            _ => Some(p),
        })
    else {
        return String::new();
    };

    let total: i64 = posts.iter().map(|p| p.score).sum();
    let mut parts = vec![if posts.len() > 1 {
        format!("Mentioned in {} posts with total score {total}.", posts.len())
    } else {
        format!("Mentioned in 1 post with score {total}.")
    }];

    let all_text = posts
        .iter()
        .map(|p| format!("{} {}", p.title, p.selftext))
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    let praise: Vec<&str> = POSITIVE_KEYWORDS
        .iter()
        .copied()
        .filter(|kw| all_text.contains(kw))
        .take(SUMMARY_KEYWORDS)
        .collect();
    if !praise.is_empty() {
        parts.push(format!("Praised as: {}.", praise.join(", ")));
    }

    let title: String = top.title.chars().take(SUMMARY_TITLE_CHARS).collect();
    parts.push(format!("Top post: \"{title}\""));
    parts.join(" ")
}
