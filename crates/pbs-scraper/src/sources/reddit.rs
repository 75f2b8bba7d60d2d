//! Reddit build ratings via the public `.json` search endpoint.
//!
//! Posts are collected per subreddit and query, then matched against stored
//! builds and aggregated into [`pbs_core::BuildRating`] rows.

use std::collections::HashSet;

use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use serde::Deserialize;

use crate::error::ScraperError;
use crate::fetch::PageFetcher;
use crate::rate_limit::PolitenessDelay;

pub use super::reddit_helpers::{rate_builds, top_skill_queries};

pub const SUBREDDITS: &[&str] = &["pathofexile", "PathOfExileBuilds"];
pub const BASE_QUERIES: &[&str] = &[
    "3.27",
    "league starter 3.27",
    "keepers of the flame build",
    "build guide 3.27",
];

/// Skill-derived queries added to [`BASE_QUERIES`].
pub const TOP_SKILL_QUERIES: usize = 10;

/// Only this subreddit is restricted to guide-flaired posts.
const FLAIR_FILTERED_SUBREDDIT: &str = "pathofexile";
const GUIDE_FLAIR: &str = "build guide";
const SITE_ORIGIN: &str = "https://www.reddit.com";

#[derive(Debug, Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Debug, Deserialize)]
struct ListingData {
    #[serde(default)]
    children: Vec<Child>,
}

#[derive(Debug, Deserialize)]
struct Child {
    data: PostData,
}

#[derive(Debug, Deserialize)]
struct PostData {
    title: Option<String>,
    selftext: Option<String>,
    score: Option<i64>,
    num_comments: Option<i64>,
    upvote_ratio: Option<f64>,
    permalink: Option<String>,
    link_flair_text: Option<String>,
}

/// A search result reduced to the fields rating needs.
#[derive(Debug, Clone, PartialEq)]
pub struct RedditPost {
    pub title: String,
    pub selftext: String,
    pub score: i64,
    pub num_comments: i64,
    pub upvote_ratio: f64,
    pub url: String,
    pub flair: String,
}

impl From<PostData> for RedditPost {
    fn from(data: PostData) -> Self {
        Self {
            title: data.title.unwrap_or_default(),
            selftext: data.selftext.unwrap_or_default(),
            score: data.score.unwrap_or(0),
            num_comments: data.num_comments.unwrap_or(0),
            upvote_ratio: data.upvote_ratio.unwrap_or(0.5),
            url: format!("{SITE_ORIGIN}{}", data.permalink.unwrap_or_default()),
            flair: data.link_flair_text.unwrap_or_default(),
        }
    }
}

#[must_use]
pub fn search_url(subreddit: &str, query: &str) -> String {
    let q = utf8_percent_encode(query, NON_ALPHANUMERIC).to_string();
    format!(
        "{SITE_ORIGIN}/r/{subreddit}/search.json?q={q}&restrict_sr=on&sort=relevance&t=month&limit=50"
    )
}

/// # Errors
///
/// Returns [`ScraperError::Deserialize`] if the body is not a search listing.
pub fn parse_search(body: &str) -> Result<Vec<RedditPost>, ScraperError> {
    let listing: Listing = serde_json::from_str(body).map_err(|source| ScraperError::Deserialize {
        context: "reddit search listing".to_string(),
        source,
    })?;
    Ok(listing
        .data
        .children
        .into_iter()
        .map(|child| RedditPost::from(child.data))
        .collect())
}

/// Search every subreddit for every query, keeping guide-flaired posts on
/// the main subreddit and deduplicating by URL.
///
/// A failed search is logged and skipped.
pub async fn collect_posts(
    fetcher: &dyn PageFetcher,
    delay: &PolitenessDelay,
    queries: &[String],
) -> Vec<RedditPost> {
    let mut posts = Vec::new();
    let mut seen_urls = HashSet::new();

    for subreddit in SUBREDDITS {
        for query in queries {
            let url = search_url(subreddit, query);
            let found = match fetcher.fetch_text(&url).await.and_then(|body| parse_search(&body)) {
                Ok(found) => found,
                Err(e) => {
                    tracing::warn!(subreddit, query = %query, error = %e, "reddit search failed");
                    delay.wait().await;
                    continue;
                }
            };

            let before = posts.len();
            for post in found {
                if *subreddit == FLAIR_FILTERED_SUBREDDIT && post.flair.to_lowercase() != GUIDE_FLAIR {
                    continue;
                }
                if seen_urls.insert(post.url.clone()) {
                    posts.push(post);
                }
            }
            tracing::debug!(
                subreddit,
                query = %query,
                new_posts = posts.len() - before,
                "reddit search page"
            );
            delay.wait().await;
        }
    }

    tracing::info!(posts = posts.len(), "collected reddit posts");
    posts
}
