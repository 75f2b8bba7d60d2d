//! Ingestion orchestration: listing, detail fetch, normalize, validate, persist.
//!
//! One sequential flow per source run. Transient fetch failures are logged and
//! the item skipped; only a store failure aborts a run.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use pbs_core::{BuildRecord, Source};
use serde::Serialize;
use sqlx::SqlitePool;

use crate::cache::BuildCache;
use crate::error::ScraperError;
use crate::extract::FieldExtractor;
use crate::fetch::PageFetcher;
use crate::html::page_text;
use crate::rate_limit::PolitenessDelay;
use crate::sources::{
    self, maxroll, mobalytics, reddit, youtube, NormalizeContext, RawBuild, VideoBuild,
};
use crate::validate::{SemanticCheck, ValidationPipeline, ValidationReport};

/// Where a run currently is. Logged on every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestState {
    Idle,
    Listing,
    DetailFetch,
    Normalize,
    Validate,
    Persisted,
    Dropped,
}

/// Per-run switches, usually taken from the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestOptions {
    /// Read `{cache_dir}/{source}_builds.json` before touching the network.
    pub use_cache: bool,
    /// Write accepted records (or ratings) to the store.
    pub persist: bool,
    /// Listing page cap; `None` walks until there is no next page.
    pub max_pages: Option<usize>,
    /// Keep only the first `n` listed items.
    pub limit: Option<usize>,
    /// Run the LLM plausibility layer when a checker is configured.
    pub semantic: bool,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            use_cache: true,
            persist: true,
            max_pages: None,
            limit: None,
            semantic: true,
        }
    }
}

/// Counts reported at the end of every run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub source: Source,
    pub from_cache: bool,
    pub listed: usize,
    pub fetched: usize,
    pub fetch_failures: usize,
    pub normalized: usize,
    pub dropped_by_normalizer: usize,
    pub validation: ValidationReport,
    /// Rows written by a rating run.
    pub ratings_saved: usize,
}

impl RunSummary {
    fn new(source: Source) -> Self {
        Self {
            source,
            from_cache: false,
            listed: 0,
            fetched: 0,
            fetch_failures: 0,
            normalized: 0,
            dropped_by_normalizer: 0,
            validation: ValidationReport::default(),
            ratings_saved: 0,
        }
    }
}

struct Run {
    summary: RunSummary,
    state: IngestState,
}

impl Run {
    fn new(source: Source) -> Self {
        Self {
            summary: RunSummary::new(source),
            state: IngestState::Idle,
        }
    }

    fn enter(&mut self, next: IngestState) {
        if self.state != next {
            tracing::debug!(
                source = %self.summary.source,
                from = ?self.state,
                to = ?next,
                "ingest state"
            );
            self.state = next;
        }
    }

    fn keep(&mut self, normalized: Option<BuildRecord>, records: &mut Vec<BuildRecord>) {
        if let Some(record) = normalized {
            self.summary.normalized += 1;
            records.push(record);
        } else {
            self.summary.dropped_by_normalizer += 1;
            self.enter(IngestState::Dropped);
        }
    }
}

/// Orchestrates source runs over shared collaborators.
pub struct Ingestor {
    fetcher: Arc<dyn PageFetcher>,
    cache: BuildCache,
    delay: PolitenessDelay,
    ctx: NormalizeContext,
    extractor: Option<FieldExtractor>,
    semantic: Option<SemanticCheck>,
    pool: Option<SqlitePool>,
}

impl Ingestor {
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        cache: BuildCache,
        delay: PolitenessDelay,
        ctx: NormalizeContext,
    ) -> Self {
        Self {
            fetcher,
            cache,
            delay,
            ctx,
            extractor: None,
            semantic: None,
            pool: None,
        }
    }

    /// Enables detail-page enrichment (site B) and transcript extraction (video).
    #[must_use]
    pub fn with_extractor(mut self, extractor: FieldExtractor) -> Self {
        self.extractor = Some(extractor);
        self
    }

    #[must_use]
    pub fn with_semantic_check(mut self, check: SemanticCheck) -> Self {
        self.semantic = Some(check);
        self
    }

    #[must_use]
    pub fn with_pool(mut self, pool: SqlitePool) -> Self {
        self.pool = Some(pool);
        self
    }

    /// Run one source end to end.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::Store`] when persisting fails. Fetch, parse and
    /// extraction failures are logged and counted, never returned.
    pub async fn run(&self, source: Source, opts: &IngestOptions) -> Result<RunSummary, ScraperError> {
        let mut run = Run::new(source);
        tracing::info!(source = %source, ?opts, "ingest started");

        if source == Source::Reddit {
            self.run_ratings(&mut run, opts).await?;
            run.enter(IngestState::Idle);
            return Ok(run.summary);
        }

        let cached = if opts.use_cache {
            self.cache.load(source).await
        } else {
            None
        };
        let mut records = if let Some(builds) = cached {
            run.summary.from_cache = true;
            run.summary.listed = builds.len();
            run.summary.normalized = builds.len();
            builds
        } else {
            let collected = match source {
                Source::Maxroll => self.collect_maxroll(&mut run, opts).await,
                Source::Mobalytics => self.collect_mobalytics(&mut run, opts).await,
                Source::Youtube => self.collect_youtube(&mut run, opts).await,
                Source::Reddit => Vec::new(),
            };
            if collected.is_empty() {
                tracing::debug!(source = %source, "nothing collected; cache left untouched");
            } else if let Err(e) = self.cache.save(source, &collected).await {
                tracing::warn!(source = %source, error = %e, "could not write cache");
            }
            collected
        };
        if let Some(limit) = opts.limit {
            records.truncate(limit);
        }

        run.enter(IngestState::Validate);
        let semantic = if opts.semantic { self.semantic.clone() } else { None };
        let mut validation = ValidationPipeline::new(semantic);
        let accepted = validation.validate_all(records).await;

        if opts.persist {
            if let Some(pool) = &self.pool {
                let outcome = pbs_db::upsert_builds(pool, &accepted).await?;
                validation.record_store_outcome(outcome);
                run.enter(IngestState::Persisted);
            } else {
                tracing::warn!(source = %source, "no store configured; results not persisted");
            }
        }

        run.summary.validation = validation.report();
        run.enter(IngestState::Idle);
        log_summary(&run.summary);
        Ok(run.summary)
    }

    /// Fetch a detail page, retrying once after a politeness pause.
    async fn fetch_detail(&self, run: &mut Run, url: &str) -> Option<String> {
        run.enter(IngestState::DetailFetch);
        match self.fetcher.fetch_text(url).await {
            Ok(body) => {
                run.summary.fetched += 1;
                return Some(body);
            }
            Err(e) => tracing::warn!(url, error = %e, "detail fetch failed; retrying once"),
        }
        self.delay.wait().await;
        match self.fetcher.fetch_text(url).await {
            Ok(body) => {
                run.summary.fetched += 1;
                Some(body)
            }
            Err(e) => {
                tracing::warn!(url, error = %e, "detail fetch failed twice; skipping");
                run.summary.fetch_failures += 1;
                run.enter(IngestState::Dropped);
                None
            }
        }
    }

    async fn collect_maxroll(&self, run: &mut Run, opts: &IngestOptions) -> Vec<BuildRecord> {
        run.enter(IngestState::Listing);
        let mut hits = Vec::new();
        let mut seen = HashSet::new();
        let mut page = 1;

        loop {
            if opts.max_pages.is_some_and(|cap| page > cap) {
                break;
            }
            let url = maxroll::listing_url(page);
            let html = match self.fetcher.fetch_text(&url).await {
                Ok(html) => html,
                Err(e) => {
                    tracing::warn!(page, error = %e, "maxroll listing fetch failed");
                    break;
                }
            };
            let found = match maxroll::parse_listing(&html) {
                Ok(found) => found,
                Err(e) => {
                    tracing::warn!(page, error = %e, "maxroll listing unparsable");
                    break;
                }
            };
            if found.is_empty() {
                break;
            }
            let before = hits.len();
            for hit in found {
                if seen.insert(hit.permalink.clone()) {
                    hits.push(hit);
                }
            }
            tracing::info!(page, new_hits = hits.len() - before, "maxroll listing page");
            if !maxroll::has_next_page(&html) {
                break;
            }
            page += 1;
            self.delay.wait().await;
        }

        truncate_to(&mut hits, opts.limit);
        run.summary.listed = hits.len();

        let mut records = Vec::new();
        for hit in hits {
            self.delay.wait().await;
            let Some(html) = self.fetch_detail(run, &hit.detail_url()).await else {
                continue;
            };
            run.enter(IngestState::Normalize);
            let raw = RawBuild::SiteA(maxroll::parse_detail(&html, &hit));
            run.keep(sources::normalize(raw, &self.ctx), &mut records);
        }
        records
    }

    async fn collect_mobalytics(&self, run: &mut Run, opts: &IngestOptions) -> Vec<BuildRecord> {
        run.enter(IngestState::Listing);
        let mut builds = Vec::new();
        let mut seen = HashSet::new();

        for (i, tab) in mobalytics::TABS.iter().enumerate() {
            if i > 0 {
                self.delay.wait().await;
            }
            let html = match self.fetcher.fetch_text(&mobalytics::listing_url(tab)).await {
                Ok(html) => html,
                Err(e) => {
                    tracing::warn!(tab, error = %e, "mobalytics listing fetch failed");
                    continue;
                }
            };
            match mobalytics::parse_listing(&html, tab) {
                Ok(found) => {
                    for build in found {
                        if seen.insert(build.source_id.clone()) {
                            builds.push(build);
                        }
                    }
                }
                Err(e) => tracing::warn!(tab, error = %e, "mobalytics listing unparsable"),
            }
        }

        truncate_to(&mut builds, opts.limit);
        run.summary.listed = builds.len();

        let mut records = Vec::new();
        for build in builds {
            let detail_url = build.detail_url();
            run.enter(IngestState::Normalize);
            let Some(mut record) = sources::normalize(RawBuild::SiteB(build), &self.ctx) else {
                run.keep(None, &mut records);
                continue;
            };

            if let Some(extractor) = &self.extractor {
                self.delay.wait().await;
                if let Some(html) = self.fetch_detail(run, &detail_url).await {
                    let text = page_text(&html);
                    let draft = extractor.extract(&text, &record.name_en).await;
                    mobalytics::enrich(&mut record, draft, &text);
                }
            }
            run.keep(Some(record), &mut records);
        }
        records
    }

    async fn collect_youtube(&self, run: &mut Run, opts: &IngestOptions) -> Vec<BuildRecord> {
        let Some(extractor) = &self.extractor else {
            tracing::warn!("video ingestion needs a field extractor; nothing collected");
            return Vec::new();
        };

        run.enter(IngestState::Listing);
        let mut candidates = Vec::new();
        let mut seen = HashSet::new();
        for (i, query) in youtube::SEARCH_QUERIES.iter().enumerate() {
            if i > 0 {
                self.delay.wait().await;
            }
            let found = match self.fetcher.fetch_text(&youtube::search_feed_url(query)).await {
                Ok(xml) => youtube::parse_feed(&xml),
                Err(e) => Err(e),
            };
            match found {
                Ok(found) => {
                    for candidate in found {
                        if seen.insert(candidate.video_id.clone()) {
                            candidates.push(candidate);
                        }
                    }
                }
                Err(e) => tracing::warn!(query, error = %e, "video search failed"),
            }
        }

        let mut ranked = youtube::rank_candidates(candidates, Utc::now(), youtube::TOP_SCORED);
        ranked.truncate(youtube::TOP_PROCESSED);
        truncate_to(&mut ranked, opts.limit);
        run.summary.listed = ranked.len();

        let mut records = Vec::new();
        for candidate in ranked {
            self.delay.wait().await;
            let Some(xml) = self
                .fetch_detail(run, &youtube::transcript_url(&candidate.video_id))
                .await
            else {
                continue;
            };
            let transcript = match youtube::parse_transcript(&xml) {
                Ok(text) => text,
                Err(e) => {
                    tracing::warn!(video_id = %candidate.video_id, error = %e, "transcript unparsable");
                    String::new()
                }
            };
            let draft = extractor
                .extract_transcript(&transcript, &candidate.title)
                .await;
            run.enter(IngestState::Normalize);
            let raw = RawBuild::Video(VideoBuild::from_candidate(candidate, draft));
            run.keep(sources::normalize(raw, &self.ctx), &mut records);
        }
        records
    }

    /// Rate stored builds from forum posts and replace the ratings table.
    async fn run_ratings(&self, run: &mut Run, opts: &IngestOptions) -> Result<(), ScraperError> {
        let Some(pool) = &self.pool else {
            tracing::warn!("rating run needs the build store; nothing to do");
            return Ok(());
        };
        let builds = pbs_db::list_build_refs(pool).await?;
        if builds.is_empty() {
            tracing::warn!("no stored builds to rate");
            return Ok(());
        }

        run.enter(IngestState::Listing);
        let mut queries: Vec<String> = reddit::BASE_QUERIES.iter().map(ToString::to_string).collect();
        queries.extend(reddit::top_skill_queries(&builds, reddit::TOP_SKILL_QUERIES));
        let mut posts = reddit::collect_posts(self.fetcher.as_ref(), &self.delay, &queries).await;
        truncate_to(&mut posts, opts.limit);
        run.summary.listed = posts.len();
        run.summary.fetched = posts.len();

        run.enter(IngestState::Normalize);
        let ratings = reddit::rate_builds(&posts, &builds);
        run.summary.normalized = ratings.len();

        if opts.persist {
            run.summary.ratings_saved = pbs_db::replace_ratings(pool, &ratings).await?;
            run.enter(IngestState::Persisted);
        }
        tracing::info!(
            posts = run.summary.listed,
            rated_builds = ratings.len(),
            saved = run.summary.ratings_saved,
            "rating run finished"
        );
        Ok(())
    }
}

fn truncate_to<T>(items: &mut Vec<T>, limit: Option<usize>) {
    if let Some(limit) = limit {
        items.truncate(limit);
    }
}

fn log_summary(summary: &RunSummary) {
    tracing::info!(
        source = %summary.source,
        from_cache = summary.from_cache,
        listed = summary.listed,
        fetched = summary.fetched,
        fetch_failures = summary.fetch_failures,
        normalized = summary.normalized,
        dropped = summary.dropped_by_normalizer,
        saved = summary.validation.saved,
        rejected = summary.validation.rejected(),
        "ingest finished"
    );
}

#[cfg(test)]
#[path = "pipeline_test.rs"]
mod tests;
