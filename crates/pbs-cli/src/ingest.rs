//! `pbs ingest` handler.

use std::sync::Arc;
use std::time::Duration;

use pbs_core::{AppConfig, Source};
use pbs_scraper::{
    BuildCache, ClaudeCli, FieldExtractor, HttpFetcher, IngestOptions, Ingestor,
    NormalizeContext, PolitenessDelay, RunSummary, SemanticCheck, TextGenerator,
};

use crate::IngestArgs;

/// Translate command-line switches into run options; `--max-pages` overrides
/// the configured page cap.
pub(crate) fn ingest_options(config: &AppConfig, args: &IngestArgs) -> IngestOptions {
    IngestOptions {
        use_cache: !args.no_cache,
        persist: !args.no_db,
        max_pages: args.max_pages.or(config.scraper_max_pages),
        limit: args.limit,
        semantic: config.semantic_validation && !args.no_semantic,
    }
}

/// Run one source end to end and print its summary.
///
/// The rating source reads stored builds, so it opens the database even
/// with `--no-db`; nothing is written in that case.
///
/// # Errors
///
/// Returns an error if the HTTP client cannot be built, the database cannot
/// be opened or migrated, or the store rejects the batch.
pub(crate) async fn run_ingest(config: &AppConfig, args: &IngestArgs) -> anyhow::Result<()> {
    let opts = ingest_options(config, args);

    let fetcher = Arc::new(HttpFetcher::from_app_config(config)?);
    let delay = PolitenessDelay::new(config.scraper_delay_min_ms, config.scraper_delay_max_ms);
    let generator: Arc<dyn TextGenerator> = Arc::new(ClaudeCli::from_app_config(config));
    let llm_timeout = Duration::from_secs(config.llm_timeout_secs);

    let mut ingestor = Ingestor::new(
        fetcher,
        BuildCache::new(&config.cache_dir, config.cache_ttl_hours),
        delay,
        NormalizeContext::from_app_config(config),
    )
    .with_extractor(FieldExtractor::new(Arc::clone(&generator), llm_timeout));
    if opts.semantic {
        ingestor = ingestor.with_semantic_check(SemanticCheck::new(generator, llm_timeout));
    }

    if opts.persist || args.source == Source::Reddit {
        let pool = pbs_db::connect_pool(
            &config.database_path,
            pbs_db::PoolConfig::from_app_config(config),
        )
        .await?;
        pbs_db::run_migrations(&pool).await?;
        ingestor = ingestor.with_pool(pool);
    }

    let summary = ingestor.run(args.source, &opts).await?;
    print_summary(&summary, opts.persist);
    Ok(())
}

fn print_summary(summary: &RunSummary, persisted: bool) {
    let origin = if summary.from_cache { " (from cache)" } else { "" };
    println!("{}{origin}", summary.source);
    println!("  listed:           {}", summary.listed);
    println!("  fetched:          {}", summary.fetched);
    println!("  fetch failures:   {}", summary.fetch_failures);
    println!("  normalized:       {}", summary.normalized);
    println!("  dropped:          {}", summary.dropped_by_normalizer);

    if summary.source == Source::Reddit {
        println!("  ratings saved:    {}", summary.ratings_saved);
        return;
    }

    let report = summary.validation;
    println!("  too short:        {}", report.skipped_structural);
    println!("  garbage:          {}", report.skipped_garbage);
    println!("  implausible:      {}", report.skipped_semantic);
    if persisted {
        println!("  saved:            {}", report.saved);
        println!("  skipped by store: {}", report.skipped_store);
    } else {
        println!("  saved:            (--no-db)");
    }
}
