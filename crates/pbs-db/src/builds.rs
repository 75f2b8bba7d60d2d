//! Database operations for the `builds` table and its `builds_fts` index.

use pbs_core::BuildRecord;
use sqlx::SqlitePool;

use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// Result of one batch save.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertOutcome {
    /// Rows inserted or overwritten.
    pub saved: usize,
    /// Records refused before reaching SQL (empty `source_id` or name).
    pub skipped: usize,
}

/// Identity and matching fields of a stored build, used by the forum-rating pass.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct BuildRef {
    pub id: i64,
    pub source: String,
    pub source_id: String,
    pub name_en: String,
    pub ascendancy_en: String,
    pub skills_en: Option<String>,
}

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct SearchHit {
    pub id: i64,
    pub source: String,
    pub source_id: String,
    pub name_en: String,
    pub class_en: String,
    pub ascendancy_en: String,
    pub combat_style: String,
    /// bm25 relevance; lower is better.
    pub relevance: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildStats {
    pub total: i64,
    /// `(source, count)` pairs ordered by source name.
    pub by_source: Vec<(String, i64)>,
    /// `(combat_style, count)` pairs ordered by style name.
    pub by_combat_style: Vec<(String, i64)>,
    pub pending_translation: i64,
    pub ratings: i64,
}

// ---------------------------------------------------------------------------
// Writes
// ---------------------------------------------------------------------------

const UPSERT_BUILD_SQL: &str = "\
INSERT INTO builds (
    source, source_id, source_url,
    name_en, class_en, ascendancy_en, skills_en, description_en,
    pros_cons_en, core_equipment_en, author,
    favorites, verified, hc, ssf, cost_tier, patch,
    build_types, playstyle, activities, damage_types,
    combat_style, specialty, translation_status, scraped_at
) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
ON CONFLICT (source, source_id) DO UPDATE SET
    source_url        = excluded.source_url,
    name_en           = excluded.name_en,
    class_en          = excluded.class_en,
    ascendancy_en     = excluded.ascendancy_en,
    skills_en         = excluded.skills_en,
    description_en    = excluded.description_en,
    pros_cons_en      = excluded.pros_cons_en,
    core_equipment_en = excluded.core_equipment_en,
    author            = excluded.author,
    favorites         = excluded.favorites,
    verified          = excluded.verified,
    hc                = excluded.hc,
    ssf               = excluded.ssf,
    cost_tier         = excluded.cost_tier,
    patch             = excluded.patch,
    build_types       = excluded.build_types,
    playstyle         = excluded.playstyle,
    activities        = excluded.activities,
    damage_types      = excluded.damage_types,
    combat_style      = excluded.combat_style,
    specialty         = excluded.specialty,
    translation_status = CASE
        WHEN builds.name_en = excluded.name_en
         AND builds.description_en IS excluded.description_en
         AND builds.pros_cons_en IS excluded.pros_cons_en
         AND builds.core_equipment_en IS excluded.core_equipment_en
        THEN builds.translation_status
        ELSE 'pending'
    END,
    translated_at = CASE
        WHEN builds.name_en = excluded.name_en
         AND builds.description_en IS excluded.description_en
         AND builds.pros_cons_en IS excluded.pros_cons_en
         AND builds.core_equipment_en IS excluded.core_equipment_en
        THEN builds.translated_at
        ELSE NULL
    END,
    scraped_at        = excluded.scraped_at";

/// Insert or overwrite each record keyed by `(source, source_id)`.
///
/// The whole batch runs in one transaction: either every accepted record is
/// written or none is. Records with an empty `source_id` or `name_en` are
/// counted as skipped. Translation state survives an overwrite unless the
/// English text that feeds translation changed.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any statement or the commit fails; the
/// transaction is rolled back.
pub async fn upsert_builds(
    pool: &SqlitePool,
    records: &[BuildRecord],
) -> Result<UpsertOutcome, DbError> {
    let mut outcome = UpsertOutcome::default();
    let mut tx = pool.begin().await?;

    for record in records {
        if record.source_id.trim().is_empty() || record.name_en.trim().is_empty() {
            tracing::warn!(
                source = %record.source,
                source_id = %record.source_id,
                "skipping build with empty key or name"
            );
            outcome.skipped += 1;
            continue;
        }

        sqlx::query(UPSERT_BUILD_SQL)
            .bind(record.source.as_str())
            .bind(&record.source_id)
            .bind(&record.source_url)
            .bind(&record.name_en)
            .bind(&record.class_en)
            .bind(&record.ascendancy_en)
            .bind(&record.skills_en)
            .bind(&record.description_en)
            .bind(&record.pros_cons_en)
            .bind(&record.core_equipment_en)
            .bind(&record.author)
            .bind(record.favorites.max(0))
            .bind(record.verified)
            .bind(record.hardcore)
            .bind(record.ssf)
            .bind(record.cost_tier.map(pbs_core::CostTier::as_str))
            .bind(&record.patch)
            .bind(&record.build_types)
            .bind(&record.playstyle)
            .bind(&record.activities)
            .bind(&record.damage_types)
            .bind(record.combat_style.as_str())
            .bind(record.specialty.to_json())
            .bind(record.translation_status.as_str())
            .bind(record.scraped_at)
            .execute(&mut *tx)
            .await?;

        outcome.saved += 1;
    }

    tx.commit().await?;
    Ok(outcome)
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

/// Count stored builds, optionally restricted to one source.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn count_builds(pool: &SqlitePool, source: Option<&str>) -> Result<i64, DbError> {
    let count = match source {
        Some(source) => {
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM builds WHERE source = ?")
                .bind(source)
                .fetch_one(pool)
                .await?
        }
        None => {
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM builds")
                .fetch_one(pool)
                .await?
        }
    };
    Ok(count)
}

/// List every stored build's identity and matching fields, ordered by id.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_build_refs(pool: &SqlitePool) -> Result<Vec<BuildRef>, DbError> {
    let rows = sqlx::query_as::<_, BuildRef>(
        "SELECT id, source, source_id, name_en, ascendancy_en, skills_en \
         FROM builds ORDER BY id",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Full-text search over name, description and skills, best match first.
///
/// Each whitespace-separated term is quoted so FTS5 operators in user input
/// are matched literally. A blank query returns no rows.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn search_builds(
    pool: &SqlitePool,
    query: &str,
    limit: i64,
) -> Result<Vec<SearchHit>, DbError> {
    let Some(match_expr) = fts_match_expression(query) else {
        return Ok(Vec::new());
    };

    let rows = sqlx::query_as::<_, SearchHit>(
        "SELECT b.id, b.source, b.source_id, b.name_en, b.class_en, b.ascendancy_en, \
                b.combat_style, bm25(builds_fts) AS relevance \
         FROM builds_fts \
         JOIN builds b ON b.id = builds_fts.rowid \
         WHERE builds_fts MATCH ? \
         ORDER BY relevance \
         LIMIT ?",
    )
    .bind(match_expr)
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Aggregate counts for `pbs db stats`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any query fails.
pub async fn build_stats(pool: &SqlitePool) -> Result<BuildStats, DbError> {
    let total = count_builds(pool, None).await?;

    let by_source = sqlx::query_as::<_, (String, i64)>(
        "SELECT source, COUNT(*) FROM builds GROUP BY source ORDER BY source",
    )
    .fetch_all(pool)
    .await?;

    let by_combat_style = sqlx::query_as::<_, (String, i64)>(
        "SELECT combat_style, COUNT(*) FROM builds GROUP BY combat_style ORDER BY combat_style",
    )
    .fetch_all(pool)
    .await?;

    let pending_translation = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM builds WHERE translation_status = 'pending'",
    )
    .fetch_one(pool)
    .await?;

    let ratings = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM reddit_ratings")
        .fetch_one(pool)
        .await?;

    Ok(BuildStats {
        total,
        by_source,
        by_combat_style,
        pending_translation,
        ratings,
    })
}

fn fts_match_expression(query: &str) -> Option<String> {
    let terms: Vec<String> = query
        .split_whitespace()
        .map(|term| format!("\"{}\"", term.replace('"', "\"\"")))
        .collect();
    if terms.is_empty() {
        None
    } else {
        Some(terms.join(" "))
    }
}
