//! Database operations for the `reddit_ratings` table.

use chrono::Utc;
use pbs_core::BuildRating;
use sqlx::SqlitePool;

use crate::DbError;

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct RatingRow {
    pub id: i64,
    pub build_id: i64,
    pub build_name_matched: String,
    pub score: i64,
    pub weighted_score: f64,
    pub mention_count: i64,
    pub comment_count: i64,
    pub sentiment: String,
    pub summary_en: String,
    pub source_urls: String,
}

/// Replace the whole ratings table with `ratings` in one transaction.
///
/// Each rating is attached to the build identified by
/// `(build_source, build_source_id)`; ratings whose build is no longer stored
/// are dropped. Returns the number of rows written.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any statement or the commit fails; the
/// previous ratings are then left untouched.
pub async fn replace_ratings(pool: &SqlitePool, ratings: &[BuildRating]) -> Result<usize, DbError> {
    let scraped_at = Utc::now();
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM reddit_ratings")
        .execute(&mut *tx)
        .await?;

    let mut written = 0usize;
    for rating in ratings {
        let result = sqlx::query(
            "INSERT INTO reddit_ratings \
                 (build_id, build_name_matched, score, weighted_score, mention_count, \
                  comment_count, sentiment, summary_en, source_urls, scraped_at) \
             SELECT id, ?, ?, ?, ?, ?, 'positive', ?, ?, ? \
             FROM builds WHERE source = ? AND source_id = ?",
        )
        .bind(&rating.build_name_matched)
        .bind(rating.score)
        .bind(rating.weighted_score)
        .bind(rating.mention_count)
        .bind(rating.comment_count)
        .bind(&rating.summary_en)
        .bind(&rating.source_urls)
        .bind(scraped_at)
        .bind(rating.build_source.as_str())
        .bind(&rating.build_source_id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tracing::warn!(
                source = %rating.build_source,
                source_id = %rating.build_source_id,
                "rating references a build that is not stored"
            );
        } else {
            written += 1;
        }
    }

    tx.commit().await?;
    Ok(written)
}

/// List ratings, highest weighted score first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_ratings(pool: &SqlitePool) -> Result<Vec<RatingRow>, DbError> {
    let rows = sqlx::query_as::<_, RatingRow>(
        "SELECT id, build_id, build_name_matched, score, weighted_score, mention_count, \
                comment_count, sentiment, summary_en, source_urls \
         FROM reddit_ratings \
         ORDER BY weighted_score DESC, id",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}
