//! `pbs db` handlers.

use pbs_core::AppConfig;

use crate::DbCommands;

/// # Errors
///
/// Returns an error if the database cannot be opened or a query fails.
pub(crate) async fn run_db(config: &AppConfig, command: DbCommands) -> anyhow::Result<()> {
    let pool = pbs_db::connect_pool(
        &config.database_path,
        pbs_db::PoolConfig::from_app_config(config),
    )
    .await?;

    match command {
        DbCommands::Migrate => {
            let applied = pbs_db::run_migrations(&pool).await?;
            println!("applied {applied} migration(s) to {}", config.database_path.display());
        }
        DbCommands::Ping => {
            pbs_db::ping(&pool).await?;
            println!("database ok: {}", config.database_path.display());
        }
        DbCommands::Stats => {
            pbs_db::run_migrations(&pool).await?;
            print_stats(&pbs_db::build_stats(&pool).await?);
        }
        DbCommands::Search { query, limit } => {
            pbs_db::run_migrations(&pool).await?;
            let hits = pbs_db::search_builds(&pool, &query, limit).await?;
            if hits.is_empty() {
                println!("no builds match '{query}'");
                return Ok(());
            }
            println!("{:<12}{:<40}{:<20}STYLE", "SOURCE", "NAME", "ASCENDANCY");
            for hit in &hits {
                println!(
                    "{:<12}{:<40}{:<20}{}",
                    hit.source,
                    truncate(&hit.name_en, 38),
                    hit.ascendancy_en,
                    hit.combat_style
                );
            }
        }
    }

    Ok(())
}

fn print_stats(stats: &pbs_db::BuildStats) {
    println!("builds: {}", stats.total);
    for (source, count) in &stats.by_source {
        println!("  {source:<12}{count}");
    }
    println!("combat styles:");
    for (style, count) in &stats.by_combat_style {
        println!("  {style:<12}{count}");
    }
    println!("pending translation: {}", stats.pending_translation);
    println!("forum ratings: {}", stats.ratings);
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let head: String = text.chars().take(max_chars - 1).collect();
        format!("{head}…")
    }
}
