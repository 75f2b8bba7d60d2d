mod db;
mod ingest;

use clap::{Args, Parser, Subcommand};
use pbs_core::Source;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "pbs")]
#[command(about = "Path of Exile build-guide ingestion")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Scrape, validate and store builds from one source
    Ingest(IngestArgs),
    /// Database maintenance and queries
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
}

#[derive(Debug, Args)]
struct IngestArgs {
    /// maxroll, mobalytics, youtube or reddit
    #[arg(value_parser = parse_source)]
    source: Source,

    /// Ignore any cached results and fetch from the network
    #[arg(long)]
    no_cache: bool,

    /// Do not write to the database
    #[arg(long)]
    no_db: bool,

    /// Stop listing after this many pages
    #[arg(long)]
    max_pages: Option<usize>,

    /// Process at most this many listed items
    #[arg(long)]
    limit: Option<usize>,

    /// Skip the LLM plausibility check
    #[arg(long)]
    no_semantic: bool,
}

#[derive(Debug, Subcommand)]
enum DbCommands {
    /// Apply pending migrations
    Migrate,
    /// Check the database connection
    Ping,
    /// Show build and rating counts
    Stats,
    /// Full-text search over stored builds
    Search {
        query: String,

        #[arg(long, default_value_t = 20)]
        limit: i64,
    },
}

fn parse_source(value: &str) -> Result<Source, String> {
    value.parse().map_err(|e: pbs_core::CoreError| e.to_string())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = pbs_core::load_app_config()?;

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    match cli.command {
        Some(Commands::Ingest(args)) => ingest::run_ingest(&config, &args).await?,
        Some(Commands::Db { command }) => db::run_db(&config, command).await?,
        None => println!("pbs: nothing to do; try `pbs ingest maxroll` or `pbs --help`"),
    }

    Ok(())
}
