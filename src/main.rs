use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use media_cache::refine::{SeriesFilter, SortOrder};
use media_cache::observe::Observers;
use media_cache::{CacheConfig, CacheLookup, CacheObserver, Category, CountingObserver, LogObserver};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "media-cache", version, about = "Query the local media search cache")]
struct Cli {
    /// JSON config file (defaults to the per-user config, if any)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Cache database, overrides config and MEDIA_CACHE_DB
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Abort a lookup after this many milliseconds
    #[arg(long, global = true)]
    timeout_ms: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Search cached titles in one category
    Lookup {
        term: String,

        #[arg(short, long)]
        category: String,

        #[arg(long, requires = "episode")]
        season: Option<u32>,

        #[arg(long, requires = "season")]
        episode: Option<u32>,

        /// quality | sizeasc | sizedesc | qualitythensize
        #[arg(long)]
        sort: Option<String>,

        /// Print cache signal counters as JSON on stderr
        #[arg(long)]
        stats: bool,
    },
    /// List the categories this configuration allows
    Categories,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;

    match cli.command {
        Command::Lookup {
            term,
            category,
            season,
            episode,
            sort,
            stats,
        } => {
            let sort = sort.map(|s| s.parse::<SortOrder>()).transpose()?;
            let category: Category = category.parse()?;
            let counter = Arc::new(CountingObserver::new());
            let observers: Vec<Arc<dyn CacheObserver>> = vec![Arc::new(LogObserver), counter.clone()];
            let lookup = CacheLookup::from_config(&config).with_observer(Arc::new(Observers(observers)));

            let mut records = lookup.lookup(&term, category).await?;
            if let (Some(season), Some(episode)) = (season, episode) {
                records = SeriesFilter::new(season, episode).apply(records);
            }
            if let Some(order) = sort {
                order.sort(&mut records);
            }
            println!("{}", serde_json::to_string_pretty(&records)?);
            if stats {
                eprintln!("{}", serde_json::to_string(&counter.snapshot())?);
            }
        }
        Command::Categories => {
            for category in &config.categories {
                println!("{}\t{}", category, category.table_name());
            }
        }
    }
    Ok(())
}

fn load_config(cli: &Cli) -> Result<CacheConfig> {
    let mut config = match &cli.config {
        Some(path) => CacheConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => CacheConfig::load_default()?,
    };
    config.apply_env()?;
    if let Some(db) = &cli.db {
        config.db_path = db.clone();
    }
    if let Some(ms) = cli.timeout_ms {
        config.timeout_ms = Some(ms);
    }
    config.validate()?;
    Ok(config)
}
