// remote-svg command-line tool.
// Resolves remote SVGs through the persisted cache and manages cached entries.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};

use remote_svg::cache::SweepOutcome;
use remote_svg::{
    Config, FileStore, HttpFetcher, KeyValueStore, MemoryStore, RemoteSvgError, ResourceCache,
    Result,
};

#[derive(Debug, Parser)]
#[command(name = "remote-svg", version, about = "Fetch and cache remote SVG icons")]
struct Cli {
    /// Path to a JSON config file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Resolve one or more URLs concurrently and print their content.
    Fetch {
        #[arg(required = true)]
        urls: Vec<String>,
        /// Freshness window in seconds. Defaults to the configured value.
        #[arg(long)]
        freshness: Option<u64>,
        /// Skip the persisted cache entirely.
        #[arg(long)]
        no_cache: bool,
        /// Print only the size of each resolved payload.
        #[arg(short, long)]
        quiet: bool,
    },
    /// List cached entries.
    List,
    /// Run the global sweep check.
    Sweep {
        /// Sweep now regardless of when the last sweep ran.
        #[arg(long)]
        force: bool,
    },
    /// Delete every cached entry.
    Clear,
    /// Remove the cached entry for one URL.
    Invalidate { url: String },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    remote_svg::logging::init(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Command failed");
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load(cli.config.as_deref())?;
    let store = open_store(&config).await?;
    let fetcher = Arc::new(HttpFetcher::new(&config.user_agent)?);
    let cache = Arc::new(ResourceCache::from_config(&config, store, fetcher));

    match cli.command {
        Command::Fetch {
            urls,
            freshness,
            no_cache,
            quiet,
        } => {
            let mut options = config.resolve_options();
            if let Some(secs) = freshness {
                options.freshness = Duration::from_secs(secs);
            }
            options.cacheable = !no_cache;

            let resolved = futures::future::join_all(urls.iter().map(|url| {
                let cache = Arc::clone(&cache);
                async move { cache.resolve(url, options).await }
            }))
            .await;

            for (url, content) in urls.iter().zip(resolved) {
                if quiet {
                    println!("{}\t{} bytes", url, content.len());
                } else {
                    println!("{}", content);
                }
            }
        }
        Command::List => {
            let entries = cache.entries().await?;
            if entries.is_empty() {
                println!("No cached entries");
            }
            for stored in entries {
                println!(
                    "{}\t{} bytes\t{}",
                    stored.cache_key,
                    stored.entry.content.len(),
                    stored.entry.stored_at.format("%Y-%m-%d %H:%M:%S UTC")
                );
            }
        }
        Command::Sweep { force } => {
            if force {
                let deleted = cache.sweep().force_sweep(cache.store().as_ref()).await?;
                println!("Deleted {} keys", deleted);
            } else {
                match cache.sweep().activate(cache.store().as_ref()).await {
                    SweepOutcome::Swept { deleted } => println!("Deleted {} keys", deleted),
                    SweepOutcome::Initialized => println!("Initialized sweep timestamp"),
                    SweepOutcome::NotDue | SweepOutcome::AlreadyChecked => {
                        println!("Sweep not due")
                    }
                    SweepOutcome::Failed => {
                        return Err(RemoteSvgError::Other("sweep failed".to_string()));
                    }
                }
            }
        }
        Command::Clear => {
            let deleted = cache.clear().await?;
            println!("Deleted {} keys", deleted);
        }
        Command::Invalidate { url } => {
            if cache.invalidate(&url).await? {
                println!("Invalidated {}", url);
            } else {
                println!("No cache key for {}", url);
            }
        }
    }

    Ok(())
}

async fn open_store(config: &Config) -> Result<Arc<dyn KeyValueStore>> {
    if !config.persist {
        return Ok(Arc::new(MemoryStore::new()));
    }

    match config.cache_dir() {
        Some(dir) => Ok(Arc::new(FileStore::open_in(&dir).await?)),
        None => {
            tracing::warn!("No cache directory available, using in-memory store");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}
