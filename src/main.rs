//! CLI entry point for capsule-rs

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use capsule_rs::cache::PostCache;
use capsule_rs::config::ContentSourceKind;
use capsule_rs::Site;

#[derive(Parser)]
#[command(name = "capsule-rs")]
#[command(version)]
#[command(about = "Serve a personal site's posts and feed from memory", long_about = None)]
struct Cli {
    /// Set the base directory (defaults to current directory)
    #[arg(short, long, global = true)]
    cwd: Option<PathBuf>,

    /// Enable debug output
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load all posts and start the server
    #[command(alias = "s")]
    Serve {
        /// Port to listen on (defaults to the configured port)
        #[arg(short, long)]
        port: Option<u16>,

        /// IP address to bind to (defaults to the configured address)
        #[arg(short, long)]
        ip: Option<String>,
    },

    /// List posts, newest first
    List {
        /// Print posts as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the RSS feed
    Feed,

    /// Load all posts and report files that were skipped
    Check,

    /// Display version information
    Version,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.debug {
        "capsule_rs=debug,info"
    } else {
        "capsule_rs=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Determine base directory
    let base_dir = match cli.cwd {
        Some(dir) => dir,
        None => std::env::current_dir().context("failed to resolve current directory")?,
    };

    match cli.command {
        Commands::Serve { port, ip } => {
            let site = Site::new(&base_dir)?;
            let cache = load(&site).await?;

            let ip = ip.unwrap_or_else(|| site.config.ip.clone());
            let port = port.unwrap_or(site.config.port);
            capsule_rs::server::start(&site, cache, &ip, port).await?;
        }

        Commands::List { json } => {
            let site = Site::new(&base_dir)?;
            let cache = load(&site).await?;
            let posts = cache.all_posts();

            if json {
                println!("{}", serde_json::to_string_pretty(posts)?);
            } else {
                println!("Date        ID  Title");
                for post in posts {
                    println!(
                        "{}  {}  {}",
                        post.published_at.format("%Y-%m-%d"),
                        post.id,
                        post.title
                    );
                }
                println!("{} posts", posts.len());
            }
        }

        Commands::Feed => {
            let site = Site::new(&base_dir)?;
            let cache = load(&site).await?;
            let feed = cache
                .feed()
                .context("RSS feed could not be generated")?;

            let mut stdout = std::io::stdout().lock();
            stdout.write_all(feed.raw_bytes())?;
            stdout.flush()?;
        }

        Commands::Check => {
            let site = Site::new(&base_dir)?;
            let cache = load(&site).await?;

            for skipped in cache.skipped() {
                println!("skipped {}: {}", skipped.path.display(), skipped.reason);
            }
            println!(
                "{} posts loaded, {} skipped, feed {}",
                cache.all_posts().len(),
                cache.skipped().len(),
                if cache.feed().is_some() { "ok" } else { "unavailable" }
            );
        }

        Commands::Version => {
            println!("capsule-rs version {}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}

/// Build and fill the post cache, bounded by the configured timeout
async fn load(site: &Site) -> Result<Arc<PostCache>> {
    let cache = site.cache();
    let limit = Duration::from_secs(site.config.init_timeout_secs);

    match site.config.content_source {
        ContentSourceKind::Directory => {
            tracing::info!("Loading posts from {:?}", site.content_dir)
        }
        ContentSourceKind::Embedded => tracing::info!(
            "Loading embedded posts from {:?}",
            site.config.embedded_content_dir()
        ),
    }
    cache
        .initialize_within(limit)
        .await
        .context("failed to initialize post cache")?;

    Ok(cache)
}
