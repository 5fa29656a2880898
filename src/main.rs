//! dealwatch - Storefront discount watcher
//!
//! Scans listings for discounted products and notifies new offers over Telegram.

use anyhow::Result;
use clap::{Parser, Subcommand};
use dealwatch::commands::{ProbeCommand, ScanCommand, StateCommand};
use dealwatch::config::{Config, OutputFormat};
use dealwatch::shop::Source;
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "dealwatch",
    version,
    about = "Storefront discount watcher",
    long_about = "Scans storefront listings for discounted products and notifies each new offer once over Telegram."
)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Proxy URL (e.g., socks5://host:port)
    #[arg(long, global = true, env = "DEALWATCH_PROXY")]
    proxy: Option<String>,

    /// Delay between requests in milliseconds
    #[arg(long, global = true, env = "DEALWATCH_DELAY")]
    delay: Option<u64>,

    /// Output format
    #[arg(short, long, global = true)]
    format: Option<OutputFormat>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan the configured sources and notify new offers
    #[command(alias = "s")]
    Scan {
        /// Minimum discount percentage
        #[arg(short, long, env = "DEALWATCH_THRESHOLD")]
        threshold: Option<u8>,

        /// Maximum candidate links per source
        #[arg(long)]
        max_per_source: Option<usize>,

        /// Maximum listing pages per source
        #[arg(long)]
        max_pages: Option<u32>,

        /// Maximum notifications sent in this run
        #[arg(long)]
        max_notify: Option<usize>,

        /// Extra keyword searches to scan (comma-separated)
        #[arg(long, value_delimiter = ',')]
        search: Option<Vec<String>>,

        /// Required keywords in title (comma-separated)
        #[arg(long, value_delimiter = ',')]
        keywords: Option<Vec<String>>,

        /// Excluded keywords from title (comma-separated)
        #[arg(long, value_delimiter = ',')]
        exclude: Option<Vec<String>>,

        /// Forget previously notified offers before scanning
        #[arg(long)]
        reset: bool,

        /// Print messages instead of sending them; state is not saved
        #[arg(long)]
        dry_run: bool,

        /// Don't fetch product pages for listing items without a visible discount
        #[arg(long)]
        no_details: bool,
    },

    /// Show what would be extracted from a listing or product page
    #[command(alias = "p")]
    Probe {
        /// Absolute listing or product URL
        url: String,
    },

    /// Show or clear the notified-offer state
    State {
        /// Number of recent entries to show
        #[arg(short, long, default_value = "20")]
        limit: usize,

        /// Forget every notified offer
        #[arg(long)]
        clear: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new(Level::DEBUG.to_string())
    } else {
        EnvFilter::from_default_env().add_directive(Level::WARN.into())
    };

    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();

    // Load config with layered overrides
    let mut config = Config::load(cli.config.as_deref())?.with_env();

    // Apply CLI overrides
    if let Some(format) = cli.format {
        config.format = format;
    }
    if let Some(delay) = cli.delay {
        config.delay_ms = delay;
    }
    if let Some(proxy) = cli.proxy {
        config.proxy = Some(proxy);
    }

    match cli.command {
        Commands::Scan {
            threshold,
            max_per_source,
            max_pages,
            max_notify,
            search,
            keywords,
            exclude,
            reset,
            dry_run,
            no_details,
        } => {
            if let Some(t) = threshold {
                config.threshold = t;
            }
            if let Some(m) = max_per_source {
                config.max_per_source = m;
            }
            if let Some(m) = max_pages {
                config.max_pages = m;
            }
            if let Some(m) = max_notify {
                config.max_notifications = m;
            }
            if let Some(queries) = search {
                config.sources.extend(queries.into_iter().map(|query| Source::Search { query }));
            }
            if let Some(kw) = keywords {
                config.keywords = kw;
            }
            if let Some(ex) = exclude {
                config.exclude_keywords = ex;
            }
            if no_details {
                config.fetch_details = false;
            }

            let cmd = ScanCommand::new(config).dry_run(dry_run);
            let output = cmd.execute(reset).await?;
            println!("{}", output);
        }

        Commands::Probe { url } => {
            let cmd = ProbeCommand::new(config);
            let output = cmd.execute(&url).await?;
            println!("{}", output);
        }

        Commands::State { limit, clear } => {
            let cmd = StateCommand::new(config);
            let output = cmd.execute(limit, clear)?;
            println!("{}", output);
        }
    }

    Ok(())
}
