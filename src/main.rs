//! Listing-Harvest main entry point
//!
//! This is the command-line interface for the Listing-Harvest page harvester.

use anyhow::Context;
use clap::Parser;
use listing_harvest::config::{load_config_with_hash, Config};
use listing_harvest::crawler::{crawl, Coordinator, CrawlTask, ListingTask, RunMode};
use listing_harvest::output::print_summary;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use url::Url;

/// Listing-Harvest: a concurrent listing and detail page harvester
///
/// Listing-Harvest crawls paginated listing pages for each configured
/// location, deduplicates the extracted listings into one CSV file per
/// location, then fetches each listed item's detail page into its own file.
#[derive(Parser, Debug)]
#[command(name = "listing-harvest")]
#[command(version)]
#[command(about = "A concurrent listing and detail page harvester", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long)]
    dry_run: bool,

    /// Run the listing stage only
    #[arg(long, conflicts_with = "details_only")]
    listings_only: bool,

    /// Run the detail stage only, from listing files of an earlier run
    #[arg(long, conflicts_with = "listings_only")]
    details_only: bool,

    /// Override the number of listing pages crawled per location
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u32).range(1..))]
    pages: Option<u32>,
}

impl Cli {
    fn mode(&self) -> RunMode {
        if self.listings_only {
            RunMode::ListingsOnly
        } else if self.details_only {
            RunMode::DetailsOnly
        } else {
            RunMode::Full
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (mut config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if let Some(pages) = cli.pages {
        tracing::info!("Overriding pages per location: {}", pages);
        config.crawler.pages = pages;
    }

    if cli.dry_run {
        handle_dry_run(config, cli.mode())
    } else {
        handle_crawl(config, cli.mode()).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("listing_harvest=info,warn"),
            1 => EnvFilter::new("listing_harvest=debug,info"),
            2 => EnvFilter::new("listing_harvest=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: validates config and shows what would be crawled
fn handle_dry_run(config: Config, mode: RunMode) -> anyhow::Result<()> {
    println!("=== Listing-Harvest Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Max workers: {}", config.crawler.max_workers);
    println!("  Max retries: {}", config.crawler.max_retries);
    println!("  Pages per location: {}", config.crawler.pages);
    println!("  Batch limit: {}", config.crawler.batch_limit);
    println!("  Dedup key: {:?}", config.crawler.dedup_key);
    println!("  Mode: {:?}", mode);

    println!("\nTransport:");
    println!("  Site: {}", config.site.base_url);
    println!("  Country: {}", config.routing.country);
    match &config.proxy {
        Some(proxy) => println!("  Proxy: {} (wait {}ms)", proxy.endpoint, proxy.wait_ms),
        None => println!("  Proxy: none, fetching directly"),
    }

    println!("\nOutput:");
    println!("  Directory: {}", config.output.directory);

    let base = Url::parse(&config.site.base_url).context("Invalid site base URL")?;
    let coordinator = Coordinator::new(config).context("Failed to build HTTP client")?;
    let locations = &coordinator.config().locations;

    println!("\nLocations ({}):", locations.len());
    for location in locations {
        println!(
            "  - {}, {} -> {}",
            location.locality,
            location.state,
            coordinator.listing_destination(location).display()
        );

        if mode != RunMode::DetailsOnly {
            let tasks = ListingTask::plan(&base, location, coordinator.config().crawler.pages)
                .with_context(|| format!("Failed to plan pages for {}", location.locality))?;
            for task in &tasks {
                println!("    * {}", task.url());
            }
        }
    }

    println!("\n✓ Configuration is valid");
    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config, mode: RunMode) -> anyhow::Result<()> {
    tracing::info!(
        "Locations: {}, pages per location: {}, workers: {}",
        config.locations.len(),
        config.crawler.pages,
        config.crawler.max_workers
    );

    let report = crawl(config, mode).await.context("Crawl failed")?;
    print_summary(&report);

    if report.total_failed() > 0 {
        tracing::warn!(
            "Crawl finished with {} failed task(s)",
            report.total_failed()
        );
    } else {
        tracing::info!("Crawl completed successfully");
    }

    Ok(())
}
