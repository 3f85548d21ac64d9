//! onionwatch CLI
//!
//! Onion service discovery crawler with PGP key reuse detection.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use onionwatch_core::{seed_addresses, DEFAULT_CONCURRENCY, DEFAULT_DETECTOR_INTERVAL_SECS};
use onionwatch_runtime::{CrawlConfig, Crawler, DetectorConfig, KeyReuseDetector, SystemClock};
use onionwatch_store::{
    write_report, FingerprintLedger, OutcomeSinks, ScanStore, SinkPaths, DEFAULT_LEDGER_FILE,
    DEFAULT_REPORT_FILE,
};
use onionwatch_tor::{TorConfig, TorFetcher};

const DEFAULT_DB_FILE: &str = "onions.db";

#[derive(Parser)]
#[command(name = "onionwatch")]
#[command(author, version, about = "onionwatch: onion discovery and PGP key reuse detection", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbosity level (0-3)
    #[arg(short, long, default_value = "1")]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl onion services until interrupted
    Crawl {
        /// Scan store database
        #[arg(long, default_value = DEFAULT_DB_FILE)]
        db: PathBuf,

        /// Directory for the JSONL outcome logs
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,

        /// Concurrent fetches per batch
        #[arg(short, long, default_value_t = DEFAULT_CONCURRENCY)]
        concurrency: usize,

        /// Tor SOCKS proxy (or set TOR_PROXY env var)
        #[arg(long, env = "TOR_PROXY", default_value = "socks5h://127.0.0.1:9050")]
        proxy: String,
    },

    /// Watch the scan store for reused PGP keys until interrupted
    Monitor {
        /// Scan store database written by `crawl`
        #[arg(long, default_value = DEFAULT_DB_FILE)]
        db: PathBuf,

        /// Ledger of already reported fingerprints
        #[arg(long, default_value = DEFAULT_LEDGER_FILE)]
        ledger: PathBuf,

        /// Report file new matches are appended to
        #[arg(long, default_value = DEFAULT_REPORT_FILE)]
        report: PathBuf,

        /// Seconds between scans
        #[arg(long, default_value_t = DEFAULT_DETECTOR_INTERVAL_SECS)]
        interval: u64,
    },

    /// Rewrite the report from the fingerprint ledger
    Report {
        #[arg(long, default_value = DEFAULT_LEDGER_FILE)]
        ledger: PathBuf,

        #[arg(long, default_value = DEFAULT_REPORT_FILE)]
        report: PathBuf,
    },

    /// Show scan store totals
    Stats {
        #[arg(long, default_value = DEFAULT_DB_FILE)]
        db: PathBuf,
    },

    /// Check Tor connection status
    Status {
        #[arg(long, env = "TOR_PROXY", default_value = "socks5h://127.0.0.1:9050")]
        proxy: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let log_level = match cli.verbose {
        0 => Level::ERROR,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .init();

    match cli.command {
        Commands::Crawl {
            db,
            out_dir,
            concurrency,
            proxy,
        } => run_crawl(db, out_dir, concurrency, &proxy).await?,
        Commands::Monitor {
            db,
            ledger,
            report,
            interval,
        } => run_monitor(db, ledger, report, interval).await?,
        Commands::Report { ledger, report } => rebuild_report(ledger, report)?,
        Commands::Stats { db } => show_stats(db)?,
        Commands::Status { proxy } => check_status(&proxy).await?,
    }

    Ok(())
}

/// Cancel the token on Ctrl-C
fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("🛑 Interrupted by user");
            token.cancel();
        }
    });
    cancel
}

async fn run_crawl(db: PathBuf, out_dir: PathBuf, concurrency: usize, proxy: &str) -> Result<()> {
    let tor_config = TorConfig::default().with_socks_addr(proxy);
    let fetcher = TorFetcher::new(&tor_config)?;

    let store = ScanStore::open(&db)
        .with_context(|| format!("failed to open scan store: {}", db.display()))?;
    let sinks = OutcomeSinks::open(&SinkPaths::in_dir(&out_dir))?;

    let config = CrawlConfig {
        concurrency,
        ..CrawlConfig::default()
    };

    let mut crawler = Crawler::new(config, Arc::new(fetcher), store, sinks, SystemClock)?;
    crawler.seed(seed_addresses());

    crawler.run(cancel_on_ctrl_c()).await?;
    Ok(())
}

async fn run_monitor(db: PathBuf, ledger: PathBuf, report: PathBuf, interval: u64) -> Result<()> {
    let store = ScanStore::open_read_only(&db)
        .with_context(|| format!("failed to open scan store: {} (has `crawl` run yet?)", db.display()))?;
    let ledger = FingerprintLedger::open(&ledger)
        .with_context(|| format!("failed to open ledger: {}", ledger.display()))?;

    let config = DetectorConfig {
        interval: Duration::from_secs(interval),
        report_path: report,
    };

    let mut detector = KeyReuseDetector::bootstrap(config, store, ledger, SystemClock)?;
    detector.run(cancel_on_ctrl_c()).await?;
    Ok(())
}

fn rebuild_report(ledger: PathBuf, report: PathBuf) -> Result<()> {
    let ledger = FingerprintLedger::open(&ledger)
        .with_context(|| format!("failed to open ledger: {}", ledger.display()))?;
    let rows = ledger.all()?;

    write_report(&report, &rows)?;
    println!("📄 Wrote {} reused key(s) to {}", rows.len(), report.display());
    Ok(())
}

fn show_stats(db: PathBuf) -> Result<()> {
    let store = ScanStore::open_read_only(&db)
        .with_context(|| format!("failed to open scan store: {}", db.display()))?;
    let stats = store.stats()?;

    println!("📊 Scan store: {}", db.display());
    println!("   Scanned addresses: {}", stats.total);
    println!("   Live (200):        {}", stats.active);
    println!("   Failed fetches:    {}", stats.failed);
    println!("   With key material: {}", stats.keyed);
    Ok(())
}

async fn check_status(proxy: &str) -> Result<()> {
    println!("🔌 Checking Tor connection...\n");

    let config = TorConfig::default().with_socks_addr(proxy);

    match onionwatch_tor::check_tor_connection(&config).await {
        Ok(true) => {
            println!("✅ Tor is running and accessible");
            println!("   Proxy: {}", config.socks_addr);
        }
        Ok(false) => {
            println!("❌ Tor is not accessible");
            println!("   Expected proxy at: {}", config.socks_addr);
            println!("\n   To install Tor:");
            println!("   - Linux: sudo apt install tor");
            println!("   - Mac: brew install tor");
            println!("   - Then start: sudo systemctl start tor (or brew services start tor)");
        }
        Err(e) => {
            warn!("Tor check failed: {}", e);
            println!("❌ Error checking Tor: {}", e);
        }
    }

    Ok(())
}
