use clap::Parser;
use nw_core::{Fetcher, HttpFetcher, Result};
use nw_scrapers::cli::{build_coordinator, format_sources};
use nw_scrapers::logging::init_logging;
use nw_scrapers::{get_adapters, handle_command, ScraperArgs, ScraperCommands, SourcesConfig};
use nw_storage::StorageKind;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, Level};

mod schedule;

use schedule::{Hours, Schedule};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct HumanDuration(Duration);

impl FromStr for HumanDuration {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let mut total_millis = 0u64;
        let mut current_number = String::new();
        let mut chars = s.trim().chars().peekable();

        while let Some(c) = chars.next() {
            if c.is_ascii_digit() {
                current_number.push(c);
                continue;
            }
            if c.is_whitespace() {
                continue;
            }
            let num: u64 = current_number
                .parse()
                .map_err(|_| format!("Missing number before unit: {}", c))?;
            let unit_millis = match c {
                'm' if chars.peek() == Some(&'s') => {
                    chars.next();
                    1
                }
                's' => 1_000,
                'm' => 60_000,
                'h' => 3_600_000,
                'd' => 86_400_000,
                _ => return Err(format!("Invalid duration unit: {}", c)),
            };
            total_millis = add_millis(total_millis, num, unit_millis)?;
            current_number.clear();
        }

        // a trailing bare number is seconds
        if !current_number.is_empty() {
            let num: u64 = current_number.parse().map_err(|_| "Invalid number in duration".to_string())?;
            total_millis = add_millis(total_millis, num, 1_000)?;
        } else if s.trim().is_empty() {
            return Err("Duration must include a number".to_string());
        }

        Ok(HumanDuration(Duration::from_millis(total_millis)))
    }
}

fn add_millis(total: u64, num: u64, unit_millis: u64) -> std::result::Result<u64, String> {
    num.checked_mul(unit_millis)
        .and_then(|millis| total.checked_add(millis))
        .ok_or_else(|| "Duration is too large".to_string())
}

#[derive(Parser, Debug)]
#[command(name = "newswire", author, version, about = "Periodic news ingestion into a deduplicated article store", long_about = None)]
struct Cli {
    /// Storage backend: memory or sqlite
    #[arg(long, default_value = "sqlite")]
    storage: StorageKind,
    /// SQLite database file
    #[arg(long)]
    database: Option<String>,
    /// JSON file with per-source overrides
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long, default_value = "info")]
    log_level: Level,
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    #[command(flatten)]
    Scraper(ScraperCommands),
    /// Ingest at fixed UTC hours until interrupted
    Schedule {
        /// Region, site or lane to restrict the runs to
        source: Option<String>,
        /// Comma-separated UTC hours
        #[arg(long, default_value = schedule::DEFAULT_HOURS)]
        hours: Hours,
        /// Upper bound of the random delay before each run (e.g. 10s, 1m30s, 500ms)
        #[arg(long, default_value = "10s")]
        jitter: HumanDuration,
        #[arg(long, default_value_t = 1)]
        concurrency: usize,
        #[arg(long)]
        persist_failed: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_level);

    let config = match &cli.config {
        Some(path) => {
            info!("⚙️ Loading source overrides from {}", path.display());
            SourcesConfig::load(path)?
        }
        None => SourcesConfig::default(),
    };
    let fetcher: Arc<dyn Fetcher> = Arc::new(HttpFetcher::new(config.timeout())?);
    let adapters = get_adapters(fetcher, &config)?;
    info!("🦗 {} sources configured", adapters.len());

    match cli.command {
        Commands::Scraper(ScraperCommands::List) => print!("{}", format_sources(&adapters)),
        Commands::Scraper(command) => {
            let sessions = match &command {
                ScraperCommands::Run { concurrency, .. } => *concurrency,
                ScraperCommands::List => 1,
            };
            let storage = nw_storage::create_storage(cli.storage, cli.database.as_deref(), sessions).await?;
            info!("🏦 Storage initialized (using {})", cli.storage);
            handle_command(ScraperArgs { command }, adapters, storage).await?;
        }
        Commands::Schedule {
            source,
            hours,
            jitter,
            concurrency,
            persist_failed,
        } => {
            let storage = nw_storage::create_storage(cli.storage, cli.database.as_deref(), concurrency).await?;
            info!("🏦 Storage initialized (using {})", cli.storage);
            let coordinator = build_coordinator(adapters, storage, concurrency, persist_failed);
            let schedule = Schedule::new(hours, jitter.0);
            schedule::run_forever(&schedule, &coordinator, source.as_deref()).await;
        }
    }

    Ok(())
}
