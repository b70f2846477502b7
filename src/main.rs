use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use jpstartup_etl::config::AppConfig;
use jpstartup_etl::fx::{FxCache, HttpRateProvider};
use jpstartup_etl::normalize::geo::PostalTable;
use jpstartup_etl::pages::PageKind;
use jpstartup_etl::pipeline::Pipeline;
use jpstartup_etl::storage::{BlobStore, LocalStore};
use jpstartup_etl::utils;

#[derive(Parser)]
#[command(name = "jpstartup-etl", about = "Startup-database crawl ETL", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Command {
    /// Parse one crawl directory of HTML pages into a snapshot CSV
    Parse {
        /// Entity type of the pages in the directory
        #[arg(short, long, value_enum)]
        entity: PageKind,

        /// Directory of .html files, named after the crawl date
        #[arg(short, long)]
        dir: PathBuf,

        /// Override the crawl time (%Y-%m-%d %H:%M:%S)
        #[arg(short, long)]
        timestamp: Option<String>,
    },

    /// Merge all stored snapshots of an entity and publish the export
    Merge {
        #[arg(short, long, value_enum)]
        entity: PageKind,
    },

    /// Convert an amount to USD through the rate cache
    Convert {
        #[arg(short, long)]
        currency: String,

        /// Conversion date (%Y-%m-%d)
        #[arg(short, long)]
        date: String,

        #[arg(short, long)]
        amount: f64,
    },

    /// Show store statistics
    Stats,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "jpstartup_etl=info,warn",
        1 => "jpstartup_etl=debug,info",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .compact()
        .with_target(false)
        .with_env_filter(EnvFilter::new(filter))
        .init();

    let config = AppConfig::load()?;

    match cli.command {
        Command::Parse {
            entity,
            dir,
            timestamp,
        } => {
            let _t = utils::Timer::start(format!("Parse {} crawl", entity.slug()));
            let stats = Pipeline::new(config).parse_crawl(entity, &dir, timestamp.as_deref())?;
            println!(
                "Done: {} page(s), {} row(s), {} error(s)",
                stats.pages, stats.rows, stats.errors
            );
        }

        Command::Merge { entity } => {
            let _t = utils::Timer::start(format!("Merge {}", entity.slug()));
            let stats = Pipeline::new(config).merge(entity)?;
            println!(
                "Done: {} snapshot row(s) → {} record(s)",
                stats.snapshots, stats.rows
            );
        }

        Command::Convert {
            currency,
            date,
            amount,
        } => {
            let date = NaiveDate::parse_from_str(&date, "%Y-%m-%d")
                .with_context(|| format!("bad date '{date}', expected %Y-%m-%d"))?;
            let primary = LocalStore::open(&config.storage.primary_root)?;
            let provider = HttpRateProvider::new(&config.provider)?;
            let mut cache = FxCache::load(&primary, &config.storage.forex_key)?;

            match cache.convert_to_usd(&provider, Some(currency.as_str()), Some(date), Some(amount))? {
                Some(usd) => println!("{amount} {currency} on {date} = {usd:.2} USD"),
                None => println!("No conversion possible"),
            }
        }

        Command::Stats => {
            let primary = LocalStore::open(&config.storage.primary_root)?;
            println!("─────────────────────────────────");
            println!("  jpstartup-etl — Store Stats");
            println!("─────────────────────────────────");
            for kind in [
                PageKind::Company,
                PageKind::Round,
                PageKind::Investor,
                PageKind::Acquisition,
            ] {
                let prefix = format!("{}/{}/", config.pipeline.snapshots_prefix, kind.slug());
                let count = primary.list(&prefix)?.len();
                println!("  {:<12}: {} snapshot file(s)", kind.slug(), count);
            }

            let cache = FxCache::load(&primary, &config.storage.forex_key)?;
            println!("  fx rates    : {}", utils::fmt_number(cache.len() as i64));

            match primary.get(&config.storage.postal_key)? {
                Some(bytes) => {
                    let postal = PostalTable::from_csv(&bytes)?;
                    println!("  postal codes: {}", utils::fmt_number(postal.len() as i64));
                }
                None => println!("  postal codes: (table not loaded)"),
            }
            println!("─────────────────────────────────");
        }
    }

    Ok(())
}
