//! Command-line interface for the stock data provider

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use comfy_table::{Table, presets::UTF8_FULL};
use stock_data::{FetchError, StockConfig, StockDataProvider, StockRecord};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "stock-cli")]
#[command(about = "Fetch and cache daily stock data", long_about = None)]
struct Cli {
    /// Cache directory (overrides CACHE_DIRECTORY)
    #[arg(long, global = true)]
    cache_dir: Option<PathBuf>,

    /// Cache freshness window in seconds (overrides CACHE_DURATION)
    #[arg(long, global = true)]
    cache_duration: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch data for a ticker, using the cache when fresh
    Fetch {
        /// Ticker symbol, e.g. AAPL
        ticker: String,

        /// Ignore any cached entry
        #[arg(long)]
        refresh: bool,

        /// Print the full record as JSON
        #[arg(long)]
        json: bool,

        /// Number of most recent days to show in the table
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Manage the on-disk cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand, Debug)]
enum CacheAction {
    /// Remove the cached entry for one ticker
    Invalidate { ticker: String },
    /// Remove every cached entry
    Clear,
}

impl Cli {
    fn config(&self) -> anyhow::Result<StockConfig> {
        let mut builder = StockConfig::builder();
        if let Some(dir) = &self.cache_dir {
            builder = builder.cache_dir(dir);
        }
        if let Some(secs) = self.cache_duration {
            builder = builder.cache_duration(Duration::from_secs(secs));
        }
        Ok(builder.with_env()?.build()?)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    stock_utils::load_dotenv();
    stock_utils::init_tracing();

    let cli = Cli::parse();
    let config = cli.config()?;
    info!(cache_dir = %config.cache_dir.display(), "starting stock-cli");

    let provider = StockDataProvider::new(config).context("failed to build provider")?;

    match cli.command {
        Command::Fetch {
            ticker,
            refresh,
            json,
            limit,
        } => {
            let result = if refresh {
                provider.refresh(&ticker).await
            } else {
                provider.try_fetch(&ticker).await
            };

            let record = match result {
                Ok(record) => record,
                Err(e @ FetchError::Exhausted { .. }) => {
                    bail!("{e} [{:?}]", e.kind());
                }
                Err(e) => return Err(e.into()),
            };

            if json {
                println!("{}", serde_json::to_string_pretty(&record)?);
            } else {
                print!("{}", render_summary(&record, limit));
            }
        }
        Command::Cache { action } => match action {
            CacheAction::Invalidate { ticker } => {
                if provider.invalidate(&ticker).await? {
                    println!("Removed cache entry for {}", ticker.trim().to_uppercase());
                } else {
                    println!("No cache entry for {}", ticker.trim().to_uppercase());
                }
            }
            CacheAction::Clear => {
                let removed = provider.clear_cache().await?;
                println!("Removed {removed} cache entries");
            }
        },
    }

    Ok(())
}

fn render_summary(record: &StockRecord, limit: usize) -> String {
    let mut out = format!(
        "{} ({} source, last updated {}, {} days)\n",
        record.ticker,
        record.source,
        if record.last_updated.is_empty() {
            "unknown"
        } else {
            record.last_updated.as_str()
        },
        record.len()
    );

    if let Some(info) = &record.company_info {
        let name = info.name.as_deref().unwrap_or("-");
        let exchange = info.exchange.as_deref().unwrap_or("-");
        out.push_str(&format!("{name} [{exchange}]\n"));
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Date", "Open", "High", "Low", "Close", "Volume"]);
    for p in record.prices.iter().take(limit) {
        table.add_row(vec![
            p.date.to_string(),
            format!("{:.2}", p.open),
            format!("{:.2}", p.high),
            format!("{:.2}", p.low),
            format!("{:.2}", p.close),
            p.volume.to_string(),
        ]);
    }
    out.push_str(&table.to_string());
    out.push('\n');
    out
}
