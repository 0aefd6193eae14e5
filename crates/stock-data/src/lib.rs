//! Stock data retrieval with caching and automatic failover
//!
//! [`StockDataProvider`] resolves a ticker symbol to a normalized
//! [`StockRecord`] of daily prices and company metadata:
//!
//! - a fresh entry in the on-disk cache is returned as-is
//! - otherwise Alpha Vantage (primary) is queried
//! - on any primary failure, including a missing API key, Yahoo Finance
//!   (secondary) is queried
//! - successful results are written back to the cache
//!
//! # Example
//!
//! ```rust,ignore
//! use stock_data::{StockConfig, StockDataProvider};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let provider = StockDataProvider::new(StockConfig::from_env()?)?;
//!
//!     match provider.fetch("AAPL").await {
//!         Some(record) => println!("{} points from {}", record.len(), record.source),
//!         None => println!("no data"),
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod model;
pub mod provider;
pub mod sources;

// Re-export main types for convenience
pub use cache::{CacheEntry, StockCache};
pub use config::{StockConfig, StockConfigBuilder};
pub use error::{CacheError, FailureKind, FetchError, Result, SourceError, StockError};
pub use model::{CompanyInfo, PricePoint, SourceTier, StockRecord, TickerSymbol};
pub use provider::StockDataProvider;
pub use sources::StockSource;
