//! Upstream data sources

pub mod alpha_vantage;
pub mod yahoo;

use async_trait::async_trait;

use crate::error::SourceError;
use crate::model::{SourceTier, StockRecord, TickerSymbol};

pub use alpha_vantage::AlphaVantageClient;
pub use yahoo::YahooFinanceClient;

/// A remote source that can produce a normalized [`StockRecord`].
///
/// Implementations never retry; the provider decides what happens after a
/// failure.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StockSource: Send + Sync {
    /// Tier recorded on records produced by this source
    fn tier(&self) -> SourceTier;

    /// Human-readable name used in logs and error reports
    fn name(&self) -> &'static str;

    async fn fetch(&self, ticker: &TickerSymbol) -> Result<StockRecord, SourceError>;
}
