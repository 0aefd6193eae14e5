//! Cache-first stock data provider with primary/secondary failover

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::cache::StockCache;
use crate::config::StockConfig;
use crate::error::{FetchError, Result, SourceFailure, StockError};
use crate::model::{StockRecord, TickerSymbol};
use crate::sources::{AlphaVantageClient, StockSource, YahooFinanceClient};

/// Resolves a ticker to a [`StockRecord`]: fresh cache entry first, then the
/// primary source, then the secondary source. Successful fetches are written
/// back to the cache.
///
/// Tiers are tried once each, in order, with no retry.
pub struct StockDataProvider {
    config: Arc<StockConfig>,
    cache: StockCache,
    primary: Arc<dyn StockSource>,
    secondary: Arc<dyn StockSource>,
}

impl StockDataProvider {
    /// Build a provider backed by Alpha Vantage and Yahoo Finance.
    pub fn new(config: StockConfig) -> Result<Self> {
        config.validate()?;

        let primary = AlphaVantageClient::new(
            config.alpha_vantage_api_key.clone(),
            config.alpha_vantage_base_url.clone(),
            config.alpha_vantage_rate_limit,
            config.request_timeout,
        )
        .map_err(|e| StockError::ConfigError(format!("cannot build HTTP client: {e}")))?;
        let secondary =
            YahooFinanceClient::new(config.history_lookback_days, config.request_timeout);

        Ok(Self::with_sources(
            config,
            Arc::new(primary),
            Arc::new(secondary),
        ))
    }

    /// Build a provider from arbitrary sources.
    pub fn with_sources(
        config: StockConfig,
        primary: Arc<dyn StockSource>,
        secondary: Arc<dyn StockSource>,
    ) -> Self {
        let cache = StockCache::new(config.cache_dir.clone(), config.cache_duration);
        Self {
            config: Arc::new(config),
            cache,
            primary,
            secondary,
        }
    }

    pub fn config(&self) -> &StockConfig {
        &self.config
    }

    pub fn cache(&self) -> &StockCache {
        &self.cache
    }

    /// Fetch a record, or `None` if the ticker is invalid or every source
    /// failed. Failures are logged, never returned.
    pub async fn fetch(&self, ticker: &str) -> Option<StockRecord> {
        match self.try_fetch(ticker).await {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(ticker, error = %e, "stock data unavailable");
                None
            }
        }
    }

    /// Like [`fetch`](Self::fetch), but reports why each source failed.
    pub async fn try_fetch(&self, ticker: &str) -> std::result::Result<StockRecord, FetchError> {
        let ticker = parse_ticker(ticker)?;

        match self.cache.load_fresh(&ticker, Utc::now()).await {
            Ok(Some(record)) => {
                info!(ticker = %ticker, "using cached data");
                return Ok(record);
            }
            Ok(None) => debug!(ticker = %ticker, "cache miss"),
            Err(e) => warn!(ticker = %ticker, error = %e, "error reading cache file"),
        }

        self.fetch_live(&ticker).await
    }

    /// Skip the cache read and go straight to the sources. The result is
    /// still written back to the cache.
    pub async fn refresh(&self, ticker: &str) -> std::result::Result<StockRecord, FetchError> {
        let ticker = parse_ticker(ticker)?;
        self.fetch_live(&ticker).await
    }

    /// Drop the cached entry for a ticker. Returns whether one existed.
    pub async fn invalidate(&self, ticker: &str) -> Result<bool> {
        let ticker = TickerSymbol::parse(ticker)?;
        Ok(self.cache.invalidate(&ticker).await?)
    }

    /// Drop every cached entry. Returns how many were removed.
    pub async fn clear_cache(&self) -> Result<usize> {
        Ok(self.cache.clear().await?)
    }

    async fn fetch_live(
        &self,
        ticker: &TickerSymbol,
    ) -> std::result::Result<StockRecord, FetchError> {
        let mut attempts = Vec::with_capacity(2);

        for source in [&self.primary, &self.secondary] {
            match source.fetch(ticker).await {
                Ok(record) => {
                    info!(
                        ticker = %ticker,
                        source = source.name(),
                        points = record.len(),
                        "fetched stock data"
                    );
                    let record = StockRecord::new(
                        record.ticker,
                        record.source,
                        record.last_updated,
                        record.prices,
                        record.company_info,
                    );
                    self.write_back(&record).await;
                    return Ok(record);
                }
                Err(error) => {
                    warn!(
                        ticker = %ticker,
                        source = source.name(),
                        error = %error,
                        "source failed, trying next tier"
                    );
                    attempts.push(SourceFailure {
                        tier: source.tier(),
                        source_name: source.name(),
                        error,
                    });
                }
            }
        }

        Err(FetchError::Exhausted {
            ticker: ticker.to_string(),
            attempts,
        })
    }

    async fn write_back(&self, record: &StockRecord) {
        if let Err(e) = self.cache.store(record, Utc::now()).await {
            warn!(ticker = %record.ticker, error = %e, "error writing cache file");
        }
    }
}

fn parse_ticker(raw: &str) -> std::result::Result<TickerSymbol, FetchError> {
    TickerSymbol::parse(raw).map_err(|_| FetchError::InvalidTicker(raw.to_string()))
}
