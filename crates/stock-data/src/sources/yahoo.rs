//! Yahoo Finance client (secondary source)

use crate::error::SourceError;
use crate::model::{CompanyInfo, PricePoint, SourceTier, StockRecord, TickerSymbol};
use crate::sources::StockSource;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::time::Duration;
use time::OffsetDateTime;
use tracing::{debug, warn};
use yahoo_finance_api as yahoo;

/// One daily bar as returned by Yahoo, before normalization
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HistoryRow {
    /// Unix timestamp of the bar
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

/// The parts of the chart metadata kept for a record
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChartMeta {
    pub long_name: Option<String>,
    pub short_name: Option<String>,
    pub exchange_name: String,
    pub instrument_type: String,
    /// Exchange offset from UTC in seconds; bars are dated in exchange time
    pub gmtoffset: i32,
}

impl From<yahoo::YMetaData> for ChartMeta {
    fn from(meta: yahoo::YMetaData) -> Self {
        Self {
            long_name: meta.long_name,
            short_name: meta.short_name,
            exchange_name: meta.exchange_name,
            instrument_type: meta.instrument_type,
            gmtoffset: meta.gmtoffset,
        }
    }
}

/// Yahoo Finance client
#[derive(Debug, Clone)]
pub struct YahooFinanceClient {
    lookback: chrono::Duration,
    timeout: Duration,
}

impl YahooFinanceClient {
    /// Create a client that fetches `lookback_days` of daily history.
    pub fn new(lookback_days: u32, timeout: Duration) -> Self {
        Self {
            lookback: chrono::Duration::days(i64::from(lookback_days)),
            timeout,
        }
    }

    /// Daily bars for the lookback window plus the chart metadata.
    pub async fn get_history(
        &self,
        symbol: &str,
    ) -> Result<(Vec<HistoryRow>, ChartMeta), SourceError> {
        let provider = yahoo::YahooConnector::new()
            .map_err(|e| SourceError::Unavailable(e.to_string()))?;

        let end = Utc::now();
        let start = end - self.lookback;

        // Convert chrono DateTime to time OffsetDateTime
        let start_odt = OffsetDateTime::from_unix_timestamp(start.timestamp())
            .map_err(|e| SourceError::Parse(format!("invalid start timestamp: {e}")))?;
        let end_odt = OffsetDateTime::from_unix_timestamp(end.timestamp())
            .map_err(|e| SourceError::Parse(format!("invalid end timestamp: {e}")))?;

        let response = tokio::time::timeout(
            self.timeout,
            provider.get_quote_history(symbol, start_odt, end_odt),
        )
        .await
        .map_err(|_| SourceError::Timeout)?
        .map_err(|e| SourceError::Unavailable(e.to_string()))?;

        // Yahoo reports an empty result set as an error from `quotes()`
        let quotes = match response.quotes() {
            Ok(quotes) => quotes,
            Err(e) => {
                warn!(symbol, error = %e, "Yahoo Finance returned no quotes");
                return Err(SourceError::NoData);
            }
        };

        let rows = quotes
            .iter()
            .map(|q| HistoryRow {
                timestamp: q.timestamp,
                open: q.open,
                high: q.high,
                low: q.low,
                close: q.close,
                volume: q.volume,
            })
            .collect();

        let meta = response
            .metadata()
            .map(ChartMeta::from)
            .map_err(|e| SourceError::Parse(format!("chart metadata: {e}")))?;

        Ok((rows, meta))
    }

    /// Company profile and valuation summary
    pub async fn get_profile(&self, symbol: &str) -> Result<yahoo::YSummaryData, SourceError> {
        let mut provider = yahoo::YahooConnector::new()
            .map_err(|e| SourceError::Unavailable(e.to_string()))?;

        let summary = tokio::time::timeout(self.timeout, provider.get_ticker_info(symbol))
            .await
            .map_err(|_| SourceError::Timeout)?
            .map_err(|e| SourceError::Unavailable(e.to_string()))?;

        if let Some(message) = summary
            .finance
            .as_ref()
            .and_then(|f| f.error.as_ref())
            .and_then(|e| e.description.clone())
        {
            return Err(SourceError::Provider(message));
        }

        summary
            .quote_summary
            .and_then(|q| q.result)
            .and_then(|r| r.into_iter().next())
            .ok_or(SourceError::NoData)
    }
}

impl Default for YahooFinanceClient {
    fn default() -> Self {
        Self::new(730, Duration::from_secs(30))
    }
}

#[async_trait]
impl StockSource for YahooFinanceClient {
    fn tier(&self) -> SourceTier {
        SourceTier::Secondary
    }

    fn name(&self) -> &'static str {
        "yahoo"
    }

    async fn fetch(&self, ticker: &TickerSymbol) -> Result<StockRecord, SourceError> {
        let (rows, meta) = self.get_history(ticker.as_str()).await?;

        // The profile is optional enrichment
        let profile = match self.get_profile(ticker.as_str()).await {
            Ok(profile) => Some(profile),
            Err(e) => {
                debug!(ticker = %ticker, error = %e, "Yahoo Finance profile unavailable");
                None
            }
        };

        let info = company_info_from_yahoo(ticker.as_str(), &meta, profile.as_ref());
        record_from_history(ticker, &rows, meta.gmtoffset, Some(info), Utc::now())
    }
}

/// Build company info from chart metadata and, when available, the quote
/// summary's asset profile and summary detail.
pub fn company_info_from_yahoo(
    symbol: &str,
    meta: &ChartMeta,
    summary: Option<&yahoo::YSummaryData>,
) -> CompanyInfo {
    let non_empty = |s: &str| Some(s.to_string()).filter(|s| !s.trim().is_empty());

    let mut info = CompanyInfo {
        symbol: Some(symbol.to_string()),
        name: meta
            .long_name
            .as_deref()
            .or(meta.short_name.as_deref())
            .and_then(non_empty),
        exchange: non_empty(&meta.exchange_name),
        ..CompanyInfo::default()
    };
    if !meta.instrument_type.is_empty() {
        info.extra.insert(
            "instrumentType".to_string(),
            Value::String(meta.instrument_type.clone()),
        );
    }

    let Some(summary) = summary else {
        return info;
    };

    if let Some(profile) = &summary.asset_profile {
        info.description = profile.long_business_summary.as_deref().and_then(non_empty);
        info.industry = profile.industry.as_deref().and_then(non_empty);
        info.sector = profile.sector.as_deref().and_then(non_empty);
    }
    if let Some(detail) = &summary.summary_detail {
        info.market_capitalization = detail.market_cap.map(|cap| cap as f64);
        // Yahoo reports an undefined ratio as "Infinity"
        info.pe_ratio = detail.trailing_pe.filter(|pe| pe.is_finite());
        info.dividend_yield = detail.dividend_yield;
    }

    info
}

/// Normalize Yahoo history rows into a record stamped with `now`'s date.
///
/// Bars are dated in exchange local time, `gmtoffset` seconds from UTC. Rows
/// whose timestamp cannot be represented are dropped. No usable rows means no
/// data.
pub fn record_from_history(
    ticker: &TickerSymbol,
    rows: &[HistoryRow],
    gmtoffset: i32,
    info: Option<CompanyInfo>,
    now: DateTime<Utc>,
) -> Result<StockRecord, SourceError> {
    let prices: Vec<PricePoint> = rows
        .iter()
        .filter_map(|row| {
            let local = row.timestamp.checked_add(i64::from(gmtoffset))?;
            let date = DateTime::from_timestamp(local, 0)?.date_naive();
            Some(PricePoint {
                date,
                open: row.open,
                high: row.high,
                low: row.low,
                close: row.close,
                volume: row.volume,
            })
        })
        .collect();

    if prices.is_empty() {
        return Err(SourceError::NoData);
    }

    Ok(StockRecord::new(
        ticker.clone(),
        SourceTier::Secondary,
        now.format("%Y-%m-%d").to_string(),
        prices,
        info,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    const NEW_YORK_OFFSET: i32 = -18_000;
    const SYDNEY_SUMMER_OFFSET: i32 = 39_600;

    fn row(timestamp: i64, close: f64) -> HistoryRow {
        HistoryRow {
            timestamp,
            open: close - 1.0,
            high: close + 1.0,
            low: close - 2.0,
            close,
            volume: 1_000,
        }
    }

    fn meta() -> ChartMeta {
        ChartMeta {
            long_name: Some("Apple Inc.".to_string()),
            short_name: Some("Apple".to_string()),
            exchange_name: "NMS".to_string(),
            instrument_type: "EQUITY".to_string(),
            gmtoffset: NEW_YORK_OFFSET,
        }
    }

    fn summary() -> yahoo::YSummaryData {
        serde_json::from_value(json!({
            "assetProfile": {
                "industry": "Consumer Electronics",
                "sector": "Technology",
                "longBusinessSummary": "Apple Inc. designs smartphones.",
                "companyOfficers": []
            },
            "summaryDetail": {
                "marketCap": 2_900_000_000_000_u64,
                "trailingPE": 29.5,
                "dividendYield": 0.0052
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_record_from_history_sorts_descending() {
        let ticker = TickerSymbol::parse("AAPL").unwrap();
        // 2024-01-02 and 2024-01-03 09:30 New York, in source order
        let rows = [row(1_704_205_800, 185.64), row(1_704_292_200, 184.25)];
        let now = Utc.with_ymd_and_hms(2024, 1, 4, 12, 0, 0).unwrap();

        let record = record_from_history(&ticker, &rows, NEW_YORK_OFFSET, None, now).unwrap();

        assert_eq!(record.source, SourceTier::Secondary);
        assert_eq!(record.last_updated, "2024-01-04");
        assert_eq!(record.prices[0].date.to_string(), "2024-01-03");
        assert_eq!(record.prices[0].close, 184.25);
        assert_eq!(record.prices[1].date.to_string(), "2024-01-02");
    }

    #[test]
    fn test_bars_are_dated_in_exchange_time() {
        let ticker = TickerSymbol::parse("BHP.AX").unwrap();
        // 2024-01-03 10:00 Sydney is still 2024-01-02 in UTC
        let rows = [row(1_704_236_400, 45.10)];

        let record =
            record_from_history(&ticker, &rows, SYDNEY_SUMMER_OFFSET, None, Utc::now()).unwrap();
        assert_eq!(record.prices[0].date.to_string(), "2024-01-03");
    }

    #[test]
    fn test_empty_history_is_no_data() {
        let ticker = TickerSymbol::parse("NOPE").unwrap();
        let result = record_from_history(&ticker, &[], 0, None, Utc::now());
        assert!(matches!(result, Err(SourceError::NoData)));
    }

    #[test]
    fn test_unrepresentable_timestamps_are_dropped() {
        let ticker = TickerSymbol::parse("AAPL").unwrap();
        let rows = [row(i64::MAX, 1.0), row(1_704_205_800, 2.0)];

        let record =
            record_from_history(&ticker, &rows, NEW_YORK_OFFSET, None, Utc::now()).unwrap();
        assert_eq!(record.len(), 1);
    }

    #[test]
    fn test_company_info_from_chart_and_summary() {
        let info = company_info_from_yahoo("AAPL", &meta(), Some(&summary()));

        assert_eq!(info.symbol.as_deref(), Some("AAPL"));
        assert_eq!(info.name.as_deref(), Some("Apple Inc."));
        assert_eq!(info.exchange.as_deref(), Some("NMS"));
        assert_eq!(info.sector.as_deref(), Some("Technology"));
        assert_eq!(info.industry.as_deref(), Some("Consumer Electronics"));
        assert_eq!(
            info.description.as_deref(),
            Some("Apple Inc. designs smartphones.")
        );
        assert_eq!(info.market_capitalization, Some(2.9e12));
        assert_eq!(info.pe_ratio, Some(29.5));
        assert_eq!(info.dividend_yield, Some(0.0052));
        assert_eq!(info.extra.get("instrumentType"), Some(&json!("EQUITY")));
    }

    #[test]
    fn test_company_info_from_chart_only() {
        let meta = ChartMeta {
            long_name: None,
            ..meta()
        };
        let info = company_info_from_yahoo("AAPL", &meta, None);

        assert_eq!(info.name.as_deref(), Some("Apple"));
        assert_eq!(info.exchange.as_deref(), Some("NMS"));
        assert!(info.sector.is_none());
        assert!(info.market_capitalization.is_none());
    }

    #[test]
    fn test_infinite_pe_is_dropped() {
        let summary: yahoo::YSummaryData = serde_json::from_value(json!({
            "summaryDetail": { "trailingPE": "Infinity" }
        }))
        .unwrap();

        let info = company_info_from_yahoo("ZZZ", &ChartMeta::default(), Some(&summary));
        assert!(info.pe_ratio.is_none());
        assert!(info.name.is_none());
        assert!(info.exchange.is_none());
        assert!(info.extra.is_empty());
    }

    #[test]
    fn test_default_lookback_is_two_years() {
        let client = YahooFinanceClient::default();
        assert_eq!(client.lookback.num_days(), 730);
    }

    #[tokio::test]
    #[ignore] // Requires network access
    async fn test_get_history_live() {
        let client = YahooFinanceClient::default();
        let (rows, meta) = client.get_history("AAPL").await.unwrap();
        assert!(!rows.is_empty());
        assert!(!meta.exchange_name.is_empty());
    }

    #[tokio::test]
    #[ignore] // Requires network access
    async fn test_get_profile_live() {
        let client = YahooFinanceClient::default();
        let profile = client.get_profile("AAPL").await.unwrap();
        assert!(profile.asset_profile.is_some());
    }
}
