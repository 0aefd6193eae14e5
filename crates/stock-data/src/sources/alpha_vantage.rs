//! Alpha Vantage API client (primary source)

use crate::error::SourceError;
use crate::model::{
    lenient_f64, lenient_string, CompanyInfo, PricePoint, SourceTier, StockRecord, TickerSymbol,
};
use crate::sources::StockSource;
use async_trait::async_trait;
use chrono::NaiveDate;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use reqwest::Client;
use serde_json::{Map, Value};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

const PROVIDER: &str = "Alpha Vantage";
const DAILY_SERIES_KEY: &str = "Time Series (Daily)";

/// Top-level keys Alpha Vantage uses to report problems inside a 200 body
const ERROR_KEYS: [&str; 3] = ["Error Message", "Information", "Note"];

type SharedRateLimiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;

/// Alpha Vantage API client
#[derive(Debug, Clone)]
pub struct AlphaVantageClient {
    client: Client,
    api_key: Option<String>,
    base_url: String,
    rate_limiter: SharedRateLimiter,
}

impl AlphaVantageClient {
    /// Create a client.
    ///
    /// # Arguments
    /// * `api_key` - Alpha Vantage API key; `None` or blank disables the client
    /// * `base_url` - query endpoint
    /// * `rate_limit` - maximum requests per minute
    /// * `timeout` - per-request timeout
    pub fn new(
        api_key: Option<String>,
        base_url: impl Into<String>,
        rate_limit: u32,
        timeout: Duration,
    ) -> Result<Self, SourceError> {
        let quota = Quota::per_minute(NonZeroU32::new(rate_limit).unwrap_or(NonZeroU32::MIN));
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            base_url: base_url.into(),
            rate_limiter: Arc::new(RateLimiter::direct(quota)),
        })
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Get the full daily time series.
    ///
    /// Returns the "Last Refreshed" value and the price points, newest first.
    pub async fn get_daily(&self, symbol: &str) -> Result<(String, Vec<PricePoint>), SourceError> {
        let data = self
            .get_json(&[
                ("function", "TIME_SERIES_DAILY"),
                ("symbol", symbol),
                ("outputsize", "full"),
            ])
            .await?;

        parse_daily_series(&data)
    }

    /// Get company overview and fundamental data
    pub async fn get_company_overview(&self, symbol: &str) -> Result<CompanyInfo, SourceError> {
        let data = self
            .get_json(&[("function", "OVERVIEW"), ("symbol", symbol)])
            .await?;

        company_info_from_overview(data).ok_or(SourceError::NoData)
    }

    /// Issue one query and return the decoded body.
    ///
    /// Fails without a request when no key is configured or the local rate
    /// limit is exhausted.
    async fn get_json(&self, params: &[(&str, &str)]) -> Result<Value, SourceError> {
        let api_key = self.api_key.as_deref().ok_or(SourceError::MissingApiKey)?;

        if self.rate_limiter.check().is_err() {
            return Err(SourceError::RateLimited {
                provider: PROVIDER.to_string(),
            });
        }

        let response = self
            .client
            .get(&self.base_url)
            .query(params)
            .query(&[("apikey", api_key)])
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            return Err(SourceError::Http {
                status: response.status().as_u16(),
            });
        }

        let data: Value = response.json().await.map_err(transport_error)?;
        check_provider_error(&data)?;
        Ok(data)
    }
}

#[async_trait]
impl StockSource for AlphaVantageClient {
    fn tier(&self) -> SourceTier {
        SourceTier::Primary
    }

    fn name(&self) -> &'static str {
        "alphavantage"
    }

    async fn fetch(&self, ticker: &TickerSymbol) -> Result<StockRecord, SourceError> {
        let (last_refreshed, prices) = self.get_daily(ticker.as_str()).await?;

        // The overview is optional enrichment
        let company_info = match self.get_company_overview(ticker.as_str()).await {
            Ok(info) => Some(info),
            Err(e) => {
                debug!(ticker = %ticker, error = %e, "Alpha Vantage overview unavailable");
                None
            }
        };

        Ok(StockRecord::new(
            ticker.clone(),
            SourceTier::Primary,
            last_refreshed,
            prices,
            company_info,
        ))
    }
}

fn transport_error(err: reqwest::Error) -> SourceError {
    if err.is_timeout() {
        SourceError::Timeout
    } else {
        SourceError::Network(err)
    }
}

/// Detect the error and throttling messages Alpha Vantage embeds in
/// successful responses.
pub fn check_provider_error(data: &Value) -> Result<(), SourceError> {
    let Some((key, message)) = ERROR_KEYS
        .iter()
        .find_map(|key| data.get(*key).map(|msg| (*key, msg)))
    else {
        return Ok(());
    };

    let message = message
        .as_str()
        .map_or_else(|| message.to_string(), str::to_string);
    warn!(key, message = %message, "Alpha Vantage returned an error body");

    if key == "Error Message" {
        Err(SourceError::Provider(message))
    } else {
        Err(SourceError::RateLimited {
            provider: PROVIDER.to_string(),
        })
    }
}

/// Map a `TIME_SERIES_DAILY` body to price points, newest first.
pub fn parse_daily_series(data: &Value) -> Result<(String, Vec<PricePoint>), SourceError> {
    let series = data
        .get(DAILY_SERIES_KEY)
        .and_then(Value::as_object)
        .filter(|s| !s.is_empty())
        .ok_or(SourceError::NoData)?;

    let mut prices = series
        .iter()
        .map(|(date, values)| parse_bar(date, values))
        .collect::<Result<Vec<_>, _>>()?;
    prices.sort_by(|a, b| b.date.cmp(&a.date));

    let last_refreshed = data
        .get("Meta Data")
        .and_then(|m| m.get("3. Last Refreshed"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    Ok((last_refreshed, prices))
}

fn parse_bar(date: &str, values: &Value) -> Result<PricePoint, SourceError> {
    let date = NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map_err(|e| SourceError::Parse(format!("date {date:?}: {e}")))?;

    Ok(PricePoint {
        date,
        open: field(values, "1. open")?,
        high: field(values, "2. high")?,
        low: field(values, "3. low")?,
        close: field(values, "4. close")?,
        volume: field(values, "5. volume")?,
    })
}

fn field<T: std::str::FromStr>(values: &Value, key: &str) -> Result<T, SourceError> {
    let raw = match values.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => return Err(SourceError::Parse(format!("missing field {key:?}"))),
    };
    raw.trim()
        .parse()
        .map_err(|_| SourceError::Parse(format!("field {key:?} has bad value {raw:?}")))
}

/// Map an `OVERVIEW` body to company info.
///
/// Returns `None` unless the body names a symbol; Alpha Vantage answers `{}`
/// for unknown tickers.
pub fn company_info_from_overview(data: Value) -> Option<CompanyInfo> {
    let Value::Object(mut map) = data else {
        return None;
    };
    if !map.contains_key("Symbol") {
        return None;
    }

    let take_str = |map: &mut Map<String, Value>, key: &str| {
        map.remove(key).as_ref().and_then(lenient_string)
    };
    let symbol = take_str(&mut map, "Symbol");
    let name = take_str(&mut map, "Name");
    let description = take_str(&mut map, "Description");
    let exchange = take_str(&mut map, "Exchange");
    let industry = take_str(&mut map, "Industry");
    let sector = take_str(&mut map, "Sector");

    let take_num = |map: &mut Map<String, Value>, key: &str| {
        map.remove(key).as_ref().and_then(lenient_f64)
    };
    let market_capitalization = take_num(&mut map, "MarketCapitalization");
    let pe_ratio = take_num(&mut map, "PERatio");
    let dividend_yield = take_num(&mut map, "DividendYield");

    Some(CompanyInfo {
        symbol,
        name,
        description,
        exchange,
        industry,
        sector,
        market_capitalization,
        pe_ratio,
        dividend_yield,
        extra: map.into_iter().collect(),
    })
}
