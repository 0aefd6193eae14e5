//! Normalized stock data types shared by every source and the cache

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, StockError};

/// Upper-cased, trimmed ticker symbol
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TickerSymbol(String);

impl TickerSymbol {
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(StockError::InvalidSymbol(raw.to_string()));
        }
        Ok(Self(trimmed.to_uppercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Lower-cased key safe to embed in a file name.
    pub fn cache_key(&self) -> String {
        self.0
            .chars()
            .map(|c| {
                let c = c.to_ascii_lowercase();
                if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                    c
                } else {
                    '_'
                }
            })
            .collect()
    }
}

impl fmt::Display for TickerSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which tier produced a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceTier {
    Primary,
    Secondary,
}

impl fmt::Display for SourceTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primary => f.write_str("primary"),
            Self::Secondary => f.write_str("secondary"),
        }
    }
}

/// One trading day
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

/// Company metadata. Known fields are typed; anything else a source returns
/// lands in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompanyInfo {
    pub symbol: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub exchange: Option<String>,
    pub industry: Option<String>,
    pub sector: Option<String>,
    pub market_capitalization: Option<f64>,
    pub pe_ratio: Option<f64>,
    pub dividend_yield: Option<f64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, Value>,
}

/// Normalized result of a fetch; this is also what the cache stores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockRecord {
    pub ticker: TickerSymbol,
    pub source: SourceTier,
    pub last_updated: String,
    pub prices: Vec<PricePoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_info: Option<CompanyInfo>,
}

impl StockRecord {
    /// Build a record, ordering prices most-recent-first.
    pub fn new(
        ticker: TickerSymbol,
        source: SourceTier,
        last_updated: impl Into<String>,
        mut prices: Vec<PricePoint>,
        company_info: Option<CompanyInfo>,
    ) -> Self {
        prices.sort_by(|a, b| b.date.cmp(&a.date));
        Self {
            ticker,
            source,
            last_updated: last_updated.into(),
            prices,
            company_info,
        }
    }

    pub fn latest(&self) -> Option<&PricePoint> {
        self.prices.first()
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }
}

/// Read a number that may arrive as a JSON number or as a string such as
/// `"28.5"`. Placeholders like `"None"` or `"-"` yield `None`.
pub(crate) fn lenient_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        _ => None,
    }
}

/// Read a non-empty string field.
pub(crate) fn lenient_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() && s != "None" => Some(s.clone()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn point(date: &str, close: f64) -> PricePoint {
        PricePoint {
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            open: close,
            high: close,
            low: close,
            close,
            volume: 100,
        }
    }

    #[test]
    fn test_ticker_parse() {
        let t = TickerSymbol::parse("  aapl ").unwrap();
        assert_eq!(t.as_str(), "AAPL");
        assert!(TickerSymbol::parse("   ").is_err());
    }

    #[test]
    fn test_cache_key_is_filesystem_safe() {
        let t = TickerSymbol::parse("BRK.B").unwrap();
        assert_eq!(t.cache_key(), "brk.b");

        let t = TickerSymbol::parse("../etc/passwd").unwrap();
        assert_eq!(t.cache_key(), ".._etc_passwd");

        let t = TickerSymbol::parse("^GSPC").unwrap();
        assert_eq!(t.cache_key(), "_gspc");
    }

    #[test]
    fn test_record_orders_most_recent_first() {
        let record = StockRecord::new(
            TickerSymbol::parse("MSFT").unwrap(),
            SourceTier::Secondary,
            "2024-01-04",
            vec![
                point("2024-01-02", 1.0),
                point("2024-01-04", 3.0),
                point("2024-01-03", 2.0),
            ],
            None,
        );

        let dates: Vec<String> = record.prices.iter().map(|p| p.date.to_string()).collect();
        assert_eq!(dates, ["2024-01-04", "2024-01-03", "2024-01-02"]);
        assert_eq!(record.latest().map(|p| p.close), Some(3.0));
    }

    #[test]
    fn test_record_json_shape() {
        let record = StockRecord::new(
            TickerSymbol::parse("ibm").unwrap(),
            SourceTier::Primary,
            "2024-01-03",
            vec![point("2024-01-03", 160.0)],
            None,
        );

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["ticker"], "IBM");
        assert_eq!(value["source"], "primary");
        assert_eq!(value["prices"][0]["date"], "2024-01-03");
        assert!(value.get("company_info").is_none());
    }

    #[test]
    fn test_lenient_numbers() {
        assert_eq!(lenient_f64(&json!("28.5")), Some(28.5));
        assert_eq!(lenient_f64(&json!(0.0051)), Some(0.0051));
        assert_eq!(lenient_f64(&json!("None")), None);
        assert_eq!(lenient_f64(&json!("-")), None);
        assert_eq!(lenient_f64(&json!(null)), None);
        assert_eq!(lenient_string(&json!("None")), None);
        assert_eq!(lenient_string(&json!("NASDAQ")), Some("NASDAQ".to_string()));
    }
}
