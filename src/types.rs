//! Types for the market data core

use crate::constants::{DEFAULT_PER_PAGE, MAX_PER_PAGE, SYNTHETIC_PROVIDER};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Logical endpoints understood by every provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Endpoint {
    /// Ranked market listing (`coins/markets`)
    Markets,
    /// Aggregate market statistics (`global`)
    Global,
    /// Trending searches (`search/trending`)
    Trending,
    /// Every known coin id (`coins/list`)
    CoinList,
    /// Spot prices for a set of ids (`simple/price`)
    SimplePrice,
}

impl Endpoint {
    /// Logical path, also used as the cache key prefix
    pub fn path(&self) -> &'static str {
        match self {
            Endpoint::Markets => "coins/markets",
            Endpoint::Global => "global",
            Endpoint::Trending => "search/trending",
            Endpoint::CoinList => "coins/list",
            Endpoint::SimplePrice => "simple/price",
        }
    }

    pub fn all() -> &'static [Endpoint] {
        &[
            Endpoint::Markets,
            Endpoint::Global,
            Endpoint::Trending,
            Endpoint::CoinList,
            Endpoint::SimplePrice,
        ]
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// Sort order for market listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketOrder {
    #[default]
    MarketCapDesc,
    MarketCapAsc,
    VolumeDesc,
    VolumeAsc,
    IdAsc,
    IdDesc,
}

impl MarketOrder {
    /// CoinGecko-style wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            MarketOrder::MarketCapDesc => "market_cap_desc",
            MarketOrder::MarketCapAsc => "market_cap_asc",
            MarketOrder::VolumeDesc => "volume_desc",
            MarketOrder::VolumeAsc => "volume_asc",
            MarketOrder::IdAsc => "id_asc",
            MarketOrder::IdDesc => "id_desc",
        }
    }
}

/// Parameter bag for a logical query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryParams {
    /// Quote currency, lowercase (`usd`, `eur`, ...)
    pub vs_currency: String,
    /// 1-based page number
    pub page: u32,
    /// Page size
    pub per_page: u32,
    pub order: MarketOrder,
    /// Canonical coin ids for price lookups
    pub ids: Vec<String>,
}

impl Default for QueryParams {
    fn default() -> Self {
        Self {
            vs_currency: "usd".to_string(),
            page: 1,
            per_page: DEFAULT_PER_PAGE,
            order: MarketOrder::default(),
            ids: Vec::new(),
        }
    }
}

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_vs_currency(mut self, vs: impl Into<String>) -> Self {
        self.vs_currency = vs.into();
        self
    }

    pub fn with_page(mut self, page: u32) -> Self {
        self.page = page;
        self
    }

    pub fn with_per_page(mut self, per_page: u32) -> Self {
        self.per_page = per_page;
        self
    }

    pub fn with_order(mut self, order: MarketOrder) -> Self {
        self.order = order;
        self
    }

    pub fn with_ids<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ids = ids.into_iter().map(Into::into).collect();
        self
    }

    /// Returns a copy with every field brought into its valid range
    ///
    /// Currency is lowercased, page is at least 1, page size is clamped to
    /// `1..=MAX_PER_PAGE`, ids are lowercased, sorted and deduplicated.
    pub fn normalized(&self) -> Self {
        let mut ids: Vec<String> = self
            .ids
            .iter()
            .map(|id| id.trim().to_lowercase())
            .filter(|id| !id.is_empty())
            .collect();
        ids.sort();
        ids.dedup();

        let vs = self.vs_currency.trim().to_lowercase();
        Self {
            vs_currency: if vs.is_empty() { "usd".to_string() } else { vs },
            page: self.page.max(1),
            per_page: self.per_page.clamp(1, MAX_PER_PAGE),
            order: self.order,
            ids,
        }
    }

    /// Offset of the first item on the current page
    pub fn offset(&self) -> usize {
        (self.page.max(1) as usize - 1).saturating_mul(self.per_page as usize)
    }

    /// Deterministic cache key for this query against `endpoint`
    ///
    /// Only the parameters the endpoint actually uses take part, so
    /// `global` queries that differ in page size share one entry.
    pub fn signature(&self, endpoint: Endpoint) -> String {
        let p = self.normalized();
        match endpoint {
            Endpoint::Markets => format!(
                "{}?vs_currency={}&order={}&page={}&per_page={}&ids={}",
                endpoint,
                p.vs_currency,
                p.order.as_str(),
                p.page,
                p.per_page,
                p.ids.join(",")
            ),
            Endpoint::Global => format!("{}?vs_currency={}", endpoint, p.vs_currency),
            Endpoint::Trending | Endpoint::CoinList => endpoint.path().to_string(),
            Endpoint::SimplePrice => format!(
                "{}?ids={}&vs_currency={}",
                endpoint,
                p.ids.join(","),
                p.vs_currency
            ),
        }
    }
}

/// One row of a market listing
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CoinMarket {
    pub id: String,
    pub symbol: String,
    pub name: String,
    pub image: Option<String>,
    pub current_price: f64,
    pub market_cap: f64,
    pub market_cap_rank: u32,
    pub total_volume: f64,
    pub high_24h: f64,
    pub low_24h: f64,
    pub price_change_percentage_24h: f64,
    pub price_change_percentage_7d: f64,
    pub circulating_supply: f64,
    /// Hourly prices over the last 7 days, oldest first
    pub sparkline_7d: Vec<f64>,
    pub last_updated: Option<DateTime<Utc>>,
}

/// Aggregate market statistics in the query currency
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GlobalStats {
    pub total_market_cap: f64,
    pub total_volume: f64,
    pub market_cap_change_percentage_24h: f64,
    /// Bitcoin share of total market cap, in percent
    pub btc_dominance: f64,
    /// Ethereum share of total market cap, in percent
    pub eth_dominance: f64,
    pub active_cryptocurrencies: u64,
    pub markets: u64,
    pub updated_at: Option<DateTime<Utc>>,
}

/// A coin currently trending in searches
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TrendingCoin {
    pub id: String,
    pub symbol: String,
    pub name: String,
    pub thumb: Option<String>,
    pub market_cap_rank: u32,
    /// Position in the trending list, 0 = hottest
    pub score: u32,
    pub price_btc: f64,
    pub price: f64,
    pub price_change_percentage_24h: f64,
    pub market_cap: f64,
    pub total_volume: f64,
}

/// Entry of the coin directory
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CoinListing {
    pub id: String,
    pub symbol: String,
    pub name: String,
}

/// Spot price of a coin in the query currency
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SpotQuote {
    pub price: f64,
    pub price_change_percentage_24h: f64,
}

/// Canonical payload of any logical endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum MarketPayload {
    Markets(Vec<CoinMarket>),
    Global(GlobalStats),
    Trending(Vec<TrendingCoin>),
    CoinList(Vec<CoinListing>),
    Prices(BTreeMap<String, SpotQuote>),
}

impl MarketPayload {
    /// Endpoint this payload answers
    pub fn endpoint(&self) -> Endpoint {
        match self {
            MarketPayload::Markets(_) => Endpoint::Markets,
            MarketPayload::Global(_) => Endpoint::Global,
            MarketPayload::Trending(_) => Endpoint::Trending,
            MarketPayload::CoinList(_) => Endpoint::CoinList,
            MarketPayload::Prices(_) => Endpoint::SimplePrice,
        }
    }

    pub fn into_markets(self) -> Option<Vec<CoinMarket>> {
        match self {
            MarketPayload::Markets(v) => Some(v),
            _ => None,
        }
    }

    pub fn into_global(self) -> Option<GlobalStats> {
        match self {
            MarketPayload::Global(v) => Some(v),
            _ => None,
        }
    }

    pub fn into_trending(self) -> Option<Vec<TrendingCoin>> {
        match self {
            MarketPayload::Trending(v) => Some(v),
            _ => None,
        }
    }

    pub fn into_coin_list(self) -> Option<Vec<CoinListing>> {
        match self {
            MarketPayload::CoinList(v) => Some(v),
            _ => None,
        }
    }

    pub fn into_prices(self) -> Option<BTreeMap<String, SpotQuote>> {
        match self {
            MarketPayload::Prices(v) => Some(v),
            _ => None,
        }
    }
}

/// Result envelope handed back to callers
///
/// `success` stays true even when every provider failed: the data is then a
/// placeholder, `provider` is `"synthetic"` and `error` carries the last
/// real error seen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchResult<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    /// Shortest rate-limit hint observed, in milliseconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
}

impl<T> FetchResult<T> {
    /// Data served by a real provider
    pub fn from_provider(data: T, provider: impl Into<String>) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            provider: Some(provider.into()),
            retry_after: None,
        }
    }

    /// Placeholder data after every provider failed
    pub fn synthetic(data: T, error: Option<String>, retry_after: Option<u64>) -> Self {
        Self {
            success: true,
            data: Some(data),
            error,
            provider: Some(SYNTHETIC_PROVIDER.to_string()),
            retry_after,
        }
    }

    /// Hard failure without data
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            provider: None,
            retry_after: None,
        }
    }

    /// True when the data is a locally generated placeholder
    pub fn is_synthetic(&self) -> bool {
        self.provider.as_deref() == Some(SYNTHETIC_PROVIDER)
    }

    /// Converts the data, turning a `None` conversion into a failure
    pub fn and_then_data<U>(self, f: impl FnOnce(T) -> Option<U>) -> FetchResult<U> {
        let provider = self.provider.clone();
        match self.data.map(f) {
            Some(Some(data)) => FetchResult {
                success: self.success,
                data: Some(data),
                error: self.error,
                provider,
                retry_after: self.retry_after,
            },
            Some(None) => FetchResult {
                provider,
                ..FetchResult::failure(format!(
                    "unexpected payload shape from {}",
                    self.provider.as_deref().unwrap_or("unknown provider")
                ))
            },
            None => FetchResult {
                success: self.success,
                data: None,
                error: self.error,
                provider,
                retry_after: self.retry_after,
            },
        }
    }
}

/// Combined view used by dashboards
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub markets: FetchResult<Vec<CoinMarket>>,
    pub global: FetchResult<GlobalStats>,
    pub trending: FetchResult<Vec<TrendingCoin>>,
}

/// Provider status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderStatus {
    /// Provider is healthy
    Healthy,
    /// Provider is rate-limited or out of budget for the current window
    Degraded,
    /// Provider is in its failure backoff window
    Unavailable,
}

/// Overall system health status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthStatus {
    /// System is healthy and all components are operational
    Healthy,
    /// System is degraded but still functional
    Degraded,
    /// System is unhealthy and requires attention
    Unhealthy,
}

/// Component health information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    /// Component name
    pub name: String,
    /// Component status
    pub status: HealthStatus,
    /// Optional status message
    pub message: Option<String>,
    /// Component-specific details
    pub details: HashMap<String, serde_json::Value>,
    /// Last checked timestamp
    pub last_checked: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalized_clamps_and_sorts() {
        let p = QueryParams::new()
            .with_vs_currency(" EUR ")
            .with_page(0)
            .with_per_page(10_000)
            .with_ids(["Ethereum", "bitcoin", "ethereum", " "])
            .normalized();

        assert_eq!(p.vs_currency, "eur");
        assert_eq!(p.page, 1);
        assert_eq!(p.per_page, MAX_PER_PAGE);
        assert_eq!(p.ids, vec!["bitcoin".to_string(), "ethereum".to_string()]);
    }

    #[test]
    fn test_signature_ignores_unused_params() {
        let a = QueryParams::new().with_per_page(10);
        let b = QueryParams::new().with_per_page(50);
        assert_eq!(a.signature(Endpoint::Global), b.signature(Endpoint::Global));
        assert_ne!(a.signature(Endpoint::Markets), b.signature(Endpoint::Markets));
    }

    #[test]
    fn test_markets_signature_depends_on_ids() {
        let btc = QueryParams::new().with_ids(["bitcoin"]);
        let eth = QueryParams::new().with_ids(["ethereum"]);
        assert_ne!(btc.signature(Endpoint::Markets), eth.signature(Endpoint::Markets));
        assert_ne!(
            btc.signature(Endpoint::Markets),
            QueryParams::new().signature(Endpoint::Markets)
        );
    }

    #[test]
    fn test_signature_is_order_insensitive_for_ids() {
        let a = QueryParams::new().with_ids(["solana", "bitcoin"]);
        let b = QueryParams::new().with_ids(["bitcoin", "solana"]);
        assert_eq!(
            a.signature(Endpoint::SimplePrice),
            b.signature(Endpoint::SimplePrice)
        );
    }

    #[test]
    fn test_envelope_serializes_camel_case() {
        let result = FetchResult::synthetic(1u32, Some("boom".into()), Some(60_000));
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["provider"], "synthetic");
        assert_eq!(json["retryAfter"], 60_000);
        assert!(result.is_synthetic());
    }

    #[test]
    fn test_and_then_data_reports_shape_mismatch() {
        let result = FetchResult::from_provider(MarketPayload::CoinList(vec![]), "coingecko");
        let typed = result.and_then_data(MarketPayload::into_markets);
        assert!(!typed.success);
        assert!(typed.data.is_none());
        assert_eq!(typed.provider.as_deref(), Some("coingecko"));
    }
}
