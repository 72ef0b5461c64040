//! CoinGecko provider implementation

use super::parse::{array, number, number_array, opt_number, opt_string, position_rank, rank, string, timestamp, unsigned};
use crate::{
    config::MarketDataConfig,
    constants::{COINGECKO_API_URL, COINGECKO_REQUESTS_PER_MINUTE},
    error::ProviderError,
    provider::MarketDataProvider,
    registry::ProviderDescriptor,
    types::{
        CoinListing, CoinMarket, Endpoint, GlobalStats, MarketPayload, QueryParams, SpotQuote,
        TrendingCoin,
    },
};
use serde_json::Value;
use std::collections::BTreeMap;

/// CoinGecko provider
///
/// The canonical schema follows CoinGecko's field names closely, so most
/// mappings here are one-to-one.
pub struct CoinGeckoProvider {
    descriptor: ProviderDescriptor,
}

impl CoinGeckoProvider {
    /// Creates the provider from its descriptor
    pub fn new(descriptor: ProviderDescriptor) -> Self {
        Self { descriptor }
    }

    /// Default descriptor, with the demo API key header when configured
    pub fn descriptor_for(config: &MarketDataConfig) -> ProviderDescriptor {
        let descriptor = ProviderDescriptor::new("coingecko", COINGECKO_API_URL, 1)
            .with_budget(COINGECKO_REQUESTS_PER_MINUTE)
            .with_timeout(config.request_timeout);
        match &config.keys.coingecko {
            Some(key) => descriptor.with_header("x-cg-demo-api-key", key.clone()),
            None => descriptor,
        }
    }

    fn markets(&self, raw: &Value, params: &QueryParams) -> Vec<CoinMarket> {
        let offset = params.offset();
        array(Some(raw))
            .iter()
            .enumerate()
            .map(|(i, item)| CoinMarket {
                id: string(item.get("id")),
                symbol: string(item.get("symbol")).to_lowercase(),
                name: string(item.get("name")),
                image: opt_string(item.get("image")),
                current_price: number(item.get("current_price")),
                market_cap: number(item.get("market_cap")),
                market_cap_rank: rank(item.get("market_cap_rank"))
                    .unwrap_or_else(|| position_rank(offset + i + 1)),
                total_volume: number(item.get("total_volume")),
                high_24h: number(item.get("high_24h")),
                low_24h: number(item.get("low_24h")),
                price_change_percentage_24h: number(item.get("price_change_percentage_24h")),
                price_change_percentage_7d: number(
                    item.get("price_change_percentage_7d_in_currency"),
                ),
                circulating_supply: number(item.get("circulating_supply")),
                sparkline_7d: number_array(
                    item.get("sparkline_in_7d").and_then(|s| s.get("price")),
                ),
                last_updated: timestamp(item.get("last_updated")),
            })
            .collect()
    }

    fn global(&self, raw: &Value, params: &QueryParams) -> GlobalStats {
        let data = raw.get("data");
        let field = |name: &str| data.and_then(|d| d.get(name));
        let in_vs = |name: &str| field(name).and_then(|m| m.get(&params.vs_currency));
        let dominance = |coin: &str| field("market_cap_percentage").and_then(|m| m.get(coin));

        GlobalStats {
            total_market_cap: number(in_vs("total_market_cap")),
            total_volume: number(in_vs("total_volume")),
            market_cap_change_percentage_24h: number(field("market_cap_change_percentage_24h_usd")),
            btc_dominance: number(dominance("btc")),
            eth_dominance: number(dominance("eth")),
            active_cryptocurrencies: unsigned(field("active_cryptocurrencies")).unwrap_or(0),
            markets: unsigned(field("markets")).unwrap_or(0),
            updated_at: timestamp(field("updated_at")),
        }
    }

    fn trending(&self, raw: &Value, params: &QueryParams) -> Vec<TrendingCoin> {
        array(raw.get("coins"))
            .iter()
            .enumerate()
            .map(|(i, entry)| {
                // entries are either {"item": {...}} or the bare item
                let item = entry.get("item").unwrap_or(entry);
                let data = item.get("data");
                let change = data
                    .and_then(|d| d.get("price_change_percentage_24h"))
                    .and_then(|c| c.get(&params.vs_currency).or_else(|| c.get("usd")));

                TrendingCoin {
                    id: string(item.get("id")),
                    symbol: string(item.get("symbol")).to_lowercase(),
                    name: string(item.get("name")),
                    thumb: opt_string(item.get("thumb")).or_else(|| opt_string(item.get("small"))),
                    market_cap_rank: rank(item.get("market_cap_rank")).unwrap_or(0),
                    score: unsigned(item.get("score"))
                        .and_then(|s| u32::try_from(s).ok())
                        .unwrap_or(i as u32),
                    price_btc: number(item.get("price_btc")),
                    price: number(data.and_then(|d| d.get("price"))),
                    price_change_percentage_24h: number(change),
                    market_cap: number(data.and_then(|d| d.get("market_cap"))),
                    total_volume: number(data.and_then(|d| d.get("total_volume"))),
                }
            })
            .collect()
    }

    fn coin_list(&self, raw: &Value) -> Vec<CoinListing> {
        array(Some(raw))
            .iter()
            .map(|item| CoinListing {
                id: string(item.get("id")),
                symbol: string(item.get("symbol")).to_lowercase(),
                name: string(item.get("name")),
            })
            .filter(|c| !c.id.is_empty())
            .collect()
    }

    fn prices(&self, raw: &Value, params: &QueryParams) -> BTreeMap<String, SpotQuote> {
        let vs = params.vs_currency.as_str();
        let change_key = format!("{}_24h_change", vs);
        let Some(map) = raw.as_object() else {
            return BTreeMap::new();
        };

        map.iter()
            .filter(|(id, _)| params.ids.is_empty() || params.ids.contains(*id))
            .filter_map(|(id, quote)| {
                let price = opt_number(quote.get(vs))?;
                Some((
                    id.clone(),
                    SpotQuote {
                        price,
                        price_change_percentage_24h: number(quote.get(&change_key)),
                    },
                ))
            })
            .collect()
    }
}

impl MarketDataProvider for CoinGeckoProvider {
    fn descriptor(&self) -> &ProviderDescriptor {
        &self.descriptor
    }

    fn build_url(&self, endpoint: Endpoint, params: &QueryParams) -> Result<String, ProviderError> {
        let path = match endpoint {
            Endpoint::Markets => {
                let mut path = format!(
                    "/coins/markets?vs_currency={}&order={}&per_page={}&page={}&sparkline=true&price_change_percentage=24h,7d",
                    params.vs_currency,
                    params.order.as_str(),
                    params.per_page,
                    params.page
                );
                if !params.ids.is_empty() {
                    path.push_str(&format!("&ids={}", params.ids.join(",")));
                }
                path
            }
            Endpoint::Global => "/global".to_string(),
            Endpoint::Trending => "/search/trending".to_string(),
            Endpoint::CoinList => "/coins/list".to_string(),
            Endpoint::SimplePrice => format!(
                "/simple/price?ids={}&vs_currencies={}&include_24hr_change=true",
                params.ids.join(","),
                params.vs_currency
            ),
        };
        Ok(self.descriptor.url(&path))
    }

    fn transform(&self, endpoint: Endpoint, raw: &Value, params: &QueryParams) -> MarketPayload {
        match endpoint {
            Endpoint::Markets => MarketPayload::Markets(self.markets(raw, params)),
            Endpoint::Global => MarketPayload::Global(self.global(raw, params)),
            Endpoint::Trending => MarketPayload::Trending(self.trending(raw, params)),
            Endpoint::CoinList => MarketPayload::CoinList(self.coin_list(raw)),
            Endpoint::SimplePrice => MarketPayload::Prices(self.prices(raw, params)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn provider() -> CoinGeckoProvider {
        CoinGeckoProvider::new(CoinGeckoProvider::descriptor_for(&MarketDataConfig::default()))
    }

    #[test]
    fn test_markets_url_carries_paging_and_order() {
        let params = QueryParams::new()
            .with_vs_currency("eur")
            .with_page(2)
            .with_per_page(50);
        let url = provider().build_url(Endpoint::Markets, &params).unwrap();
        assert!(url.starts_with("https://api.coingecko.com/api/v3/coins/markets?"));
        assert!(url.contains("vs_currency=eur"));
        assert!(url.contains("page=2"));
        assert!(url.contains("per_page=50"));
        assert!(url.contains("order=market_cap_desc"));
    }

    #[test]
    fn test_markets_transform_maps_fields() {
        let raw = json!([{
            "id": "bitcoin",
            "symbol": "BTC",
            "name": "Bitcoin",
            "image": "https://example.com/btc.png",
            "current_price": 64000.5,
            "market_cap": 1.26e12,
            "market_cap_rank": 1,
            "total_volume": 3.1e10,
            "high_24h": 65000,
            "low_24h": 63000,
            "price_change_percentage_24h": -1.5,
            "price_change_percentage_7d_in_currency": 4.25,
            "circulating_supply": 19_600_000,
            "sparkline_in_7d": {"price": [63000.0, 63500.0, 64000.5]},
            "last_updated": "2024-03-01T12:00:00.000Z"
        }]);

        let rows = provider()
            .transform(Endpoint::Markets, &raw, &QueryParams::default())
            .into_markets()
            .unwrap();
        let btc = &rows[0];
        assert_eq!(btc.symbol, "btc");
        assert_eq!(btc.current_price, 64000.5);
        assert_eq!(btc.price_change_percentage_7d, 4.25);
        assert_eq!(btc.sparkline_7d.len(), 3);
        assert!(btc.last_updated.is_some());
    }

    #[test]
    fn test_markets_rank_synthesized_from_page_offset() {
        let raw = json!([{"id": "a", "market_cap_rank": null}, {"id": "b"}]);
        let params = QueryParams::new().with_page(3).with_per_page(10);
        let rows = provider()
            .transform(Endpoint::Markets, &raw, &params)
            .into_markets()
            .unwrap();
        assert_eq!(rows[0].market_cap_rank, 21);
        assert_eq!(rows[1].market_cap_rank, 22);
    }

    #[test]
    fn test_global_reads_requested_currency() {
        let raw = json!({"data": {
            "active_cryptocurrencies": 13000,
            "markets": 1000,
            "total_market_cap": {"usd": 2.5e12, "eur": 2.3e12},
            "total_volume": {"usd": 9.0e10},
            "market_cap_percentage": {"btc": 52.1, "eth": 16.9},
            "market_cap_change_percentage_24h_usd": 1.2,
            "updated_at": 1_709_294_400
        }});
        let params = QueryParams::new().with_vs_currency("eur");
        let stats = provider()
            .transform(Endpoint::Global, &raw, &params)
            .into_global()
            .unwrap();
        assert_eq!(stats.total_market_cap, 2.3e12);
        assert_eq!(stats.total_volume, 0.0);
        assert_eq!(stats.btc_dominance, 52.1);
        assert_eq!(stats.active_cryptocurrencies, 13000);
    }

    #[test]
    fn test_trending_parses_formatted_numbers() {
        let raw = json!({"coins": [{"item": {
            "id": "pepe",
            "name": "Pepe",
            "symbol": "PEPE",
            "market_cap_rank": 30,
            "thumb": "https://example.com/pepe.png",
            "price_btc": 1.5e-10,
            "data": {
                "price": "$0.00001",
                "market_cap": "$4,200,000,000",
                "total_volume": "$1.2B",
                "price_change_percentage_24h": {"usd": 12.5}
            }
        }}]});
        let coins = provider()
            .transform(Endpoint::Trending, &raw, &QueryParams::default())
            .into_trending()
            .unwrap();
        assert_eq!(coins[0].score, 0);
        assert_eq!(coins[0].market_cap, 4.2e9);
        assert!((coins[0].total_volume - 1.2e9).abs() < 1.0);
        assert_eq!(coins[0].price_change_percentage_24h, 12.5);
    }

    #[test]
    fn test_prices_keep_only_requested_ids() {
        let raw = json!({
            "bitcoin": {"usd": 64000.0, "usd_24h_change": 2.0},
            "ethereum": {"usd": 3100.0},
            "broken": {"eur": 1.0}
        });
        let params = QueryParams::new().with_ids(["bitcoin", "broken"]);
        let prices = provider()
            .transform(Endpoint::SimplePrice, &raw, &params)
            .into_prices()
            .unwrap();
        assert_eq!(prices.len(), 1);
        assert_eq!(prices["bitcoin"].price_change_percentage_24h, 2.0);
    }
}
