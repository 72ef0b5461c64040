//! CoinPaprika provider implementation
//!
//! Paprika has no server-side paging or sorting for tickers, identifies
//! coins as `btc-bitcoin` and carries no trending feed. The transformers
//! page, sort and re-key the full ticker list locally.

use super::apply_order;
use super::parse::{array, number, opt_number, position_rank, rank, string, timestamp, unsigned};
use crate::{
    config::MarketDataConfig,
    constants::{COINPAPRIKA_API_URL, COINPAPRIKA_REQUESTS_PER_MINUTE},
    error::ProviderError,
    provider::MarketDataProvider,
    registry::ProviderDescriptor,
    types::{
        CoinListing, CoinMarket, Endpoint, GlobalStats, MarketPayload, QueryParams, SpotQuote,
    },
};
use serde_json::Value;
use std::collections::BTreeMap;

const LOGO_URL: &str = "https://static.coinpaprika.com/coin";

/// CoinPaprika provider
pub struct CoinPaprikaProvider {
    descriptor: ProviderDescriptor,
}

/// Paprika ids whose stripped form differs from the canonical id
const ID_ALIASES: &[(&str, &str)] = &[
    ("xrp-xrp", "ripple"),
    ("bnb-binance-coin", "binancecoin"),
    ("avax-avalanche", "avalanche-2"),
    ("matic-polygon", "matic-network"),
    ("ton-toncoin", "the-open-network"),
    ("near-near-protocol", "near"),
    ("steth-lido-staked-ether", "staked-ether"),
];

/// `btc-bitcoin` -> `bitcoin`
///
/// Known aliases win. Otherwise ids that do not start with their own symbol
/// are kept as they are.
pub fn canonical_id(paprika_id: &str, symbol: &str) -> String {
    if let Some((_, canonical)) = ID_ALIASES.iter().find(|(alias, _)| *alias == paprika_id) {
        return canonical.to_string();
    }
    let prefix = format!("{}-", symbol.to_lowercase());
    paprika_id
        .strip_prefix(prefix.as_str())
        .filter(|rest| !rest.is_empty())
        .unwrap_or(paprika_id)
        .to_string()
}

impl CoinPaprikaProvider {
    /// Creates the provider from its descriptor
    pub fn new(descriptor: ProviderDescriptor) -> Self {
        Self { descriptor }
    }

    /// Default descriptor: public API, priority 2, per-minute budget
    pub fn descriptor_for(config: &MarketDataConfig) -> ProviderDescriptor {
        ProviderDescriptor::new("coinpaprika", COINPAPRIKA_API_URL, 2)
            .with_budget(COINPAPRIKA_REQUESTS_PER_MINUTE)
            .with_timeout(config.request_timeout)
    }

    fn quote<'a>(item: &'a Value, params: &QueryParams) -> Option<&'a Value> {
        item.get("quotes")
            .and_then(|q| q.get(params.vs_currency.to_uppercase()))
    }

    fn ticker(item: &Value, index: usize, params: &QueryParams) -> CoinMarket {
        let paprika_id = string(item.get("id"));
        let symbol = string(item.get("symbol")).to_lowercase();
        let quote = Self::quote(item, params);
        let field = |name: &str| quote.and_then(|q| q.get(name));

        CoinMarket {
            id: canonical_id(&paprika_id, &symbol),
            image: (!paprika_id.is_empty()).then(|| format!("{}/{}/logo.png", LOGO_URL, paprika_id)),
            name: string(item.get("name")),
            current_price: number(field("price")),
            market_cap: number(field("market_cap")),
            market_cap_rank: rank(item.get("rank")).unwrap_or_else(|| position_rank(index + 1)),
            total_volume: number(field("volume_24h")),
            high_24h: 0.0,
            low_24h: 0.0,
            price_change_percentage_24h: number(field("percent_change_24h")),
            price_change_percentage_7d: number(field("percent_change_7d")),
            circulating_supply: number(item.get("circulating_supply")),
            sparkline_7d: Vec::new(),
            last_updated: timestamp(item.get("last_updated")),
            symbol,
        }
    }

    fn markets(&self, raw: &Value, params: &QueryParams) -> Vec<CoinMarket> {
        let mut rows: Vec<CoinMarket> = array(Some(raw))
            .iter()
            .enumerate()
            .map(|(i, item)| Self::ticker(item, i, params))
            .filter(|row| params.ids.is_empty() || params.ids.contains(&row.id))
            .collect();

        apply_order(&mut rows, params.order);
        rows.into_iter()
            .skip(params.offset())
            .take(params.per_page as usize)
            .collect()
    }

    fn global(&self, raw: &Value) -> GlobalStats {
        GlobalStats {
            total_market_cap: number(raw.get("market_cap_usd")),
            total_volume: number(raw.get("volume_24h_usd")),
            market_cap_change_percentage_24h: number(raw.get("market_cap_change_24h")),
            btc_dominance: number(raw.get("bitcoin_dominance_percentage")),
            eth_dominance: 0.0,
            active_cryptocurrencies: unsigned(raw.get("cryptocurrencies_number")).unwrap_or(0),
            markets: 0,
            updated_at: timestamp(raw.get("last_updated")),
        }
    }

    fn coin_list(&self, raw: &Value) -> Vec<CoinListing> {
        array(Some(raw))
            .iter()
            .filter(|coin| coin.get("is_active").and_then(Value::as_bool) != Some(false))
            .map(|coin| {
                let symbol = string(coin.get("symbol")).to_lowercase();
                CoinListing {
                    id: canonical_id(&string(coin.get("id")), &symbol),
                    name: string(coin.get("name")),
                    symbol,
                }
            })
            .filter(|c| !c.id.is_empty())
            .collect()
    }

    fn prices(&self, raw: &Value, params: &QueryParams) -> BTreeMap<String, SpotQuote> {
        array(Some(raw))
            .iter()
            .filter_map(|item| {
                let symbol = string(item.get("symbol"));
                let id = canonical_id(&string(item.get("id")), &symbol);
                if !params.ids.contains(&id) {
                    return None;
                }
                let quote = Self::quote(item, params);
                let price = opt_number(quote.and_then(|q| q.get("price")))?;
                Some((
                    id,
                    SpotQuote {
                        price,
                        price_change_percentage_24h: number(
                            quote.and_then(|q| q.get("percent_change_24h")),
                        ),
                    },
                ))
            })
            .collect()
    }
}

impl MarketDataProvider for CoinPaprikaProvider {
    fn descriptor(&self) -> &ProviderDescriptor {
        &self.descriptor
    }

    fn build_url(&self, endpoint: Endpoint, params: &QueryParams) -> Result<String, ProviderError> {
        let path = match endpoint {
            Endpoint::Markets | Endpoint::SimplePrice => {
                format!("/tickers?quotes={}", params.vs_currency.to_uppercase())
            }
            Endpoint::Global if params.vs_currency == "usd" => "/global".to_string(),
            Endpoint::CoinList => "/coins".to_string(),
            Endpoint::Global | Endpoint::Trending => {
                return Err(ProviderError::unsupported(self.name(), endpoint));
            }
        };
        Ok(self.descriptor.url(&path))
    }

    fn transform(&self, endpoint: Endpoint, raw: &Value, params: &QueryParams) -> MarketPayload {
        match endpoint {
            Endpoint::Markets => MarketPayload::Markets(self.markets(raw, params)),
            Endpoint::Global => MarketPayload::Global(self.global(raw)),
            Endpoint::Trending => MarketPayload::Trending(Vec::new()),
            Endpoint::CoinList => MarketPayload::CoinList(self.coin_list(raw)),
            Endpoint::SimplePrice => MarketPayload::Prices(self.prices(raw, params)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MarketOrder;
    use serde_json::json;

    fn provider() -> CoinPaprikaProvider {
        CoinPaprikaProvider::new(CoinPaprikaProvider::descriptor_for(&MarketDataConfig::default()))
    }

    fn tickers() -> Value {
        json!([
            {"id": "btc-bitcoin", "name": "Bitcoin", "symbol": "BTC", "rank": 1,
             "circulating_supply": 19600000,
             "last_updated": "2024-03-01T12:00:00Z",
             "quotes": {"USD": {"price": 64000.0, "volume_24h": 3.0e10, "market_cap": 1.25e12,
                                "percent_change_24h": -1.0, "percent_change_7d": 5.0}}},
            {"id": "eth-ethereum", "name": "Ethereum", "symbol": "ETH", "rank": 2,
             "quotes": {"USD": {"price": 3100.0, "volume_24h": 1.5e10, "market_cap": 3.7e11}}},
            {"id": "usdt-tether", "name": "Tether", "symbol": "USDT",
             "quotes": {"USD": {"price": 1.0, "volume_24h": 5.0e10, "market_cap": 1.0e11}}}
        ])
    }

    #[test]
    fn test_canonical_id_strips_symbol_prefix() {
        assert_eq!(canonical_id("btc-bitcoin", "BTC"), "bitcoin");
        assert_eq!(canonical_id("matic-network", "POL"), "matic-network");
        assert_eq!(canonical_id("x-", "x"), "x-");
    }

    #[test]
    fn test_canonical_id_maps_known_aliases() {
        assert_eq!(canonical_id("xrp-xrp", "XRP"), "ripple");
        assert_eq!(canonical_id("bnb-binance-coin", "BNB"), "binancecoin");
        assert_eq!(canonical_id("usdt-tether", "USDT"), "tether");
    }

    #[test]
    fn test_prices_resolve_aliased_ids() {
        let raw = json!([
            {"id": "xrp-xrp", "symbol": "XRP", "quotes": {"USD": {"price": 0.52, "percent_change_24h": 1.5}}},
            {"id": "bnb-binance-coin", "symbol": "BNB", "quotes": {"USD": {"price": 590.0}}}
        ]);
        let params = QueryParams::new().with_ids(["ripple", "binancecoin"]).normalized();
        let prices = provider()
            .transform(Endpoint::SimplePrice, &raw, &params)
            .into_prices()
            .unwrap();
        assert_eq!(prices.len(), 2);
        assert_eq!(prices["ripple"].price, 0.52);
        assert_eq!(prices["binancecoin"].price, 590.0);
    }

    #[test]
    fn test_trending_and_non_usd_global_are_unsupported() {
        let p = provider();
        assert!(matches!(
            p.build_url(Endpoint::Trending, &QueryParams::default()),
            Err(ProviderError::UnsupportedEndpoint { .. })
        ));
        assert!(p
            .build_url(Endpoint::Global, &QueryParams::new().with_vs_currency("eur"))
            .is_err());
        assert!(p.build_url(Endpoint::Global, &QueryParams::default()).is_ok());
    }

    #[test]
    fn test_markets_are_paged_locally() {
        let params = QueryParams::new().with_page(2).with_per_page(2);
        let rows = provider()
            .transform(Endpoint::Markets, &tickers(), &params)
            .into_markets()
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, "tether");
        // unranked third ticker gets its list position
        assert_eq!(rows[0].market_cap_rank, 3);
        assert_eq!(rows[0].sparkline_7d, Vec::<f64>::new());
    }

    #[test]
    fn test_markets_apply_requested_order() {
        let params = QueryParams::new().with_order(MarketOrder::VolumeDesc);
        let rows = provider()
            .transform(Endpoint::Markets, &tickers(), &params)
            .into_markets()
            .unwrap();
        let ids: Vec<&str> = rows.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["tether", "bitcoin", "ethereum"]);
        assert!(rows[1]
            .image
            .as_deref()
            .unwrap()
            .ends_with("/btc-bitcoin/logo.png"));
    }

    #[test]
    fn test_prices_match_canonical_ids() {
        let params = QueryParams::new().with_ids(["ethereum", "dogecoin"]);
        let prices = provider()
            .transform(Endpoint::SimplePrice, &tickers(), &params)
            .into_prices()
            .unwrap();
        assert_eq!(prices.len(), 1);
        assert_eq!(prices["ethereum"].price, 3100.0);
    }

    #[test]
    fn test_coin_list_skips_inactive() {
        let raw = json!([
            {"id": "btc-bitcoin", "name": "Bitcoin", "symbol": "BTC", "is_active": true},
            {"id": "old-oldcoin", "name": "Old", "symbol": "OLD", "is_active": false}
        ]);
        let list = provider()
            .transform(Endpoint::CoinList, &raw, &QueryParams::default())
            .into_coin_list()
            .unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].id, "bitcoin");
    }
}
