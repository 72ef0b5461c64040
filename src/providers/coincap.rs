//! CoinCap provider implementation
//!
//! CoinCap quotes USD only and encodes every number as a string.

use super::apply_order;
use super::parse::{array, number, opt_number, position_rank, rank, string, timestamp_millis};
use crate::{
    config::MarketDataConfig,
    constants::{COINCAP_API_URL, COINCAP_REQUESTS_PER_MINUTE},
    error::ProviderError,
    provider::MarketDataProvider,
    registry::ProviderDescriptor,
    types::{CoinListing, CoinMarket, Endpoint, MarketPayload, QueryParams, SpotQuote},
};
use serde_json::Value;
use std::collections::BTreeMap;

const ICON_URL: &str = "https://assets.coincap.io/assets/icons";

/// Upper bound CoinCap accepts for `limit`
const MAX_LIMIT: usize = 2000;

/// CoinCap provider
pub struct CoinCapProvider {
    descriptor: ProviderDescriptor,
}

impl CoinCapProvider {
    /// Creates the provider from its descriptor
    pub fn new(descriptor: ProviderDescriptor) -> Self {
        Self { descriptor }
    }

    /// Default descriptor, with a bearer token when configured
    pub fn descriptor_for(config: &MarketDataConfig) -> ProviderDescriptor {
        let descriptor = ProviderDescriptor::new("coincap", COINCAP_API_URL, 3)
            .with_budget(COINCAP_REQUESTS_PER_MINUTE)
            .with_timeout(config.request_timeout);
        match &config.keys.coincap {
            Some(key) => descriptor.with_header("Authorization", format!("Bearer {}", key)),
            None => descriptor,
        }
    }

    fn markets(&self, raw: &Value, params: &QueryParams) -> Vec<CoinMarket> {
        let offset = params.offset();
        let last_updated = timestamp_millis(raw.get("timestamp"));

        let mut rows: Vec<CoinMarket> = array(raw.get("data"))
            .iter()
            .enumerate()
            .map(|(i, asset)| {
                let symbol = string(asset.get("symbol")).to_lowercase();
                CoinMarket {
                    id: string(asset.get("id")),
                    image: (!symbol.is_empty()).then(|| format!("{}/{}@2x.png", ICON_URL, symbol)),
                    name: string(asset.get("name")),
                    current_price: number(asset.get("priceUsd")),
                    market_cap: number(asset.get("marketCapUsd")),
                    market_cap_rank: rank(asset.get("rank"))
                        .unwrap_or_else(|| position_rank(offset + i + 1)),
                    total_volume: number(asset.get("volumeUsd24Hr")),
                    high_24h: 0.0,
                    low_24h: 0.0,
                    price_change_percentage_24h: number(asset.get("changePercent24Hr")),
                    price_change_percentage_7d: 0.0,
                    circulating_supply: number(asset.get("supply")),
                    sparkline_7d: Vec::new(),
                    last_updated,
                    symbol,
                }
            })
            .collect();

        // CoinCap pages by rank; other orders are applied within the page
        apply_order(&mut rows, params.order);
        rows
    }

    fn coin_list(&self, raw: &Value) -> Vec<CoinListing> {
        array(raw.get("data"))
            .iter()
            .map(|asset| CoinListing {
                id: string(asset.get("id")),
                symbol: string(asset.get("symbol")).to_lowercase(),
                name: string(asset.get("name")),
            })
            .filter(|c| !c.id.is_empty())
            .collect()
    }

    fn prices(&self, raw: &Value, params: &QueryParams) -> BTreeMap<String, SpotQuote> {
        array(raw.get("data"))
            .iter()
            .filter_map(|asset| {
                let id = string(asset.get("id"));
                if !params.ids.is_empty() && !params.ids.contains(&id) {
                    return None;
                }
                let price = opt_number(asset.get("priceUsd"))?;
                Some((
                    id,
                    SpotQuote {
                        price,
                        price_change_percentage_24h: number(asset.get("changePercent24Hr")),
                    },
                ))
            })
            .collect()
    }
}

impl MarketDataProvider for CoinCapProvider {
    fn descriptor(&self) -> &ProviderDescriptor {
        &self.descriptor
    }

    fn build_url(&self, endpoint: Endpoint, params: &QueryParams) -> Result<String, ProviderError> {
        let usd = params.vs_currency == "usd";
        let path = match endpoint {
            Endpoint::Markets if usd => {
                let mut path = format!("/assets?limit={}&offset={}", params.per_page, params.offset());
                if !params.ids.is_empty() {
                    path.push_str(&format!("&ids={}", params.ids.join(",")));
                }
                path
            }
            Endpoint::SimplePrice if usd => format!("/assets?ids={}", params.ids.join(",")),
            Endpoint::CoinList => format!("/assets?limit={}", MAX_LIMIT),
            _ => return Err(ProviderError::unsupported(self.name(), endpoint)),
        };
        Ok(self.descriptor.url(&path))
    }

    fn transform(&self, endpoint: Endpoint, raw: &Value, params: &QueryParams) -> MarketPayload {
        match endpoint {
            Endpoint::Markets => MarketPayload::Markets(self.markets(raw, params)),
            Endpoint::CoinList => MarketPayload::CoinList(self.coin_list(raw)),
            Endpoint::SimplePrice => MarketPayload::Prices(self.prices(raw, params)),
            Endpoint::Global => MarketPayload::Global(Default::default()),
            Endpoint::Trending => MarketPayload::Trending(Vec::new()),
        }
    }
}
