//! Placeholder payloads served when every provider failed
//!
//! Shapes are complete and deterministic; every number is zero so nothing
//! can be mistaken for a real quote.

use crate::providers::parse::position_rank;
use crate::types::{CoinListing, CoinMarket, Endpoint, MarketPayload, QueryParams, SpotQuote};

/// Large caps used to fill the head of a placeholder listing
const SEED_COINS: &[(&str, &str, &str)] = &[
    ("bitcoin", "btc", "Bitcoin"),
    ("ethereum", "eth", "Ethereum"),
    ("tether", "usdt", "Tether"),
    ("binancecoin", "bnb", "BNB"),
    ("solana", "sol", "Solana"),
    ("usd-coin", "usdc", "USDC"),
    ("ripple", "xrp", "XRP"),
    ("dogecoin", "doge", "Dogecoin"),
    ("cardano", "ada", "Cardano"),
    ("tron", "trx", "TRON"),
];

fn seed_row(rank: usize) -> CoinMarket {
    let (id, symbol, name) = match SEED_COINS.get(rank.wrapping_sub(1)) {
        Some((id, symbol, name)) => (id.to_string(), symbol.to_string(), name.to_string()),
        None => (
            format!("placeholder-{}", rank),
            String::new(),
            format!("Placeholder {}", rank),
        ),
    };
    CoinMarket {
        id,
        symbol,
        name,
        market_cap_rank: position_rank(rank),
        ..CoinMarket::default()
    }
}

/// Row for a requested id; unknown ids keep the id as their name
fn id_row(id: &str, rank: usize) -> CoinMarket {
    let (symbol, name) = SEED_COINS
        .iter()
        .find(|(seed, _, _)| *seed == id)
        .map(|(_, symbol, name)| (symbol.to_string(), name.to_string()))
        .unwrap_or_else(|| (String::new(), id.to_string()));
    CoinMarket {
        id: id.to_string(),
        symbol,
        name,
        market_cap_rank: position_rank(rank),
        ..CoinMarket::default()
    }
}

/// Placeholder for `endpoint`
///
/// Market listings have one row per requested id, or exactly `per_page`
/// rows ranked from the page offset when no ids were given. Expects
/// normalized params.
pub fn placeholder(endpoint: Endpoint, params: &QueryParams) -> MarketPayload {
    match endpoint {
        Endpoint::Markets if !params.ids.is_empty() => MarketPayload::Markets(
            params
                .ids
                .iter()
                .enumerate()
                .map(|(i, id)| id_row(id, i + 1))
                .collect(),
        ),
        Endpoint::Markets => {
            let offset = params.offset();
            MarketPayload::Markets(
                (0..params.per_page as usize)
                    .map(|i| seed_row(offset.saturating_add(i + 1)))
                    .collect(),
            )
        }
        Endpoint::Global => MarketPayload::Global(Default::default()),
        Endpoint::Trending => MarketPayload::Trending(Vec::new()),
        Endpoint::CoinList => MarketPayload::CoinList(
            SEED_COINS
                .iter()
                .map(|(id, symbol, name)| CoinListing {
                    id: id.to_string(),
                    symbol: symbol.to_string(),
                    name: name.to_string(),
                })
                .collect(),
        ),
        Endpoint::SimplePrice => MarketPayload::Prices(
            params
                .ids
                .iter()
                .map(|id| (id.clone(), SpotQuote::default()))
                .collect(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_markets_placeholder_matches_page_size() {
        let params = QueryParams::new().with_per_page(25);
        let rows = placeholder(Endpoint::Markets, &params).into_markets().unwrap();
        assert_eq!(rows.len(), 25);
        assert_eq!(rows[0].id, "bitcoin");
        assert_eq!(rows[24].id, "placeholder-25");
        assert!(rows.iter().all(|r| r.current_price == 0.0));
    }

    #[test]
    fn test_markets_placeholder_ranks_follow_page() {
        let params = QueryParams::new().with_page(3).with_per_page(5);
        let rows = placeholder(Endpoint::Markets, &params).into_markets().unwrap();
        let ranks: Vec<u32> = rows.iter().map(|r| r.market_cap_rank).collect();
        assert_eq!(ranks, vec![11, 12, 13, 14, 15]);
    }

    #[test]
    fn test_markets_placeholder_lists_requested_ids() {
        let params = QueryParams::new()
            .with_ids(["solana", "my-token"])
            .with_per_page(50)
            .normalized();
        let rows = placeholder(Endpoint::Markets, &params).into_markets().unwrap();
        let ids: Vec<&str> = rows.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["my-token", "solana"]);
        assert_eq!(rows[1].symbol, "sol");
        assert_eq!(rows[0].name, "my-token");
        assert!(rows.iter().all(|r| r.current_price == 0.0));
    }

    #[test]
    fn test_markets_placeholder_rank_saturates_on_deep_pages() {
        let params = QueryParams::new()
            .with_page(u32::MAX)
            .with_per_page(250)
            .normalized();
        let rows = placeholder(Endpoint::Markets, &params).into_markets().unwrap();
        assert_eq!(rows.len(), 250);
        assert!(rows.iter().all(|r| r.market_cap_rank == u32::MAX));
    }

    #[test]
    fn test_prices_placeholder_covers_requested_ids() {
        let params = QueryParams::new().with_ids(["bitcoin", "solana"]);
        let prices = placeholder(Endpoint::SimplePrice, &params).into_prices().unwrap();
        assert_eq!(prices.len(), 2);
        assert_eq!(prices["solana"], SpotQuote::default());
    }
}
