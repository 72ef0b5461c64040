//! Market data provider implementations

pub mod coincap;
pub mod coingecko;
pub mod coinpaprika;
pub mod parse;

pub use coincap::CoinCapProvider;
pub use coingecko::CoinGeckoProvider;
pub use coinpaprika::CoinPaprikaProvider;

use crate::types::{CoinMarket, MarketOrder};

/// Sorts a market listing for providers that cannot sort server-side
///
/// Stable, so rows with equal keys keep the provider's rank order.
pub(crate) fn apply_order(rows: &mut [CoinMarket], order: MarketOrder) {
    match order {
        MarketOrder::MarketCapDesc => rows.sort_by(|a, b| b.market_cap.total_cmp(&a.market_cap)),
        MarketOrder::MarketCapAsc => rows.sort_by(|a, b| a.market_cap.total_cmp(&b.market_cap)),
        MarketOrder::VolumeDesc => rows.sort_by(|a, b| b.total_volume.total_cmp(&a.total_volume)),
        MarketOrder::VolumeAsc => rows.sort_by(|a, b| a.total_volume.total_cmp(&b.total_volume)),
        MarketOrder::IdAsc => rows.sort_by(|a, b| a.id.cmp(&b.id)),
        MarketOrder::IdDesc => rows.sort_by(|a, b| b.id.cmp(&a.id)),
    }
}
