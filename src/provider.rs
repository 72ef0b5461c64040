//! Provider capability abstraction
//!
//! Each provider knows how to spell a logical query as its own URL and how
//! to turn its raw JSON back into the canonical payload. The orchestrator
//! does the HTTP work and never branches on provider names.

use crate::{
    error::ProviderError,
    registry::ProviderDescriptor,
    types::{Endpoint, MarketPayload, QueryParams},
};
use serde_json::Value;

/// Trait for market data providers
///
/// Implementations cover one third-party REST API (CoinGecko, CoinPaprika,
/// CoinCap, ...). Adding a provider means implementing this trait and
/// registering the implementation, nothing else.
pub trait MarketDataProvider: Send + Sync {
    /// Static description: name, base URL, priority, budget, timeout
    fn descriptor(&self) -> &ProviderDescriptor;

    /// Returns the name of this provider
    fn name(&self) -> &str {
        &self.descriptor().name
    }

    /// Builds the full request URL for `endpoint`
    ///
    /// # Returns
    /// The URL, or `ProviderError::UnsupportedEndpoint` when the provider
    /// has no equivalent for this endpoint/parameter combination
    fn build_url(&self, endpoint: Endpoint, params: &QueryParams) -> Result<String, ProviderError>;

    /// Maps the provider's raw payload into the canonical shape
    ///
    /// Must not panic. Missing or malformed fields degrade to defaults.
    fn transform(&self, endpoint: Endpoint, raw: &Value, params: &QueryParams) -> MarketPayload;
}
