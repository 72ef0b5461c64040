//! Market data service
//!
//! Query-level API over the cache and the fetch orchestrator. One instance
//! owns all shared state; construct it once and hand it to callers.

use crate::{
    availability::AvailabilityTracker,
    cache::ResponseCache,
    cancel::FetchControl,
    clock::{Clock, SystemClock},
    config::MarketDataConfig,
    error::{ConfigError, PriceError},
    metrics::ProviderMetrics,
    orchestrator::FetchOrchestrator,
    registry::ProviderRegistry,
    transport::{HttpTransport, ReqwestTransport},
    types::{
        CoinListing, CoinMarket, ComponentHealth, Endpoint, FetchResult, GlobalStats,
        HealthStatus, MarketPayload, MarketSnapshot, ProviderStatus, QueryParams, SpotQuote,
        TrendingCoin,
    },
};
use serde_json::json;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Market data service
///
/// # Example
/// ```no_run
/// use market_data_core::{MarketDataService, QueryParams};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let service = MarketDataService::from_env()?;
/// let page = service.markets(&QueryParams::new().with_per_page(20)).await;
/// if page.is_synthetic() {
///     println!("placeholder data: {:?}", page.error);
/// }
/// let btc = service.spot_price("bitcoin", "usd").await?;
/// println!("BTC: ${:.2}", btc.price);
/// # Ok(())
/// # }
/// ```
pub struct MarketDataService {
    config: MarketDataConfig,
    orchestrator: FetchOrchestrator,
    cache: ResponseCache<FetchResult<MarketPayload>>,
    clock: Arc<dyn Clock>,
}

impl MarketDataService {
    /// Service over the default providers, reqwest and the wall clock
    pub fn new(config: MarketDataConfig) -> Result<Self, ConfigError> {
        let registry = ProviderRegistry::with_defaults(&config);
        let transport = Arc::new(ReqwestTransport::new()?);
        Ok(Self::with_parts(config, registry, transport, Arc::new(SystemClock)))
    }

    /// Same as `new` with `MarketDataConfig::from_env()`
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::new(MarketDataConfig::from_env()?)
    }

    /// Service from explicit parts
    pub fn with_parts(
        config: MarketDataConfig,
        registry: ProviderRegistry,
        transport: Arc<dyn HttpTransport>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let tracker = Arc::new(AvailabilityTracker::new(
            Arc::new(registry),
            config.availability,
            clock.clone(),
        ));
        let orchestrator = FetchOrchestrator::new(tracker, transport, clock.clone(), &config);
        let cache = ResponseCache::new(clock.clone());

        Self {
            config,
            orchestrator,
            cache,
            clock,
        }
    }

    /// Configuration the service was built with
    pub fn config(&self) -> &MarketDataConfig {
        &self.config
    }

    /// Availability tracker shared by every fetch
    pub fn availability(&self) -> &Arc<AvailabilityTracker> {
        self.orchestrator.tracker()
    }

    /// Cached logical fetch
    pub async fn fetch(&self, endpoint: Endpoint, params: &QueryParams) -> FetchResult<MarketPayload> {
        self.fetch_with_control(endpoint, params, &FetchControl::none())
            .await
    }

    /// Cached logical fetch with cancellation and deadline
    ///
    /// Provider data is cached for the endpoint's TTL, placeholders for the
    /// synthetic TTL. Failures and aborted fetches are never cached.
    pub async fn fetch_with_control(
        &self,
        endpoint: Endpoint,
        params: &QueryParams,
        control: &FetchControl,
    ) -> FetchResult<MarketPayload> {
        let params = params.normalized();
        if endpoint == Endpoint::SimplePrice && params.ids.is_empty() {
            return FetchResult::failure("no coin ids requested");
        }

        let key = params.signature(endpoint);
        if let Some(hit) = self.cache.get(&key).await {
            tracing::debug!(key = %key, provider = ?hit.provider, "cache hit");
            return hit;
        }

        let result = self
            .orchestrator
            .fetch_with_fallback(endpoint, &params, None, control)
            .await;

        let ttl = match (result.success, result.is_synthetic()) {
            (false, _) => None,
            (true, false) => Some(self.config.cache.ttl_for(endpoint)),
            (true, true) if control.is_aborted() => None,
            (true, true) => self.config.cache.synthetic_ttl_for(endpoint),
        };
        if let Some(ttl) = ttl {
            self.cache.set(key, result.clone(), ttl).await;
        }

        result
    }

    /// Ranked market listing
    pub async fn markets(&self, params: &QueryParams) -> FetchResult<Vec<CoinMarket>> {
        self.fetch(Endpoint::Markets, params)
            .await
            .and_then_data(MarketPayload::into_markets)
    }

    /// Global statistics in `vs_currency`
    pub async fn global_stats(&self, vs_currency: &str) -> FetchResult<GlobalStats> {
        let params = QueryParams::new().with_vs_currency(vs_currency);
        self.fetch(Endpoint::Global, &params)
            .await
            .and_then_data(MarketPayload::into_global)
    }

    /// Trending coins
    pub async fn trending(&self) -> FetchResult<Vec<TrendingCoin>> {
        self.fetch(Endpoint::Trending, &QueryParams::default())
            .await
            .and_then_data(MarketPayload::into_trending)
    }

    /// Every listed coin
    pub async fn coin_list(&self) -> FetchResult<Vec<CoinListing>> {
        self.fetch(Endpoint::CoinList, &QueryParams::default())
            .await
            .and_then_data(MarketPayload::into_coin_list)
    }

    /// Spot prices keyed by canonical id
    pub async fn simple_prices<I, S>(
        &self,
        ids: I,
        vs_currency: &str,
    ) -> FetchResult<BTreeMap<String, SpotQuote>>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let params = QueryParams::new()
            .with_ids(ids)
            .with_vs_currency(vs_currency);
        self.fetch(Endpoint::SimplePrice, &params)
            .await
            .and_then_data(MarketPayload::into_prices)
    }

    /// Display price of a single coin
    ///
    /// Unlike the envelope-returning queries, placeholder data is an error
    /// here: a zero price must never be shown as real.
    pub async fn spot_price(&self, coin: &str, vs_currency: &str) -> Result<SpotQuote, PriceError> {
        let id = coin.trim().to_lowercase();
        let result = self.simple_prices([id.as_str()], vs_currency).await;

        if !result.success {
            return Err(PriceError::provider_failure(
                result.error.unwrap_or_else(|| "unknown error".to_string()),
            ));
        }
        if result.is_synthetic() {
            return Err(PriceError::synthetic(
                &id,
                result.error.unwrap_or_else(|| "no provider available".to_string()),
            ));
        }
        result
            .data
            .and_then(|prices| prices.get(&id).copied())
            .ok_or_else(|| PriceError::not_available(&id))
    }

    /// Markets, global stats and trending, fetched concurrently
    pub async fn dashboard(&self, params: &QueryParams) -> MarketSnapshot {
        let (markets, global, trending) = futures::join!(
            self.markets(params),
            self.global_stats(&params.vs_currency),
            self.trending()
        );
        MarketSnapshot {
            markets,
            global,
            trending,
        }
    }

    /// Drops every cached result
    pub async fn invalidate_cache(&self) {
        self.cache.clear().await;
    }

    /// Latency and success metrics, one entry per registered provider
    pub async fn provider_metrics(&self) -> Vec<ProviderMetrics> {
        let mut all = Vec::new();
        for name in self.availability().registry().names() {
            all.push(self.orchestrator.metrics().get(name).await);
        }
        all
    }

    /// Perform a health check on the market data service
    ///
    /// # Returns
    /// Healthy when every provider is healthy, Unhealthy when none can be
    /// consulted, Degraded in between
    pub async fn health_check(&self) -> ComponentHealth {
        let tracker = self.availability();
        let mut providers = serde_json::Map::new();
        let mut healthy = 0usize;
        let mut available = 0usize;

        for (name, metrics) in tracker
            .registry()
            .names()
            .into_iter()
            .zip(self.provider_metrics().await)
        {
            let status = tracker.status(name);
            if status == ProviderStatus::Healthy {
                healthy += 1;
            }
            if tracker.is_available(name) {
                available += 1;
            }
            providers.insert(
                name.to_string(),
                json!({
                    "status": status,
                    "state": tracker.state(name),
                    "metrics": metrics,
                }),
            );
        }

        let total = tracker.registry().len();
        let status = if available == 0 {
            HealthStatus::Unhealthy
        } else if healthy == total {
            HealthStatus::Healthy
        } else {
            HealthStatus::Degraded
        };

        let message = match status {
            HealthStatus::Healthy => format!("All {} providers are operational", total),
            HealthStatus::Degraded => format!("{} of {} providers are healthy", healthy, total),
            HealthStatus::Unhealthy => {
                "No provider is available, serving placeholder data".to_string()
            }
        };

        let mut details = HashMap::new();
        details.insert("providers".to_string(), serde_json::Value::Object(providers));
        details.insert("cache_entries".to_string(), json!(self.cache.len().await));

        ComponentHealth {
            name: "market_data_service".to_string(),
            status,
            message: Some(message),
            details,
            last_checked: self.clock.now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::SyntheticCaching;
    use crate::provider::{mock::MockProvider, MarketDataProvider};
    use crate::providers::CoinGeckoProvider;
    use crate::registry::ProviderDescriptor;
    use crate::transport::{mock::MockTransport, HttpResponse};
    use std::time::Duration;

    struct Harness {
        service: MarketDataService,
        transport: Arc<MockTransport>,
        clock: Arc<ManualClock>,
    }

    fn harness_with(
        providers: Vec<Arc<dyn MarketDataProvider>>,
        transport: MockTransport,
        config: MarketDataConfig,
    ) -> Harness {
        let clock = Arc::new(ManualClock::default());
        let transport = Arc::new(transport);
        let service = MarketDataService::with_parts(
            config,
            ProviderRegistry::new(providers).unwrap(),
            transport.clone(),
            clock.clone(),
        );
        Harness {
            service,
            transport,
            clock,
        }
    }

    fn fast_config() -> MarketDataConfig {
        let mut config = MarketDataConfig::default();
        config.retry.max_retries = 1;
        config.retry.backoff_base = Duration::from_millis(1);
        config
    }

    fn two_mocks(transport: MockTransport) -> Harness {
        harness_with(
            vec![
                Arc::new(MockProvider::new("p1", 1)),
                Arc::new(MockProvider::new("p2", 2)),
            ],
            transport,
            fast_config(),
        )
    }

    fn gecko(transport: MockTransport) -> Harness {
        harness_with(
            vec![Arc::new(CoinGeckoProvider::new(ProviderDescriptor::new(
                "coingecko",
                "http://cg.test",
                1,
            )))],
            transport,
            fast_config(),
        )
    }

    fn rate_limited_everywhere() -> MockTransport {
        let transport = MockTransport::new();
        for prefix in ["http://p1.test", "http://p2.test"] {
            transport.push(prefix, Ok(HttpResponse::new(429, "").with_retry_after("1")));
        }
        transport
    }

    #[tokio::test]
    async fn test_cache_hit_skips_network() {
        let transport = MockTransport::new();
        transport.ok("http://p1.test", serde_json::json!([{"id": "bitcoin", "price": 1.0}]));
        let h = two_mocks(transport);

        let first = h.service.markets(&QueryParams::default()).await;
        let second = h.service.markets(&QueryParams::new().with_vs_currency("USD")).await;

        assert_eq!(first.provider.as_deref(), Some("p1"));
        assert_eq!(first, second);
        assert_eq!(h.transport.calls().len(), 1);

        h.clock.advance(Duration::from_secs(31));
        h.service.markets(&QueryParams::default()).await;
        assert_eq!(h.transport.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_markets_filtered_by_ids_are_cached_separately() {
        let transport = MockTransport::new();
        transport.ok("http://p1.test", serde_json::json!([{"id": "bitcoin", "price": 1.0}]));
        let h = two_mocks(transport);

        h.service
            .markets(&QueryParams::new().with_ids(["bitcoin"]))
            .await;
        h.service
            .markets(&QueryParams::new().with_ids(["ethereum"]))
            .await;
        assert_eq!(h.transport.calls().len(), 2);

        h.service
            .markets(&QueryParams::new().with_ids(["Bitcoin"]))
            .await;
        assert_eq!(h.transport.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_synthetic_is_cached_briefly() {
        let h = two_mocks(rate_limited_everywhere());

        let first = h.service.markets(&QueryParams::default()).await;
        assert!(first.is_synthetic());
        assert_eq!(first.retry_after, Some(1_000));
        assert_eq!(h.transport.calls().len(), 2);

        let cached = h.service.markets(&QueryParams::default()).await;
        assert!(cached.is_synthetic());
        assert_eq!(h.transport.calls().len(), 2);

        h.clock.advance(Duration::from_secs(6));
        h.service.markets(&QueryParams::default()).await;
        assert_eq!(h.transport.calls().len(), 4);
    }

    #[tokio::test]
    async fn test_synthetic_skip_policy_leaves_cache_empty() {
        let mut config = fast_config();
        config.cache.synthetic = SyntheticCaching::Skip;
        let h = harness_with(
            vec![Arc::new(MockProvider::new("p1", 1))],
            rate_limited_everywhere(),
            config,
        );

        assert!(h.service.markets(&QueryParams::default()).await.is_synthetic());
        assert!(h.service.cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_cancelled_fetch_is_not_cached() {
        let transport = MockTransport::new().with_delay(Duration::from_secs(30));
        let h = two_mocks(transport);
        let (control, handle) = FetchControl::cancellable();
        handle.cancel();

        let result = h
            .service
            .fetch_with_control(Endpoint::Markets, &QueryParams::default(), &control)
            .await;

        assert_eq!(result.error.as_deref(), Some("fetch cancelled"));
        assert!(h.transport.calls().is_empty());
        assert!(h.service.cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_prices_without_ids_fail_fast() {
        let h = gecko(MockTransport::new());
        let result = h.service.simple_prices(Vec::<String>::new(), "usd").await;
        assert!(!result.success);
        assert!(result.data.is_none());
        assert!(h.transport.calls().is_empty());
    }

    #[tokio::test]
    async fn test_spot_price_reads_quote() {
        let transport = MockTransport::new();
        transport.ok(
            "http://cg.test/simple/price",
            serde_json::json!({"bitcoin": {"usd": 64000.0, "usd_24h_change": 1.5}}),
        );
        let h = gecko(transport);

        let quote = h.service.spot_price("Bitcoin", "usd").await.unwrap();
        assert_eq!(quote.price, 64000.0);
        assert_eq!(quote.price_change_percentage_24h, 1.5);

        let missing = h.service.spot_price("dogecoin", "usd").await;
        assert_eq!(missing, Err(PriceError::not_available("dogecoin")));
    }

    #[tokio::test]
    async fn test_spot_price_rejects_placeholder() {
        let transport = MockTransport::new();
        transport.status("http://cg.test", 503);
        let h = gecko(transport);

        let err = h.service.spot_price("bitcoin", "usd").await.unwrap_err();
        assert!(matches!(err, PriceError::Synthetic { ref coin, .. } if coin == "bitcoin"));
    }

    #[tokio::test]
    async fn test_dashboard_runs_all_three_queries() {
        let transport = MockTransport::new();
        transport.ok("http://p1.test", serde_json::json!([]));
        let h = two_mocks(transport);

        let snapshot = h.service.dashboard(&QueryParams::default()).await;
        assert_eq!(snapshot.markets.provider.as_deref(), Some("p1"));
        assert_eq!(snapshot.global.provider.as_deref(), Some("p1"));
        assert_eq!(snapshot.trending.provider.as_deref(), Some("p1"));
        assert_eq!(h.transport.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_health_reflects_provider_states() {
        let h = two_mocks(MockTransport::new());
        assert_eq!(h.service.health_check().await.status, HealthStatus::Healthy);

        h.service.availability().record_failure("p1");
        let health = h.service.health_check().await;
        assert_eq!(health.status, HealthStatus::Degraded);
        assert_eq!(health.details["providers"]["p1"]["status"], "unavailable");

        h.service.availability().record_rate_limited("p2", 10_000);
        assert_eq!(h.service.health_check().await.status, HealthStatus::Unhealthy);

        let metrics = h.service.provider_metrics().await;
        assert_eq!(metrics.len(), 2);
        assert_eq!(metrics[0].provider_name, "p1");
    }
}
