//! Runtime configuration
//!
//! Everything defaults to the values in [`crate::constants`]. A few knobs
//! can be overridden from the environment through [`MarketDataConfig::from_env`].

use crate::constants::*;
use crate::error::ConfigError;
use crate::types::Endpoint;
use std::time::Duration;

/// Per-provider retry behaviour
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts per provider, including the first one
    pub max_retries: u32,
    /// Delay before retry `n` is `backoff_base * 2^n`
    pub backoff_base: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: MAX_RETRY_ATTEMPTS,
            backoff_base: Duration::from_millis(BACKOFF_BASE_MS),
        }
    }
}

impl RetryPolicy {
    /// Sleep after failed attempt `attempt` (1-based)
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.backoff_base.saturating_mul(factor)
    }
}

/// Circuit-breaker and request budget timings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AvailabilityPolicy {
    /// How long a failed provider is skipped
    pub failure_backoff: Duration,
    /// Pause applied when a 429 carries no usable hint
    pub default_retry_after: Duration,
    /// Length of the request budget window
    pub rate_window: Duration,
}

impl Default for AvailabilityPolicy {
    fn default() -> Self {
        Self {
            failure_backoff: Duration::from_secs(FAILURE_BACKOFF_SECS),
            default_retry_after: Duration::from_millis(DEFAULT_RETRY_AFTER_MS),
            rate_window: Duration::from_secs(RATE_WINDOW_SECS),
        }
    }
}

/// What to do with placeholder results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyntheticCaching {
    /// Cache with `CachePolicy::synthetic_ttl`
    #[default]
    ShortTtl,
    /// Never cache placeholders
    Skip,
}

/// TTL per query family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    pub markets_ttl: Duration,
    pub prices_ttl: Duration,
    pub global_ttl: Duration,
    pub trending_ttl: Duration,
    pub coin_list_ttl: Duration,
    pub synthetic_ttl: Duration,
    pub synthetic: SyntheticCaching,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            markets_ttl: Duration::from_secs(MARKETS_TTL_SECS),
            prices_ttl: Duration::from_secs(PRICES_TTL_SECS),
            global_ttl: Duration::from_secs(GLOBAL_TTL_SECS),
            trending_ttl: Duration::from_secs(TRENDING_TTL_SECS),
            coin_list_ttl: Duration::from_secs(COIN_LIST_TTL_SECS),
            synthetic_ttl: Duration::from_secs(SYNTHETIC_TTL_SECS),
            synthetic: SyntheticCaching::default(),
        }
    }
}

impl CachePolicy {
    /// TTL for genuine provider data of `endpoint`
    pub fn ttl_for(&self, endpoint: Endpoint) -> Duration {
        match endpoint {
            Endpoint::Markets => self.markets_ttl,
            Endpoint::SimplePrice => self.prices_ttl,
            Endpoint::Global => self.global_ttl,
            Endpoint::Trending => self.trending_ttl,
            Endpoint::CoinList => self.coin_list_ttl,
        }
    }

    /// TTL for a placeholder result, `None` when it must not be cached
    pub fn synthetic_ttl_for(&self, endpoint: Endpoint) -> Option<Duration> {
        match self.synthetic {
            SyntheticCaching::ShortTtl => Some(self.synthetic_ttl.min(self.ttl_for(endpoint))),
            SyntheticCaching::Skip => None,
        }
    }
}

/// Optional credentials for providers with keyed tiers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderKeys {
    pub coingecko: Option<String>,
    pub coincap: Option<String>,
}

/// Complete configuration of the market data core
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketDataConfig {
    pub retry: RetryPolicy,
    pub availability: AvailabilityPolicy,
    pub cache: CachePolicy,
    pub keys: ProviderKeys,
    /// Timeout applied to every provider request
    pub request_timeout: Duration,
}

impl MarketDataConfig {
    /// Defaults plus any overrides present in the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as `from_env` with an explicit variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        config.keys.coingecko = non_empty(ENV_COINGECKO_API_KEY);
        config.keys.coincap = non_empty(ENV_COINCAP_API_KEY);

        if let Some(raw) = non_empty(ENV_MAX_RETRIES) {
            let retries: u32 = parse_var(ENV_MAX_RETRIES, &raw)?;
            if retries == 0 {
                return Err(invalid(ENV_MAX_RETRIES, &raw));
            }
            config.retry.max_retries = retries;
        }
        if let Some(raw) = non_empty(ENV_BACKOFF_BASE_MS) {
            config.retry.backoff_base = Duration::from_millis(parse_var(ENV_BACKOFF_BASE_MS, &raw)?);
        }
        if let Some(raw) = non_empty(ENV_SYNTHETIC_TTL_SECS) {
            let secs: u64 = parse_var(ENV_SYNTHETIC_TTL_SECS, &raw)?;
            if secs == 0 {
                config.cache.synthetic = SyntheticCaching::Skip;
            } else {
                config.cache.synthetic_ttl = Duration::from_secs(secs);
            }
        }

        Ok(config)
    }
}

impl Default for MarketDataConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            availability: AvailabilityPolicy::default(),
            cache: CachePolicy::default(),
            keys: ProviderKeys::default(),
            request_timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
        }
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| invalid(key, raw))
}

fn invalid(key: &str, raw: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: raw.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_backoff_delay_doubles_from_attempt_one() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff_delay(1), Duration::from_secs(2));
        assert_eq!(policy.backoff_delay(2), Duration::from_secs(4));
        assert_eq!(policy.backoff_delay(3), Duration::from_secs(8));
    }

    #[test]
    fn test_from_lookup_applies_overrides() {
        let config = MarketDataConfig::from_lookup(lookup(&[
            (ENV_COINGECKO_API_KEY, "cg-key"),
            (ENV_COINCAP_API_KEY, "  "),
            (ENV_MAX_RETRIES, "5"),
            (ENV_BACKOFF_BASE_MS, "250"),
        ]))
        .unwrap();

        assert_eq!(config.keys.coingecko.as_deref(), Some("cg-key"));
        assert_eq!(config.keys.coincap, None);
        assert_eq!(config.retry.max_retries, 5);
        assert_eq!(config.retry.backoff_base, Duration::from_millis(250));
        assert_eq!(config.request_timeout, Duration::from_secs(REQUEST_TIMEOUT_SECS));
    }

    #[test]
    fn test_from_lookup_rejects_garbage() {
        let err = MarketDataConfig::from_lookup(lookup(&[(ENV_MAX_RETRIES, "lots")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));

        let err = MarketDataConfig::from_lookup(lookup(&[(ENV_MAX_RETRIES, "0")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_zero_synthetic_ttl_disables_placeholder_caching() {
        let config =
            MarketDataConfig::from_lookup(lookup(&[(ENV_SYNTHETIC_TTL_SECS, "0")])).unwrap();
        assert_eq!(config.cache.synthetic_ttl_for(Endpoint::Markets), None);
    }

    #[test]
    fn test_synthetic_ttl_never_exceeds_family_ttl() {
        let policy = CachePolicy {
            synthetic_ttl: Duration::from_secs(600),
            ..CachePolicy::default()
        };
        assert_eq!(
            policy.synthetic_ttl_for(Endpoint::Markets),
            Some(Duration::from_secs(MARKETS_TTL_SECS))
        );
    }
}
