//! Constants for the market data core
//!
//! Defaults for every tunable live here. `MarketDataConfig::default()` is
//! built from these values; `MarketDataConfig::from_env()` overrides a
//! handful of them at startup.

/// Provider name reported when every real provider failed
pub const SYNTHETIC_PROVIDER: &str = "synthetic";

/// Attempts per provider before moving on
pub const MAX_RETRY_ATTEMPTS: u32 = 3;

/// Base of the exponential retry delay (delay = base * 2^attempt)
pub const BACKOFF_BASE_MS: u64 = 1000;

/// How long a failed provider is skipped (5 minutes)
pub const FAILURE_BACKOFF_SECS: u64 = 300;

/// Rate-limit pause used when a 429 carries no usable Retry-After
pub const DEFAULT_RETRY_AFTER_MS: u64 = 60_000;

/// Length of the per-provider request budget window
pub const RATE_WINDOW_SECS: u64 = 60;

/// Cache TTL for market listings (seconds)
pub const MARKETS_TTL_SECS: u64 = 30;

/// Cache TTL for spot prices (seconds)
pub const PRICES_TTL_SECS: u64 = 30;

/// Cache TTL for global statistics (seconds)
pub const GLOBAL_TTL_SECS: u64 = 120;

/// Cache TTL for trending coins (seconds)
pub const TRENDING_TTL_SECS: u64 = 300;

/// Cache TTL for the coin list (seconds)
pub const COIN_LIST_TTL_SECS: u64 = 3600;

/// Cache TTL for synthetic placeholder results (seconds)
pub const SYNTHETIC_TTL_SECS: u64 = 5;

/// Default page size for market listings
pub const DEFAULT_PER_PAGE: u32 = 100;

/// Largest page size any provider accepts
pub const MAX_PER_PAGE: u32 = 250;

/// HTTP request timeout when fetching from a provider (in seconds)
pub const REQUEST_TIMEOUT_SECS: u64 = 10;

/// CoinGecko API base URL
pub const COINGECKO_API_URL: &str = "https://api.coingecko.com/api/v3";

/// CoinGecko free tier budget
pub const COINGECKO_REQUESTS_PER_MINUTE: u32 = 30;

/// CoinPaprika API base URL
pub const COINPAPRIKA_API_URL: &str = "https://api.coinpaprika.com/v1";

pub const COINPAPRIKA_REQUESTS_PER_MINUTE: u32 = 60;

/// CoinCap API base URL
pub const COINCAP_API_URL: &str = "https://api.coincap.io/v2";

pub const COINCAP_REQUESTS_PER_MINUTE: u32 = 120;

/// User agent for HTTP requests
pub const USER_AGENT: &str = "market-data-core/0.1.0";

/// Environment variable names recognised by `MarketDataConfig::from_env`
pub const ENV_COINGECKO_API_KEY: &str = "MARKET_DATA_COINGECKO_API_KEY";
pub const ENV_COINCAP_API_KEY: &str = "MARKET_DATA_COINCAP_API_KEY";
pub const ENV_MAX_RETRIES: &str = "MARKET_DATA_MAX_RETRIES";
pub const ENV_BACKOFF_BASE_MS: &str = "MARKET_DATA_BACKOFF_BASE_MS";
pub const ENV_SYNTHETIC_TTL_SECS: &str = "MARKET_DATA_SYNTHETIC_TTL_SECS";
