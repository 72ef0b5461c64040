//! # Market Data Core
//!
//! Resilient crypto market data from several public providers (CoinGecko,
//! CoinPaprika, CoinCap) behind one canonical schema.
//!
//! Every logical query walks the providers in priority order, retrying
//! transient failures with exponential backoff, skipping providers that are
//! backed off, rate limited or out of request budget, and falling back to a
//! zeroed placeholder tagged `provider: "synthetic"` when nothing answers.
//! Results are cached per query with family-specific TTLs.
//!
//! ## Usage
//!
//! ```no_run
//! use market_data_core::{MarketDataService, QueryParams};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let service = MarketDataService::from_env()?;
//!
//! let page = service.markets(&QueryParams::new().with_per_page(50)).await;
//! println!("served by {:?}", page.provider);
//!
//! let snapshot = service.dashboard(&QueryParams::default()).await;
//! if let Some(global) = snapshot.global.data {
//!     println!("BTC dominance: {:.1}%", global.btc_dominance);
//! }
//! # Ok(())
//! # }
//! ```

pub mod availability;
pub mod cache;
pub mod cancel;
pub mod clock;
pub mod config;
pub mod constants;
pub mod error;
pub mod metrics;
pub mod orchestrator;
pub mod provider;
pub mod providers;
pub mod registry;
pub mod service;
pub mod synthetic;
pub mod transport;
pub mod types;

// Re-export commonly used types
pub use availability::{AvailabilityState, AvailabilityTracker};
pub use cancel::{CancelHandle, FetchControl};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{CachePolicy, MarketDataConfig, RetryPolicy, SyntheticCaching};
pub use error::{ConfigError, PriceError, ProviderError};
pub use metrics::ProviderMetrics;
pub use orchestrator::{AttemptOutcome, FetchOrchestrator};
pub use provider::MarketDataProvider;
pub use registry::{ProviderDescriptor, ProviderRegistry};
pub use service::MarketDataService;
pub use transport::{HttpResponse, HttpTransport, ReqwestTransport};
pub use types::{
    CoinListing, CoinMarket, ComponentHealth, Endpoint, FetchResult, GlobalStats, HealthStatus,
    MarketOrder, MarketPayload, MarketSnapshot, ProviderStatus, QueryParams, SpotQuote,
    TrendingCoin,
};
