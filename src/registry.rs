//! Provider registry
//!
//! Holds the ordered, immutable list of providers consulted by the
//! orchestrator. Declaration order breaks priority ties.

use crate::{
    config::MarketDataConfig,
    error::ConfigError,
    provider::MarketDataProvider,
    providers::{CoinCapProvider, CoinGeckoProvider, CoinPaprikaProvider},
};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

/// Static description of a provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderDescriptor {
    /// Unique key, also reported in result envelopes
    pub name: String,
    /// Base URL every path is appended to
    pub base_url: String,
    /// Lower is tried first
    pub priority: u32,
    /// Request budget per rate window, 0 = unlimited
    pub requests_per_minute: u32,
    pub timeout: Duration,
    /// Headers sent with every request
    pub auth_headers: Vec<(String, String)>,
}

impl ProviderDescriptor {
    /// Creates a descriptor with no budget, the default timeout and no headers
    pub fn new(name: impl Into<String>, base_url: impl Into<String>, priority: u32) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            priority,
            requests_per_minute: 0,
            timeout: Duration::from_secs(crate::constants::REQUEST_TIMEOUT_SECS),
            auth_headers: Vec::new(),
        }
    }

    /// Caps requests per one-minute window; 0 means unlimited
    pub fn with_budget(mut self, requests_per_minute: u32) -> Self {
        self.requests_per_minute = requests_per_minute;
        self
    }

    /// Per-request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Adds a header sent with every request
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.auth_headers.push((name.into(), value.into()));
        self
    }

    /// Joins `path_and_query` onto the base URL
    pub fn url(&self, path_and_query: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path_and_query)
    }
}

/// Ordered set of providers
pub struct ProviderRegistry {
    providers: Vec<Arc<dyn MarketDataProvider>>,
}

impl ProviderRegistry {
    /// Creates a registry, rejecting duplicate provider names
    pub fn new(providers: Vec<Arc<dyn MarketDataProvider>>) -> Result<Self, ConfigError> {
        let mut seen = HashSet::new();
        for provider in &providers {
            if !seen.insert(provider.name().to_string()) {
                return Err(ConfigError::DuplicateProvider(provider.name().to_string()));
            }
        }
        Ok(Self { providers })
    }

    /// CoinGecko, then CoinPaprika, then CoinCap
    pub fn with_defaults(config: &MarketDataConfig) -> Self {
        let providers: Vec<Arc<dyn MarketDataProvider>> = vec![
            Arc::new(CoinGeckoProvider::new(CoinGeckoProvider::descriptor_for(config))),
            Arc::new(CoinPaprikaProvider::new(CoinPaprikaProvider::descriptor_for(config))),
            Arc::new(CoinCapProvider::new(CoinCapProvider::descriptor_for(config))),
        ];
        Self { providers }
    }

    /// Providers in declaration order
    pub fn providers(&self) -> &[Arc<dyn MarketDataProvider>] {
        &self.providers
    }

    /// Provider registered as `name`
    pub fn get(&self, name: &str) -> Option<&Arc<dyn MarketDataProvider>> {
        self.providers.iter().find(|p| p.name() == name)
    }

    /// Descriptor of the provider registered as `name`
    pub fn descriptor(&self, name: &str) -> Option<&ProviderDescriptor> {
        self.get(name).map(|p| p.descriptor())
    }

    /// Provider names in priority order
    pub fn names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// Number of registered providers
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Whether no provider is registered
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.providers.iter().map(|p| p.descriptor()))
            .finish()
    }
}
