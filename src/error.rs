//! Error types for the market data core

use thiserror::Error;

/// Errors raised while talking to a single provider
///
/// These never leave the orchestrator: they are classified into attempt
/// outcomes, logged with the provider's identity and folded into the
/// `error` field of the result envelope.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ProviderError {
    /// Network request failed before a response arrived
    #[error("Network error: {0}")]
    Network(String),

    /// Request exceeded the provider's configured timeout
    #[error("Request timeout after {0}ms")]
    Timeout(u64),

    /// Provider answered with an error status
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// Response body could not be decoded
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Provider answered 429
    #[error("Rate limit exceeded (retry after {retry_after_ms}ms)")]
    RateLimited { retry_after_ms: u64 },

    /// Provider has no wire equivalent for the logical endpoint
    #[error("{provider} does not support {endpoint}")]
    UnsupportedEndpoint { provider: String, endpoint: String },

    /// Provider is backed off or out of request budget
    #[error("{0} is currently unavailable")]
    Unavailable(String),

    /// Caller cancelled the fetch
    #[error("fetch cancelled")]
    Cancelled,

    /// Caller deadline elapsed
    #[error("deadline exceeded")]
    DeadlineExceeded,
}

impl ProviderError {
    /// Creates an UnsupportedEndpoint error
    pub fn unsupported(provider: &str, endpoint: impl std::fmt::Display) -> Self {
        Self::UnsupportedEndpoint {
            provider: provider.to_string(),
            endpoint: endpoint.to_string(),
        }
    }

    /// Whether another attempt against the same provider could succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Network(_) | Self::Timeout(_) | Self::Http { .. } | Self::InvalidResponse(_)
        )
    }

    /// Whether the caller aborted the fetch
    pub fn is_abort(&self) -> bool {
        matches!(self, Self::Cancelled | Self::DeadlineExceeded)
    }
}

/// Errors returned by single-coin price lookups
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PriceError {
    /// No provider returned a quote for the coin
    #[error("Price data not available for {coin}")]
    NotAvailable { coin: String },

    /// Only a synthetic placeholder was available
    #[error("Only placeholder data available for {coin}: {reason}")]
    Synthetic { coin: String, reason: String },

    /// The lookup itself failed
    #[error("All providers failed: {0}")]
    ProviderFailure(String),
}

impl PriceError {
    /// Creates a NotAvailable error
    pub fn not_available(coin: &str) -> Self {
        Self::NotAvailable {
            coin: coin.to_string(),
        }
    }

    /// Creates a Synthetic error
    pub fn synthetic(coin: &str, reason: impl Into<String>) -> Self {
        Self::Synthetic {
            coin: coin.to_string(),
            reason: reason.into(),
        }
    }

    /// Creates a ProviderFailure error
    pub fn provider_failure(msg: impl Into<String>) -> Self {
        Self::ProviderFailure(msg.into())
    }
}

/// Invalid configuration overrides
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: String, value: String },

    #[error("duplicate provider name: {0}")]
    DuplicateProvider(String),

    #[error("failed to build HTTP client: {0}")]
    HttpClient(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(ProviderError::Timeout(10).is_retryable());
        assert!(ProviderError::Http {
            status: 503,
            body: String::new()
        }
        .is_retryable());
        assert!(!ProviderError::RateLimited { retry_after_ms: 1 }.is_retryable());
        assert!(!ProviderError::unsupported("coincap", "global").is_retryable());
        assert!(ProviderError::Cancelled.is_abort());
    }
}
