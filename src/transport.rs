//! HTTP transport used by the orchestrator
//!
//! The orchestrator only needs "GET this URL with these headers within this
//! timeout", so the transport is a narrow trait. [`ReqwestTransport`] is the
//! production implementation.

use crate::{constants::USER_AGENT, error::ConfigError, error::ProviderError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{header::RETRY_AFTER, Client};
use std::time::Duration;

/// Status, rate-limit hint and body of a provider response
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    /// Raw `Retry-After` header, if any
    pub retry_after: Option<String>,
    pub body: String,
}

impl HttpResponse {
    /// Creates a response with no headers
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            retry_after: None,
            body: body.into(),
        }
    }

    /// Sets the raw `Retry-After` header value
    pub fn with_retry_after(mut self, value: impl Into<String>) -> Self {
        self.retry_after = Some(value.into());
        self
    }

    /// Rate-limit pause in milliseconds
    ///
    /// Accepts delta-seconds or an HTTP-date; falls back to `default` when
    /// the header is missing or unreadable.
    pub fn retry_after_ms(&self, now: DateTime<Utc>, default: Duration) -> u64 {
        let default_ms = u64::try_from(default.as_millis()).unwrap_or(u64::MAX);
        let Some(raw) = self.retry_after.as_deref().map(str::trim) else {
            return default_ms;
        };

        if let Ok(secs) = raw.parse::<u64>() {
            return secs.saturating_mul(1000);
        }
        match DateTime::parse_from_rfc2822(raw) {
            Ok(at) => (at.with_timezone(&Utc) - now).num_milliseconds().max(0) as u64,
            Err(_) => default_ms,
        }
    }
}

/// Minimal async HTTP client
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Performs a GET
    ///
    /// Any HTTP status is a successful transport call; only failures to get
    /// a response at all (connect, timeout, body read) are errors.
    async fn get(
        &self,
        url: &str,
        headers: &[(String, String)],
        timeout: Duration,
    ) -> Result<HttpResponse, ProviderError>;
}

/// reqwest-backed transport
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Creates a transport with the crate's user agent
    pub fn new() -> Result<Self, ConfigError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        Ok(Self { client })
    }

    /// Wraps an existing client (shared pools, custom TLS, proxies)
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

fn classify(err: reqwest::Error, timeout: Duration) -> ProviderError {
    if err.is_timeout() {
        ProviderError::Timeout(timeout.as_millis() as u64)
    } else {
        ProviderError::Network(err.to_string())
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(
        &self,
        url: &str,
        headers: &[(String, String)],
        timeout: Duration,
    ) -> Result<HttpResponse, ProviderError> {
        let mut request = self.client.get(url).timeout(timeout);
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request.send().await.map_err(|e| classify(e, timeout))?;
        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.text().await.map_err(|e| classify(e, timeout))?;

        Ok(HttpResponse {
            status,
            retry_after,
            body,
        })
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_retry_after_seconds() {
        let response = HttpResponse::new(429, "").with_retry_after("30");
        assert_eq!(response.retry_after_ms(Utc::now(), Duration::from_secs(60)), 30_000);
    }

    #[test]
    fn test_retry_after_default_when_missing_or_garbage() {
        let default = Duration::from_secs(60);
        assert_eq!(HttpResponse::new(429, "").retry_after_ms(Utc::now(), default), 60_000);
        let garbage = HttpResponse::new(429, "").with_retry_after("soon");
        assert_eq!(garbage.retry_after_ms(Utc::now(), default), 60_000);
    }

    #[test]
    fn test_retry_after_http_date() {
        let now = Utc.with_ymd_and_hms(2015, 10, 21, 7, 27, 0).unwrap();
        let response =
            HttpResponse::new(429, "").with_retry_after("Wed, 21 Oct 2015 07:28:00 GMT");
        assert_eq!(response.retry_after_ms(now, Duration::from_secs(60)), 60_000);

        let past = Utc.with_ymd_and_hms(2016, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(response.retry_after_ms(past, Duration::from_secs(60)), 0);
    }
}
