//! Priority-ordered fetching with retries and a synthetic fallback
//!
//! Providers are attempted strictly one after another. Each attempt ends in
//! an [`AttemptOutcome`]; provider errors never escape this module and the
//! caller always gets an envelope back.

use crate::{
    availability::AvailabilityTracker,
    cancel::FetchControl,
    clock::Clock,
    config::{MarketDataConfig, RetryPolicy},
    error::ProviderError,
    metrics::{AttemptKind, MetricsRegistry},
    provider::MarketDataProvider,
    synthetic,
    transport::HttpTransport,
    types::{Endpoint, FetchResult, MarketPayload, QueryParams},
};
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::Instrument;
use uuid::Uuid;

/// Longest error body kept in an HTTP error
const MAX_ERROR_BODY: usize = 200;

/// Result of consulting a single provider
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptOutcome {
    Success(MarketPayload),
    /// Provider answered 429; no retry was spent
    RateLimited { retry_after_ms: u64 },
    Failure(ProviderError),
}

/// Runs logical fetches against the registered providers
pub struct FetchOrchestrator {
    tracker: Arc<AvailabilityTracker>,
    transport: Arc<dyn HttpTransport>,
    clock: Arc<dyn Clock>,
    retry: RetryPolicy,
    default_retry_after: Duration,
    metrics: Arc<MetricsRegistry>,
}

impl FetchOrchestrator {
    /// Creates an orchestrator with its own metrics registry
    pub fn new(
        tracker: Arc<AvailabilityTracker>,
        transport: Arc<dyn HttpTransport>,
        clock: Arc<dyn Clock>,
        config: &MarketDataConfig,
    ) -> Self {
        Self {
            tracker,
            transport,
            clock,
            retry: config.retry,
            default_retry_after: config.availability.default_retry_after,
            metrics: Arc::new(MetricsRegistry::new()),
        }
    }

    /// Availability tracker shared with the service
    pub fn tracker(&self) -> &Arc<AvailabilityTracker> {
        &self.tracker
    }

    /// Per-provider attempt metrics
    pub fn metrics(&self) -> &Arc<MetricsRegistry> {
        &self.metrics
    }

    /// Tries every available provider in priority order
    ///
    /// `max_retries` overrides the configured attempts per provider. When
    /// nothing succeeds the result is a synthetic placeholder carrying the
    /// last real error and the shortest rate-limit hint.
    pub async fn fetch_with_fallback(
        &self,
        endpoint: Endpoint,
        params: &QueryParams,
        max_retries: Option<u32>,
        control: &FetchControl,
    ) -> FetchResult<MarketPayload> {
        let request_id = Uuid::new_v4();
        let span = tracing::info_span!("fetch", %request_id, %endpoint);
        let max_retries = max_retries.unwrap_or(self.retry.max_retries).max(1);
        let params = &params.normalized();

        async move {
            let mut last_error: Option<String> = None;
            let mut retry_after: Option<u64> = None;

            for provider in self.tracker.sorted_available_providers() {
                if let Err(abort) = control.check() {
                    last_error = Some(abort.to_string());
                    break;
                }

                let name = provider.name();
                match self
                    .fetch_from_provider(&provider, endpoint, params, max_retries, control)
                    .await
                {
                    AttemptOutcome::Success(payload) => {
                        self.tracker.record_success(name);
                        tracing::debug!(provider = name, "fetch succeeded");
                        return FetchResult::from_provider(payload, name);
                    }
                    AttemptOutcome::RateLimited { retry_after_ms } => {
                        self.tracker.record_rate_limited(name, retry_after_ms);
                        retry_after = Some(retry_after.map_or(retry_after_ms, |r| r.min(retry_after_ms)));
                        last_error = Some(format!(
                            "{}: {}",
                            name,
                            ProviderError::RateLimited { retry_after_ms }
                        ));
                    }
                    AttemptOutcome::Failure(err) if err.is_abort() => {
                        last_error = Some(err.to_string());
                        break;
                    }
                    AttemptOutcome::Failure(err @ ProviderError::UnsupportedEndpoint { .. }) => {
                        // not a provider fault, keep the last real error
                        last_error.get_or_insert_with(|| err.to_string());
                    }
                    AttemptOutcome::Failure(err) => {
                        if err.is_retryable() {
                            self.tracker.record_failure(name);
                        }
                        tracing::warn!(provider = name, error = %err, "provider exhausted");
                        last_error = Some(format!("{}: {}", name, err));
                    }
                }
            }

            if let Err(abort) = control.check() {
                last_error = Some(abort.to_string());
            }

            tracing::info!(
                error = last_error.as_deref().unwrap_or("no provider available"),
                "serving synthetic fallback"
            );
            FetchResult::synthetic(
                synthetic::placeholder(endpoint, params),
                Some(last_error.unwrap_or_else(|| "no provider available".to_string())),
                retry_after,
            )
        }
        .instrument(span)
        .await
    }

    /// Consults one provider, retrying retryable failures
    ///
    /// Sleeps `backoff_base * 2^attempt` between attempts, never after the
    /// last one. A 429 returns at once. Unsupported endpoints return a
    /// failure without touching the network.
    pub async fn fetch_from_provider(
        &self,
        provider: &Arc<dyn MarketDataProvider>,
        endpoint: Endpoint,
        params: &QueryParams,
        max_retries: u32,
        control: &FetchControl,
    ) -> AttemptOutcome {
        let name = provider.name();
        let descriptor = provider.descriptor();
        let url = match provider.build_url(endpoint, params) {
            Ok(url) => url,
            Err(err) => {
                tracing::debug!(provider = name, error = %err, "skipping provider");
                return AttemptOutcome::Failure(err);
            }
        };

        let mut last_error = ProviderError::Unavailable(name.to_string());
        for attempt in 1..=max_retries {
            if !self.tracker.try_reserve_request(name) {
                return AttemptOutcome::Failure(ProviderError::Unavailable(name.to_string()));
            }

            tracing::debug!(provider = name, attempt, url = %url, "dispatching request");
            let started = Instant::now();
            let response = match control
                .run(self.transport.get(&url, &descriptor.auth_headers, descriptor.timeout))
                .await
            {
                Ok(response) => response,
                Err(abort) => return AttemptOutcome::Failure(abort),
            };
            let elapsed = started.elapsed();

            let error = match response {
                Ok(resp) if resp.status == 429 => {
                    let retry_after_ms = resp.retry_after_ms(self.clock.now(), self.default_retry_after);
                    self.metrics.record(name, elapsed, AttemptKind::RateLimited).await;
                    return AttemptOutcome::RateLimited { retry_after_ms };
                }
                Ok(resp) if resp.status >= 400 => ProviderError::Http {
                    status: resp.status,
                    body: resp.body.chars().take(MAX_ERROR_BODY).collect(),
                },
                Ok(resp) => match serde_json::from_str::<Value>(&resp.body) {
                    Ok(raw) => {
                        self.metrics.record(name, elapsed, AttemptKind::Success).await;
                        return AttemptOutcome::Success(provider.transform(endpoint, &raw, params));
                    }
                    Err(e) => ProviderError::InvalidResponse(e.to_string()),
                },
                Err(err) => err,
            };

            self.metrics.record(name, elapsed, AttemptKind::Failure).await;
            tracing::warn!(
                provider = name,
                attempt,
                max_attempts = max_retries,
                error = %error,
                "provider request failed"
            );

            if !error.is_retryable() {
                return AttemptOutcome::Failure(error);
            }
            last_error = error;

            if attempt < max_retries {
                let delay = self.retry.backoff_delay(attempt);
                if let Err(abort) = control.run(tokio::time::sleep(delay)).await {
                    return AttemptOutcome::Failure(abort);
                }
            }
        }

        AttemptOutcome::Failure(last_error)
    }
}
