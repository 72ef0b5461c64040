//! Provider health metrics collection and reporting
//!
//! Tracks latency histograms and success rates for every provider attempt,
//! including attempts that were rate limited.

use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Maximum number of samples to keep per provider
const MAX_SAMPLES: usize = 100;

/// Metrics for a single provider
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderMetrics {
    /// Name of the provider
    pub provider_name: String,
    /// 50th percentile latency in milliseconds
    pub latency_p50_ms: f64,
    /// 99th percentile latency in milliseconds
    pub latency_p99_ms: f64,
    /// Success rate (0.0 to 1.0)
    pub success_rate: f64,
    /// Total number of requests tracked
    pub total_requests: u64,
    /// Number of failed requests
    pub failed_requests: u64,
    /// Number of 429 answers
    pub rate_limited_requests: u64,
}

impl ProviderMetrics {
    /// Creates metrics with no data
    pub fn empty(provider_name: &str) -> Self {
        Self {
            provider_name: provider_name.to_string(),
            latency_p50_ms: 0.0,
            latency_p99_ms: 0.0,
            success_rate: 1.0,
            total_requests: 0,
            failed_requests: 0,
            rate_limited_requests: 0,
        }
    }
}

/// How a single attempt ended, for metrics purposes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptKind {
    Success,
    RateLimited,
    Failure,
}

#[derive(Debug, Clone)]
struct LatencySample {
    duration_ms: f64,
    success: bool,
}

#[derive(Debug, Default)]
struct Counters {
    samples: VecDeque<LatencySample>,
    total: u64,
    failed: u64,
    rate_limited: u64,
}

/// Collects and computes metrics for one provider
pub struct MetricsCollector {
    provider_name: String,
    counters: RwLock<Counters>,
}

impl MetricsCollector {
    /// Creates a new metrics collector for a provider
    pub fn new(provider_name: &str) -> Self {
        Self {
            provider_name: provider_name.to_string(),
            counters: RwLock::new(Counters {
                samples: VecDeque::with_capacity(MAX_SAMPLES),
                ..Counters::default()
            }),
        }
    }

    /// Records one attempt with its duration
    pub async fn record(&self, duration: Duration, kind: AttemptKind) {
        let duration_ms = duration.as_secs_f64() * 1000.0;
        let mut counters = self.counters.write().await;

        counters.total += 1;
        match kind {
            AttemptKind::Success => {}
            AttemptKind::RateLimited => counters.rate_limited += 1,
            AttemptKind::Failure => counters.failed += 1,
        }

        if counters.samples.len() >= MAX_SAMPLES {
            counters.samples.pop_front();
        }
        counters.samples.push_back(LatencySample {
            duration_ms,
            success: kind == AttemptKind::Success,
        });
    }

    /// Computes current metrics from collected samples
    pub async fn get_metrics(&self) -> ProviderMetrics {
        let counters = self.counters.read().await;

        if counters.samples.is_empty() {
            return ProviderMetrics::empty(&self.provider_name);
        }

        // Percentiles only over successful requests
        let mut latencies: Vec<f64> = counters
            .samples
            .iter()
            .filter(|s| s.success)
            .map(|s| s.duration_ms)
            .collect();
        latencies.sort_by(f64::total_cmp);

        let unsuccessful = counters.failed + counters.rate_limited;
        let success_rate = if counters.total > 0 {
            counters.total.saturating_sub(unsuccessful) as f64 / counters.total as f64
        } else {
            1.0
        };

        ProviderMetrics {
            provider_name: self.provider_name.clone(),
            latency_p50_ms: percentile(&latencies, 50.0),
            latency_p99_ms: percentile(&latencies, 99.0),
            success_rate,
            total_requests: counters.total,
            failed_requests: counters.failed,
            rate_limited_requests: counters.rate_limited,
        }
    }
}

/// One collector per provider, created on first use
#[derive(Default)]
pub struct MetricsRegistry {
    collectors: RwLock<HashMap<String, Arc<MetricsCollector>>>,
}

impl MetricsRegistry {
    /// Creates an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Collector for `provider`, created on first use
    pub async fn collector(&self, provider: &str) -> Arc<MetricsCollector> {
        if let Some(existing) = self.collectors.read().await.get(provider) {
            return existing.clone();
        }
        self.collectors
            .write()
            .await
            .entry(provider.to_string())
            .or_insert_with(|| Arc::new(MetricsCollector::new(provider)))
            .clone()
    }

    /// Records one attempt against `provider`
    pub async fn record(&self, provider: &str, duration: Duration, kind: AttemptKind) {
        self.collector(provider).await.record(duration, kind).await;
    }

    /// Metrics for `provider`; empty metrics if it was never attempted
    pub async fn get(&self, provider: &str) -> ProviderMetrics {
        let collector = self.collectors.read().await.get(provider).cloned();
        match collector {
            Some(collector) => collector.get_metrics().await,
            None => ProviderMetrics::empty(provider),
        }
    }
}

/// Calculate percentile from sorted values
fn percentile(sorted_values: &[f64], p: f64) -> f64 {
    if sorted_values.is_empty() {
        return 0.0;
    }

    let idx = (p / 100.0 * (sorted_values.len() - 1) as f64).round() as usize;
    sorted_values[idx.min(sorted_values.len() - 1)]
}
