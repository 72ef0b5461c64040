//! Per-provider availability tracking
//!
//! Combines three gates, each resolved purely by comparing the clock to
//! stored timestamps:
//!
//! - **backoff**: a provider that exhausted its retries is skipped for a
//!   fixed window
//! - **rate limit**: a provider that answered 429 is skipped until its
//!   `Retry-After` elapses
//! - **budget**: at most `requests_per_minute` dispatches per window
//!
//! State is created lazily on first event and never deleted.

use crate::{
    clock::{add, Clock},
    config::AvailabilityPolicy,
    provider::MarketDataProvider,
    registry::ProviderRegistry,
    types::ProviderStatus,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Stored timestamps and counters for one provider
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AvailabilityState {
    pub failed_at: Option<DateTime<Utc>>,
    pub backoff_until: Option<DateTime<Utc>>,
    pub rate_limit_reset_at: Option<DateTime<Utc>>,
    /// Dispatches in the current window
    pub request_count: u32,
    pub window_reset_at: Option<DateTime<Utc>>,
}

impl AvailabilityState {
    fn in_backoff(&self, now: DateTime<Utc>) -> bool {
        self.backoff_until.is_some_and(|until| now < until)
    }

    fn rate_limited(&self, now: DateTime<Utc>) -> bool {
        self.rate_limit_reset_at.is_some_and(|reset| now < reset)
    }

    /// Requests counted against the window that contains `now`
    fn live_count(&self, now: DateTime<Utc>) -> u32 {
        match self.window_reset_at {
            Some(reset) if now < reset => self.request_count,
            _ => 0,
        }
    }

    fn budget_exhausted(&self, now: DateTime<Utc>, budget: u32) -> bool {
        budget > 0 && self.live_count(now) >= budget
    }

    fn available(&self, now: DateTime<Utc>, budget: u32) -> bool {
        !self.in_backoff(now) && !self.rate_limited(now) && !self.budget_exhausted(now, budget)
    }

    fn count_request(&mut self, now: DateTime<Utc>, window: Duration) {
        match self.window_reset_at {
            Some(reset) if now < reset => self.request_count = self.request_count.saturating_add(1),
            _ => {
                self.request_count = 1;
                self.window_reset_at = Some(add(now, window));
            }
        }
    }
}

/// Shared availability state for every registered provider
pub struct AvailabilityTracker {
    registry: Arc<ProviderRegistry>,
    policy: AvailabilityPolicy,
    clock: Arc<dyn Clock>,
    states: Mutex<HashMap<String, AvailabilityState>>,
}

impl AvailabilityTracker {
    /// Creates a tracker with no recorded state
    pub fn new(
        registry: Arc<ProviderRegistry>,
        policy: AvailabilityPolicy,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            registry,
            policy,
            clock,
            states: Mutex::new(HashMap::new()),
        }
    }

    /// Registry the tracker reads priorities and budgets from
    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    /// Lock the state map, recovering from poison
    fn lock_states(&self) -> MutexGuard<'_, HashMap<String, AvailabilityState>> {
        self.states.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("availability state mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn budget(&self, provider: &str) -> Option<u32> {
        self.registry
            .descriptor(provider)
            .map(|d| d.requests_per_minute)
    }

    /// Starts the provider's backoff window
    pub fn record_failure(&self, provider: &str) {
        let now = self.clock.now();
        let until = add(now, self.policy.failure_backoff);
        let mut states = self.lock_states();
        let state = states.entry(provider.to_string()).or_default();
        state.failed_at = Some(now);
        state.backoff_until = Some(until);

        tracing::warn!(provider, backoff_until = %until, "provider backed off");
    }

    /// Blocks the provider for `retry_after_ms`
    pub fn record_rate_limited(&self, provider: &str, retry_after_ms: u64) {
        let now = self.clock.now();
        let reset = add(now, Duration::from_millis(retry_after_ms));
        let mut states = self.lock_states();
        states.entry(provider.to_string()).or_default().rate_limit_reset_at = Some(reset);

        tracing::warn!(provider, retry_after_ms, "provider rate limited");
    }

    /// Clears any backoff
    pub fn record_success(&self, provider: &str) {
        let mut states = self.lock_states();
        if let Some(state) = states.get_mut(provider) {
            state.failed_at = None;
            state.backoff_until = None;
        }
    }

    /// Counts one dispatched request against the current window
    pub fn increment_request_count(&self, provider: &str) {
        let now = self.clock.now();
        let mut states = self.lock_states();
        states
            .entry(provider.to_string())
            .or_default()
            .count_request(now, self.policy.rate_window);
    }

    /// Whether the provider may be consulted right now
    ///
    /// Unknown providers are never available.
    pub fn is_available(&self, provider: &str) -> bool {
        let Some(budget) = self.budget(provider) else {
            return false;
        };
        let now = self.clock.now();
        let states = self.lock_states();
        states
            .get(provider)
            .map_or(true, |state| state.available(now, budget))
    }

    /// Checks availability and counts the request under one lock
    ///
    /// Returns false, counting nothing, when the provider is unavailable.
    pub fn try_reserve_request(&self, provider: &str) -> bool {
        let Some(budget) = self.budget(provider) else {
            return false;
        };
        let now = self.clock.now();
        let mut states = self.lock_states();
        let state = states.entry(provider.to_string()).or_default();
        if !state.available(now, budget) {
            return false;
        }
        state.count_request(now, self.policy.rate_window);
        true
    }

    /// Available providers, lowest priority value first
    ///
    /// Equal priorities keep registry declaration order.
    pub fn sorted_available_providers(&self) -> Vec<Arc<dyn MarketDataProvider>> {
        let mut available: Vec<Arc<dyn MarketDataProvider>> = self
            .registry
            .providers()
            .iter()
            .filter(|p| self.is_available(p.name()))
            .cloned()
            .collect();
        available.sort_by_key(|p| p.descriptor().priority);
        available
    }

    /// Snapshot of the stored state, `None` before the first event
    pub fn state(&self, provider: &str) -> Option<AvailabilityState> {
        self.lock_states().get(provider).cloned()
    }

    /// Health of `provider` at the current instant
    pub fn status(&self, provider: &str) -> ProviderStatus {
        let Some(budget) = self.budget(provider) else {
            return ProviderStatus::Unavailable;
        };
        let now = self.clock.now();
        let states = self.lock_states();
        match states.get(provider) {
            Some(state) if state.in_backoff(now) => ProviderStatus::Unavailable,
            Some(state) if state.rate_limited(now) || state.budget_exhausted(now, budget) => {
                ProviderStatus::Degraded
            }
            _ => ProviderStatus::Healthy,
        }
    }
}
