//! `ProviderMetrics`: dependency-free counters tracking provider activity.

use kr_common::Counter;

/// Counters exposed by a [`crate::provider::KeyRingProvider`], renderable as
/// Prometheus exposition text.
#[derive(Debug)]
pub struct ProviderMetrics {
    /// Fast-path cache hits: a valid snapshot satisfied the call directly.
    pub cache_hits: Counter,
    /// Calls that returned a stale snapshot because another thread held
    /// the refresh lock.
    pub stale_fallback_serves: Counter,
    /// Refreshes that ran to completion and published a new snapshot.
    pub refreshes: Counter,
    /// Refreshes that created a new key.
    pub keys_generated: Counter,
    /// Transient failures that triggered the 2-minute lifetime extension.
    pub transient_failure_extensions: Counter,
    /// Refreshes that failed with no prior snapshot to fall back to.
    pub refresh_failures: Counter,
}

impl Default for ProviderMetrics {
    fn default() -> Self {
        Self {
            cache_hits: Counter::new(
                "key_ring_provider_cache_hits_total",
                "Calls satisfied by a valid cached snapshot without a refresh",
            ),
            stale_fallback_serves: Counter::new(
                "key_ring_provider_stale_fallback_serves_total",
                "Calls that returned a stale snapshot while a refresh was in flight elsewhere",
            ),
            refreshes: Counter::new(
                "key_ring_provider_refreshes_total",
                "Refreshes that published a new snapshot",
            ),
            keys_generated: Counter::new(
                "key_ring_provider_keys_generated_total",
                "New keys created by a refresh",
            ),
            transient_failure_extensions: Counter::new(
                "key_ring_provider_transient_failure_extensions_total",
                "Transient key-manager failures handled by extending the prior snapshot's lifetime",
            ),
            refresh_failures: Counter::new(
                "key_ring_provider_refresh_failures_total",
                "Refreshes that failed with no prior snapshot to fall back to",
            ),
        }
    }
}

impl ProviderMetrics {
    /// Create a fresh, zeroed set of counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Render all counters as Prometheus exposition text.
    #[must_use]
    pub fn to_prometheus(&self) -> String {
        [
            self.cache_hits.to_prometheus(),
            self.stale_fallback_serves.to_prometheus(),
            self.refreshes.to_prometheus(),
            self.keys_generated.to_prometheus(),
            self.transient_failure_extensions.to_prometheus(),
            self.refresh_failures.to_prometheus(),
        ]
        .concat()
    }
}
