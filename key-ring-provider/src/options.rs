//! Immutable policy parameters governing key lifetime and default selection.

use chrono::Duration;

/// Policy parameters for key lifetime, propagation, and refresh.
///
/// Plain data, `Clone`-able, with no interior mutability: an instance passed
/// into [`crate::provider::KeyRingProvider::new`] is moved/cloned, so later
/// mutation of a caller's copy is never observable by the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyManagementOptions {
    auto_generate_keys: bool,
    new_key_lifetime: Duration,
    key_propagation_window: Duration,
    max_server_clock_skew: Duration,
    key_ring_refresh_period: Duration,
}

impl Default for KeyManagementOptions {
    /// Typical values: 90-day key lifetime, 2-day propagation window, 5-minute
    /// clock skew budget, 24-hour refresh period, auto-generation enabled.
    fn default() -> Self {
        Self {
            auto_generate_keys: true,
            new_key_lifetime: Duration::days(90),
            key_propagation_window: Duration::days(2),
            max_server_clock_skew: Duration::minutes(5),
            key_ring_refresh_period: Duration::hours(24),
        }
    }
}

impl KeyManagementOptions {
    /// Whether the provider may call `KeyManager::create_new_key` when the
    /// resolver reports no usable default.
    #[must_use]
    pub const fn auto_generate_keys(&self) -> bool {
        self.auto_generate_keys
    }

    /// The lifetime given to a newly created key, from its activation date.
    #[must_use]
    pub const fn new_key_lifetime(&self) -> Duration {
        self.new_key_lifetime
    }

    /// How long after activation a key is still considered propagating, and
    /// therefore not yet eligible to be the default.
    #[must_use]
    pub const fn key_propagation_window(&self) -> Duration {
        self.key_propagation_window
    }

    /// The maximum clock skew tolerated between nodes when evaluating a
    /// key's activation/expiration window.
    #[must_use]
    pub const fn max_server_clock_skew(&self) -> Duration {
        self.max_server_clock_skew
    }

    /// Upper bound on snapshot staleness absent an explicit expiration
    /// signal from the key manager.
    #[must_use]
    pub const fn key_ring_refresh_period(&self) -> Duration {
        self.key_ring_refresh_period
    }

    /// Override whether new keys may be auto-generated.
    #[must_use]
    pub const fn with_auto_generate_keys(mut self, value: bool) -> Self {
        self.auto_generate_keys = value;
        self
    }

    /// Override the lifetime given to newly created keys.
    #[must_use]
    pub const fn with_new_key_lifetime(mut self, value: Duration) -> Self {
        self.new_key_lifetime = value;
        self
    }

    /// Override the propagation window.
    #[must_use]
    pub const fn with_key_propagation_window(mut self, value: Duration) -> Self {
        self.key_propagation_window = value;
        self
    }

    /// Override the clock skew budget.
    #[must_use]
    pub const fn with_max_server_clock_skew(mut self, value: Duration) -> Self {
        self.max_server_clock_skew = value;
        self
    }

    /// Override the refresh period.
    #[must_use]
    pub const fn with_key_ring_refresh_period(mut self, value: Duration) -> Self {
        self.key_ring_refresh_period = value;
        self
    }
}
