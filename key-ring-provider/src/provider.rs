//! `KeyRingProvider`: the concurrent, single-writer-refresh cache at the
//! center of this crate.

use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use uuid::Uuid;

use crate::clock::{Clock, SystemClock};
use crate::error::KeyRingError;
use crate::key::Key;
use crate::key_ring::{CacheableKeyRing, KeyRing};
use crate::manager::KeyManager;
use crate::metrics::ProviderMetrics;
use crate::options::KeyManagementOptions;
use crate::resolver::DefaultKeyResolver;

/// How long a prior snapshot's lifetime is extended by when a refresh fails
/// transiently but a snapshot already existed (§4.2.1).
const TRANSIENT_FAILURE_EXTENSION: Duration = Duration::minutes(2);

/// Concurrent cache over a [`KeyManager`], resolving and publishing
/// [`CacheableKeyRing`] snapshots with at most one refresh in flight.
///
/// See §4.2 for the full state machine. In short: a fast path reads an
/// atomic pointer with no locking; a caller that finds the cache invalid
/// either performs the refresh itself (holding a mutex) or, if another
/// thread is already refreshing and a fallback snapshot exists, returns
/// that stale snapshot immediately rather than waiting.
pub struct KeyRingProvider {
    key_manager: Arc<dyn KeyManager>,
    clock: Arc<dyn Clock>,
    options: KeyManagementOptions,
    snapshot: ArcSwapOption<CacheableKeyRing>,
    refresh_lock: Mutex<()>,
    metrics: ProviderMetrics,
}

impl KeyRingProvider {
    /// Construct a provider backed by the real wall clock.
    #[must_use]
    pub fn new(key_manager: Arc<dyn KeyManager>, options: KeyManagementOptions) -> Self {
        Self::with_clock(key_manager, options, Arc::new(SystemClock))
    }

    /// Construct a provider with an injected [`Clock`], for deterministic
    /// tests.
    #[must_use]
    pub fn with_clock(
        key_manager: Arc<dyn KeyManager>,
        options: KeyManagementOptions,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            key_manager,
            clock,
            options,
            snapshot: ArcSwapOption::empty(),
            refresh_lock: Mutex::new(()),
            metrics: ProviderMetrics::new(),
        }
    }

    /// This provider's activity counters.
    #[must_use]
    pub const fn metrics(&self) -> &ProviderMetrics {
        &self.metrics
    }

    /// Return the currently valid key ring, refreshing from the
    /// [`KeyManager`] if necessary.
    ///
    /// # Errors
    ///
    /// Returns [`KeyRingError`] only when no prior snapshot exists and the
    /// refresh that would produce one failed; see §4.2.1 and §7.
    #[tracing::instrument(skip(self))]
    pub fn get_current_key_ring(&self) -> Result<KeyRing, KeyRingError> {
        let now = self.clock.now();

        if let Some(snapshot) = self.snapshot.load_full() {
            if snapshot.is_valid_at(now) {
                tracing::debug!("key ring cache hit");
                self.metrics.cache_hits.inc();
                return Ok(snapshot.key_ring());
            }
        }

        let prior_exists = self.snapshot.load_full().is_some();

        if prior_exists {
            if let Some(_guard) = self.refresh_lock.try_lock() {
                if let Some(snapshot) = self.snapshot.load_full() {
                    if snapshot.is_valid_at(self.clock.now()) {
                        return Ok(snapshot.key_ring());
                    }
                }
                self.refresh(now)
            } else {
                tracing::debug!("refresh already in flight, serving stale snapshot");
                self.metrics.stale_fallback_serves.inc();
                let snapshot = self
                    .snapshot
                    .load_full()
                    .expect("prior_exists guarantees a snapshot is published");
                Ok(snapshot.key_ring())
            }
        } else {
            let _guard = self.refresh_lock.lock();
            if let Some(snapshot) = self.snapshot.load_full() {
                if snapshot.is_valid_at(self.clock.now()) {
                    return Ok(snapshot.key_ring());
                }
            }
            self.refresh(now)
        }
    }

    /// Perform a refresh, publish its result (or a lifetime-extended prior
    /// snapshot on transient failure), and return the outcome. Called only
    /// while holding `refresh_lock`.
    fn refresh(&self, now: DateTime<Utc>) -> Result<KeyRing, KeyRingError> {
        match self.refresh_once(now) {
            Ok(ring) => {
                self.metrics.refreshes.inc();
                Ok(ring)
            }
            Err(err) => {
                let prior = self.snapshot.load_full();
                match (prior, err.is_transient()) {
                    (Some(prior_snapshot), true) => {
                        tracing::warn!(
                            error = %err,
                            "refresh failed transiently, extending prior snapshot lifetime"
                        );
                        self.metrics.transient_failure_extensions.inc();
                        let extended = prior_snapshot.extend_lifetime(now + TRANSIENT_FAILURE_EXTENSION);
                        self.snapshot.store(Some(Arc::new(extended)));
                    }
                    (None, _) => {
                        tracing::error!(error = %err, "refresh failed with no prior snapshot to fall back to");
                        self.metrics.refresh_failures.inc();
                    }
                    (Some(_), false) => {
                        tracing::error!(error = %err, "refresh failed with a non-retryable configuration error");
                    }
                }
                Err(err)
            }
        }
    }

    /// Run the refresh algorithm of §4.2.1 to completion, returning the
    /// freshly assembled key ring without touching `self.snapshot`.
    fn refresh_once(&self, now: DateTime<Utc>) -> Result<KeyRing, KeyRingError> {
        let expiration_signal = self.key_manager.cache_expiration_token()?;
        let mut key_just_added: Option<Arc<Key>> = None;
        let mut generated_this_refresh = false;

        let (chosen, all_keys) = loop {
            let all_keys = self.key_manager.get_all_keys()?;
            let policy = DefaultKeyResolver::resolve(now, &all_keys, &self.options);

            if !policy.should_generate_new_key {
                // (a) policy has a default and does not request a new key.
                let default = policy
                    .default_key
                    .expect("resolver never requests no generation without a default");
                break (default, all_keys);
            }

            if let Some(just_added) = &key_just_added {
                // (b) recursion guard: we already created a key on a prior
                // pass of this loop, so this pass must terminate.
                let chosen = policy
                    .default_key
                    .or(policy.fallback_key)
                    .unwrap_or_else(|| just_added.clone());
                break (chosen, all_keys);
            }

            if !self.options.auto_generate_keys() {
                // (c) generation requested but disabled.
                let chosen = policy
                    .default_key
                    .or(policy.fallback_key)
                    .ok_or(KeyRingError::NoDefaultKeyAutoGenerateDisabled)?;
                break (chosen, all_keys);
            }

            // (d) generation requested and permitted: create a key and loop
            // once more to let the resolver see it.
            let (activation, expiration) = match &policy.default_key {
                None => (now, now + self.options.new_key_lifetime()),
                Some(existing) => (existing.expiration_date(), now + self.options.new_key_lifetime()),
            };
            let new_key = self.key_manager.create_new_key(activation, expiration)?;
            tracing::info!(key_id = %new_key.key_id(), "created new key during refresh");
            generated_this_refresh = true;
            self.metrics.keys_generated.inc();
            key_just_added = Some(new_key);
        };

        let next_refresh_at = now + crate::jitter::jittered(self.options.key_ring_refresh_period());
        let expiration_time = if chosen.expiration_date() <= now {
            next_refresh_at
        } else {
            chosen.expiration_date().min(next_refresh_at)
        };

        chosen
            .encryptor()
            .map_err(|_| KeyRingError::EncryptorUnavailable {
                key_id: chosen.key_id(),
            })?;

        let all_keys_map: HashMap<Uuid, Arc<Key>> = all_keys
            .into_iter()
            .map(|key| (key.key_id(), key))
            .collect();

        let snapshot = CacheableKeyRing::new(expiration_time, expiration_signal, chosen, all_keys_map);
        let key_ring = snapshot.key_ring();
        self.snapshot.store(Some(Arc::new(snapshot)));

        tracing::info!(
            generated_new_key = generated_this_refresh,
            expiration_time = %expiration_time,
            "published new key ring snapshot"
        );

        Ok(key_ring)
    }
}
