//! The `KeyManager` collaborator: the interface between the core and a key repository.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use kr_common::PlatformError;

use crate::key::Key;

/// A one-shot, cancellable signal that fires when the repository observes
/// an external mutation to the key set.
///
/// Cloning shares the same underlying flag: whichever side (repository
/// implementation or test) calls [`CacheExpirationToken::fire`] is observed
/// by every clone via [`CacheExpirationToken::has_fired`].
#[derive(Debug, Clone, Default)]
pub struct CacheExpirationToken(Arc<AtomicBool>);

impl CacheExpirationToken {
    /// Create a fresh, unfired token.
    #[must_use]
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    /// Whether this token (or any clone of it) has fired.
    #[must_use]
    pub fn has_fired(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Fire the token. Idempotent: firing an already-fired token is a no-op.
    pub fn fire(&self) {
        self.0.store(true, Ordering::Release);
    }
}

/// The storage collaborator the core depends on.
///
/// Implementations own XML/file/registry storage, envelope encryption of
/// key material, and any network I/O; the core constrains none of that,
/// only these three operations and their ordering guarantees.
pub trait KeyManager: Send + Sync {
    /// Returns the current universe of keys, including revoked ones
    /// (`is_revoked = true`).
    ///
    /// # Errors
    ///
    /// Returns [`PlatformError`] on any repository failure.
    fn get_all_keys(&self) -> Result<Vec<Arc<Key>>, PlatformError>;

    /// Atomically create and persist a new key with the given activation
    /// and expiration instants. A subsequent `get_all_keys` call must
    /// include the returned key.
    ///
    /// # Errors
    ///
    /// Returns [`PlatformError`] on any repository failure.
    fn create_new_key(
        &self,
        activation: DateTime<Utc>,
        expiration: DateTime<Utc>,
    ) -> Result<Arc<Key>, PlatformError>;

    /// Obtain a token that fires if the repository observes a mutation to
    /// the key set after this call. Must be called *before* `get_all_keys`
    /// in a refresh so that a race with a concurrent mutation is never
    /// missed.
    ///
    /// # Errors
    ///
    /// Returns [`PlatformError`] on any repository failure.
    fn cache_expiration_token(&self) -> Result<CacheExpirationToken, PlatformError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_starts_unfired() {
        let token = CacheExpirationToken::new();
        assert!(!token.has_fired());
    }

    #[test]
    fn firing_is_observed_by_clones() {
        let token = CacheExpirationToken::new();
        let clone = token.clone();
        token.fire();
        assert!(clone.has_fired());
    }
}
