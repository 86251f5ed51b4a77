//! `CacheableKeyRing`: the immutable snapshot published by the provider, and
//! the `KeyRing` view handed to callers.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::key::Key;
use crate::manager::CacheExpirationToken;

/// An immutable, published view of the key ring: a default key plus every
/// non-revoked key known at the time of the refresh that produced it.
pub struct CacheableKeyRing {
    expiration_time: DateTime<Utc>,
    expiration_signal: CacheExpirationToken,
    default_key: Arc<Key>,
    all_keys: HashMap<Uuid, Arc<Key>>,
}

impl CacheableKeyRing {
    /// Assemble a snapshot. `all_keys` must contain `default_key`; this is
    /// enforced by inserting it if missing rather than panicking, since the
    /// caller (the provider's refresh routine) is trusted but defense here
    /// is cheap.
    #[must_use]
    pub fn new(
        expiration_time: DateTime<Utc>,
        expiration_signal: CacheExpirationToken,
        default_key: Arc<Key>,
        mut all_keys: HashMap<Uuid, Arc<Key>>,
    ) -> Self {
        all_keys
            .entry(default_key.key_id())
            .or_insert_with(|| default_key.clone());

        Self {
            expiration_time,
            expiration_signal,
            default_key,
            all_keys,
        }
    }

    /// Build a lifetime-extended copy of this snapshot: same keys and
    /// expiration signal, but a fresh `expiration_time`. Used when a
    /// transient refresh failure forces the provider to keep serving a
    /// prior snapshot a little longer (§4.2.1).
    #[must_use]
    pub fn extend_lifetime(&self, new_expiration_time: DateTime<Utc>) -> Self {
        Self {
            expiration_time: new_expiration_time,
            expiration_signal: self.expiration_signal.clone(),
            default_key: self.default_key.clone(),
            all_keys: self.all_keys.clone(),
        }
    }

    /// Whether this snapshot is still valid at `now`: not past its
    /// expiration time, and its expiration signal has not fired.
    #[must_use]
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expiration_time && !self.expiration_signal.has_fired()
    }

    /// The instant this snapshot is considered stale.
    #[must_use]
    pub const fn expiration_time(&self) -> DateTime<Utc> {
        self.expiration_time
    }

    /// The current default (encrypting) key.
    #[must_use]
    pub fn default_key(&self) -> Arc<Key> {
        self.default_key.clone()
    }

    /// Look up a key by id, revoked or not.
    #[must_use]
    pub fn find(&self, key_id: Uuid) -> Option<Arc<Key>> {
        self.all_keys.get(&key_id).cloned()
    }

    /// The read-only view handed to external callers.
    #[must_use]
    pub fn key_ring(&self) -> KeyRing {
        KeyRing {
            default_key: self.default_key.clone(),
            all_keys: self.all_keys.clone(),
        }
    }
}

/// Read-only view of a resolved key ring, returned to callers of
/// [`crate::provider::KeyRingProvider::get_current_key_ring`].
#[derive(Clone)]
pub struct KeyRing {
    default_key: Arc<Key>,
    all_keys: HashMap<Uuid, Arc<Key>>,
}

impl KeyRing {
    /// The key that should be used to encrypt new payloads.
    #[must_use]
    pub fn default(&self) -> Arc<Key> {
        self.default_key.clone()
    }

    /// Look up a key (default, non-default, or revoked) by id.
    #[must_use]
    pub fn find(&self, key_id: Uuid) -> Option<Arc<Key>> {
        self.all_keys.get(&key_id).cloned()
    }

    /// The number of keys known to this ring, including revoked ones.
    #[must_use]
    pub fn len(&self) -> usize {
        self.all_keys.len()
    }

    /// Whether this ring knows about any keys at all. Always `false` in
    /// practice since a ring always contains at least its default key.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.all_keys.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::{EncryptorError, Key};
    use chrono::Duration;

    fn test_key(id: Uuid) -> Arc<Key> {
        let now = Utc::now();
        Arc::new(
            Key::new(id, now, now, now + Duration::days(1), false, move || {
                Err(EncryptorError::new("unused in this test"))
            })
            .unwrap(),
        )
    }

    #[test]
    fn find_covers_revoked_keys() {
        let default_key = test_key(Uuid::new_v4());
        let revoked_id = Uuid::new_v4();
        let revoked_key = test_key(revoked_id);
        let mut all_keys = HashMap::new();
        all_keys.insert(revoked_id, revoked_key);

        let ring = CacheableKeyRing::new(
            Utc::now() + Duration::hours(1),
            CacheExpirationToken::new(),
            default_key.clone(),
            all_keys,
        );

        assert_eq!(ring.find(revoked_id).unwrap().key_id(), revoked_id);
        assert_eq!(ring.default_key().key_id(), default_key.key_id());
    }

    #[test]
    fn validity_respects_expiration_time_and_signal() {
        let default_key = test_key(Uuid::new_v4());
        let signal = CacheExpirationToken::new();
        let now = Utc::now();
        let ring = CacheableKeyRing::new(now + Duration::hours(1), signal.clone(), default_key, HashMap::new());

        assert!(ring.is_valid_at(now));
        assert!(!ring.is_valid_at(now + Duration::hours(2)));

        signal.fire();
        assert!(!ring.is_valid_at(now));
    }

    #[test]
    fn extend_lifetime_keeps_keys_and_signal() {
        let default_key = test_key(Uuid::new_v4());
        let signal = CacheExpirationToken::new();
        let now = Utc::now();
        let ring = CacheableKeyRing::new(now + Duration::hours(1), signal, default_key.clone(), HashMap::new());

        let extended = ring.extend_lifetime(now + Duration::minutes(2));
        assert_eq!(extended.default_key().key_id(), default_key.key_id());
        assert_eq!(extended.expiration_time(), now + Duration::minutes(2));
    }
}
