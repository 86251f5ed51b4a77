//! `DefaultKeyResolver`: pure selection of the default and fallback keys under policy.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::key::Key;
use crate::options::KeyManagementOptions;

/// The outcome of running [`DefaultKeyResolver::resolve`] against a key set.
#[derive(Debug, Clone)]
pub struct ResolvedPolicy {
    /// The key that should currently encrypt, if any usable key qualifies.
    pub default_key: Option<Arc<Key>>,
    /// A last-resort candidate to use when no default exists and
    /// generation is disabled.
    pub fallback_key: Option<Arc<Key>>,
    /// Whether the caller should create a new key before settling on a
    /// final default.
    pub should_generate_new_key: bool,
}

/// Stateless policy engine that picks a default key from a key set.
///
/// `resolve` is a pure function of its three inputs (§P5): it never
/// mutates, never panics, and an encryptor-probe failure on a candidate key
/// simply demotes it to "non-usable" rather than propagating an error.
pub struct DefaultKeyResolver;

impl DefaultKeyResolver {
    /// Resolve the default and fallback keys for `now` out of `all_keys`,
    /// under `options`.
    #[must_use]
    pub fn resolve(
        now: DateTime<Utc>,
        all_keys: &[Arc<Key>],
        options: &KeyManagementOptions,
    ) -> ResolvedPolicy {
        let skew = options.max_server_clock_skew();
        let propagation = options.key_propagation_window();

        let is_active = |key: &Arc<Key>| {
            !key.is_revoked()
                && key.activation_date() <= now + skew
                && now + skew < key.expiration_date()
        };

        let usable_keys: Vec<Arc<Key>> = all_keys
            .iter()
            .filter(|key| is_active(key) && key.encryptor().is_ok())
            .cloned()
            .collect();

        let propagation_floor = now - propagation;
        let mut eligible: Vec<Arc<Key>> = usable_keys
            .iter()
            .filter(|key| key.activation_date() <= propagation_floor)
            .cloned()
            .collect();
        if eligible.is_empty() {
            eligible = usable_keys
                .iter()
                .filter(|key| key.activation_date() <= now)
                .cloned()
                .collect();
        }

        let default_key = Self::latest_activated(&eligible);

        // A key nearing expiry needs a successor queued well before it goes
        // dark, not just before the propagation/skew budget runs out: a
        // successor created only `propagation + skew` before expiration
        // would still be propagating (and therefore ineligible) right up
        // until the old key expires. Lead time is the larger of that floor
        // and a tenth of the key's own lifetime, so long-lived keys get a
        // proportionally longer runway to rotate.
        let lifetime_lead = Duration::milliseconds(options.new_key_lifetime().num_milliseconds() / 10);
        let generation_lead_time = (propagation + skew).max(lifetime_lead);

        let should_generate_new_key = match &default_key {
            None => true,
            Some(default) => {
                let near_expiry = default.expiration_date() - now <= generation_lead_time;
                near_expiry
                    && !usable_keys.iter().any(|key| {
                        key.key_id() != default.key_id()
                            && key.activation_date() > default.activation_date()
                    })
            }
        };

        let fallback_key = if default_key.is_none() {
            Self::latest_activated(&usable_keys)
        } else {
            None
        };

        ResolvedPolicy {
            default_key,
            fallback_key,
            should_generate_new_key,
        }
    }

    /// Pick the key with the latest `activation_date`, tie-breaking on the
    /// larger `key_id` byte-lexicographically, for deterministic agreement
    /// across nodes that observe the same key set.
    fn latest_activated(keys: &[Arc<Key>]) -> Option<Arc<Key>> {
        keys.iter()
            .max_by(|a, b| {
                a.activation_date()
                    .cmp(&b.activation_date())
                    .then_with(|| a.key_id().cmp(&b.key_id()))
            })
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::EncryptorError;
    use chrono::{Duration, TimeZone};
    use std::sync::Arc;
    use uuid::Uuid;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2015, 3, 1, 0, 0, 0).unwrap()
    }

    fn broken_key(id: Uuid, activation: DateTime<Utc>, expiration: DateTime<Utc>) -> Arc<Key> {
        Arc::new(
            Key::new(id, activation, activation, expiration, false, || {
                Err(EncryptorError::new("always fails"))
            })
            .unwrap(),
        )
    }

    fn options() -> KeyManagementOptions {
        KeyManagementOptions::default()
            .with_new_key_lifetime(Duration::days(90))
            .with_key_propagation_window(Duration::days(2))
            .with_max_server_clock_skew(Duration::minutes(5))
    }

    #[derive(Debug)]
    struct StubEncryptor;
    impl crate::key::Encryptor for StubEncryptor {
        fn encrypt(&self, _: &[u8]) -> Result<Vec<u8>, EncryptorError> {
            Ok(Vec::new())
        }
        fn decrypt(&self, _: &[u8]) -> Result<Vec<u8>, EncryptorError> {
            Ok(Vec::new())
        }
    }

    fn usable_key(
        id: Uuid,
        activation: DateTime<Utc>,
        expiration: DateTime<Utc>,
        revoked: bool,
    ) -> Arc<Key> {
        Arc::new(
            Key::new(id, activation, activation, expiration, revoked, || {
                Ok(Arc::new(StubEncryptor) as Arc<dyn crate::key::Encryptor>)
            })
            .unwrap(),
        )
    }

    #[test]
    fn empty_repository_requests_generation() {
        let policy = DefaultKeyResolver::resolve(t0(), &[], &options());
        assert!(policy.default_key.is_none());
        assert!(policy.fallback_key.is_none());
        assert!(policy.should_generate_new_key);
    }

    #[test]
    fn single_mid_life_key_is_default_without_generation() {
        let key = usable_key(Uuid::new_v4(), t0() - Duration::days(10), t0() + Duration::days(80), false);
        let policy = DefaultKeyResolver::resolve(t0(), &[key.clone()], &options());
        assert_eq!(policy.default_key.unwrap().key_id(), key.key_id());
        assert!(!policy.should_generate_new_key);
    }

    #[test]
    fn key_nearing_expiry_requests_generation_but_stays_default() {
        let key = usable_key(Uuid::new_v4(), t0() - Duration::days(85), t0() + Duration::days(5), false);
        let policy = DefaultKeyResolver::resolve(t0(), &[key.clone()], &options());
        assert_eq!(policy.default_key.unwrap().key_id(), key.key_id());
        assert!(policy.should_generate_new_key);
    }

    #[test]
    fn revoked_key_is_skipped_for_default() {
        let revoked = usable_key(Uuid::new_v4(), t0() - Duration::days(10), t0() + Duration::days(80), true);
        let active = usable_key(Uuid::new_v4(), t0() - Duration::days(5), t0() + Duration::days(85), false);
        let policy = DefaultKeyResolver::resolve(t0(), &[revoked, active.clone()], &options());
        assert_eq!(policy.default_key.unwrap().key_id(), active.key_id());
    }

    #[test]
    fn key_still_in_propagation_window_is_not_chosen_over_propagated_one() {
        let propagated = usable_key(Uuid::new_v4(), t0() - Duration::days(10), t0() + Duration::days(80), false);
        let fresh = usable_key(Uuid::new_v4(), t0() - Duration::hours(1), t0() + Duration::days(90), false);
        let policy = DefaultKeyResolver::resolve(t0(), &[propagated.clone(), fresh], &options());
        assert_eq!(policy.default_key.unwrap().key_id(), propagated.key_id());
    }

    #[test]
    fn propagation_floor_relaxes_when_nothing_meets_it() {
        let fresh = usable_key(Uuid::new_v4(), t0() - Duration::hours(1), t0() + Duration::days(90), false);
        let policy = DefaultKeyResolver::resolve(t0(), &[fresh.clone()], &options());
        assert_eq!(policy.default_key.unwrap().key_id(), fresh.key_id());
    }

    #[test]
    fn broken_encryptor_is_treated_as_nonexistent_for_defaulting() {
        let broken = broken_key(Uuid::new_v4(), t0() - Duration::days(10), t0() + Duration::days(80));
        let policy = DefaultKeyResolver::resolve(t0(), &[broken], &options());
        assert!(policy.default_key.is_none());
        assert!(policy.should_generate_new_key);
    }

    #[test]
    fn fallback_is_populated_only_when_default_is_absent() {
        let key = usable_key(Uuid::new_v4(), t0() - Duration::days(10), t0() + Duration::days(80), false);
        let policy = DefaultKeyResolver::resolve(t0(), &[key], &options());
        assert!(policy.default_key.is_some());
        assert!(policy.fallback_key.is_none());

        let policy_empty = DefaultKeyResolver::resolve(t0(), &[], &options());
        assert!(policy_empty.default_key.is_none());
        assert!(policy_empty.fallback_key.is_none());
    }

    #[test]
    fn resolver_is_a_pure_function_of_its_inputs() {
        let key = usable_key(Uuid::new_v4(), t0() - Duration::days(10), t0() + Duration::days(80), false);
        let opts = options();
        let first = DefaultKeyResolver::resolve(t0(), &[key.clone()], &opts);
        let second = DefaultKeyResolver::resolve(t0(), &[key], &opts);
        assert_eq!(
            first.default_key.map(|k| k.key_id()),
            second.default_key.map(|k| k.key_id())
        );
        assert_eq!(first.should_generate_new_key, second.should_generate_new_key);
    }
}
