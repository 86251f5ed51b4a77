//! Test and documentation scaffolding: an in-memory [`KeyManager`], a
//! manually advanceable [`Clock`], and a minimal AES-GCM [`Encryptor`].
//!
//! None of this is part of the crate's production surface (§1's
//! Out-of-scope section): the real key repository and cipher constructions
//! live outside this crate entirely. This module exists so the crate is
//! exercisable end to end in its own tests and doctests. Gated behind the
//! `test-support` feature, which is always enabled for `cfg(test)`.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Nonce};
use chrono::{DateTime, Duration, Utc};
use kr_common::PlatformError;
use parking_lot::Mutex;
use uuid::Uuid;

use crate::clock::Clock;
use crate::key::{Encryptor, EncryptorError, Key};
use crate::manager::{CacheExpirationToken, KeyManager};

/// A minimal AES-256-GCM [`Encryptor`]. Each instance owns a freshly
/// generated key; the nonce is prepended to the ciphertext on encrypt and
/// split back off on decrypt. Not a recommended production cipher source
/// for this crate's consumers — see the module doc.
#[derive(Debug)]
pub struct AesGcmEncryptor {
    cipher: Aes256Gcm,
}

impl AesGcmEncryptor {
    /// Generate a new encryptor with a fresh random key.
    #[must_use]
    pub fn generate() -> Self {
        let key = Aes256Gcm::generate_key(OsRng);
        Self {
            cipher: Aes256Gcm::new(&key),
        }
    }
}

impl Encryptor for AesGcmEncryptor {
    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, EncryptorError> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let mut ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext)
            .map_err(|e| EncryptorError::new(e.to_string()))?;
        let mut out = nonce.to_vec();
        out.append(&mut ciphertext);
        Ok(out)
    }

    fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, EncryptorError> {
        if ciphertext.len() < 12 {
            return Err(EncryptorError::new("ciphertext too short to contain a nonce"));
        }
        let (nonce_bytes, body) = ciphertext.split_at(12);
        let nonce = Nonce::from_slice(nonce_bytes);
        self.cipher
            .decrypt(nonce, body)
            .map_err(|e| EncryptorError::new(e.to_string()))
    }
}

/// A [`Clock`] whose `now()` is set explicitly and advanced on demand,
/// for deterministic tests.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    /// Create a clock that initially reports `now`.
    #[must_use]
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    /// Move the clock forward by `delta`.
    pub fn advance(&self, delta: Duration) {
        *self.now.lock() += delta;
    }

    /// Jump the clock to an arbitrary instant.
    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock() = now;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

/// An in-memory [`KeyManager`] backed by a `Vec`, for tests and doctests.
///
/// Supports seeding keys directly, injecting a one-shot failure on the next
/// `get_all_keys` call, and simulating an externally observed mutation that
/// fires the current cache expiration token.
pub struct InMemoryKeyManager {
    keys: Mutex<Vec<Arc<Key>>>,
    current_token: Mutex<CacheExpirationToken>,
    get_all_keys_calls: AtomicU64,
    fail_next_get_all_keys: AtomicBool,
}

impl InMemoryKeyManager {
    /// Create an empty manager.
    #[must_use]
    pub fn new() -> Self {
        Self {
            keys: Mutex::new(Vec::new()),
            current_token: Mutex::new(CacheExpirationToken::new()),
            get_all_keys_calls: AtomicU64::new(0),
            fail_next_get_all_keys: AtomicBool::new(false),
        }
    }

    /// How many times `get_all_keys` has been called so far.
    #[must_use]
    pub fn get_all_keys_call_count(&self) -> u64 {
        self.get_all_keys_calls.load(Ordering::SeqCst)
    }

    /// Make the next `get_all_keys` call fail with a simulated outage.
    pub fn fail_next_get_all_keys(&self) {
        self.fail_next_get_all_keys.store(true, Ordering::SeqCst);
    }

    /// Seed a non-revoked key with a working encryptor and return its id.
    #[must_use]
    pub fn seed_active_key(&self, activation: DateTime<Utc>, expiration: DateTime<Utc>) -> Uuid {
        self.seed_key(activation, expiration, false)
    }

    /// Seed a revoked key with a working encryptor and return its id.
    #[must_use]
    pub fn seed_revoked_key(&self, activation: DateTime<Utc>, expiration: DateTime<Utc>) -> Uuid {
        self.seed_key(activation, expiration, true)
    }

    fn seed_key(&self, activation: DateTime<Utc>, expiration: DateTime<Utc>, revoked: bool) -> Uuid {
        let id = Uuid::new_v4();
        let key = Key::new(id, activation, activation, expiration, revoked, || {
            Ok(Arc::new(AesGcmEncryptor::generate()) as Arc<dyn Encryptor>)
        })
        .expect("seeded test keys always satisfy creation <= activation < expiration");
        self.keys.lock().push(Arc::new(key));
        id
    }

    /// Fire the current cache expiration token, as if the repository had
    /// observed an external mutation, and rotate in a fresh one.
    pub fn simulate_external_mutation(&self) {
        let mut current = self.current_token.lock();
        current.fire();
        *current = CacheExpirationToken::new();
    }
}

impl Default for InMemoryKeyManager {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyManager for InMemoryKeyManager {
    fn get_all_keys(&self) -> Result<Vec<Arc<Key>>, PlatformError> {
        self.get_all_keys_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_next_get_all_keys.swap(false, Ordering::SeqCst) {
            return Err(PlatformError::unavailable("simulated repository outage"));
        }
        Ok(self.keys.lock().clone())
    }

    fn create_new_key(
        &self,
        activation: DateTime<Utc>,
        expiration: DateTime<Utc>,
    ) -> Result<Arc<Key>, PlatformError> {
        let id = Uuid::new_v4();
        let key = Key::new(id, activation, activation, expiration, false, || {
            Ok(Arc::new(AesGcmEncryptor::generate()) as Arc<dyn Encryptor>)
        })
        .map_err(|e| PlatformError::internal(e.to_string()))?;
        let key = Arc::new(key);
        self.keys.lock().push(key.clone());
        Ok(key)
    }

    fn cache_expiration_token(&self) -> Result<CacheExpirationToken, PlatformError> {
        Ok(self.current_token.lock().clone())
    }
}
