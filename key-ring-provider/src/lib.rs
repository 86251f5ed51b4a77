//! The concurrent, cache-and-refresh core of a data-protection key ring.
//!
//! This crate hands callers an active authenticated-encryption key plus the
//! set of keys required to decrypt previously protected payloads. It sits
//! between a persistent key repository (consumed through the [`KeyManager`]
//! trait) and the payload-protection layer that actually performs
//! encryption and decryption (consumed through the [`Encryptor`] trait).
//!
//! - [`key`] - the immutable `Key` entity and its lazy encryptor factory
//! - [`manager`] - the `KeyManager` collaborator interface
//! - [`resolver`] - the pure `DefaultKeyResolver` selection policy
//! - [`key_ring`] - the immutable `CacheableKeyRing` snapshot and `KeyRing` view
//! - [`provider`] - `KeyRingProvider`, the concurrent single-flight cache
//! - [`clock`] - the injectable wall-clock abstraction
//! - [`options`] - `KeyManagementOptions`, the immutable policy parameters
//! - [`metrics`] - dependency-free provider counters
//! - [`error`] - the crate's error taxonomy
//!
//! ```
//! use std::sync::Arc;
//! use key_ring_provider::{KeyManagementOptions, KeyRingProvider};
//! use key_ring_provider::test_support::InMemoryKeyManager;
//!
//! let manager = Arc::new(InMemoryKeyManager::new());
//! let provider = KeyRingProvider::new(manager, KeyManagementOptions::default());
//!
//! let ring = provider.get_current_key_ring().expect("auto-generation is enabled by default");
//! let encryptor = ring.default().encryptor().expect("freshly generated keys have a working encryptor");
//! let ciphertext = encryptor.encrypt(b"payload").unwrap();
//! assert_eq!(encryptor.decrypt(&ciphertext).unwrap(), b"payload");
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod clock;
pub mod error;
pub mod jitter;
pub mod key;
pub mod key_ring;
pub mod manager;
pub mod metrics;
pub mod options;
pub mod provider;
pub mod resolver;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use clock::{Clock, SystemClock};
pub use error::KeyRingError;
pub use key::{Encryptor, EncryptorError, Key, KeyValidationError};
pub use key_ring::{CacheableKeyRing, KeyRing};
pub use manager::{CacheExpirationToken, KeyManager};
pub use metrics::ProviderMetrics;
pub use options::KeyManagementOptions;
pub use provider::KeyRingProvider;
pub use resolver::{DefaultKeyResolver, ResolvedPolicy};
