//! Error taxonomy for the key ring provider.

use kr_common::PlatformError;
use thiserror::Error;
use uuid::Uuid;

/// Errors that `KeyRingProvider::get_current_key_ring` can surface.
#[derive(Debug, Error)]
pub enum KeyRingError {
    /// The resolver found no usable default key and `auto_generate_keys` is
    /// `false`. Non-retryable until an operator enables generation or the
    /// repository is seeded with a valid key.
    #[error("no default key is available and auto-generation of new keys is disabled")]
    NoDefaultKeyAutoGenerateDisabled,

    /// The underlying `KeyManager` failed (I/O, deserialization, or any
    /// other repository error). Treated as transient: triggers the 2-minute
    /// lifetime extension when a prior snapshot exists.
    #[error("key manager failure: {0}")]
    KeyManagerFailure(#[from] PlatformError),

    /// The chosen default key's `encryptor()` failed the final assembly-time
    /// probe, after having already been selected by the resolver.
    #[error("default key {key_id} failed its encryptor probe during refresh")]
    EncryptorUnavailable {
        /// The key that failed the probe.
        key_id: Uuid,
    },
}

impl KeyRingError {
    /// Whether this error reflects a transient condition that a later
    /// refresh is likely to resolve on its own, as opposed to a
    /// configuration problem requiring operator action.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::KeyManagerFailure(_) | Self::EncryptorUnavailable { .. })
    }
}
