//! The `Key` entity: an immutable descriptor plus a lazily-memoized encryptor factory.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use once_cell::sync::OnceCell;
use thiserror::Error;
use uuid::Uuid;

/// Opaque authenticated-encryption handle produced by a [`Key`].
///
/// The concrete construction (AES-CBC+HMAC, AES-GCM, ...) lives entirely
/// outside this crate; the core only ever sees this trait object.
pub trait Encryptor: Send + Sync + fmt::Debug {
    /// Encrypt `plaintext`, returning an opaque ciphertext blob.
    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, EncryptorError>;

    /// Decrypt a blob previously produced by [`Encryptor::encrypt`].
    fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, EncryptorError>;
}

/// Failure building or operating an [`Encryptor`].
#[derive(Debug, Clone, Error)]
#[error("encryptor unavailable: {reason}")]
pub struct EncryptorError {
    reason: String,
}

impl EncryptorError {
    /// Construct an error carrying a human-readable `reason`.
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Error returned by [`Key::new`] when the creation/activation/expiration
/// invariant does not hold.
#[derive(Debug, Clone, Error)]
pub enum KeyValidationError {
    /// `creation_date` was after `activation_date`.
    #[error("key {key_id}: creation_date {creation_date} is after activation_date {activation_date}")]
    CreationAfterActivation {
        /// The key under construction.
        key_id: Uuid,
        /// The offending creation date.
        creation_date: DateTime<Utc>,
        /// The offending activation date.
        activation_date: DateTime<Utc>,
    },

    /// `activation_date` was not strictly before `expiration_date`.
    #[error("key {key_id}: activation_date {activation_date} is not before expiration_date {expiration_date}")]
    ActivationNotBeforeExpiration {
        /// The key under construction.
        key_id: Uuid,
        /// The offending activation date.
        activation_date: DateTime<Utc>,
        /// The offending expiration date.
        expiration_date: DateTime<Utc>,
    },
}

type EncryptorFactory = Arc<dyn Fn() -> Result<Arc<dyn Encryptor>, EncryptorError> + Send + Sync>;
type EncryptorOutcome = Result<Arc<dyn Encryptor>, EncryptorError>;

/// An immutable key descriptor with a lazy, memoized encryptor factory.
///
/// Everything but `is_revoked` is fixed at construction time; revocation is
/// decided once, by the repository, when the key is loaded, and is never
/// cleared afterward (§3 of the design).
pub struct Key {
    key_id: Uuid,
    creation_date: DateTime<Utc>,
    activation_date: DateTime<Utc>,
    expiration_date: DateTime<Utc>,
    is_revoked: bool,
    factory: EncryptorFactory,
    encryptor: OnceCell<EncryptorOutcome>,
}

impl Key {
    /// Construct a new key, validating `creation ≤ activation < expiration`.
    ///
    /// # Errors
    ///
    /// Returns [`KeyValidationError`] if the ordering invariant is violated.
    pub fn new(
        key_id: Uuid,
        creation_date: DateTime<Utc>,
        activation_date: DateTime<Utc>,
        expiration_date: DateTime<Utc>,
        is_revoked: bool,
        factory: impl Fn() -> Result<Arc<dyn Encryptor>, EncryptorError> + Send + Sync + 'static,
    ) -> Result<Self, KeyValidationError> {
        if creation_date > activation_date {
            return Err(KeyValidationError::CreationAfterActivation {
                key_id,
                creation_date,
                activation_date,
            });
        }
        if activation_date >= expiration_date {
            return Err(KeyValidationError::ActivationNotBeforeExpiration {
                key_id,
                activation_date,
                expiration_date,
            });
        }

        Ok(Self {
            key_id,
            creation_date,
            activation_date,
            expiration_date,
            is_revoked,
            factory: Arc::new(factory),
            encryptor: OnceCell::new(),
        })
    }

    /// The key's 128-bit identifier.
    #[must_use]
    pub const fn key_id(&self) -> Uuid {
        self.key_id
    }

    /// When the key was created in the repository.
    #[must_use]
    pub const fn creation_date(&self) -> DateTime<Utc> {
        self.creation_date
    }

    /// When the key becomes eligible for use.
    #[must_use]
    pub const fn activation_date(&self) -> DateTime<Utc> {
        self.activation_date
    }

    /// When the key stops being eligible for use.
    #[must_use]
    pub const fn expiration_date(&self) -> DateTime<Utc> {
        self.expiration_date
    }

    /// Whether the repository has flagged this key revoked.
    #[must_use]
    pub const fn is_revoked(&self) -> bool {
        self.is_revoked
    }

    /// Obtain this key's encryptor, invoking the underlying factory at most
    /// once. Both success and failure are memoized and replayed on
    /// subsequent calls without re-invoking the factory.
    ///
    /// # Errors
    ///
    /// Returns the factory's [`EncryptorError`] if construction failed; the
    /// same error is returned on every subsequent call.
    pub fn encryptor(&self) -> Result<Arc<dyn Encryptor>, EncryptorError> {
        self.encryptor.get_or_init(|| (self.factory)()).clone()
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Key")
            .field("key_id", &self.key_id)
            .field("creation_date", &self.creation_date)
            .field("activation_date", &self.activation_date)
            .field("expiration_date", &self.expiration_date)
            .field("is_revoked", &self.is_revoked)
            .finish_non_exhaustive()
    }
}

impl PartialEq for Key {
    fn eq(&self, other: &Self) -> bool {
        self.key_id == other.key_id
    }
}

impl Eq for Key {}
