//! External collaborator traits.
//!
//! The synchronization core sits on top of two external systems it does not
//! reimplement: a decentralized identity provider and a decentralized
//! key-value store. Both are reached through traits so the core can be
//! exercised against in-memory implementations (see [`memory`]) and wired to
//! real backends by the embedding application.
//!
//! Every operation is an asynchronous network call; implementations map
//! their failures into the [`SyncError`](crate::SyncError) taxonomy and
//! report absence as `Ok(None)`, never as an error.

pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::error::SyncResult;

/// Stable identifier of a published slot definition.
///
/// Obtained once by publishing a [`SlotDefinition`] against the identity
/// provider; stable for the lifetime of the provider's schema registry and
/// treated as a constant lookup key, not regenerated per session.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DefinitionId(String);

impl DefinitionId {
    /// Creates a definition ID from its string form.
    #[must_use]
    pub fn new<S: Into<String>>(id: S) -> Self {
        Self(id.into())
    }

    /// Returns the string form of the definition ID.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DefinitionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A schema/definition published against the identity provider to obtain
/// the well-known per-identity escrow slot.
#[derive(Debug, Clone, Serialize)]
pub struct SlotDefinition {
    /// Short name of the definition.
    pub name: &'static str,
    /// Human-readable description.
    pub description: &'static str,
    /// JSON schema constraining slot contents.
    pub schema: Value,
}

/// Whole-document JSON storage.
///
/// Documents are addressed by a `(key, data_key)` pair: reads go through the
/// hex-encoded public key, writes through the matching private key. The
/// store only supports whole-document get/set; there is no per-entry upsert,
/// which is why all writers in this crate read-merge-write.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetches the document at `(public_key, data_key)`.
    ///
    /// Returns `Ok(None)` if no document exists yet.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Repository`](crate::SyncError::Repository) on
    /// network or storage failure.
    async fn get_json(&self, public_key: &str, data_key: &str) -> SyncResult<Option<Value>>;

    /// Replaces the document at `(private_key, data_key)`.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Repository`](crate::SyncError::Repository) on
    /// network or storage failure.
    async fn set_json(&self, private_key: &str, data_key: &str, value: Value) -> SyncResult<()>;
}

/// An authenticated identity handle.
///
/// Carries the stable string identifier plus encrypt/decrypt operations
/// scoped to the identity and per-identity key-value slots addressed by
/// [`DefinitionId`].
#[async_trait]
pub trait Identity: Send + Sync {
    /// Stable string identifier of this identity.
    fn id(&self) -> &str;

    /// Encrypts `plaintext` such that only this identity can decrypt it.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider rejects the operation.
    async fn encrypt(&self, plaintext: &[u8]) -> SyncResult<Vec<u8>>;

    /// Decrypts a blob previously encrypted to this identity.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::EscrowDecrypt`](crate::SyncError::EscrowDecrypt)
    /// if the blob was encrypted to a different identity or is corrupted.
    async fn decrypt(&self, ciphertext: &[u8]) -> SyncResult<Vec<u8>>;

    /// Fetches this identity's slot for `definition`.
    ///
    /// Returns `Ok(None)` if the slot has never been written.
    ///
    /// # Errors
    ///
    /// Returns an error on provider failure.
    async fn get_slot(&self, definition: &DefinitionId) -> SyncResult<Option<Vec<u8>>>;

    /// Upserts this identity's slot for `definition`.
    ///
    /// # Errors
    ///
    /// Returns an error on provider failure.
    async fn set_slot(&self, definition: &DefinitionId, blob: &[u8]) -> SyncResult<()>;
}

/// The decentralized identity provider.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Authenticates and returns the identity handle.
    ///
    /// # Errors
    ///
    /// Returns
    /// [`SyncError::Authentication`](crate::SyncError::Authentication) on
    /// failure.
    async fn authenticate(&self) -> SyncResult<Arc<dyn Identity>>;

    /// Publishes a slot definition, returning its stable identifier.
    ///
    /// Idempotent by definition content: publishing the same definition
    /// twice yields the same [`DefinitionId`].
    ///
    /// # Errors
    ///
    /// Returns an error on provider failure.
    async fn publish_definition(&self, definition: &SlotDefinition) -> SyncResult<DefinitionId>;
}
