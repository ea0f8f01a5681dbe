//! Seed escrow against a decentralized identity.
//!
//! The seed is encrypted such that only the owning identity can decrypt it
//! and stored at a well-known per-identity slot, so a returning user can
//! recover their storage key pair on a new session without any server
//! holding the plaintext. The slot is addressed by a [`DefinitionId`]
//! obtained by publishing a fixed schema/definition against the identity
//! provider (idempotent by content).

use std::sync::Arc;

use serde_json::json;

use crate::error::{SyncError, SyncResult};
use crate::platform::{DefinitionId, Identity, IdentityProvider, SlotDefinition};
use crate::secret::{Seed, SEED_LEN};

/// Returns the well-known escrow slot definition.
#[must_use]
pub fn slot_definition() -> SlotDefinition {
    SlotDefinition {
        name: "TripVault",
        description: "TripVault seed",
        schema: json!({
            "$schema": "http://json-schema.org/draft-07/schema#",
            "title": "TripVault",
            "type": "object",
        }),
    }
}

/// Escrow of the seed under a single identity's well-known slot.
pub struct IdentityEscrow {
    /// The authenticated identity owning the slot.
    identity: Arc<dyn Identity>,
    /// Stable slot address from the published definition.
    definition: DefinitionId,
}

impl IdentityEscrow {
    /// Publishes the slot definition and binds the escrow to `identity`.
    ///
    /// # Errors
    ///
    /// Returns an error if publishing the definition fails.
    pub async fn setup(
        provider: &dyn IdentityProvider,
        identity: Arc<dyn Identity>,
    ) -> SyncResult<Self> {
        let definition = provider.publish_definition(&slot_definition()).await?;
        tracing::debug!(definition = %definition, identity = identity.id(), "escrow slot bound");
        Ok(Self {
            identity,
            definition,
        })
    }

    /// Encrypts `seed` to the identity and upserts it at the slot.
    ///
    /// Not retried internally: the provider's underlying log may have
    /// partially applied a failed write, so retries must be
    /// caller-initiated.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::EscrowWrite`] on provider failure.
    pub async fn store(&self, seed: &Seed) -> SyncResult<()> {
        let blob = self
            .identity
            .encrypt(seed.as_bytes())
            .await
            .map_err(|e| SyncError::escrow_write(e.to_string()))?;
        self.identity
            .set_slot(&self.definition, &blob)
            .await
            .map_err(|e| SyncError::escrow_write(e.to_string()))?;
        tracing::info!(identity = self.identity.id(), "seed escrowed");
        Ok(())
    }

    /// Fetches and decrypts the escrowed seed.
    ///
    /// Returns `Ok(None)` if no slot exists — the expected state for a
    /// first-time user, not an error. Read-after-write against the provider
    /// is not instantaneous; a transient `None` right after a `store` on a
    /// fresh session is a possible race, not proof of absence. Within one
    /// session the derived key pair should be reused instead of calling
    /// this again.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::EscrowDecrypt`] if a slot exists but cannot be
    /// decrypted (wrong identity or corrupted blob).
    pub async fn recover(&self) -> SyncResult<Option<Seed>> {
        let Some(blob) = self.identity.get_slot(&self.definition).await? else {
            tracing::debug!(identity = self.identity.id(), "no escrowed seed");
            return Ok(None);
        };

        let plaintext = self.identity.decrypt(&blob).await?;
        let bytes: [u8; SEED_LEN] = plaintext
            .try_into()
            .map_err(|_| SyncError::escrow_decrypt("escrowed blob has wrong seed length"))?;
        Ok(Some(Seed::from_bytes(bytes)))
    }

    /// The identity this escrow is bound to.
    #[must_use]
    pub fn identity(&self) -> &Arc<dyn Identity> {
        &self.identity
    }
}

#[cfg(test)]
mod tests {
    use crate::platform::memory::{MemoryIdentity, MemoryIdentityProvider};
    use crate::secret::seed_from_phrase;

    use super::*;

    async fn escrow_for(provider: &MemoryIdentityProvider) -> IdentityEscrow {
        let identity = provider.authenticate().await.unwrap();
        IdentityEscrow::setup(provider, identity).await.unwrap()
    }

    #[tokio::test]
    async fn test_recover_before_store_is_absent() {
        let provider = MemoryIdentityProvider::new("did:mem:alice");
        let escrow = escrow_for(&provider).await;

        assert_eq!(escrow.recover().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_store_then_recover_roundtrip() {
        let provider = MemoryIdentityProvider::new("did:mem:alice");
        let escrow = escrow_for(&provider).await;
        let seed = seed_from_phrase("amber canyon drift");

        escrow.store(&seed).await.unwrap();
        assert_eq!(escrow.recover().await.unwrap(), Some(seed));
    }

    #[tokio::test]
    async fn test_store_overwrites_previous_seed() {
        let provider = MemoryIdentityProvider::new("did:mem:alice");
        let escrow = escrow_for(&provider).await;

        escrow.store(&seed_from_phrase("first")).await.unwrap();
        escrow.store(&seed_from_phrase("second")).await.unwrap();

        assert_eq!(
            escrow.recover().await.unwrap(),
            Some(seed_from_phrase("second"))
        );
    }

    #[tokio::test]
    async fn test_recover_with_foreign_blob_fails() {
        let provider = MemoryIdentityProvider::new("did:mem:alice");
        let escrow = escrow_for(&provider).await;
        let seed = seed_from_phrase("amber canyon drift");

        // A blob escrowed by someone else lands in the slot.
        let mallory = MemoryIdentity::new("did:mem:mallory");
        let foreign_blob = mallory.encrypt(seed.as_bytes()).await.unwrap();
        let definition = provider
            .publish_definition(&slot_definition())
            .await
            .unwrap();
        provider
            .identity()
            .set_slot(&definition, &foreign_blob)
            .await
            .unwrap();

        assert!(matches!(
            escrow.recover().await,
            Err(SyncError::EscrowDecrypt(_))
        ));
    }
}
