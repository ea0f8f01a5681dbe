//! Deterministic storage key derivation.
//!
//! The key-value store addresses documents by hex-encoded Ed25519 keys:
//! reads go through the public key, writes through the private key. The pair
//! is a pure function of the [`Seed`], so it is re-derived on demand each
//! session and never persisted.

use sha2::{Digest, Sha256};

use crate::secret::Seed;

/// Label for deriving the storage signing key from a seed.
const LABEL_STORAGE_KEY: &[u8] = b"tripvault:storage-key";

/// A storage key pair addressing one private trip collection.
///
/// Both halves are hex strings in the encoding the key-value store expects:
/// the public key is the 32-byte Ed25519 verifying key, the private key the
/// 64-byte keypair (secret scalar followed by verifying key).
#[derive(Clone, PartialEq, Eq)]
pub struct KeyPair {
    /// Hex-encoded public key; addresses document reads.
    pub public_key: String,
    /// Hex-encoded private key; authorizes document writes.
    pub private_key: String,
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &self.public_key)
            .field("private_key", &"[REDACTED]")
            .finish()
    }
}

/// Derives the storage key pair from a seed.
///
/// The Ed25519 secret scalar is computed as:
/// ```text
/// scalar = SHA256("tripvault:storage-key" || seed)
/// ```
///
/// Identical seeds always yield identical key pairs; distinct seeds yield
/// distinct pairs with overwhelming probability. Pure and total for any
/// well-formed seed.
#[must_use]
pub fn derive_key_pair(seed: &Seed) -> KeyPair {
    let mut hasher = Sha256::new();
    hasher.update(LABEL_STORAGE_KEY);
    hasher.update(seed.as_bytes());
    let hash = hasher.finalize();

    let mut scalar = [0u8; 32];
    scalar.copy_from_slice(&hash);

    let signing_key = ed25519_dalek::SigningKey::from_bytes(&scalar);
    KeyPair {
        public_key: hex::encode(signing_key.verifying_key().to_bytes()),
        private_key: hex::encode(signing_key.to_keypair_bytes()),
    }
}
