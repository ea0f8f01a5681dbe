//! In-memory implementations of the collaborator traits for testing.
//!
//! These implementations are NOT secure for production use. They are
//! designed for unit and integration testing of the synchronization core
//! without a live identity provider or key-value store.

// Allow certain clippy lints for test-only code
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::significant_drop_tightening)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;
use serde_json::Value;
use sha2::{Digest, Sha256};
use tokio::sync::Notify;

use crate::error::{SyncError, SyncResult};

use super::{DefinitionId, DocumentStore, Identity, IdentityProvider, SlotDefinition};

// Memory Document Store

/// In-memory whole-document JSON store backed by a `HashMap`.
///
/// Documents are stored under the public key. Writes arrive addressed by the
/// private key and are resolved to the matching public key through Ed25519,
/// mirroring the real store's registry semantics: data written with a
/// private key is readable through the derived public key.
pub struct MemoryDocumentStore {
    /// Documents keyed by `(public_key, data_key)`.
    documents: RwLock<HashMap<(String, String), Value>>,
    /// Number of completed writes, for asserting no-write guarantees.
    write_count: AtomicU64,
}

impl MemoryDocumentStore {
    /// Creates a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            documents: RwLock::new(HashMap::new()),
            write_count: AtomicU64::new(0),
        }
    }

    /// Returns the number of writes performed.
    #[must_use]
    pub fn write_count(&self) -> u64 {
        self.write_count.load(Ordering::SeqCst)
    }

    /// Returns the number of stored documents.
    #[must_use]
    pub fn document_count(&self) -> usize {
        self.documents.read().unwrap().len()
    }

    /// Resolves a hex private key to the public key it writes under.
    fn public_key_for(private_key: &str) -> SyncResult<String> {
        let bytes = hex::decode(private_key)
            .map_err(|e| SyncError::repository(format!("private key is not hex: {e}")))?;
        let keypair: [u8; 64] = bytes
            .try_into()
            .map_err(|_| SyncError::repository("private key must be 64 bytes"))?;
        let signing_key = ed25519_dalek::SigningKey::from_keypair_bytes(&keypair)
            .map_err(|e| SyncError::repository(format!("invalid private key: {e}")))?;
        Ok(hex::encode(signing_key.verifying_key().to_bytes()))
    }
}

impl Default for MemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn get_json(&self, public_key: &str, data_key: &str) -> SyncResult<Option<Value>> {
        let documents = self.documents.read().unwrap();
        Ok(documents
            .get(&(public_key.to_string(), data_key.to_string()))
            .cloned())
    }

    async fn set_json(&self, private_key: &str, data_key: &str, value: Value) -> SyncResult<()> {
        let public_key = Self::public_key_for(private_key)?;
        let mut documents = self.documents.write().unwrap();
        documents.insert((public_key, data_key.to_string()), value);
        self.write_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// Memory Identity

/// Size of the random nonce prepended to sealed blobs.
const NONCE_LEN: usize = 8;

/// Size of the integrity tag appended to sealed blobs.
const TAG_LEN: usize = 32;

/// In-memory identity handle.
///
/// **FOR TESTING ONLY** — "encryption" is an XOR keystream derived from the
/// identity secret plus a SHA-256 integrity tag. The tag exists so that
/// decrypting with the wrong identity fails loudly, which is the behavior
/// the escrow layer relies on; it provides no real security.
pub struct MemoryIdentity {
    /// Stable identifier.
    id: String,
    /// Per-identity secret driving the keystream and tag.
    secret: [u8; 32],
    /// Slot contents keyed by definition ID.
    slots: RwLock<HashMap<DefinitionId, Vec<u8>>>,
}

impl MemoryIdentity {
    /// Creates an identity with a fresh random secret.
    #[must_use]
    pub fn new<S: Into<String>>(id: S) -> Self {
        let mut secret = [0u8; 32];
        getrandom::getrandom(&mut secret).expect("getrandom failed");
        Self::with_secret(id, secret)
    }

    /// Creates an identity with a fixed secret.
    #[must_use]
    pub fn with_secret<S: Into<String>>(id: S, secret: [u8; 32]) -> Self {
        Self {
            id: id.into(),
            secret,
            slots: RwLock::new(HashMap::new()),
        }
    }

    /// Derives a keystream of `len` bytes bound to `nonce`.
    fn keystream(&self, nonce: &[u8], len: usize) -> Vec<u8> {
        let mut keystream = Vec::with_capacity(len);
        let mut counter = 0u64;

        while keystream.len() < len {
            let mut hasher = Sha256::new();
            hasher.update(self.secret);
            hasher.update(nonce);
            hasher.update(counter.to_le_bytes());
            keystream.extend_from_slice(&hasher.finalize());
            counter += 1;
        }

        keystream.truncate(len);
        keystream
    }

    /// Computes the integrity tag over `nonce` and `plaintext`.
    fn tag(&self, nonce: &[u8], plaintext: &[u8]) -> [u8; TAG_LEN] {
        let mut hasher = Sha256::new();
        hasher.update(self.secret);
        hasher.update(nonce);
        hasher.update(plaintext);
        hasher.finalize().into()
    }
}

#[async_trait]
impl Identity for MemoryIdentity {
    fn id(&self) -> &str {
        &self.id
    }

    async fn encrypt(&self, plaintext: &[u8]) -> SyncResult<Vec<u8>> {
        let mut nonce = [0u8; NONCE_LEN];
        getrandom::getrandom(&mut nonce)
            .map_err(|e| SyncError::escrow_write(format!("getrandom failed: {e}")))?;

        let keystream = self.keystream(&nonce, plaintext.len());
        let body: Vec<u8> = plaintext
            .iter()
            .zip(keystream.iter())
            .map(|(p, k)| p ^ k)
            .collect();

        let mut blob = Vec::with_capacity(NONCE_LEN + body.len() + TAG_LEN);
        blob.extend_from_slice(&nonce);
        blob.extend_from_slice(&body);
        blob.extend_from_slice(&self.tag(&nonce, plaintext));
        Ok(blob)
    }

    async fn decrypt(&self, ciphertext: &[u8]) -> SyncResult<Vec<u8>> {
        if ciphertext.len() < NONCE_LEN + TAG_LEN {
            return Err(SyncError::escrow_decrypt("ciphertext too short"));
        }

        let (nonce, rest) = ciphertext.split_at(NONCE_LEN);
        let (body, tag) = rest.split_at(rest.len() - TAG_LEN);

        let keystream = self.keystream(nonce, body.len());
        let plaintext: Vec<u8> = body
            .iter()
            .zip(keystream.iter())
            .map(|(c, k)| c ^ k)
            .collect();

        if self.tag(nonce, &plaintext) != tag {
            return Err(SyncError::escrow_decrypt(
                "integrity tag mismatch (wrong identity or corrupted blob)",
            ));
        }

        Ok(plaintext)
    }

    async fn get_slot(&self, definition: &DefinitionId) -> SyncResult<Option<Vec<u8>>> {
        Ok(self.slots.read().unwrap().get(definition).cloned())
    }

    async fn set_slot(&self, definition: &DefinitionId, blob: &[u8]) -> SyncResult<()> {
        self.slots
            .write()
            .unwrap()
            .insert(definition.clone(), blob.to_vec());
        Ok(())
    }
}

// Memory Identity Provider

/// In-memory identity provider wrapping a single [`MemoryIdentity`].
///
/// Tracks authentication attempts and supports gating and failure injection
/// so tests can exercise the coordinator's connect state machine.
pub struct MemoryIdentityProvider {
    /// The identity returned by `authenticate`.
    identity: Arc<MemoryIdentity>,
    /// Number of authentication attempts observed.
    auth_count: AtomicU64,
    /// When set, `authenticate` waits for a notification before completing.
    gate: Mutex<Option<Arc<Notify>>>,
    /// When set, the next authentication attempt fails.
    fail_next: AtomicBool,
}

impl MemoryIdentityProvider {
    /// Creates a provider for a fresh identity with the given ID.
    #[must_use]
    pub fn new<S: Into<String>>(id: S) -> Self {
        Self {
            identity: Arc::new(MemoryIdentity::new(id)),
            auth_count: AtomicU64::new(0),
            gate: Mutex::new(None),
            fail_next: AtomicBool::new(false),
        }
    }

    /// Returns the wrapped identity.
    #[must_use]
    pub fn identity(&self) -> Arc<MemoryIdentity> {
        Arc::clone(&self.identity)
    }

    /// Returns the number of authentication attempts observed.
    #[must_use]
    pub fn auth_count(&self) -> u64 {
        self.auth_count.load(Ordering::SeqCst)
    }

    /// Holds authentication attempts until `notify_one` is called on the
    /// returned handle (one call releases one held attempt; a stored permit
    /// releases the next attempt if none is waiting yet).
    #[must_use]
    pub fn hold_authentication(&self) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        *self.gate.lock().unwrap() = Some(Arc::clone(&notify));
        notify
    }

    /// Makes the next authentication attempt fail.
    pub fn fail_next_authentication(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl IdentityProvider for MemoryIdentityProvider {
    async fn authenticate(&self) -> SyncResult<Arc<dyn Identity>> {
        self.auth_count.fetch_add(1, Ordering::SeqCst);

        let gate = self.gate.lock().unwrap().clone();
        if let Some(notify) = gate {
            notify.notified().await;
        }

        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(SyncError::authentication("injected failure"));
        }

        Ok(Arc::clone(&self.identity) as Arc<dyn Identity>)
    }

    async fn publish_definition(&self, definition: &SlotDefinition) -> SyncResult<DefinitionId> {
        // Idempotent by content: the ID is a digest of the definition.
        let bytes = serde_json::to_vec(definition)
            .map_err(|e| SyncError::escrow_write(format!("definition serialization: {e}")))?;
        let mut hasher = Sha256::new();
        hasher.update(b"tripvault:definition");
        hasher.update(&bytes);
        Ok(DefinitionId::new(hex::encode(hasher.finalize())))
    }
}
