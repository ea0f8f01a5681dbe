//! The shared public trip index.
//!
//! One document, shared by all identities, holds every published trip under
//! a composite key of `authorId + "---" + tripName`. The document is
//! addressed by a single well-known key pair derived from a fixed phrase:
//! write access to the index is deliberately not identity-scoped — any
//! writer holds the same private key and only the visible authorship label
//! differs. That makes blind writes unsafe; every publish is a
//! read-merge-write, and the later of two racing writers wins at document
//! granularity.

use std::collections::BTreeMap;
use std::sync::{Arc, LazyLock};

use crate::error::{SyncError, SyncResult};
use crate::keys::{derive_key_pair, KeyPair};
use crate::platform::DocumentStore;
use crate::secret::seed_from_phrase;
use crate::trip::Trip;

/// Data key of the shared public trip document.
pub const PUBLIC_REPO_KEY: &str = "public_trips";

/// Separator between author ID and trip name in composite keys.
///
/// Trip names are user-chosen and may contain leading fragments of this
/// token, so composite keys are split on its **last** occurrence. Author
/// IDs are assumed never to contain it; the identity provider's ID format
/// is the contract that upholds this.
pub const COMPOSITE_KEY_SEPARATOR: &str = "---";

/// Phrase behind the shared index credential.
const SHARED_INDEX_PHRASE: &str =
    "granite lantern meadow quartz ember falcon willow harbor cinder taiga onyx drift";

/// The shared-write credential for the public index.
///
/// Derived once at process start from a fixed phrase. This is a trust
/// boundary: everyone running this software can write the shared document,
/// and the index relies on read-merge-write cooperation rather than access
/// control.
pub static SHARED_INDEX_CREDENTIAL: LazyLock<KeyPair> =
    LazyLock::new(|| derive_key_pair(&seed_from_phrase(SHARED_INDEX_PHRASE)));

/// Builds the composite key for an author's published trip.
#[must_use]
pub fn composite_key(author_id: &str, name: &str) -> String {
    format!("{author_id}{COMPOSITE_KEY_SEPARATOR}{name}")
}

/// Splits a composite key into `(author_id, trip_name)`.
///
/// Splits on the last occurrence of [`COMPOSITE_KEY_SEPARATOR`].
///
/// # Errors
///
/// Returns [`SyncError::MalformedKey`] if the separator is absent. This
/// should not occur for well-formed entries; the check is defensive.
pub fn resolve_author(key: &str) -> SyncResult<(&str, &str)> {
    let position = key
        .rfind(COMPOSITE_KEY_SEPARATOR)
        .ok_or_else(|| SyncError::MalformedKey(key.to_string()))?;
    let (author_id, rest) = key.split_at(position);
    Ok((author_id, &rest[COMPOSITE_KEY_SEPARATOR.len()..]))
}

/// Reads and writes the shared collection of published trips.
pub struct PublicTripIndex {
    /// The decentralized key-value collaborator.
    store: Arc<dyn DocumentStore>,
}

impl PublicTripIndex {
    /// Creates an index over the given document store.
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Loads the full shared document, or an empty mapping if absent.
    async fn load(&self) -> SyncResult<BTreeMap<String, Trip>> {
        let Some(document) = self
            .store
            .get_json(&SHARED_INDEX_CREDENTIAL.public_key, PUBLIC_REPO_KEY)
            .await?
        else {
            return Ok(BTreeMap::new());
        };

        serde_json::from_value(document)
            .map_err(|e| SyncError::repository(format!("public index does not parse: {e}")))
    }

    /// Publishes `name -> trip` under `author_id`.
    ///
    /// Load-merge-write against the shared document. The document grows
    /// without bound; no pruning happens here.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidInput`] for an empty name and
    /// [`SyncError::Repository`] on storage failure.
    pub async fn publish(&self, author_id: &str, name: &str, trip: &Trip) -> SyncResult<()> {
        if name.is_empty() {
            return Err(SyncError::invalid_input("name", "trip name must not be empty"));
        }

        let mut public_trips = self.load().await?;
        public_trips.insert(composite_key(author_id, name), trip.clone());

        let document = serde_json::to_value(&public_trips)
            .map_err(|e| SyncError::repository(format!("public index serialization: {e}")))?;
        self.store
            .set_json(
                &SHARED_INDEX_CREDENTIAL.private_key,
                PUBLIC_REPO_KEY,
                document,
            )
            .await?;

        tracing::info!(author_id, name, "trip published to shared index");
        Ok(())
    }

    /// Loads the shared document, optionally dropping one author's entries.
    ///
    /// Filtering compares the author segment of each composite key
    /// (last-occurrence split) against `exclude_author_id`; entries without
    /// a separator are kept, as they cannot belong to the excluded author.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Repository`] on storage failure.
    pub async fn browse(
        &self,
        exclude_author_id: Option<&str>,
    ) -> SyncResult<BTreeMap<String, Trip>> {
        let mut public_trips = self.load().await?;

        if let Some(author_id) = exclude_author_id {
            public_trips.retain(|key, _| match resolve_author(key) {
                Ok((entry_author, _)) => entry_author != author_id,
                Err(_) => true,
            });
        }

        Ok(public_trips)
    }

    /// Fetches a single published trip by composite key.
    ///
    /// Returns `Ok(None)` if the key is not present (or no shared document
    /// exists yet).
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Repository`] on storage failure.
    pub async fn fetch(&self, key: &str) -> SyncResult<Option<Trip>> {
        let mut public_trips = self.load().await?;
        Ok(public_trips.remove(key))
    }
}
