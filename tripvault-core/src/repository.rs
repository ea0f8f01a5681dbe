//! The private, per-identity trip collection.
//!
//! One collection exists per storage key pair, held as a single JSON
//! document at `(public_key, "trips")`. The backing store only supports
//! whole-document get/set, so every save is a read-modify-write: re-fetch
//! the current collection, merge the new entry, write the whole document
//! back. Concurrent sessions of the same identity can race; the later
//! writer's merged state wins at document granularity, which is accepted.

use std::sync::Arc;

use crate::error::{SyncError, SyncResult};
use crate::keys::KeyPair;
use crate::platform::DocumentStore;
use crate::trip::{Trip, TripCollection};

/// Data key of the private trip document.
pub const USER_REPO_KEY: &str = "trips";

/// Reads and writes the private trip collection for a key pair.
pub struct TripRepository {
    /// The decentralized key-value collaborator.
    store: Arc<dyn DocumentStore>,
}

impl TripRepository {
    /// Creates a repository over the given document store.
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Loads the trip collection for `key_pair`.
    ///
    /// A missing document and an empty document both present as an empty
    /// collection; the distinction only exists at the storage layer.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Repository`] on storage failure or if the
    /// document does not parse as a trip collection.
    pub async fn load(&self, key_pair: &KeyPair) -> SyncResult<TripCollection> {
        let Some(document) = self
            .store
            .get_json(&key_pair.public_key, USER_REPO_KEY)
            .await?
        else {
            return Ok(TripCollection::new());
        };

        serde_json::from_value(document)
            .map_err(|e| SyncError::repository(format!("trip collection does not parse: {e}")))
    }

    /// Saves `name -> trip` into the collection.
    ///
    /// Performs load-then-merge-then-write. On failure nothing has been
    /// merged locally; the caller's editing state is untouched.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidInput`] for an empty name (before any
    /// network call) and [`SyncError::Repository`] on storage failure.
    pub async fn save(&self, key_pair: &KeyPair, name: &str, trip: &Trip) -> SyncResult<()> {
        if name.is_empty() {
            return Err(SyncError::invalid_input("name", "trip name must not be empty"));
        }

        let mut trips = self.load(key_pair).await?;
        trips.insert(name.to_string(), trip.clone());

        let document = serde_json::to_value(&trips)
            .map_err(|e| SyncError::repository(format!("trip collection serialization: {e}")))?;
        self.store
            .set_json(&key_pair.private_key, USER_REPO_KEY, document)
            .await?;

        tracing::debug!(name, trips = trips.len(), "private trip collection written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::keys::derive_key_pair;
    use crate::platform::memory::MemoryDocumentStore;
    use crate::secret::seed_from_phrase;

    use super::*;

    fn sample_trip(tag: &str) -> Trip {
        Trip {
            tags: tag.to_string(),
            public: false,
            body: "<h1>hello</h1>".to_string(),
            css: "h1 { color: coral; }".to_string(),
            js: String::new(),
        }
    }

    fn setup() -> (Arc<MemoryDocumentStore>, TripRepository, KeyPair) {
        let store = Arc::new(MemoryDocumentStore::new());
        let repository = TripRepository::new(Arc::clone(&store) as Arc<dyn DocumentStore>);
        let key_pair = derive_key_pair(&seed_from_phrase("repository tests"));
        (store, repository, key_pair)
    }

    #[tokio::test]
    async fn test_load_missing_document_is_empty() {
        let (_store, repository, key_pair) = setup();
        assert!(repository.load(&key_pair).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_save_then_load_roundtrip() {
        let (_store, repository, key_pair) = setup();
        let trip = sample_trip("sunset");

        repository.save(&key_pair, "first-trip", &trip).await.unwrap();

        let trips = repository.load(&key_pair).await.unwrap();
        assert_eq!(trips.get("first-trip"), Some(&trip));
    }

    #[tokio::test]
    async fn test_second_save_preserves_first_entry() {
        let (_store, repository, key_pair) = setup();
        let first = sample_trip("one");
        let second = sample_trip("two");

        repository.save(&key_pair, "first", &first).await.unwrap();
        repository.save(&key_pair, "second", &second).await.unwrap();

        let trips = repository.load(&key_pair).await.unwrap();
        assert_eq!(trips.len(), 2);
        assert_eq!(trips.get("first"), Some(&first));
        assert_eq!(trips.get("second"), Some(&second));
    }

    #[tokio::test]
    async fn test_save_overwrites_same_name() {
        let (_store, repository, key_pair) = setup();

        repository
            .save(&key_pair, "trip", &sample_trip("old"))
            .await
            .unwrap();
        repository
            .save(&key_pair, "trip", &sample_trip("new"))
            .await
            .unwrap();

        let trips = repository.load(&key_pair).await.unwrap();
        assert_eq!(trips.len(), 1);
        assert_eq!(trips.get("trip").unwrap().tags, "new");
    }

    #[tokio::test]
    async fn test_empty_name_is_rejected_without_write() {
        let (store, repository, key_pair) = setup();

        let result = repository.save(&key_pair, "", &sample_trip("x")).await;
        assert!(matches!(result, Err(SyncError::InvalidInput { .. })));
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn test_collections_are_isolated_per_key_pair() {
        let (_store, repository, key_pair) = setup();
        let other = derive_key_pair(&seed_from_phrase("someone else"));

        repository
            .save(&key_pair, "mine", &sample_trip("mine"))
            .await
            .unwrap();

        assert!(repository.load(&other).await.unwrap().is_empty());
    }
}
