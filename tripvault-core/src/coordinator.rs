//! Session orchestration: connect, enroll or recover the key pair, and move
//! trips between the editor, the private repository, and the public index.
//!
//! The coordinator owns all mutable session state explicitly — the
//! connection state machine, the cached key pair, and the current-trip
//! snapshot — and exposes async operations over it. UI event wiring lives
//! entirely outside this crate; callers invoke these operations and render
//! the returned values and errors.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::error::{SyncError, SyncResult};
use crate::escrow::IdentityEscrow;
use crate::keys::{derive_key_pair, KeyPair};
use crate::platform::{DocumentStore, Identity, IdentityProvider};
use crate::public_index::PublicTripIndex;
use crate::repository::TripRepository;
use crate::secret::seed_from_phrase;
use crate::trip::{Trip, TripCollection};

/// Connection state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No identity attached; `connect` will start authentication.
    Unauthenticated,
    /// An authentication attempt is in flight; further `connect` calls are
    /// no-ops.
    Authenticating,
    /// An identity handle is attached and escrow is bound.
    Authenticated,
}

/// Mutable editing state of the session.
///
/// Owned by the coordinator and exposed by snapshot; the editor collaborator
/// reports changes through [`SyncCoordinator::mark_unsaved`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    /// The trip most recently saved, opened, or forked.
    pub current_trip: Option<Trip>,
    /// Whether the editor buffers match the last persisted state.
    pub saved: bool,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            current_trip: None,
            saved: true,
        }
    }
}

/// Result of a [`SyncCoordinator::save_trip`] call.
///
/// The private save is the authoritative copy of record; a failed public
/// mirror is reported here rather than rolling it back.
#[derive(Debug)]
pub enum SaveOutcome {
    /// The private save committed; the trip is not public.
    Saved,
    /// The private save committed and the public mirror was written.
    SavedAndMirrored,
    /// The private save committed but mirroring into the public index
    /// failed. Retrying the save is safe.
    MirrorFailed(SyncError),
}

/// Per-session state guarded by the session mutex.
///
/// Holding one mutex across every storage operation keeps a save's
/// read-merge-write sequence from being interleaved by another operation of
/// the same coordinator. No lock exists across sessions or devices.
#[derive(Default)]
struct Session {
    /// Authenticated identity handle, if any.
    identity: Option<Arc<dyn Identity>>,
    /// Escrow bound to the identity, if authenticated.
    escrow: Option<IdentityEscrow>,
    /// Cached key pair; derived at most once per session.
    key_pair: Option<KeyPair>,
    /// Current editing state.
    state: SessionState,
}

/// Orchestrates identity, escrow, and the two trip repositories.
pub struct SyncCoordinator {
    /// The identity provider collaborator.
    provider: Arc<dyn IdentityProvider>,
    /// Private per-identity trip collection.
    repository: TripRepository,
    /// Shared public trip index.
    public_index: PublicTripIndex,
    /// Connection state machine.
    connection: Mutex<ConnectionState>,
    /// Session state; see [`Session`].
    session: Mutex<Session>,
}

impl SyncCoordinator {
    /// Creates a coordinator over the given collaborators.
    #[must_use]
    pub fn new(provider: Arc<dyn IdentityProvider>, store: Arc<dyn DocumentStore>) -> Self {
        Self {
            provider,
            repository: TripRepository::new(Arc::clone(&store)),
            public_index: PublicTripIndex::new(store),
            connection: Mutex::new(ConnectionState::Unauthenticated),
            session: Mutex::new(Session::default()),
        }
    }

    /// Returns the current connection state.
    pub async fn connection_state(&self) -> ConnectionState {
        *self.connection.lock().await
    }

    /// Returns a snapshot of the session's editing state.
    pub async fn session_state(&self) -> SessionState {
        self.session.lock().await.state.clone()
    }

    /// Marks the current trip as having unsaved editor changes.
    ///
    /// This is the editor collaborator's change notification.
    pub async fn mark_unsaved(&self) {
        self.session.lock().await.state.saved = false;
    }

    /// Connects and authenticates the session.
    ///
    /// Idempotent: a call while an authentication attempt is already in
    /// flight, or while authenticated, is a no-op — never queued. On
    /// failure the state returns to [`ConnectionState::Unauthenticated`]
    /// and the error surfaces to the caller; there is no auto-retry.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Authentication`] if the provider rejects the
    /// attempt, or the escrow setup error if binding the slot fails.
    pub async fn connect(&self) -> SyncResult<()> {
        {
            let mut connection = self.connection.lock().await;
            match *connection {
                ConnectionState::Authenticating | ConnectionState::Authenticated => {
                    tracing::debug!(state = ?*connection, "connect ignored");
                    return Ok(());
                }
                ConnectionState::Unauthenticated => *connection = ConnectionState::Authenticating,
            }
        }

        match self.authenticate().await {
            Ok(()) => Ok(()),
            Err(e) => {
                *self.connection.lock().await = ConnectionState::Unauthenticated;
                Err(e)
            }
        }
    }

    /// Runs one authentication attempt and binds the escrow slot.
    async fn authenticate(&self) -> SyncResult<()> {
        let identity = self.provider.authenticate().await?;
        let escrow = IdentityEscrow::setup(self.provider.as_ref(), Arc::clone(&identity)).await?;
        tracing::info!(identity = identity.id(), "authenticated");

        let mut session = self.session.lock().await;
        session.identity = Some(identity);
        session.escrow = Some(escrow);
        drop(session);

        *self.connection.lock().await = ConnectionState::Authenticated;
        Ok(())
    }

    /// Returns the session key pair, recovering it from escrow if needed.
    ///
    /// The cached pair is reused for the whole session; escrow is consulted
    /// at most once. `Ok(None)` means no secret is enrolled for this
    /// identity — the caller should prompt for a seed phrase rather than
    /// fabricating one.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Authentication`] if the session is not
    /// authenticated, or an escrow error if recovery fails.
    pub async fn ensure_key_pair(&self) -> SyncResult<Option<KeyPair>> {
        let mut session = self.session.lock().await;
        if let Some(key_pair) = &session.key_pair {
            return Ok(Some(key_pair.clone()));
        }

        let escrow = session
            .escrow
            .as_ref()
            .ok_or_else(|| SyncError::authentication("not authenticated"))?;
        let Some(seed) = escrow.recover().await? else {
            return Ok(None);
        };

        let key_pair = derive_key_pair(&seed);
        session.key_pair = Some(key_pair.clone());
        Ok(Some(key_pair))
    }

    /// Enrolls a seed phrase: escrows the stretched seed under the current
    /// identity and caches the derived key pair.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidInput`] for an empty phrase,
    /// [`SyncError::Authentication`] if not authenticated, and
    /// [`SyncError::EscrowWrite`] if the escrow write fails (in which case
    /// nothing is cached and the caller may retry explicitly).
    pub async fn enroll(&self, phrase: &str) -> SyncResult<KeyPair> {
        if phrase.is_empty() {
            return Err(SyncError::invalid_input(
                "phrase",
                "seed phrase must not be empty",
            ));
        }

        let mut session = self.session.lock().await;
        let escrow = session
            .escrow
            .as_ref()
            .ok_or_else(|| SyncError::authentication("not authenticated"))?;

        let seed = seed_from_phrase(phrase);
        escrow.store(&seed).await?;

        let key_pair = derive_key_pair(&seed);
        session.key_pair = Some(key_pair.clone());
        Ok(key_pair)
    }

    /// Saves `name -> trip` privately and, for public trips, mirrors it
    /// into the shared index under the current identity.
    ///
    /// The private save completes first and is authoritative; a mirror
    /// failure is reported in the returned [`SaveOutcome`] without rolling
    /// it back. Session state (current trip, saved flag) updates only after
    /// the private save commits, so a failed save leaves editing state
    /// untouched.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::NotEnrolled`] without a cached key pair,
    /// [`SyncError::InvalidInput`] for an empty name, and
    /// [`SyncError::Repository`] if the private save fails.
    pub async fn save_trip(&self, name: &str, trip: &Trip) -> SyncResult<SaveOutcome> {
        let mut session = self.session.lock().await;
        let key_pair = session.key_pair.clone().ok_or(SyncError::NotEnrolled)?;

        self.repository.save(&key_pair, name, trip).await?;
        session.state.current_trip = Some(trip.clone());
        session.state.saved = true;

        if !trip.public {
            return Ok(SaveOutcome::Saved);
        }

        let author_id = session
            .identity
            .as_ref()
            .map(|identity| identity.id().to_string())
            .ok_or_else(|| SyncError::authentication("not authenticated"))?;

        match self.public_index.publish(&author_id, name, trip).await {
            Ok(()) => Ok(SaveOutcome::SavedAndMirrored),
            Err(e) => {
                tracing::warn!(error = %e, name, "public mirror failed; private save retained");
                Ok(SaveOutcome::MirrorFailed(e))
            }
        }
    }

    /// Loads the current identity's private trip collection.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::NotEnrolled`] without a cached key pair, or a
    /// repository error.
    pub async fn my_trips(&self) -> SyncResult<TripCollection> {
        let session = self.session.lock().await;
        let key_pair = session.key_pair.clone().ok_or(SyncError::NotEnrolled)?;
        drop(session);

        self.repository.load(&key_pair).await
    }

    /// Opens a private trip into the session.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::NotEnrolled`] without a cached key pair and
    /// [`SyncError::TripNotFound`] if the name is absent; session state is
    /// untouched on failure.
    pub async fn open_trip(&self, name: &str) -> SyncResult<Trip> {
        let mut session = self.session.lock().await;
        let key_pair = session.key_pair.clone().ok_or(SyncError::NotEnrolled)?;

        let mut trips = self.repository.load(&key_pair).await?;
        let trip = trips
            .remove(name)
            .ok_or_else(|| SyncError::TripNotFound(name.to_string()))?;

        session.state.current_trip = Some(trip.clone());
        session.state.saved = true;
        Ok(trip)
    }

    /// Browses the public index, excluding the current identity's own
    /// entries when authenticated.
    ///
    /// # Errors
    ///
    /// Returns a repository error on storage failure.
    pub async fn explore(&self) -> SyncResult<BTreeMap<String, Trip>> {
        let session = self.session.lock().await;
        let author_id = session
            .identity
            .as_ref()
            .map(|identity| identity.id().to_string());
        drop(session);

        self.public_index.browse(author_id.as_deref()).await
    }

    /// Forks a published trip into the session as unsaved work.
    ///
    /// The forked content belongs to its original author until this
    /// identity saves it under a name of its own.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::TripNotFound`] if the composite key is absent,
    /// or a repository error.
    pub async fn fork(&self, composite_key: &str) -> SyncResult<Trip> {
        let trip = self
            .public_index
            .fetch(composite_key)
            .await?
            .ok_or_else(|| SyncError::TripNotFound(composite_key.to_string()))?;

        let mut session = self.session.lock().await;
        session.state.current_trip = Some(trip.clone());
        session.state.saved = false;
        Ok(trip)
    }
}

#[cfg(test)]
mod tests {
    use crate::platform::memory::{MemoryDocumentStore, MemoryIdentityProvider};

    use super::*;

    fn sample_trip(public: bool) -> Trip {
        Trip {
            tags: "test".to_string(),
            public,
            body: "<h1>hi</h1>".to_string(),
            css: String::new(),
            js: String::new(),
        }
    }

    fn setup(id: &str) -> (Arc<MemoryIdentityProvider>, Arc<MemoryDocumentStore>, SyncCoordinator) {
        let provider = Arc::new(MemoryIdentityProvider::new(id));
        let store = Arc::new(MemoryDocumentStore::new());
        let coordinator = SyncCoordinator::new(
            Arc::clone(&provider) as Arc<dyn IdentityProvider>,
            Arc::clone(&store) as Arc<dyn DocumentStore>,
        );
        (provider, store, coordinator)
    }

    #[tokio::test]
    async fn test_connect_transitions_to_authenticated() {
        let (provider, _store, coordinator) = setup("did:mem:alice");
        assert_eq!(
            coordinator.connection_state().await,
            ConnectionState::Unauthenticated
        );

        coordinator.connect().await.unwrap();
        assert_eq!(
            coordinator.connection_state().await,
            ConnectionState::Authenticated
        );
        assert_eq!(provider.auth_count(), 1);
    }

    #[tokio::test]
    async fn test_connect_is_idempotent_when_authenticated() {
        let (provider, _store, coordinator) = setup("did:mem:alice");

        coordinator.connect().await.unwrap();
        coordinator.connect().await.unwrap();
        assert_eq!(provider.auth_count(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_concurrent_connects_trigger_one_attempt() {
        let (provider, store, _unused) = setup("did:mem:alice");
        let coordinator = Arc::new(SyncCoordinator::new(
            Arc::clone(&provider) as Arc<dyn IdentityProvider>,
            store as Arc<dyn DocumentStore>,
        ));

        let gate = provider.hold_authentication();

        let first = {
            let coordinator = Arc::clone(&coordinator);
            tokio::spawn(async move { coordinator.connect().await })
        };

        // Wait until the first attempt is in flight.
        while coordinator.connection_state().await != ConnectionState::Authenticating {
            tokio::task::yield_now().await;
        }

        // A second connect while authenticating is a no-op.
        coordinator.connect().await.unwrap();
        assert_eq!(provider.auth_count(), 1);

        gate.notify_one();
        first.await.unwrap().unwrap();
        assert_eq!(provider.auth_count(), 1);
        assert_eq!(
            coordinator.connection_state().await,
            ConnectionState::Authenticated
        );
    }

    #[tokio::test]
    async fn test_failed_connect_returns_to_unauthenticated() {
        let (provider, _store, coordinator) = setup("did:mem:alice");
        provider.fail_next_authentication();

        let result = coordinator.connect().await;
        assert!(matches!(result, Err(SyncError::Authentication(_))));
        assert_eq!(
            coordinator.connection_state().await,
            ConnectionState::Unauthenticated
        );

        // No auto-retry happened; an explicit reconnect works.
        coordinator.connect().await.unwrap();
        assert_eq!(provider.auth_count(), 2);
    }

    #[tokio::test]
    async fn test_ensure_key_pair_requires_authentication() {
        let (_provider, _store, coordinator) = setup("did:mem:alice");
        assert!(matches!(
            coordinator.ensure_key_pair().await,
            Err(SyncError::Authentication(_))
        ));
    }

    #[tokio::test]
    async fn test_ensure_key_pair_signals_missing_enrollment() {
        let (_provider, _store, coordinator) = setup("did:mem:alice");
        coordinator.connect().await.unwrap();

        assert_eq!(coordinator.ensure_key_pair().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_enroll_rejects_empty_phrase() {
        let (_provider, store, coordinator) = setup("did:mem:alice");
        coordinator.connect().await.unwrap();

        let result = coordinator.enroll("").await;
        assert!(matches!(result, Err(SyncError::InvalidInput { .. })));
        assert_eq!(store.write_count(), 0);
        assert_eq!(coordinator.ensure_key_pair().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_enroll_then_ensure_reuses_cached_pair() {
        let (_provider, _store, coordinator) = setup("did:mem:alice");
        coordinator.connect().await.unwrap();

        let enrolled = coordinator.enroll("amber canyon drift").await.unwrap();
        let ensured = coordinator.ensure_key_pair().await.unwrap();
        assert_eq!(ensured, Some(enrolled));
    }

    #[tokio::test]
    async fn test_new_session_recovers_same_pair_from_escrow() {
        let (provider, store, coordinator) = setup("did:mem:alice");
        coordinator.connect().await.unwrap();
        let enrolled = coordinator.enroll("amber canyon drift").await.unwrap();

        // A later session against the same provider and store.
        let next_session = SyncCoordinator::new(
            Arc::clone(&provider) as Arc<dyn IdentityProvider>,
            store as Arc<dyn DocumentStore>,
        );
        next_session.connect().await.unwrap();

        let recovered = next_session.ensure_key_pair().await.unwrap();
        assert_eq!(recovered, Some(enrolled));
    }

    #[tokio::test]
    async fn test_save_trip_requires_enrollment() {
        let (_provider, store, coordinator) = setup("did:mem:alice");
        coordinator.connect().await.unwrap();

        let result = coordinator.save_trip("trip", &sample_trip(false)).await;
        assert!(matches!(result, Err(SyncError::NotEnrolled)));
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn test_private_save_updates_session_and_skips_mirror() {
        let (_provider, store, coordinator) = setup("did:mem:alice");
        coordinator.connect().await.unwrap();
        coordinator.enroll("amber canyon drift").await.unwrap();

        let trip = sample_trip(false);
        let outcome = coordinator.save_trip("trip", &trip).await.unwrap();
        assert!(matches!(outcome, SaveOutcome::Saved));

        let state = coordinator.session_state().await;
        assert_eq!(state.current_trip, Some(trip));
        assert!(state.saved);

        // Escrow slot is not a document; only the private collection was
        // written.
        assert_eq!(store.document_count(), 1);
    }

    #[tokio::test]
    async fn test_public_save_mirrors_under_identity() {
        let (provider, _store, coordinator) = setup("did:mem:alice");
        coordinator.connect().await.unwrap();
        coordinator.enroll("amber canyon drift").await.unwrap();

        let trip = sample_trip(true);
        let outcome = coordinator.save_trip("shared-trip", &trip).await.unwrap();
        assert!(matches!(outcome, SaveOutcome::SavedAndMirrored));

        // Explore filters our own entries; browsing without exclusion from
        // the index shows them.
        let own = coordinator.explore().await.unwrap();
        assert!(own.is_empty());

        let key = format!("{}---shared-trip", provider.identity().id());
        let trips = coordinator.public_index.browse(None).await.unwrap();
        assert_eq!(trips.get(&key), Some(&trip));
    }

    #[tokio::test]
    async fn test_failed_save_leaves_session_untouched() {
        let (_provider, _store, coordinator) = setup("did:mem:alice");
        coordinator.connect().await.unwrap();
        coordinator.enroll("amber canyon drift").await.unwrap();
        coordinator.mark_unsaved().await;

        let result = coordinator.save_trip("", &sample_trip(false)).await;
        assert!(matches!(result, Err(SyncError::InvalidInput { .. })));

        let state = coordinator.session_state().await;
        assert_eq!(state.current_trip, None);
        assert!(!state.saved);
    }

    #[tokio::test]
    async fn test_open_trip_and_missing_trip() {
        let (_provider, _store, coordinator) = setup("did:mem:alice");
        coordinator.connect().await.unwrap();
        coordinator.enroll("amber canyon drift").await.unwrap();

        let trip = sample_trip(false);
        coordinator.save_trip("trip", &trip).await.unwrap();
        coordinator.mark_unsaved().await;

        let opened = coordinator.open_trip("trip").await.unwrap();
        assert_eq!(opened, trip);
        assert!(coordinator.session_state().await.saved);

        let result = coordinator.open_trip("missing").await;
        assert!(matches!(result, Err(SyncError::TripNotFound(_))));
    }

    #[tokio::test]
    async fn test_my_trips_requires_enrollment() {
        let (_provider, _store, coordinator) = setup("did:mem:alice");
        coordinator.connect().await.unwrap();

        assert!(matches!(
            coordinator.my_trips().await,
            Err(SyncError::NotEnrolled)
        ));
    }
}
