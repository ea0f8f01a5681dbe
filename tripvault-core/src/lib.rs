#![deny(clippy::all, clippy::pedantic, clippy::nursery)]
//! Identity-bound secret derivation and repository synchronization for
//! trips: small self-contained web snippets persisted in a decentralized
//! key-value store.
//!
//! A human-memorable seed phrase is stretched into a seed, escrowed under a
//! decentralized identity, and deterministically expanded into the Ed25519
//! key pair that addresses the user's private trip collection. Public trips
//! are additionally mirrored into one shared index document that every
//! participant can read and write. [`SyncCoordinator`] ties the pieces
//! together into a session.

mod coordinator;
pub use coordinator::*;

mod error;
pub use error::*;

mod escrow;
pub use escrow::*;

mod keys;
pub use keys::*;

pub mod platform;

mod public_index;
pub use public_index::*;

mod repository;
pub use repository::*;

mod secret;
pub use secret::*;

mod trip;
pub use trip::*;
