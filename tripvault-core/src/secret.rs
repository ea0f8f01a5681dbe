//! Seed type and the human-memorable secret codec.
//!
//! A [`Seed`] is the 32-byte root secret from which the storage key pair is
//! derived. It is produced either by generating a fresh random word phrase
//! from a fixed dictionary or by stretching an arbitrary user-supplied
//! phrase. The stretch is a SHA-256 hash under a domain-separation label, so
//! the same phrase always yields the same seed.
//!
//! The seed is never persisted in plaintext; it lives in memory for the
//! session and crosses the escrow boundary encrypted to the user's identity.

use rand::rngs::OsRng;
use rand::seq::SliceRandom;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Length of a seed in bytes.
pub const SEED_LEN: usize = 32;

/// Number of words in a generated phrase.
const PHRASE_WORDS: usize = 12;

/// Label for stretching a phrase into a seed.
const LABEL_SEED_STRETCH: &[u8] = b"tripvault:seed-stretch";

/// Fixed dictionary for phrase and trip-name generation.
///
/// 256 words, so each generated word carries 8 bits; a 12-word phrase
/// carries 96 bits of entropy before stretching.
pub(crate) const WORDS: [&str; 256] = [
    "acorn", "amber", "anchor", "apron", "arrow", "aspen", "atlas", "autumn",
    "badge", "bamboo", "barley", "basil", "beacon", "berry", "birch", "bison",
    "blaze", "bluff", "bonfire", "breeze", "brick", "bridge", "brook", "bugle",
    "butter", "cabin", "cactus", "camera", "candle", "canoe", "canyon", "carbon",
    "cedar", "cello", "chalk", "cherry", "cinder", "citron", "clover", "cobalt",
    "comet", "copper", "coral", "cotton", "cradle", "crater", "cricket", "crystal",
    "cypress", "daisy", "dapple", "desert", "dew", "dome", "drift", "dune",
    "eagle", "ebony", "echo", "ember", "falcon", "feather", "fennel", "fern",
    "fiddle", "finch", "fjord", "flint", "fog", "forest", "fossil", "fox",
    "frost", "galaxy", "garnet", "geyser", "ginger", "glacier", "glade", "glow",
    "gorge", "granite", "grape", "grove", "gull", "harbor", "hazel", "heron",
    "hickory", "hollow", "honey", "horizon", "ibis", "icicle", "indigo", "iris",
    "iron", "island", "ivory", "ivy", "jade", "jasper", "jetty", "juniper",
    "kelp", "kestrel", "kiln", "kite", "lagoon", "lantern", "larch", "lark",
    "lava", "lavender", "ledge", "lemon", "lichen", "lilac", "linen", "lotus",
    "lumen", "lynx", "magma", "magnet", "mango", "maple", "marble", "marsh",
    "meadow", "mesa", "minnow", "mint", "mirror", "mist", "morning", "moss",
    "moth", "mulberry", "myrtle", "nectar", "nettle", "north", "nutmeg", "oak",
    "oasis", "ocean", "olive", "onyx", "opal", "orchard", "orchid", "osprey",
    "otter", "owl", "palm", "pebble", "pecan", "pelican", "pepper", "petal",
    "pine", "pistachio", "plume", "pond", "poplar", "poppy", "prairie", "prism",
    "pumice", "quail", "quarry", "quartz", "quill", "quince", "raven", "reed",
    "reef", "ridge", "ripple", "river", "robin", "rosemary", "rowan", "ruby",
    "rust", "saffron", "sage", "salmon", "sand", "sapling", "satin", "sequoia",
    "shale", "shell", "shore", "silver", "sleet", "slate", "snow", "solstice",
    "sparrow", "spruce", "squall", "starling", "steam", "stone", "storm", "summit",
    "sun", "swallow", "sycamore", "taiga", "tallow", "tamarind", "teal", "tempest",
    "thicket", "thistle", "thunder", "tidal", "timber", "topaz", "trench", "trout",
    "tulip", "tundra", "turquoise", "umber", "valley", "vapor", "velvet", "vine",
    "violet", "walnut", "wave", "wheat", "whistle", "willow", "wind", "winter",
    "wisteria", "wolf", "wren", "yarrow", "yew", "yonder", "zephyr", "zinc",
    "zinnia", "cliff", "delta", "gale", "knoll", "loam", "pier", "surf",
];

/// The 32-byte root secret.
///
/// # Security
///
/// - Zeroized on drop to prevent memory leaks.
/// - Never logged or serialized in plaintext; `Debug` is redacted.
/// - Equality is constant-time.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Seed([u8; SEED_LEN]);

impl Seed {
    /// Creates a seed from raw bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; SEED_LEN]) -> Self {
        Self(bytes)
    }

    /// Returns a reference to the raw seed bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; SEED_LEN] {
        &self.0
    }
}

impl PartialEq for Seed {
    fn eq(&self, other: &Self) -> bool {
        self.0.as_slice().ct_eq(other.0.as_slice()).into()
    }
}

impl Eq for Seed {}

impl std::fmt::Debug for Seed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Seed").field("bytes", &"[REDACTED]").finish()
    }
}

/// Generates a fresh random 12-word phrase from the fixed dictionary.
///
/// Uses the operating system's randomness source; two calls will not collide
/// in practice.
///
/// # Panics
///
/// Panics if the system's random number generator fails.
#[must_use]
pub fn generate_phrase() -> String {
    let mut rng = OsRng;
    let words: Vec<&str> = (0..PHRASE_WORDS)
        .map(|_| *WORDS.choose(&mut rng).expect("word list is non-empty"))
        .collect();
    words.join(" ")
}

/// Deterministically stretches a phrase into a seed.
///
/// The seed is computed as:
/// ```text
/// seed = SHA256("tripvault:seed-stretch" || phrase)
/// ```
///
/// Same phrase always yields the same seed; distinct phrases yield distinct
/// seeds with overwhelming probability. Empty-phrase rejection is the
/// coordinator's responsibility, not enforced here.
#[must_use]
pub fn seed_from_phrase(phrase: &str) -> Seed {
    let mut hasher = Sha256::new();
    hasher.update(LABEL_SEED_STRETCH);
    hasher.update(phrase.as_bytes());
    let hash = hasher.finalize();

    let mut bytes = [0u8; SEED_LEN];
    bytes.copy_from_slice(&hash);
    Seed(bytes)
}

/// Generates a fresh phrase and its stretched seed.
///
/// The phrase is returned alongside the seed so the caller can display it
/// for the user to record; recovery on a new session goes through
/// [`seed_from_phrase`].
#[must_use]
pub fn generate() -> (String, Seed) {
    let phrase = generate_phrase();
    let seed = seed_from_phrase(&phrase);
    (phrase, seed)
}
