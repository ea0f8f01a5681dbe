//! The trip data model.
//!
//! A trip is the unit of user content: a self-contained web snippet made of
//! three independent buffers (markup, styling, behavior) plus tags and a
//! publication flag. Trips live in JSON documents, so the serde shape here
//! is the wire format.

use std::collections::BTreeMap;

use rand::rngs::OsRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::secret::WORDS;

/// Number of words in a generated trip name.
const TRIP_NAME_WORDS: usize = 3;

/// A self-contained web snippet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trip {
    /// Free-form tags, comma-separated by convention.
    pub tags: String,
    /// Whether the trip is mirrored into the shared public index on save.
    pub public: bool,
    /// Markup buffer (HTML body).
    pub body: String,
    /// Styling buffer (CSS).
    pub css: String,
    /// Behavior buffer (JavaScript).
    pub js: String,
}

/// A collection of trips keyed by user-chosen trip name.
///
/// Names are unique within the collection; empty names are rejected by the
/// repository before any write.
pub type TripCollection = BTreeMap<String, Trip>;

/// Generates a random three-word dashed trip name, e.g. `amber-canyon-drift`.
///
/// # Panics
///
/// Panics if the system's random number generator fails.
#[must_use]
pub fn generate_trip_name() -> String {
    let mut rng = OsRng;
    let words: Vec<&str> = (0..TRIP_NAME_WORDS)
        .map(|_| *WORDS.choose(&mut rng).expect("word list is non-empty"))
        .collect();
    words.join("-")
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_trip_json_shape() {
        let trip = Trip {
            tags: "demo".to_string(),
            public: true,
            body: "<p>hi</p>".to_string(),
            css: String::new(),
            js: String::new(),
        };

        let value = serde_json::to_value(&trip).unwrap();
        assert_eq!(
            value,
            json!({
                "tags": "demo",
                "public": true,
                "body": "<p>hi</p>",
                "css": "",
                "js": "",
            })
        );

        let back: Trip = serde_json::from_value(value).unwrap();
        assert_eq!(back, trip);
    }

    #[test]
    fn test_generate_trip_name_shape() {
        let name = generate_trip_name();
        let words: Vec<&str> = name.split('-').collect();
        assert_eq!(words.len(), 3);
        for word in words {
            assert!(WORDS.contains(&word), "unexpected word: {word}");
        }
    }
}
