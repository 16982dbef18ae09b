//! Playlist cursor over the cards of the active deck.
//!
//! The cursor is fixed in shape once built: only the position moves, and it
//! wraps around so a study session cycles through the deck until the user
//! leaves.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::HostError;

/// Wire form of an identifier: the card API hands out integers, plugins and
/// the UI pass strings around.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Number(i64),
}

impl From<RawId> for String {
    fn from(raw: RawId) -> Self {
        match raw {
            RawId::Text(s) => s,
            RawId::Number(n) => n.to_string(),
        }
    }
}

macro_rules! opaque_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                RawId::deserialize(deserializer).map(|raw| Self(raw.into()))
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<i64> for $name {
            fn from(n: i64) -> Self {
                Self(n.to_string())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

opaque_id!(
    /// Opaque identifier of a card within a deck.
    CardId
);

opaque_id!(
    /// Opaque identifier of a deck.
    DeckId
);

/// Ordered card identifiers plus the index of the card being studied.
#[derive(Debug, Clone)]
pub struct PlaylistCursor {
    card_ids: Vec<CardId>,
    position: usize,
}

impl PlaylistCursor {
    /// Build a cursor positioned on the first card.
    pub fn new(card_ids: Vec<CardId>) -> Result<Self, HostError> {
        if card_ids.is_empty() {
            return Err(HostError::EmptyPlaylist);
        }
        Ok(Self {
            card_ids,
            position: 0,
        })
    }

    pub fn current(&self) -> &CardId {
        &self.card_ids[self.position]
    }

    /// Move to the next card, wrapping to the start after the last one.
    /// A single-card playlist advances onto itself.
    pub fn advance(&mut self) {
        self.position = (self.position + 1) % self.card_ids.len();
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn len(&self) -> usize {
        self.card_ids.len()
    }

    /// Always false; a cursor cannot be built empty.
    pub fn is_empty(&self) -> bool {
        self.card_ids.is_empty()
    }
}
