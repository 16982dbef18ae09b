//! Host runtime error types.

use thiserror::Error;

use crate::playlist::CardId;

#[derive(Error, Debug)]
pub enum HostError {
    #[error("deck {0} has no playable cards")]
    EmptyDeck(String),

    #[error("playlist must contain at least one card")]
    EmptyPlaylist,

    #[error("failed to resolve plugin for card {card_id}: {reason}")]
    PluginResolutionFailed { card_id: CardId, reason: String },

    /// A plugin message that was discarded. Logged at trace level only,
    /// never returned to callers.
    #[error("malformed message: {0}")]
    MalformedMessage(String),

    #[error("card data gateway unavailable: {0}")]
    GatewayUnavailable(String),

    #[error("deck not found: {0}")]
    DeckNotFound(String),

    #[error("card not found: {0}")]
    CardNotFound(String),

    #[error("no deck selected")]
    NotInitialized,

    #[error("host surface error: {0}")]
    Surface(String),

    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<reqwest::Error> for HostError {
    fn from(e: reqwest::Error) -> Self {
        HostError::GatewayUnavailable(e.to_string())
    }
}
