//! Card data gateway: where decks and cards come from.
//!
//! The host never owns card data. It asks a gateway for the ordered card ids
//! of a deck and, per card, for the plugin that renders it. `HttpCardGateway`
//! talks to the flashcard backend's REST API.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::HostError;
use crate::playlist::{CardId, DeckId};

/// Name of the renderer a card uses.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PluginName(String);

impl PluginName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl std::fmt::Display for PluginName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// What the host needs to know about a card to mount it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardRecord {
    pub plugin: PluginName,
    /// Plugin-specific card content, passed through untouched.
    pub payload: serde_json::Value,
}

/// Source of decks and cards.
#[async_trait]
pub trait CardGateway: Send + Sync + 'static {
    /// Card ids of a deck in study order. Fails with `DeckNotFound`.
    async fn list_card_ids(&self, deck_id: &DeckId) -> Result<Vec<CardId>, HostError>;

    /// Plugin identity and payload of a card. Fails with `CardNotFound`.
    async fn get_card(&self, card_id: &CardId) -> Result<CardRecord, HostError>;
}

// ─── HTTP gateway ───────────────────────────────────────────────────────

/// `GET /api/decks/{id}` response body.
#[derive(Deserialize)]
struct DeckWithCards {
    card_ids: Vec<CardId>,
}

/// `GET /api/cards/{id}` response body (only the fields the host reads).
#[derive(Deserialize)]
struct ApiCard {
    plugin_name: String,
    #[serde(default)]
    plugin_data: serde_json::Value,
}

/// Gateway backed by the flashcard backend's REST API.
#[derive(Debug, Clone)]
pub struct HttpCardGateway {
    http: reqwest::Client,
    base_url: Url,
}

impl HttpCardGateway {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, HostError> {
        let base_url = Url::parse(base_url)?;
        if base_url.cannot_be_a_base() {
            return Err(HostError::GatewayUnavailable(format!(
                "{base_url} cannot be used as an API base"
            )));
        }
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("flashplay/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        // Checked in `new`: the base can always hold path segments.
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// Probe the backend's health route, returning the HTTP status code.
    pub async fn health(&self) -> Result<u16, HostError> {
        let url = self.endpoint(&["api", "system", "health"]);
        let resp = self.http.get(url).send().await?;
        Ok(resp.status().as_u16())
    }
}

#[async_trait]
impl CardGateway for HttpCardGateway {
    async fn list_card_ids(&self, deck_id: &DeckId) -> Result<Vec<CardId>, HostError> {
        let url = self.endpoint(&["api", "decks", deck_id.as_str()]);
        tracing::debug!(deck_id = %deck_id, %url, "fetching deck");

        let resp = self.http.get(url).send().await?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(HostError::DeckNotFound(deck_id.to_string()));
        }
        if !resp.status().is_success() {
            return Err(HostError::GatewayUnavailable(format!(
                "deck {deck_id}: backend returned {}",
                resp.status()
            )));
        }

        let body: DeckWithCards = resp.json().await?;
        Ok(body.card_ids)
    }

    async fn get_card(&self, card_id: &CardId) -> Result<CardRecord, HostError> {
        let url = self.endpoint(&["api", "cards", card_id.as_str()]);
        tracing::debug!(card_id = %card_id, %url, "fetching card");

        let resp = self.http.get(url).send().await?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(HostError::CardNotFound(card_id.to_string()));
        }
        if !resp.status().is_success() {
            return Err(HostError::GatewayUnavailable(format!(
                "card {card_id}: backend returned {}",
                resp.status()
            )));
        }

        let card: ApiCard = resp.json().await?;
        Ok(CardRecord {
            plugin: PluginName(card.plugin_name),
            payload: card.plugin_data,
        })
    }
}
