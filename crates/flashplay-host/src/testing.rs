//! In-memory collaborators shared by the unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::HostError;
use crate::gateway::{CardGateway, CardRecord, PluginName};
use crate::playlist::{CardId, DeckId};

/// Gateway serving decks and cards from memory.
pub(crate) struct MemoryGateway {
    decks: RwLock<HashMap<DeckId, Vec<CardId>>>,
    cards: RwLock<HashMap<CardId, CardRecord>>,
    /// Decks whose lookup fails as if the backend were down.
    unavailable_decks: RwLock<HashSet<DeckId>>,
    card_requests: AtomicUsize,
}

impl MemoryGateway {
    pub(crate) fn new() -> Self {
        Self {
            decks: RwLock::new(HashMap::new()),
            cards: RwLock::new(HashMap::new()),
            unavailable_decks: RwLock::new(HashSet::new()),
            card_requests: AtomicUsize::new(0),
        }
    }

    pub(crate) fn with_deck(mut self, deck_id: &str, card_ids: &[&str]) -> Self {
        self.decks.get_mut().insert(
            DeckId::from(deck_id),
            card_ids.iter().map(|id| CardId::from(*id)).collect(),
        );
        self
    }

    pub(crate) fn with_card(mut self, card_id: &str, plugin: &str) -> Self {
        self.cards.get_mut().insert(
            CardId::from(card_id),
            CardRecord {
                plugin: PluginName::new(plugin),
                payload: serde_json::json!({ "card": card_id }),
            },
        );
        self
    }

    pub(crate) fn with_unavailable_deck(mut self, deck_id: &str) -> Self {
        self.unavailable_decks
            .get_mut()
            .insert(DeckId::from(deck_id));
        self
    }

    pub(crate) async fn add_card(&self, card_id: &str, plugin: &str) {
        self.cards.write().await.insert(
            CardId::from(card_id),
            CardRecord {
                plugin: PluginName::new(plugin),
                payload: serde_json::json!({ "card": card_id }),
            },
        );
    }

    pub(crate) fn card_requests(&self) -> usize {
        self.card_requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CardGateway for MemoryGateway {
    async fn list_card_ids(&self, deck_id: &DeckId) -> Result<Vec<CardId>, HostError> {
        if self.unavailable_decks.read().await.contains(deck_id) {
            return Err(HostError::GatewayUnavailable("backend offline".into()));
        }
        self.decks
            .read()
            .await
            .get(deck_id)
            .cloned()
            .ok_or_else(|| HostError::DeckNotFound(deck_id.to_string()))
    }

    async fn get_card(&self, card_id: &CardId) -> Result<CardRecord, HostError> {
        self.card_requests.fetch_add(1, Ordering::SeqCst);
        self.cards
            .read()
            .await
            .get(card_id)
            .cloned()
            .ok_or_else(|| HostError::CardNotFound(card_id.to_string()))
    }
}
