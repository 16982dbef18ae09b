//! Study session controller: the host's state machine.
//!
//! The `SessionController` owns the playlist cursor, the plugin loader, the
//! single completion timer and the broadcaster. It moves through
//! `Idle → Loading → Active → Loading → …` and never ends on its own: the
//! deck cycles until the host is torn down.
//!
//! Two producers race to end a card: the plugin's completion message and
//! the completion timer. Both funnel into `advance()`. Every mount gets a
//! fresh `Generation`, and a trigger carrying any other generation is
//! dropped, so a card is advanced past at most once whichever trigger
//! arrives first.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{mpsc, oneshot, watch};

use crate::broadcast::Broadcaster;
use crate::config::HostConfig;
use crate::error::HostError;
use crate::gateway::{CardGateway, PluginName};
use crate::loader::{Generation, PluginLoader};
use crate::message::{self, Color, Completion, Envelope, HostOrigin, Rejection};
use crate::playlist::{CardId, DeckId, PlaylistCursor};
use crate::surface::HostSurface;
use crate::timer::CompletionTimer;

// ─── State & outcomes ───────────────────────────────────────────────────

/// Where the session is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum SessionState {
    Idle,
    Loading {
        card_id: CardId,
    },
    Active {
        card_id: CardId,
        plugin: PluginName,
        generation: Generation,
    },
}

/// What caused an advance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    /// The plugin reported it is done with the card.
    Completion(Completion),
    /// The completion timer ran out.
    Timeout,
    /// The user asked for the next card.
    Skip,
}

/// Why a trigger did not move the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// Rejected by the message codec.
    Rejected(Rejection),
    /// Refers to a mount that has been superseded.
    Stale,
    /// No card is being studied.
    NotActive,
}

/// Result of feeding a trigger to the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    Advanced {
        from: CardId,
        to: CardId,
        generation: Generation,
        trigger: Trigger,
    },
    Ignored(IgnoreReason),
}

impl Disposition {
    pub fn advanced(&self) -> bool {
        matches!(self, Disposition::Advanced { .. })
    }
}

/// The card on screen, for status displays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NowPlaying {
    pub card_id: CardId,
    pub plugin: PluginName,
    /// Zero-based position in the deck.
    pub position: usize,
    pub total: usize,
}

impl fmt::Display for NowPlaying {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Plugin: {} ({}/{})",
            self.plugin,
            self.position + 1,
            self.total
        )
    }
}

// ─── Controller ─────────────────────────────────────────────────────────

pub struct SessionController {
    gateway: Arc<dyn CardGateway>,
    loader: PluginLoader,
    broadcaster: Broadcaster,
    host_origin: HostOrigin,
    completion_timeout: Duration,
    cursor: Option<PlaylistCursor>,
    state: SessionState,
    /// Generation of the latest load attempt.
    generation: Generation,
    /// The one live completion timer, if armed.
    timer: Option<CompletionTimer>,
    timer_tx: mpsc::UnboundedSender<Generation>,
    timer_rx: mpsc::UnboundedReceiver<Generation>,
}

impl fmt::Debug for SessionController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionController")
            .field("state", &self.state)
            .field("generation", &self.generation)
            .field("cursor", &self.cursor)
            .field("timer", &self.timer)
            .finish_non_exhaustive()
    }
}

impl SessionController {
    pub fn new(
        config: &HostConfig,
        gateway: Arc<dyn CardGateway>,
        surface: Arc<dyn HostSurface>,
    ) -> Result<Self, HostError> {
        let host_origin = HostOrigin::parse(&config.host_origin)?;
        let loader = PluginLoader::new(
            gateway.clone(),
            surface.clone(),
            host_origin.clone(),
            config.plugin_route.clone(),
        );
        let broadcaster = Broadcaster::new(surface, host_origin.serialized());
        let (timer_tx, timer_rx) = mpsc::unbounded_channel();

        Ok(Self {
            gateway,
            loader,
            broadcaster,
            host_origin,
            completion_timeout: config.completion_timeout(),
            cursor: None,
            state: SessionState::Idle,
            generation: Generation::default(),
            timer: None,
            timer_tx,
            timer_rx,
        })
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn host_origin(&self) -> &HostOrigin {
        &self.host_origin
    }

    /// The card on screen, if one is mounted.
    pub fn now_playing(&self) -> Option<NowPlaying> {
        let SessionState::Active {
            card_id, plugin, ..
        } = &self.state
        else {
            return None;
        };
        let cursor = self.cursor.as_ref()?;
        Some(NowPlaying {
            card_id: card_id.clone(),
            plugin: plugin.clone(),
            position: cursor.position(),
            total: cursor.len(),
        })
    }

    /// Start studying a deck from its first card.
    ///
    /// Fails without touching the current session when the deck cannot be
    /// fetched or has no cards: an idle session stays `Idle`, a running one
    /// keeps cycling its current deck.
    pub async fn select_deck(&mut self, deck_id: &DeckId) -> Result<(), HostError> {
        let card_ids = self.gateway.list_card_ids(deck_id).await.map_err(|e| {
            tracing::warn!(deck_id = %deck_id, "failed to fetch deck: {e}");
            e
        })?;

        let cursor = PlaylistCursor::new(card_ids).map_err(|_| {
            tracing::warn!(deck_id = %deck_id, "deck has no cards");
            HostError::EmptyDeck(deck_id.to_string())
        })?;

        tracing::info!(deck_id = %deck_id, cards = cursor.len(), "deck selected");
        self.cursor = Some(cursor);
        self.load_current().await
    }

    /// Mount the card under the cursor and arm a fresh timer.
    ///
    /// A card whose plugin cannot be resolved is skipped. When every card
    /// in the deck failed in a row the session stays `Loading` with the
    /// timer armed, so the next attempt waits for the timeout instead of
    /// spinning.
    pub async fn load_current(&mut self) -> Result<(), HostError> {
        let total = self.cursor.as_ref().ok_or(HostError::NotInitialized)?.len();
        let mut failures = 0;

        loop {
            self.cancel_timer();
            self.generation = self.generation.next();
            let generation = self.generation;

            let cursor = self.cursor.as_mut().ok_or(HostError::NotInitialized)?;
            let card_id = cursor.current().clone();
            self.state = SessionState::Loading {
                card_id: card_id.clone(),
            };

            match self.loader.mount(&card_id, generation).await {
                Ok(target) => {
                    tracing::info!(
                        card_id = %card_id,
                        plugin = %target.plugin,
                        generation = %generation,
                        "card active"
                    );
                    self.state = SessionState::Active {
                        card_id,
                        plugin: target.plugin,
                        generation,
                    };
                    self.arm_timer(generation);
                    return Ok(());
                }
                Err(e) => {
                    failures += 1;
                    tracing::warn!(
                        card_id = %card_id,
                        generation = %generation,
                        "skipping card: {e}"
                    );
                    if failures >= total {
                        tracing::warn!(
                            cards = total,
                            timeout_secs = self.completion_timeout.as_secs(),
                            "no card in the deck could be mounted, retrying after timeout"
                        );
                        self.arm_timer(generation);
                        return Ok(());
                    }
                    if let Some(cursor) = self.cursor.as_mut() {
                        cursor.advance();
                    }
                }
            }
        }
    }

    /// Handle a message from a plugin.
    ///
    /// Cross-origin, non-completion and stale messages are dropped without
    /// a trace above `trace` level; they are normal traffic.
    pub async fn on_message(&mut self, envelope: Envelope) -> Disposition {
        let completion = match message::accept(&envelope, &self.host_origin) {
            Ok(c) => c,
            Err(rejection) => {
                tracing::trace!(
                    origin = %envelope.origin,
                    generation = %envelope.generation,
                    "ignoring message: {}",
                    HostError::from(rejection)
                );
                return Disposition::Ignored(IgnoreReason::Rejected(rejection));
            }
        };

        if self.cursor.is_none() {
            return Disposition::Ignored(IgnoreReason::NotActive);
        }
        if envelope.generation != self.generation {
            tracing::trace!(
                got = %envelope.generation,
                current = %self.generation,
                "dropping completion from superseded mount"
            );
            return Disposition::Ignored(IgnoreReason::Stale);
        }
        let SessionState::Active { card_id, plugin, .. } = &self.state else {
            return Disposition::Ignored(IgnoreReason::NotActive);
        };

        tracing::info!(
            card_id = %card_id,
            plugin = %plugin,
            reason = %completion.reason,
            status_code = ?completion.status_code,
            "plugin finished card"
        );
        self.advance(Trigger::Completion(completion)).await
    }

    /// Handle a completion timer firing for `generation`.
    pub async fn on_timer_fire(&mut self, generation: Generation) -> Disposition {
        if self.cursor.is_none() {
            return Disposition::Ignored(IgnoreReason::NotActive);
        }
        if generation != self.generation {
            tracing::trace!(
                got = %generation,
                current = %self.generation,
                "dropping timer from superseded mount"
            );
            return Disposition::Ignored(IgnoreReason::Stale);
        }

        if let SessionState::Active { card_id, .. } | SessionState::Loading { card_id } =
            &self.state
        {
            tracing::info!(
                card_id = %card_id,
                generation = %generation,
                "completion timer fired"
            );
        }
        self.advance(Trigger::Timeout).await
    }

    /// Move to the next card. The single path every trigger goes through.
    pub async fn advance(&mut self, trigger: Trigger) -> Disposition {
        self.cancel_timer();
        let Some(cursor) = self.cursor.as_mut() else {
            return Disposition::Ignored(IgnoreReason::NotActive);
        };
        let from = cursor.current().clone();
        cursor.advance();

        if let Err(e) = self.load_current().await {
            tracing::error!("failed to load next card: {e}");
        }

        let to = match self.cursor.as_ref() {
            Some(cursor) => cursor.current().clone(),
            None => from.clone(),
        };
        Disposition::Advanced {
            from,
            to,
            generation: self.generation,
            trigger,
        }
    }

    /// Send a cosmetic color change to the mounted plugin.
    pub fn broadcast(&mut self, color: Color) -> bool {
        self.broadcaster.broadcast(self.loader.mounted(), color)
    }

    /// Broadcast the next palette color.
    pub fn cycle_color(&mut self) -> Color {
        self.broadcaster.cycle(self.loader.mounted())
    }

    fn arm_timer(&mut self, generation: Generation) {
        // Replacing the slot drops (and aborts) any previous timer.
        self.timer = Some(CompletionTimer::arm(
            generation,
            self.completion_timeout,
            self.timer_tx.clone(),
        ));
    }

    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.cancel();
        }
    }

    async fn handle(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::SelectDeck { deck_id, reply } => {
                let result = self.select_deck(&deck_id).await;
                if let Some(reply) = reply {
                    let _ = reply.send(result);
                }
            }
            SessionCommand::Message(envelope) => {
                self.on_message(envelope).await;
            }
            SessionCommand::Broadcast(color) => {
                self.broadcast(color);
            }
            SessionCommand::CycleColor => {
                self.cycle_color();
            }
            SessionCommand::Skip => {
                self.advance(Trigger::Skip).await;
            }
        }
    }

    /// Drive the session until shutdown or until every command sender is
    /// gone.
    pub async fn run(
        mut self,
        mut commands: mpsc::Receiver<SessionCommand>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        tracing::info!(
            origin = %self.host_origin,
            timeout_secs = self.completion_timeout.as_secs(),
            "study session started"
        );

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.handle(command).await,
                    None => {
                        tracing::info!("command channel closed, stopping session");
                        break;
                    }
                },
                Some(generation) = self.timer_rx.recv() => {
                    self.on_timer_fire(generation).await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        tracing::info!("study session shutting down");
                        break;
                    }
                }
            }
        }

        self.cancel_timer();
    }
}

/// Requests the session task accepts.
#[derive(Debug)]
pub enum SessionCommand {
    SelectDeck {
        deck_id: DeckId,
        /// Receives the outcome; deck errors are meant for the user.
        reply: Option<oneshot::Sender<Result<(), HostError>>>,
    },
    Message(Envelope),
    Broadcast(Color),
    CycleColor,
    Skip,
}

/// Spawn the session as its own task.
///
/// All session state lives on that task; callers talk to it through
/// `commands` and stop it through `shutdown`.
pub fn spawn_session(
    controller: SessionController,
    commands: mpsc::Receiver<SessionCommand>,
    shutdown: watch::Receiver<bool>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(controller.run(commands, shutdown))
}

// ─── Tests ──────────────────────────────────────────────────────────────
