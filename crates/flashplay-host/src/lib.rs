//! Flashplay plugin host
//!
//! Runs a study session over a deck of flashcards. Each card names a plugin
//! page that renders it; the host mounts one plugin at a time in a sandboxed
//! surface, waits for the plugin to report `finish` (or for the completion
//! timer to run out), then moves to the next card, cycling the deck forever.
//! Plugins talk to the host only through origin-checked messages and may
//! receive cosmetic side-channel events such as background color changes.

pub mod broadcast;
pub mod config;
pub mod error;
pub mod gateway;
pub mod loader;
pub mod message;
pub mod playlist;
pub mod session;
pub mod surface;
pub mod timer;

#[cfg(test)]
mod testing;

pub use broadcast::Broadcaster;
pub use config::HostConfig;
pub use error::HostError;
pub use gateway::{CardGateway, CardRecord, HttpCardGateway, PluginName};
pub use loader::{Generation, MountTarget, PluginLoader};
pub use message::{Color, Completion, Envelope, FinishReason, HostMessage, HostOrigin};
pub use playlist::{CardId, DeckId, PlaylistCursor};
pub use session::{
    spawn_session, Disposition, IgnoreReason, NowPlaying, SessionCommand, SessionController,
    SessionState, Trigger,
};
pub use surface::{ChannelSurface, HostSurface, SurfaceCommand};
pub use timer::CompletionTimer;
