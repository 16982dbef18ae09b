//! Host surface: the UI that actually shows plugins.
//!
//! The session never touches a frame directly. It asks a `HostSurface` to
//! navigate the isolated frame or to post a message into it.
//! `ChannelSurface` turns those requests into `SurfaceCommand`s on a channel
//! so any embedding UI (a webview shell, a test) can carry them out.

use serde::Serialize;
use tokio::sync::mpsc;

use crate::error::HostError;
use crate::loader::{Generation, MountTarget};
use crate::message::HostMessage;

/// What the host needs from the embedding UI.
pub trait HostSurface: Send + Sync + 'static {
    /// Point the isolated frame at `target.url`, replacing the current page.
    fn navigate(&self, target: &MountTarget) -> Result<(), HostError>;

    /// Deliver `message` to the frame mounted as `generation`, restricted to
    /// `target_origin`.
    fn post_message(
        &self,
        generation: Generation,
        message: &HostMessage,
        target_origin: &str,
    ) -> Result<(), HostError>;
}

/// A request for the embedding UI.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum SurfaceCommand {
    Navigate(MountTarget),
    PostMessage {
        generation: Generation,
        message: HostMessage,
        target_origin: String,
    },
}

/// Surface that forwards every request as a `SurfaceCommand`.
#[derive(Debug, Clone)]
pub struct ChannelSurface {
    tx: mpsc::UnboundedSender<SurfaceCommand>,
}

impl ChannelSurface {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SurfaceCommand>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, command: SurfaceCommand) -> Result<(), HostError> {
        self.tx
            .send(command)
            .map_err(|_| HostError::Surface("surface receiver dropped".into()))
    }
}

impl HostSurface for ChannelSurface {
    fn navigate(&self, target: &MountTarget) -> Result<(), HostError> {
        self.send(SurfaceCommand::Navigate(target.clone()))
    }

    fn post_message(
        &self,
        generation: Generation,
        message: &HostMessage,
        target_origin: &str,
    ) -> Result<(), HostError> {
        self.send(SurfaceCommand::PostMessage {
            generation,
            message: message.clone(),
            target_origin: target_origin.to_string(),
        })
    }
}
