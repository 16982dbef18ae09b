//! Side-channel broadcaster for cosmetic host → plugin events.
//!
//! Broadcasts are best-effort: no acknowledgement, no retry, and no effect on
//! the study session. A plugin that ignores them keeps working.

use std::sync::Arc;

use crate::loader::MountTarget;
use crate::message::{Color, HostMessage};
use crate::surface::HostSurface;

pub struct Broadcaster {
    surface: Arc<dyn HostSurface>,
    /// Origin the message is restricted to; plugins are served same-origin.
    target_origin: String,
    color: Color,
}

impl std::fmt::Debug for Broadcaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Broadcaster")
            .field("target_origin", &self.target_origin)
            .field("color", &self.color)
            .finish_non_exhaustive()
    }
}

impl Broadcaster {
    pub fn new(surface: Arc<dyn HostSurface>, target_origin: impl Into<String>) -> Self {
        Self {
            surface,
            target_origin: target_origin.into(),
            color: Color::PALETTE[0],
        }
    }

    /// Send `color` to the mounted plugin. Returns whether anything was sent.
    pub fn broadcast(&mut self, mounted: Option<&MountTarget>, color: Color) -> bool {
        self.color = color;
        let Some(target) = mounted else {
            tracing::debug!(?color, "no plugin mounted, dropping broadcast");
            return false;
        };

        let message = HostMessage::ChangeBackgroundColor { color };
        match self
            .surface
            .post_message(target.generation, &message, &self.target_origin)
        {
            Ok(()) => {
                tracing::debug!(
                    ?color,
                    plugin = %target.plugin,
                    generation = %target.generation,
                    "background color broadcast"
                );
                true
            }
            Err(e) => {
                tracing::debug!(?color, "broadcast not delivered: {e}");
                false
            }
        }
    }

    /// Move to the next palette color and broadcast it.
    pub fn cycle(&mut self, mounted: Option<&MountTarget>) -> Color {
        let next = self.color.next();
        self.broadcast(mounted, next);
        next
    }

    /// Last color broadcast (or attempted).
    pub fn color(&self) -> Color {
        self.color
    }
}
