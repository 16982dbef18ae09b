//! Completion timer: forces progress when a plugin never reports back.
//!
//! A timer is a spawned task that sleeps until its deadline and then sends
//! its generation to the session. Cancelling aborts the task; aborting a
//! task that already fired or was already aborted does nothing, so cancel
//! is idempotent. A fire that slipped into the channel before the cancel
//! carries an old generation and is discarded by the session.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::loader::Generation;

/// Upper bound on a timer's duration, about thirty years.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

#[derive(Debug)]
pub struct CompletionTimer {
    generation: Generation,
    deadline: Instant,
    handle: JoinHandle<()>,
}

impl CompletionTimer {
    /// Arm a timer that reports `generation` on `fired` after `duration`.
    pub fn arm(
        generation: Generation,
        duration: Duration,
        fired: mpsc::UnboundedSender<Generation>,
    ) -> Self {
        // Deadline fixed here, not when the task is first polled.
        let deadline = Instant::now() + duration.min(FAR_FUTURE);
        let handle = tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            let _ = fired.send(generation);
        });
        Self {
            generation,
            deadline,
            handle,
        }
    }

    pub fn cancel(&self) {
        self.handle.abort();
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

}

impl Drop for CompletionTimer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
