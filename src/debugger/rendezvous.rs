//! Interpreter-thread rendezvous
//!
//! A bounded channel of capacity one carrying the resume intent. The
//! interpreter thread blocks in [`Rendezvous::wait`] and drains exactly one
//! value per pause; every resuming client command releases it exactly once
//! via [`Rendezvous::release`]. The channel's send acts as the release
//! barrier, so state written before a release is visible to the woken
//! interpreter thread.

use std::sync::mpsc::{sync_channel, Receiver, SyncSender, TrySendError};
use std::sync::Mutex;

use super::events::StepIntent;

/// The value carried across a release.
#[derive(Debug, Clone, Copy)]
pub struct Resume {
    pub intent: StepIntent,
}

pub struct Rendezvous {
    tx: SyncSender<Resume>,
    rx: Mutex<Receiver<Resume>>,
}

impl Rendezvous {
    pub fn new() -> Self {
        let (tx, rx) = sync_channel(1);
        Self {
            tx,
            rx: Mutex::new(rx),
        }
    }

    /// Release the interpreter thread with the given intent.
    ///
    /// A release while one is already pending is dropped: the latch is
    /// already set, and the first release's intent wins.
    pub fn release(&self, intent: StepIntent) {
        match self.tx.try_send(Resume { intent }) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                tracing::warn!("resume already pending, dropping duplicate release");
            }
            // Interpreter thread is gone; nothing to release.
            Err(TrySendError::Disconnected(_)) => {}
        }
    }

    /// Block until released, draining exactly one pending resume.
    ///
    /// Only the interpreter thread calls this.
    pub fn wait(&self) -> Resume {
        let rx = self.rx.lock().unwrap();
        rx.recv().unwrap_or(Resume {
            intent: StepIntent::None,
        })
    }
}

impl Default for Rendezvous {
    fn default() -> Self {
        Self::new()
    }
}
