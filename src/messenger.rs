//! Cross-context message conduit
//!
//! Unidirectional, at-most-once, unordered messaging from the foreground
//! scheduler to the background scheduler. No acknowledgment flows back; the
//! background side treats a repeated `ScheduleRequest` for the same id as a
//! no-op overwrite, so a duplicate or re-sent message is harmless.

use tokio::sync::mpsc;

use crate::error::NotifyError;
use crate::types::{NotificationSettings, ScheduledNotification};

/// Channel buffer size for scheduler messages.
const MESSENGER_CHANNEL_SIZE: usize = 32;

/// Messages accepted by the background scheduler.
#[derive(Debug, Clone)]
pub enum SchedulerMessage {
    /// Persist-and-arm request for a draft record.
    ScheduleRequest(ScheduledNotification),
    /// Replace the background side's settings snapshot.
    SettingsUpdate(NotificationSettings),
    /// Platform wake signal: run a catch-up sweep. Carries no payload.
    Wake,
}

/// Sending half held by the foreground scheduler.
#[derive(Clone)]
pub struct Messenger {
    sender: mpsc::Sender<SchedulerMessage>,
}

impl Messenger {
    /// Create a messenger and the receiver the background loop will drain.
    pub fn channel() -> (Self, mpsc::Receiver<SchedulerMessage>) {
        let (sender, receiver) = mpsc::channel(MESSENGER_CHANNEL_SIZE);
        (Self { sender }, receiver)
    }

    /// Fire-and-forget send. A full or closed channel means the background
    /// context is unreachable; the caller falls back to in-memory timers.
    pub fn delegate(&self, message: SchedulerMessage) -> Result<(), NotifyError> {
        self.sender
            .try_send(message)
            .map_err(|e| NotifyError::DelegationFailed(e.to_string()))
    }
}
