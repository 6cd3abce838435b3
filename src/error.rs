//! Error types for the reminder engine
//!
//! Reminders are a best-effort convenience feature: every error here is
//! recovered locally (degrade, fall back, or fail open) and never surfaced
//! to the user or allowed to fail the caller's primary flow.

use thiserror::Error;

/// Errors raised by scheduling, delegation, and delivery.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// The durable store cannot be opened or written (quota/permissions).
    /// Recovery: degrade to in-memory timers only.
    #[error("Schedule store unavailable: {0}")]
    StorageUnavailable(String),

    /// Notification permission not granted. All public scheduling
    /// operations become no-ops after the early permission check.
    #[error("Notification permission not granted")]
    PermissionDenied,

    /// The background context is unreachable from the foreground.
    /// Recovery: silent fallback to an in-memory timer.
    #[error("Delegation to background scheduler failed: {0}")]
    DelegationFailed(String),

    /// Quiet-hour strings are not parseable as `HH:mm` (or the timezone is
    /// unknown). Recovery: treat quiet hours as disabled — fail open toward
    /// over-notifying rather than silently suppressing every reminder.
    #[error("Malformed notification settings: {0}")]
    MalformedSettings(String),
}

impl NotifyError {
    /// True when the engine keeps a degraded scheduling path available
    /// (in-memory timers) instead of dropping the request outright.
    pub fn has_fallback(&self) -> bool {
        matches!(
            self,
            NotifyError::StorageUnavailable(_) | NotifyError::DelegationFailed(_)
        )
    }
}
