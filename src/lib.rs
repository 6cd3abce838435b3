//! Local notification scheduling & delivery for the SipNote wine journal.
//!
//! Two scheduler instances cooperate across independently-lifecycled
//! contexts: the [`foreground::ForegroundScheduler`] lives only while a page
//! is open and delegates everything it can, while the
//! [`background::BackgroundScheduler`] persists records, arms timers, and
//! sweeps for missed fires whenever its context wakes. The
//! [`messenger::Messenger`] is the only channel between them —
//! fire-and-forget, at-most-once, no acknowledgments.

pub mod background;
pub mod config;
pub mod delivery;
pub mod error;
pub mod foreground;
pub mod messenger;
pub mod plan;
pub mod quiet_hours;
pub mod store;
pub mod timer;
pub mod types;

pub use background::{BackgroundScheduler, PastDuePolicy};
pub use error::NotifyError;
pub use foreground::ForegroundScheduler;
pub use messenger::{Messenger, SchedulerMessage};
pub use store::ScheduleStore;
pub use types::{NotificationKind, NotificationSettings, ScheduledNotification};
