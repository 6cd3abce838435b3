//! Background scheduler
//!
//! Runs in the persistent context that outlives any open page and that the
//! host may suspend or terminate without notice. Every accepted schedule
//! request is persisted before a timer is armed, so correctness never rests
//! on in-memory timers: the wake sweep re-delivers anything that came due
//! while the context was down.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use crate::delivery::{compose, NotificationPresenter};
use crate::messenger::SchedulerMessage;
use crate::quiet_hours::is_in_quiet_hours;
use crate::store::ScheduleStore;
use crate::timer::{TimerHandle, TimerPort};
use crate::types::{NotificationSettings, ScheduledNotification};

/// Poll interval for the message/wake loop (1 minute).
const POLL_INTERVAL_SECS: u64 = 60;

/// Time jump threshold to detect suspend/resume (5 minutes).
const TIME_JUMP_THRESHOLD_SECS: i64 = 300;

/// A poll-to-poll gap well past the interval means the host suspended this
/// context rather than the loop simply running late.
fn is_wake_jump(last_check: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    (now - last_check).num_seconds() > TIME_JUMP_THRESHOLD_SECS
}

/// What to do with a schedule request whose fire time is already past.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PastDuePolicy {
    /// Drop the request silently.
    #[default]
    Skip,
    /// Deliver right away instead of dropping.
    DeliverImmediately,
}

/// Scheduler for the persistent background context.
///
/// Owns the durable store, the armed-timer map, and the latest settings
/// snapshot. Constructed with `store: None` when the store could not be
/// opened — all operations then degrade to in-memory timers only.
pub struct BackgroundScheduler {
    store: Mutex<Option<ScheduleStore>>,
    timers: Mutex<HashMap<String, TimerHandle>>,
    settings: Mutex<NotificationSettings>,
    presenter: Arc<dyn NotificationPresenter>,
    timer: Arc<dyn TimerPort>,
    past_due: PastDuePolicy,
}

impl BackgroundScheduler {
    pub fn new(
        store: Option<ScheduleStore>,
        settings: NotificationSettings,
        presenter: Arc<dyn NotificationPresenter>,
        timer: Arc<dyn TimerPort>,
    ) -> Self {
        if store.is_none() {
            log::warn!("BackgroundScheduler: no durable store, in-memory timers only");
        }
        Self {
            store: Mutex::new(store),
            timers: Mutex::new(HashMap::new()),
            settings: Mutex::new(settings),
            presenter,
            timer,
            past_due: PastDuePolicy::default(),
        }
    }

    pub fn with_past_due_policy(mut self, past_due: PastDuePolicy) -> Self {
        self.past_due = past_due;
        self
    }

    /// Persist a record and arm its timer.
    ///
    /// Idempotent: re-invoking with the same id overwrites the stored record
    /// and replaces any armed timer. A past-due fire time follows the
    /// configured `PastDuePolicy`. Never fails the caller.
    pub fn schedule_notification(self: &Arc<Self>, record: ScheduledNotification) {
        if !self.presenter.permission_granted() {
            log::debug!("Schedule: permission not granted, ignoring '{}'", record.id);
            return;
        }

        let delay = record.scheduled_for - Utc::now();
        if delay <= chrono::Duration::zero() {
            match self.past_due {
                PastDuePolicy::Skip => {
                    log::debug!("Schedule: '{}' is already past due, dropping", record.id);
                }
                PastDuePolicy::DeliverImmediately => {
                    log::debug!("Schedule: '{}' is past due, delivering now", record.id);
                    self.deliver(&record, Utc::now());
                }
            }
            return;
        }

        self.persist(&record);
        self.cancel_timer(&record.id);

        let delay = delay.to_std().unwrap_or_default();
        let scheduler = Arc::clone(self);
        let fired = record.clone();
        let handle = self.timer.after(
            delay,
            Box::new(move || scheduler.on_timer_fired(fired)),
        );

        if let Ok(mut timers) = self.timers.lock() {
            timers.insert(record.id.clone(), handle);
        }
        log::debug!(
            "Schedule: armed '{}' to fire in {}s",
            record.id,
            delay.as_secs()
        );
    }

    /// Clear an armed timer (if any) and delete the persisted record.
    /// Always succeeds, absent ids included. Best-effort-prompt: a timer
    /// that has already begun firing may still render.
    pub fn cancel_scheduled(&self, id: &str) {
        self.cancel_timer(id);
        self.remove_persisted(id);
        log::debug!("Cancel: '{}'", id);
    }

    /// Deliver every persisted record whose fire time has passed, deleting
    /// each as it goes; future records stay untouched. Invoked whenever the
    /// background context is woken, which is what turns "timer lost to a
    /// restart" into "delivered late" rather than "delivered never".
    pub fn sweep_and_deliver_due(&self, now: DateTime<Utc>) -> usize {
        let records = {
            let guard = match self.store.lock() {
                Ok(g) => g,
                Err(_) => return 0,
            };
            let Some(store) = guard.as_ref() else {
                return 0;
            };
            match store.get_all() {
                Ok(records) => records,
                Err(e) => {
                    log::warn!("Sweep: failed to read store: {}", e);
                    return 0;
                }
            }
        };

        let mut delivered = 0;
        for record in records {
            if record.scheduled_for <= now {
                self.cancel_timer(&record.id);
                self.deliver(&record, now);
                delivered += 1;
            }
        }

        if delivered > 0 {
            log::info!("Sweep: delivered {} due notification(s)", delivered);
        }
        delivered
    }

    /// Replace the settings snapshot used for fire-time message composition.
    pub fn update_settings(&self, settings: NotificationSettings) {
        if let Ok(mut guard) = self.settings.lock() {
            *guard = settings;
        }
    }

    /// Message/wake loop. Drains messenger traffic and polls once a minute;
    /// a time jump past the threshold means the host suspended this context,
    /// so missed fires are swept up (same detection as a platform wake).
    /// Returns when the messenger closes.
    pub async fn run(self: Arc<Self>, mut receiver: mpsc::Receiver<SchedulerMessage>) {
        log::info!("BackgroundScheduler: started");
        self.sweep_and_deliver_due(Utc::now());

        let mut last_check = Utc::now();
        loop {
            tokio::select! {
                message = receiver.recv() => match message {
                    Some(SchedulerMessage::ScheduleRequest(record)) => {
                        self.schedule_notification(record);
                    }
                    Some(SchedulerMessage::SettingsUpdate(settings)) => {
                        self.update_settings(settings);
                    }
                    Some(SchedulerMessage::Wake) => {
                        self.sweep_and_deliver_due(Utc::now());
                    }
                    None => {
                        log::info!("BackgroundScheduler: messenger closed, stopping");
                        return;
                    }
                },
                _ = tokio::time::sleep(Duration::from_secs(POLL_INTERVAL_SECS)) => {
                    let now = Utc::now();
                    if is_wake_jump(last_check, now) {
                        log::info!(
                            "Detected wake from suspension (time jumped {}s), sweeping",
                            (now - last_check).num_seconds()
                        );
                        self.sweep_and_deliver_due(now);
                    }
                    last_check = now;
                }
            }
        }
    }

    /// Spawn the run loop onto the current runtime.
    pub fn spawn(
        self: &Arc<Self>,
        receiver: mpsc::Receiver<SchedulerMessage>,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(Arc::clone(self).run(receiver))
    }

    fn on_timer_fired(&self, record: ScheduledNotification) {
        if let Ok(mut timers) = self.timers.lock() {
            timers.remove(&record.id);
        }
        self.deliver(&record, Utc::now());
    }

    /// Compose and render, consulting quiet hours at fire time — never at
    /// schedule time. The record is consumed either way: a suppressed
    /// delivery still transitions Scheduled → Delivered, otherwise the next
    /// sweep would re-fire it.
    fn deliver(&self, record: &ScheduledNotification, now: DateTime<Utc>) {
        let suppressed = {
            let settings = self
                .settings
                .lock()
                .map(|g| g.clone())
                .unwrap_or_default();
            is_in_quiet_hours(&settings, now)
        };

        if suppressed {
            log::info!("Delivery: '{}' suppressed by quiet hours", record.id);
        } else if !self.presenter.permission_granted() {
            log::debug!("Delivery: permission not granted, not rendering '{}'", record.id);
        } else {
            self.presenter.render(compose(record));
            log::debug!("Delivery: rendered '{}'", record.id);
        }

        self.remove_persisted(&record.id);
    }

    fn persist(&self, record: &ScheduledNotification) {
        let guard = match self.store.lock() {
            Ok(g) => g,
            Err(_) => return,
        };
        if let Some(store) = guard.as_ref() {
            if let Err(e) = store.put(record) {
                // Degrade silently: the in-memory timer still fires, the
                // record just won't survive a context restart.
                log::warn!("Schedule: store write failed for '{}': {}", record.id, e);
            }
        }
    }

    fn remove_persisted(&self, id: &str) {
        let guard = match self.store.lock() {
            Ok(g) => g,
            Err(_) => return,
        };
        if let Some(store) = guard.as_ref() {
            if let Err(e) = store.delete(id) {
                log::warn!("Store delete failed for '{}': {}", id, e);
            }
        }
    }

    fn cancel_timer(&self, id: &str) {
        if let Ok(mut timers) = self.timers.lock() {
            if let Some(handle) = timers.remove(id) {
                handle.cancel();
            }
        }
    }

    #[cfg(test)]
    fn store_len(&self) -> usize {
        self.store
            .lock()
            .ok()
            .and_then(|g| g.as_ref().and_then(|s| s.len().ok()))
            .unwrap_or(0)
    }
}
