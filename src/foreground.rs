//! Foreground scheduler
//!
//! Page-scoped counterpart of the background scheduler. Every schedule
//! request is first delegated across the messenger; only when the background
//! context is unreachable does it arm its own in-memory timer — an accepted
//! lossy fallback that dies with the page. Timers are indexed per user so
//! "cancel everything for this user" never relies on id substring matching.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};

use crate::delivery::{compose, NotificationPresenter};
use crate::messenger::{Messenger, SchedulerMessage};
use crate::plan::build_daily_plan;
use crate::timer::{TimerHandle, TimerPort};
use crate::types::{BadgeEvent, NotificationKind, NotificationSettings, ScheduledNotification};

struct ArmedTimer {
    handle: TimerHandle,
    user_id: String,
}

/// Scheduler active only while a page is open.
pub struct ForegroundScheduler {
    timers: Mutex<HashMap<String, ArmedTimer>>,
    by_user: Mutex<HashMap<String, HashSet<String>>>,
    messenger: Messenger,
    presenter: Arc<dyn NotificationPresenter>,
    timer: Arc<dyn TimerPort>,
}

impl ForegroundScheduler {
    pub fn new(
        messenger: Messenger,
        presenter: Arc<dyn NotificationPresenter>,
        timer: Arc<dyn TimerPort>,
    ) -> Self {
        Self {
            timers: Mutex::new(HashMap::new()),
            by_user: Mutex::new(HashMap::new()),
            messenger,
            presenter,
            timer,
        }
    }

    /// Schedule a record: delegate to the background scheduler, and on
    /// delegation failure fall back silently to an in-memory timer (lost if
    /// the page closes before it fires). Never fails the caller.
    pub fn schedule(self: &Arc<Self>, record: ScheduledNotification) {
        if !self.presenter.permission_granted() {
            log::debug!("Schedule: permission not granted, ignoring '{}'", record.id);
            return;
        }

        match self
            .messenger
            .delegate(SchedulerMessage::ScheduleRequest(record.clone()))
        {
            Ok(()) => {
                // Durable path is authoritative; clear any fallback timer a
                // previously failed delegation left behind for this id
                self.cancel_notification(&record.id);
                log::debug!("Schedule: delegated '{}'", record.id);
            }
            Err(e) => {
                log::debug!("Schedule: delegation failed ({}), arming in-memory timer", e);
                self.arm_local(record);
            }
        }
    }

    /// Build tomorrow's plan from the settings and schedule every draft.
    pub fn schedule_daily_plan(
        self: &Arc<Self>,
        settings: &NotificationSettings,
        user_id: &str,
        now: DateTime<Utc>,
        rng: &mut impl rand::Rng,
    ) {
        for record in build_daily_plan(settings, user_id, now, rng) {
            self.schedule(record);
        }
    }

    pub fn schedule_streak_reminder(
        self: &Arc<Self>,
        user_id: &str,
        scheduled_for: DateTime<Utc>,
    ) {
        self.schedule(
            ScheduledNotification::new(
                NotificationKind::StreakReminder,
                user_id,
                scheduled_for,
                "Keep your streak going",
                "Log a wine today to keep your tasting streak alive.",
            )
            .with_payload("url", "/wine-entry"),
        );
    }

    pub fn schedule_quiz_reminder(self: &Arc<Self>, user_id: &str, scheduled_for: DateTime<Utc>) {
        self.schedule(
            ScheduledNotification::new(
                NotificationKind::QuizReminder,
                user_id,
                scheduled_for,
                "Time for a quick quiz",
                "A couple of questions to sharpen your palate memory.",
            )
            .with_payload("url", "/quiz"),
        );
    }

    pub fn schedule_heart_recovery(self: &Arc<Self>, user_id: &str, scheduled_for: DateTime<Utc>) {
        self.schedule(
            ScheduledNotification::new(
                NotificationKind::HeartRecovery,
                user_id,
                scheduled_for,
                "Your hearts are back",
                "Jump back into the quiz — your hearts have recovered.",
            )
            .with_payload("url", "/quiz"),
        );
    }

    pub fn schedule_memory_recall(
        self: &Arc<Self>,
        user_id: &str,
        wine_id: &str,
        scheduled_for: DateTime<Utc>,
    ) {
        self.schedule(
            ScheduledNotification::new(
                NotificationKind::WineMemoryRecall,
                user_id,
                scheduled_for,
                "Remember this wine?",
                "Take a moment to recall how it tasted.",
            )
            .with_payload("url", format!("/wine-detail/{}", wine_id))
            .with_payload("wineId", wine_id),
        );
    }

    /// Render a badge notification immediately. Never persisted and never
    /// swept — it fires within the current page's lifetime or not at all.
    pub fn notify_badge_earned(&self, badge: &BadgeEvent) {
        if !self.presenter.permission_granted() {
            log::debug!("Badge: permission not granted, ignoring '{}'", badge.name);
            return;
        }

        let record = ScheduledNotification::new(
            NotificationKind::BadgeEarned,
            "",
            Utc::now(),
            format!("Badge earned: {}", badge.name),
            format!("{} You just earned the {} badge.", badge.icon, badge.name),
        )
        .with_payload("url", "/profile");
        self.presenter.render(compose(&record));
    }

    /// Clear a matching in-memory timer, if present.
    pub fn cancel_notification(&self, id: &str) {
        let user_id = {
            let mut timers = match self.timers.lock() {
                Ok(g) => g,
                Err(_) => return,
            };
            match timers.remove(id) {
                Some(armed) => {
                    armed.handle.cancel();
                    armed.user_id
                }
                None => return,
            }
        };
        self.drop_from_index(&user_id, id);
    }

    /// Clear every in-memory timer belonging to a user.
    pub fn cancel_all_user_notifications(&self, user_id: &str) {
        let ids: Vec<String> = match self.by_user.lock() {
            Ok(mut index) => index
                .remove(user_id)
                .map(|set| set.into_iter().collect())
                .unwrap_or_default(),
            Err(_) => return,
        };

        if ids.is_empty() {
            return;
        }

        if let Ok(mut timers) = self.timers.lock() {
            for id in &ids {
                if let Some(armed) = timers.remove(id) {
                    armed.handle.cancel();
                }
            }
        }
        log::debug!("Cancel: cleared {} timer(s) for user {}", ids.len(), user_id);
    }

    /// Forward new settings to the background scheduler. A lost update is
    /// tolerated: quiet hours are then evaluated against the previous
    /// snapshot until the next update gets through.
    pub fn update_settings(&self, settings: NotificationSettings) {
        if let Err(e) = self.messenger.delegate(SchedulerMessage::SettingsUpdate(settings)) {
            log::debug!("Settings update not delivered: {}", e);
        }
    }

    /// Number of armed fallback timers (diagnostics).
    pub fn armed_timers(&self) -> usize {
        self.timers.lock().map(|g| g.len()).unwrap_or(0)
    }

    fn arm_local(self: &Arc<Self>, record: ScheduledNotification) {
        let delay = record.scheduled_for - Utc::now();
        if delay <= chrono::Duration::zero() {
            log::debug!("Schedule: '{}' is already past due, dropping", record.id);
            return;
        }

        // Replace any previous timer for the same id
        self.cancel_notification(&record.id);

        let scheduler = Arc::clone(self);
        let fired = record.clone();
        let handle = self.timer.after(
            delay.to_std().unwrap_or_default(),
            Box::new(move || scheduler.on_timer_fired(fired)),
        );

        if let Ok(mut timers) = self.timers.lock() {
            timers.insert(
                record.id.clone(),
                ArmedTimer {
                    handle,
                    user_id: record.user_id.clone(),
                },
            );
        }
        if let Ok(mut index) = self.by_user.lock() {
            index
                .entry(record.user_id.clone())
                .or_default()
                .insert(record.id.clone());
        }
    }

    fn on_timer_fired(&self, record: ScheduledNotification) {
        if let Ok(mut timers) = self.timers.lock() {
            timers.remove(&record.id);
        }
        self.drop_from_index(&record.user_id, &record.id);
        self.presenter.render(compose(&record));
        log::debug!("Delivery: rendered '{}' from in-memory timer", record.id);
    }

    fn drop_from_index(&self, user_id: &str, id: &str) {
        if let Ok(mut index) = self.by_user.lock() {
            if let Some(set) = index.get_mut(user_id) {
                set.remove(id);
                if set.is_empty() {
                    index.remove(user_id);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delivery::testing::RecordingPresenter;
    use crate::timer::testing::ManualTimer;

    struct Fixture {
        scheduler: Arc<ForegroundScheduler>,
        presenter: Arc<RecordingPresenter>,
        timer: Arc<ManualTimer>,
        receiver: Option<tokio::sync::mpsc::Receiver<SchedulerMessage>>,
    }

    /// `delegation` controls whether the background receiver stays alive.
    fn fixture(delegation: bool) -> Fixture {
        let (messenger, receiver) = Messenger::channel();
        let presenter = Arc::new(RecordingPresenter::new());
        let timer = Arc::new(ManualTimer::new());
        let scheduler = Arc::new(ForegroundScheduler::new(
            messenger,
            presenter.clone(),
            timer.clone(),
        ));
        Fixture {
            scheduler,
            presenter,
            timer,
            receiver: delegation.then_some(receiver),
        }
    }

    fn in_two_hours() -> DateTime<Utc> {
        Utc::now() + chrono::Duration::hours(2)
    }

    #[test]
    fn test_successful_delegation_skips_local_timer() {
        let mut fx = fixture(true);
        fx.scheduler.schedule_streak_reminder("u1", in_two_hours());

        assert_eq!(fx.timer.armed(), 0, "durable path is authoritative");
        let message = fx.receiver.as_mut().unwrap().try_recv().unwrap();
        match message {
            SchedulerMessage::ScheduleRequest(record) => {
                assert_eq!(record.kind, NotificationKind::StreakReminder);
                assert_eq!(record.user_id, "u1");
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_delegation_failure_falls_back_to_memory_timer() {
        let fx = fixture(false);
        fx.scheduler.schedule_quiz_reminder("u1", in_two_hours());

        assert_eq!(fx.timer.armed(), 1);
        fx.timer.fire_all();
        assert_eq!(fx.presenter.rendered_tags(), vec!["quiz_reminder"]);
        assert_eq!(fx.scheduler.armed_timers(), 0, "fired timer removed from map");
    }

    #[test]
    fn test_cancel_notification_prevents_fire() {
        let fx = fixture(false);
        let when = in_two_hours();
        fx.scheduler.schedule_heart_recovery("u1", when);

        let id = crate::types::notification_id(NotificationKind::HeartRecovery, "u1", when);
        fx.scheduler.cancel_notification(&id);

        fx.timer.fire_all();
        assert_eq!(fx.presenter.render_count(), 0);
        assert_eq!(fx.scheduler.armed_timers(), 0);
    }

    #[test]
    fn test_cancel_all_for_user_spares_other_users() {
        let fx = fixture(false);
        fx.scheduler.schedule_streak_reminder("alice", in_two_hours());
        fx.scheduler.schedule_quiz_reminder("alice", in_two_hours());
        fx.scheduler.schedule_streak_reminder("bob", in_two_hours());

        fx.scheduler.cancel_all_user_notifications("alice");

        fx.timer.fire_all();
        assert_eq!(fx.presenter.render_count(), 1, "only bob's reminder fires");
        assert_eq!(fx.presenter.rendered_tags(), vec!["streak_reminder"]);
    }

    #[test]
    fn test_index_keys_are_exact_no_substring_matches() {
        // "al" must not catch "alice" the way the old substring filter did
        let fx = fixture(false);
        fx.scheduler.schedule_streak_reminder("alice", in_two_hours());

        fx.scheduler.cancel_all_user_notifications("al");

        assert_eq!(fx.timer.armed(), 1, "alice's timer untouched");
    }

    #[test]
    fn test_badge_renders_immediately_without_persisting() {
        let mut fx = fixture(true);
        fx.scheduler.notify_badge_earned(&BadgeEvent {
            name: "First Cork".to_string(),
            icon: "🏅".to_string(),
        });

        assert_eq!(fx.presenter.rendered_tags(), vec!["badge_earned"]);
        assert_eq!(fx.timer.armed(), 0);
        assert!(
            fx.receiver.as_mut().unwrap().try_recv().is_err(),
            "badge events are never delegated or persisted"
        );
        let rendered = fx.presenter.rendered.lock().unwrap();
        assert_eq!(rendered[0].data.url, "/profile");
    }

    #[test]
    fn test_permission_denied_is_a_noop() {
        let (messenger, mut receiver) = Messenger::channel();
        let presenter = Arc::new(RecordingPresenter::denied());
        let timer = Arc::new(ManualTimer::new());
        let scheduler = Arc::new(ForegroundScheduler::new(
            messenger,
            presenter.clone(),
            timer.clone(),
        ));

        scheduler.schedule_streak_reminder("u1", in_two_hours());
        scheduler.notify_badge_earned(&BadgeEvent {
            name: "First Cork".to_string(),
            icon: "🏅".to_string(),
        });

        assert_eq!(timer.armed(), 0);
        assert_eq!(presenter.render_count(), 0);
        assert!(receiver.try_recv().is_err());
    }

    #[test]
    fn test_successful_delegation_clears_stale_fallback_timer() {
        let mut fx = fixture(true);
        let when = in_two_hours();

        // Saturate the channel so the first attempt falls back to memory
        for _ in 0..64 {
            fx.scheduler.update_settings(NotificationSettings::default());
        }
        fx.scheduler.schedule_streak_reminder("u1", when);
        assert_eq!(fx.timer.armed(), 1, "full channel forces the fallback");

        // Background catches up; the same slot delegates cleanly
        let receiver = fx.receiver.as_mut().unwrap();
        while receiver.try_recv().is_ok() {}
        fx.scheduler.schedule_streak_reminder("u1", when);

        assert_eq!(fx.timer.armed(), 0, "stale fallback timer is cancelled");
        fx.timer.fire_all();
        assert_eq!(fx.presenter.render_count(), 0);
    }

    #[test]
    fn test_past_due_fallback_is_dropped() {
        let fx = fixture(false);
        fx.scheduler
            .schedule_streak_reminder("u1", Utc::now() - chrono::Duration::minutes(1));
        assert_eq!(fx.timer.armed(), 0);
    }

    #[test]
    fn test_memory_recall_carries_wine_route() {
        let fx = fixture(false);
        fx.scheduler
            .schedule_memory_recall("u1", "abc", in_two_hours());

        fx.timer.fire_all();
        let rendered = fx.presenter.rendered.lock().unwrap();
        assert_eq!(rendered[0].data.url, "/wine-detail/abc");
    }

    #[test]
    fn test_settings_update_is_forwarded() {
        let mut fx = fixture(true);
        fx.scheduler.update_settings(NotificationSettings::default());
        match fx.receiver.as_mut().unwrap().try_recv().unwrap() {
            SchedulerMessage::SettingsUpdate(_) => {}
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_schedule_daily_plan_delegates_all_drafts() {
        use rand::SeedableRng;

        let mut fx = fixture(true);
        let mut rng = rand::rngs::StdRng::seed_from_u64(7);
        let settings = NotificationSettings::default();
        fx.scheduler
            .schedule_daily_plan(&settings, "u1", Utc::now(), &mut rng);

        let receiver = fx.receiver.as_mut().unwrap();
        let mut delegated = 0;
        while let Ok(message) = receiver.try_recv() {
            assert!(matches!(message, SchedulerMessage::ScheduleRequest(_)));
            delegated += 1;
        }
        // streak + 2-3 quizzes + recall
        assert!((4..=5).contains(&delegated), "got {} drafts", delegated);
        assert_eq!(fx.timer.armed(), 0);
    }
}
