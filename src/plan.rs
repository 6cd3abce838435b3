//! Daily plan builder
//!
//! Computes tomorrow's reminder set from the user's settings: a fixed-time
//! streak nudge, two or three quiz prompts at randomized times, and one
//! "remember this wine" recall. Pure given an injected random source, so a
//! seeded rng makes the whole plan reproducible in tests. Invoked once per
//! day (session start / background wake); the deterministic record ids make
//! accidental double invocation an idempotent overwrite rather than a
//! double-booking.

use chrono::{DateTime, Duration, LocalResult, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use rand::{Rng, RngExt};

use crate::types::{NotificationKind, NotificationSettings, ScheduledNotification};

/// Streak reminder fires at 19:00 local.
const STREAK_MINUTE: u32 = 19 * 60;

/// Morning quiz window [09:00, 12:00), local minutes.
const QUIZ_MORNING_START: u32 = 9 * 60;
/// Afternoon quiz window [14:00, 17:00).
const QUIZ_AFTERNOON_START: u32 = 14 * 60;
/// Evening quiz window [18:00, 21:00), included with 50% probability.
const QUIZ_EVENING_START: u32 = 18 * 60;
/// Each quiz window spans three hours.
const QUIZ_WINDOW_MINUTES: u32 = 180;

/// Wine recall window [10:00, 20:00).
const RECALL_START: u32 = 10 * 60;
const RECALL_WINDOW_MINUTES: u32 = 600;

/// Build tomorrow's reminder records for a user.
///
/// Skips any type whose settings flag is false; globally disabled settings
/// produce an empty plan. An unknown timezone falls back to UTC. The recall
/// draft carries no wine id — the domain collaborator attaches one (and the
/// `/wine-detail/{id}` url) before scheduling.
pub fn build_daily_plan(
    settings: &NotificationSettings,
    user_id: &str,
    now: DateTime<Utc>,
    rng: &mut impl Rng,
) -> Vec<ScheduledNotification> {
    if !settings.enabled {
        return Vec::new();
    }

    let tz: Tz = settings.timezone.parse().unwrap_or_else(|_| {
        log::debug!("Plan: unknown timezone '{}', using UTC", settings.timezone);
        chrono_tz::UTC
    });
    let tomorrow = (now.with_timezone(&tz) + Duration::days(1)).date_naive();

    let mut plan = Vec::new();

    if settings.kind_enabled(NotificationKind::StreakReminder) {
        if let Some(at) = local_slot(tz, tomorrow, STREAK_MINUTE) {
            plan.push(
                ScheduledNotification::new(
                    NotificationKind::StreakReminder,
                    user_id,
                    at,
                    "Keep your streak going",
                    "Log a wine today to keep your tasting streak alive.",
                )
                .with_payload("url", "/wine-entry"),
            );
        }
    }

    if settings.kind_enabled(NotificationKind::QuizReminder) {
        let mut quiz_minutes = vec![
            QUIZ_MORNING_START + rng.random_range(0..QUIZ_WINDOW_MINUTES),
            QUIZ_AFTERNOON_START + rng.random_range(0..QUIZ_WINDOW_MINUTES),
        ];
        if rng.random_bool(0.5) {
            quiz_minutes.push(QUIZ_EVENING_START + rng.random_range(0..QUIZ_WINDOW_MINUTES));
        }
        for minute in quiz_minutes {
            if let Some(at) = local_slot(tz, tomorrow, minute) {
                plan.push(
                    ScheduledNotification::new(
                        NotificationKind::QuizReminder,
                        user_id,
                        at,
                        "Time for a quick quiz",
                        "A couple of questions to sharpen your palate memory.",
                    )
                    .with_payload("url", "/quiz"),
                );
            }
        }
    }

    if settings.kind_enabled(NotificationKind::WineMemoryRecall) {
        let minute = RECALL_START + rng.random_range(0..RECALL_WINDOW_MINUTES);
        if let Some(at) = local_slot(tz, tomorrow, minute) {
            plan.push(ScheduledNotification::new(
                NotificationKind::WineMemoryRecall,
                user_id,
                at,
                "Remember this wine?",
                "Take a moment to recall how it tasted.",
            ));
        }
    }

    plan
}

/// Resolve a local minute-of-day on a date to a UTC instant.
///
/// An ambiguous local time (DST fall-back) takes the earlier instant; a
/// nonexistent one (DST spring-forward gap) drops the slot.
fn local_slot(tz: Tz, date: NaiveDate, minute_of_day: u32) -> Option<DateTime<Utc>> {
    let naive = date.and_hms_opt(minute_of_day / 60, minute_of_day % 60, 0)?;
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => Some(dt.with_timezone(&Utc)),
        LocalResult::Ambiguous(earlier, _) => Some(earlier.with_timezone(&Utc)),
        LocalResult::None => {
            log::debug!("Plan: {} {} does not exist in {}, skipping slot", date, naive.time(), tz);
            None
        }
    }
}
