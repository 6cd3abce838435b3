use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kinds of locally-scheduled notifications.
///
/// The string form doubles as the render tag: a new delivery with the same
/// tag replaces a still-visible prior one, so reminders never stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    StreakReminder,
    QuizReminder,
    BadgeEarned,
    HeartRecovery,
    WeeklySummary,
    WineMemoryRecall,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::StreakReminder => "streak_reminder",
            NotificationKind::QuizReminder => "quiz_reminder",
            NotificationKind::BadgeEarned => "badge_earned",
            NotificationKind::HeartRecovery => "heart_recovery",
            NotificationKind::WeeklySummary => "weekly_summary",
            NotificationKind::WineMemoryRecall => "wine_memory_recall",
        }
    }
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for NotificationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "streak_reminder" => Ok(NotificationKind::StreakReminder),
            "quiz_reminder" => Ok(NotificationKind::QuizReminder),
            "badge_earned" => Ok(NotificationKind::BadgeEarned),
            "heart_recovery" => Ok(NotificationKind::HeartRecovery),
            "weekly_summary" => Ok(NotificationKind::WeeklySummary),
            "wine_memory_recall" => Ok(NotificationKind::WineMemoryRecall),
            _ => Err(format!("Unknown notification kind: {}", s)),
        }
    }
}

/// Build the deterministic record id: `{kind}_{userId}_{epochMillis}`.
///
/// The composite key makes re-scheduling idempotent (same slot → same id →
/// upsert) and lets callers cancel without a lookup. The fixed `_` delimiter
/// is relied on nowhere else; user-scoped cancellation goes through the
/// structured index in the foreground scheduler.
pub fn notification_id(kind: NotificationKind, user_id: &str, scheduled_for: DateTime<Utc>) -> String {
    format!("{}_{}_{}", kind.as_str(), user_id, scheduled_for.timestamp_millis())
}

/// A notification scheduled for future delivery.
///
/// Exists in the store only while not yet delivered and not cancelled;
/// delivery and cancellation both delete the record, so the store stays
/// bounded by the daily planning cadence (~5 records per user).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledNotification {
    pub id: String,
    pub user_id: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub scheduled_for: DateTime<Utc>,
    pub title: String,
    pub body: String,
    /// Opaque payload: carries a `url` route and, for wine recall, the wine id.
    #[serde(default)]
    pub payload: HashMap<String, String>,
    #[serde(default)]
    pub sent: bool,
    pub created_at: DateTime<Utc>,
}

impl ScheduledNotification {
    /// Create a record with the deterministic composite id.
    pub fn new(
        kind: NotificationKind,
        user_id: impl Into<String>,
        scheduled_for: DateTime<Utc>,
        title: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        let user_id = user_id.into();
        Self {
            id: notification_id(kind, &user_id, scheduled_for),
            user_id,
            kind,
            scheduled_for,
            title: title.into(),
            body: body.into(),
            payload: HashMap::new(),
            sent: false,
            created_at: Utc::now(),
        }
    }

    /// Attach a payload entry (builder-style).
    pub fn with_payload(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.payload.insert(key.into(), value.into());
        self
    }

    /// The route carried in the payload, if any.
    pub fn url(&self) -> Option<&str> {
        self.payload.get("url").map(String::as_str)
    }
}

/// Do-not-disturb window, `HH:mm` local times. May span midnight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuietHours {
    pub enabled: bool,
    pub start: String,
    pub end: String,
}

impl Default for QuietHours {
    fn default() -> Self {
        Self {
            enabled: false,
            start: "22:00".to_string(),
            end: "08:00".to_string(),
        }
    }
}

/// Per-user notification preferences.
///
/// Owned and mutated by the settings collaborator; this crate only reads it
/// (daily planning, fire-time message composition).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationSettings {
    pub enabled: bool,
    #[serde(default)]
    pub types: HashMap<NotificationKind, bool>,
    #[serde(default)]
    pub quiet_hours: QuietHours,
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

fn default_timezone() -> String {
    "UTC".to_string()
}

impl Default for NotificationSettings {
    fn default() -> Self {
        let mut types = HashMap::new();
        for kind in [
            NotificationKind::StreakReminder,
            NotificationKind::QuizReminder,
            NotificationKind::BadgeEarned,
            NotificationKind::HeartRecovery,
            NotificationKind::WeeklySummary,
            NotificationKind::WineMemoryRecall,
        ] {
            types.insert(kind, true);
        }
        Self {
            enabled: true,
            types,
            quiet_hours: QuietHours::default(),
            timezone: default_timezone(),
        }
    }
}

impl NotificationSettings {
    /// Whether a kind is enabled. Absent from the map defaults to enabled.
    pub fn kind_enabled(&self, kind: NotificationKind) -> bool {
        self.enabled && *self.types.get(&kind).unwrap_or(&true)
    }
}

/// The realized act of rendering a notification. Ephemeral, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryEvent {
    pub title: String,
    pub body: String,
    /// Render tag — the kind's string form. Same tag replaces, never stacks.
    pub tag: String,
    pub data: DeliveryData,
}

/// Click-handling data carried alongside the rendered notification.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryData {
    #[serde(rename = "type")]
    pub kind: String,
    pub url: String,
}

/// Ad-hoc "badge earned" gameplay event. Rendered immediately, never stored.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BadgeEvent {
    pub name: String,
    pub icon: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_notification_id_is_deterministic() {
        let when = Utc.with_ymd_and_hms(2026, 3, 14, 19, 0, 0).unwrap();
        let a = notification_id(NotificationKind::StreakReminder, "user-1", when);
        let b = notification_id(NotificationKind::StreakReminder, "user-1", when);
        assert_eq!(a, b);
        assert_eq!(a, format!("streak_reminder_user-1_{}", when.timestamp_millis()));
    }

    #[test]
    fn test_notification_id_varies_by_kind_user_and_time() {
        let when = Utc.with_ymd_and_hms(2026, 3, 14, 19, 0, 0).unwrap();
        let base = notification_id(NotificationKind::QuizReminder, "user-1", when);
        assert_ne!(base, notification_id(NotificationKind::StreakReminder, "user-1", when));
        assert_ne!(base, notification_id(NotificationKind::QuizReminder, "user-2", when));
        assert_ne!(
            base,
            notification_id(NotificationKind::QuizReminder, "user-1", when + chrono::Duration::minutes(1))
        );
    }

    #[test]
    fn test_record_wire_shape_is_camel_case() {
        let when = Utc.with_ymd_and_hms(2026, 3, 14, 10, 30, 0).unwrap();
        let record = ScheduledNotification::new(
            NotificationKind::WineMemoryRecall,
            "user-1",
            when,
            "Remember this wine?",
            "That 2019 Barolo from last month.",
        )
        .with_payload("url", "/wine-detail/abc");

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["type"], "wine_memory_recall");
        assert_eq!(json["userId"], "user-1");
        assert!(json["scheduledFor"].as_str().unwrap().starts_with("2026-03-14T10:30:00"));
        assert_eq!(json["payload"]["url"], "/wine-detail/abc");
        assert_eq!(json["sent"], false);
    }

    #[test]
    fn test_kind_round_trips_through_str() {
        for kind in [
            NotificationKind::StreakReminder,
            NotificationKind::QuizReminder,
            NotificationKind::BadgeEarned,
            NotificationKind::HeartRecovery,
            NotificationKind::WeeklySummary,
            NotificationKind::WineMemoryRecall,
        ] {
            let parsed: NotificationKind = kind.as_str().parse().unwrap();
            assert_eq!(parsed, kind);
        }
        assert!("push_promo".parse::<NotificationKind>().is_err());
    }

    #[test]
    fn test_default_settings_enable_all_kinds() {
        let settings = NotificationSettings::default();
        assert!(settings.kind_enabled(NotificationKind::StreakReminder));
        assert!(settings.kind_enabled(NotificationKind::WineMemoryRecall));
        assert!(!settings.quiet_hours.enabled);
    }

    #[test]
    fn test_kind_enabled_respects_global_switch() {
        let mut settings = NotificationSettings::default();
        settings.enabled = false;
        assert!(!settings.kind_enabled(NotificationKind::StreakReminder));
    }
}
