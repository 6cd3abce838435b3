//! Notification rendering and click routing
//!
//! Delivery goes through two ports: a presenter (render surface + permission
//! probe) and a navigator (focus an open page or open a new one). Both local
//! timer fires and remote/push-originated messages resolve click targets
//! through the same `resolve_route` table.

use std::collections::HashMap;

use crate::types::{DeliveryData, DeliveryEvent, NotificationKind, ScheduledNotification};

/// Fallback route for unknown or missing notification types.
const HOME_ROUTE: &str = "/";

/// Render surface for notifications.
pub trait NotificationPresenter: Send + Sync {
    /// Whether the user has granted notification permission. Public
    /// scheduling operations no-op when this is false.
    fn permission_granted(&self) -> bool;

    /// Render a notification. An event with the same tag as a still-visible
    /// one replaces it rather than stacking.
    fn render(&self, event: DeliveryEvent);
}

/// Page navigation surface for notification clicks.
pub trait Navigator: Send + Sync {
    /// Focus an already-open page and navigate it in place.
    /// Returns false when no page is open.
    fn focus_existing(&self, url: &str) -> bool;

    /// Open a new page at the route.
    fn open(&self, url: &str);
}

/// User interaction with a delivered notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickAction {
    /// Tap on the notification body.
    Open,
    /// Explicit dismiss. Performs no navigation.
    Dismiss,
}

/// Build the render event for a record.
pub fn compose(record: &ScheduledNotification) -> DeliveryEvent {
    DeliveryEvent {
        title: record.title.clone(),
        body: record.body.clone(),
        tag: record.kind.as_str().to_string(),
        data: DeliveryData {
            kind: record.kind.as_str().to_string(),
            url: resolve_route(record.kind.as_str(), &record.payload),
        },
    }
}

/// Resolve the click target for a notification type.
///
/// `wine_memory_recall` navigates to the specific wine named by the payload
/// url; everything unrecognized lands on the home route.
pub fn resolve_route(kind: &str, payload: &HashMap<String, String>) -> String {
    match kind.parse::<NotificationKind>() {
        Ok(NotificationKind::StreakReminder) => "/wine-entry".to_string(),
        Ok(NotificationKind::QuizReminder) => "/quiz".to_string(),
        Ok(NotificationKind::HeartRecovery) => "/quiz".to_string(),
        Ok(NotificationKind::BadgeEarned) => "/profile".to_string(),
        Ok(NotificationKind::WineMemoryRecall) => payload
            .get("url")
            .cloned()
            .unwrap_or_else(|| HOME_ROUTE.to_string()),
        _ => HOME_ROUTE.to_string(),
    }
}

/// Handle a user interaction with a delivered notification.
///
/// Focuses and navigates an open page when one exists; otherwise opens a new
/// page at the target route. Dismiss performs no navigation.
pub fn handle_click(
    action: ClickAction,
    kind: &str,
    payload: &HashMap<String, String>,
    navigator: &dyn Navigator,
) {
    if action == ClickAction::Dismiss {
        return;
    }

    let url = resolve_route(kind, payload);
    if navigator.focus_existing(&url) {
        return;
    }
    navigator.open(&url);
}

/// Presenter for headless operation: logs instead of rendering.
pub struct LogPresenter;

impl NotificationPresenter for LogPresenter {
    fn permission_granted(&self) -> bool {
        true
    }

    fn render(&self, event: DeliveryEvent) {
        log::info!(
            "Notification [{}]: {} — {} ({})",
            event.tag,
            event.title,
            event.body,
            event.data.url
        );
    }
}

/// Navigator for headless operation: logs the target route.
pub struct LogNavigator;

impl Navigator for LogNavigator {
    fn focus_existing(&self, _url: &str) -> bool {
        false
    }

    fn open(&self, url: &str) {
        log::info!("Navigate: {}", url);
    }
}
