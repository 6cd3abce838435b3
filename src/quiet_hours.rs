//! Do-not-disturb window evaluation
//!
//! Pure minute-of-day predicate over the user's quiet-hours settings.
//! Consulted at fire time by message composition — never at schedule time.

use chrono::{DateTime, Timelike, Utc};
use chrono_tz::Tz;

use crate::error::NotifyError;
use crate::types::NotificationSettings;

/// Parse an `HH:mm` string into a minute-of-day (0..=1439).
pub fn parse_hhmm(s: &str) -> Result<u32, NotifyError> {
    let (h, m) = s
        .split_once(':')
        .ok_or_else(|| NotifyError::MalformedSettings(format!("Not HH:mm: '{}'", s)))?;
    let hours: u32 = h
        .parse()
        .map_err(|_| NotifyError::MalformedSettings(format!("Bad hour in '{}'", s)))?;
    let minutes: u32 = m
        .parse()
        .map_err(|_| NotifyError::MalformedSettings(format!("Bad minute in '{}'", s)))?;
    if hours > 23 || minutes > 59 {
        return Err(NotifyError::MalformedSettings(format!(
            "Out-of-range time '{}'",
            s
        )));
    }
    Ok(hours * 60 + minutes)
}

/// Whether `now` falls inside the user's quiet hours.
///
/// When the window wraps midnight (`start > end`, e.g. 22:00–08:00) the
/// predicate is `now >= start || now < end`; the end minute itself is
/// outside the window. A non-wrapping window is inclusive on both ends.
/// Disabled settings short-circuit to false; malformed `HH:mm` strings or an
/// unknown timezone also evaluate to false (fail open).
pub fn is_in_quiet_hours(settings: &NotificationSettings, now: DateTime<Utc>) -> bool {
    if !settings.quiet_hours.enabled {
        return false;
    }

    let (start, end) = match (
        parse_hhmm(&settings.quiet_hours.start),
        parse_hhmm(&settings.quiet_hours.end),
    ) {
        (Ok(s), Ok(e)) => (s, e),
        (Err(e), _) | (_, Err(e)) => {
            log::debug!("Quiet hours disabled: {}", e);
            return false;
        }
    };

    let minute = match settings.timezone.parse::<Tz>() {
        Ok(tz) => {
            let local = now.with_timezone(&tz);
            local.hour() * 60 + local.minute()
        }
        Err(_) => {
            log::debug!(
                "Quiet hours disabled: unknown timezone '{}'",
                settings.timezone
            );
            return false;
        }
    };

    if start > end {
        // Overnight window
        minute >= start || minute < end
    } else {
        (start..=end).contains(&minute)
    }
}
