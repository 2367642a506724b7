//! Pure predicates deciding whether an alarm should go off at a given instant.
//!
//! Neither predicate mutates the alarm. Updating `last_triggered` after an
//! interval alarm fires is up to the caller.

use chrono::{DateTime, Datelike, Duration, Local, Timelike};

use crate::alarm::{IntervalAlarm, TimeAlarm};

/// A time alarm only matches during the first seconds of its minute. The poll
/// runs about once a second, so without this the alarm would match for the
/// whole minute.
pub const FIRING_WINDOW_SECS: u32 = 10;

/// `true` on the alarm's weekdays, at its hour and minute, before second
/// [`FIRING_WINDOW_SECS`].
#[must_use]
pub fn time_alarm_due(alarm: &TimeAlarm, now: &DateTime<Local>) -> bool {
    if !alarm.enabled {
        return false;
    }
    let today = u8::try_from(now.weekday().num_days_from_sunday()).unwrap_or(u8::MAX);
    if !alarm.days.contains(&today) {
        return false;
    }
    now.hour() == alarm.time.hour()
        && now.minute() == alarm.time.minute()
        && now.second() < FIRING_WINDOW_SECS
}

/// `true` once at least the configured period has elapsed since the alarm
/// last fired. Alarms with no baseline or a zero period never fire.
#[must_use]
pub fn interval_alarm_due(alarm: &IntervalAlarm, now: &DateTime<Local>) -> bool {
    if !alarm.enabled {
        return false;
    }
    let Some(last_triggered) = alarm.last_triggered else {
        return false;
    };
    let total_minutes = alarm.total_minutes();
    if total_minutes == 0 {
        return false;
    }
    let period = i64::try_from(total_minutes)
        .ok()
        .and_then(Duration::try_minutes);
    // a period too large to represent never elapses
    period.is_some_and(|period| now.signed_duration_since(last_triggered) >= period)
}
