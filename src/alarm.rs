use std::{borrow::Borrow, collections::BTreeSet, fmt};

use chrono::{DateTime, Local, NaiveTime};
use uuid::Uuid;

use crate::evaluator;

pub const DAYS_IN_WEEK: u8 = 7;

const DAY_NAMES: [&str; DAYS_IN_WEEK as usize] = [
    "Sunday",
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
];

/// full name of a weekday index (0 is sunday), empty for anything out of range
#[must_use]
pub fn day_name(index: u8) -> &'static str {
    DAY_NAMES.get(usize::from(index)).copied().unwrap_or_default()
}

/// three letter name of a weekday index (0 is sunday), empty for anything out of range
#[must_use]
pub fn short_day_name(index: u8) -> &'static str {
    day_name(index).get(..3).unwrap_or_default()
}

/// keeps only valid weekday indices
pub fn normalize_days(days: impl IntoIterator<Item = u8>) -> BTreeSet<u8> {
    days.into_iter().filter(|day| *day < DAYS_IN_WEEK).collect()
}

/// Opaque alarm identifier.
///
/// Freshly generated ids are short random hex strings, but any string read
/// back from storage is accepted as is.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AlarmId(String);

impl AlarmId {
    #[must_use]
    pub fn generate() -> Self {
        let mut id = Uuid::new_v4().simple().to_string();
        id.truncate(8);
        Self(id)
    }

    /// draws ids until one is not `taken`
    pub fn generate_unique(taken: impl Fn(&Self) -> bool) -> Self {
        loop {
            let id = Self::generate();
            if !taken(&id) {
                return id;
            }
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AlarmId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for AlarmId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for AlarmId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl Borrow<str> for AlarmId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// An alarm that goes off every `hours`:`minutes` counted from its last firing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntervalAlarm {
    pub id: AlarmId,
    pub hours: u32,
    /// clamped to 0..=59 when the alarm is created, not afterwards
    pub minutes: u32,
    pub enabled: bool,
    /// without a baseline the alarm never fires
    pub last_triggered: Option<DateTime<Local>>,
    pub sound: String,
    pub label: String,
}

impl IntervalAlarm {
    #[must_use]
    pub const fn total_minutes(&self) -> u64 {
        self.hours as u64 * 60 + self.minutes as u64
    }

    /// short description used when the alarm has no label
    #[must_use]
    pub fn describe(&self) -> String {
        format!("Interval Alarm ({}h {}m)", self.hours, self.minutes)
    }
}

fn plural(count: u32, unit: &str) -> String {
    if count == 1 {
        format!("{count} {unit}")
    } else {
        format!("{count} {unit}s")
    }
}

impl fmt::Display for IntervalAlarm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.hours, self.minutes) {
            (0, 0) => f.write_str("Invalid interval"),
            (hours, 0) => write!(f, "Every {}", plural(hours, "hour")),
            (0, minutes) => write!(f, "Every {}", plural(minutes, "minute")),
            (hours, minutes) => write!(
                f,
                "Every {} and {}",
                plural(hours, "hour"),
                plural(minutes, "minute")
            ),
        }
    }
}

/// An alarm that goes off at a time of day on selected weekdays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeAlarm {
    pub id: AlarmId,
    /// only the hour and minute matter
    pub time: NaiveTime,
    pub enabled: bool,
    /// weekday indices, 0 is sunday
    pub days: BTreeSet<u8>,
    pub sound: String,
    pub label: String,
}

impl TimeAlarm {
    #[must_use]
    pub fn every_day(&self) -> bool {
        self.days.len() == usize::from(DAYS_IN_WEEK)
    }

    /// the day list as the alarm list shows it
    #[must_use]
    pub fn days_summary(&self) -> String {
        if self.every_day() {
            "Every day".to_string()
        } else {
            self.short_day_names()
        }
    }

    fn short_day_names(&self) -> String {
        self.days
            .iter()
            .map(|day| short_day_name(*day))
            .collect::<Vec<_>>()
            .join(", ")
    }

    #[must_use]
    pub fn describe(&self) -> String {
        format!("Time Alarm ({})", self.time.format("%-I:%M:%S %p"))
    }
}

impl fmt::Display for TimeAlarm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.time.format("%I:%M %p"))?;
        if !self.days.is_empty() {
            write!(f, " ({})", self.short_day_names())?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Alarm {
    Interval(IntervalAlarm),
    Time(TimeAlarm),
}

impl Alarm {
    #[must_use]
    pub const fn id(&self) -> &AlarmId {
        match self {
            Self::Interval(alarm) => &alarm.id,
            Self::Time(alarm) => &alarm.id,
        }
    }

    #[must_use]
    pub fn sound(&self) -> &str {
        match self {
            Self::Interval(alarm) => &alarm.sound,
            Self::Time(alarm) => &alarm.sound,
        }
    }

    #[must_use]
    pub fn label(&self) -> &str {
        match self {
            Self::Interval(alarm) => &alarm.label,
            Self::Time(alarm) => &alarm.label,
        }
    }

    #[must_use]
    pub fn is_due(&self, now: &DateTime<Local>) -> bool {
        match self {
            Self::Interval(alarm) => evaluator::interval_alarm_due(alarm, now),
            Self::Time(alarm) => evaluator::time_alarm_due(alarm, now),
        }
    }

    /// the label, or a description of the alarm when it has none
    #[must_use]
    pub fn headline(&self) -> String {
        if !self.label().is_empty() {
            return self.label().to_string();
        }
        match self {
            Self::Interval(alarm) => alarm.describe(),
            Self::Time(alarm) => alarm.describe(),
        }
    }
}

impl From<IntervalAlarm> for Alarm {
    fn from(alarm: IntervalAlarm) -> Self {
        Self::Interval(alarm)
    }
}

impl From<TimeAlarm> for Alarm {
    fn from(alarm: TimeAlarm) -> Self {
        Self::Time(alarm)
    }
}
