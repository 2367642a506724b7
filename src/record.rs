//! On-disk shape of the alarm collections.
//!
//! Each collection is a TOML document `alarms = [...]` whose records use the
//! camelCase field names of the storage layout. Reading is lenient: a record
//! that can't be used is skipped and an unreadable `lastTriggered` becomes
//! null, so a damaged file never stops the alarms from loading.

use std::collections::HashSet;

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat, TimeZone};
use log::warn;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::{
    alarm::{normalize_days, AlarmId, IntervalAlarm, TimeAlarm},
    config::always_true,
    error::Result,
};

#[derive(Debug, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
struct Document<T> {
    #[serde(default)]
    alarms: Vec<T>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IntervalAlarmRecord {
    id: String,
    #[serde(default)]
    hours: u32,
    #[serde(default)]
    minutes: u32,
    #[serde(default = "always_true")]
    enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    last_triggered: Option<toml::Value>,
    #[serde(default)]
    sound: String,
    #[serde(default)]
    label: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TimeAlarmRecord {
    id: String,
    time: toml::Value,
    #[serde(default = "always_true")]
    enabled: bool,
    #[serde(default)]
    days: Vec<i64>,
    #[serde(default)]
    sound: String,
    #[serde(default)]
    label: String,
}

fn format_timestamp(timestamp: &DateTime<Local>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::AutoSi, false)
}

fn parse_timestamp(value: &toml::Value) -> Option<DateTime<Local>> {
    let text = value.as_str()?;
    DateTime::parse_from_rfc3339(text)
        .ok()
        .map(|timestamp| timestamp.with_timezone(&Local))
}

/// The time of day is stored as a full timestamp on a fixed reference date.
fn format_time_of_day(time: NaiveTime) -> String {
    let anchor = NaiveDate::from_ymd_opt(1970, 1, 1).map(|date| date.and_time(time));
    match anchor.and_then(|naive| Local.from_local_datetime(&naive).earliest()) {
        Some(timestamp) => format_timestamp(&timestamp),
        None => time.format("%H:%M:%S").to_string(),
    }
}

/// Accepts RFC 3339 timestamps, naive datetimes and bare `HH:MM[:SS]`.
pub(crate) fn parse_time_of_day(text: &str) -> Option<NaiveTime> {
    let text = text.trim();
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(text) {
        return Some(timestamp.with_timezone(&Local).time());
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .map(|naive| naive.time())
        .or_else(|| {
            ["%H:%M:%S", "%H:%M"]
                .iter()
                .find_map(|format| NaiveTime::parse_from_str(text, format).ok())
        })
}

impl From<&IntervalAlarm> for IntervalAlarmRecord {
    fn from(alarm: &IntervalAlarm) -> Self {
        Self {
            id: alarm.id.to_string(),
            hours: alarm.hours,
            minutes: alarm.minutes,
            enabled: alarm.enabled,
            last_triggered: alarm
                .last_triggered
                .as_ref()
                .map(|timestamp| toml::Value::String(format_timestamp(timestamp))),
            sound: alarm.sound.clone(),
            label: alarm.label.clone(),
        }
    }
}

impl IntervalAlarmRecord {
    fn into_alarm(self) -> IntervalAlarm {
        let last_triggered = self.last_triggered.as_ref().and_then(|value| {
            let parsed = parse_timestamp(value);
            if parsed.is_none() {
                warn!(
                    "interval alarm {}: unreadable lastTriggered {value}, treating as unset",
                    self.id
                );
            }
            parsed
        });
        IntervalAlarm {
            id: AlarmId::from(self.id),
            hours: self.hours,
            minutes: self.minutes,
            enabled: self.enabled,
            last_triggered,
            sound: self.sound,
            label: self.label,
        }
    }
}

impl From<&TimeAlarm> for TimeAlarmRecord {
    fn from(alarm: &TimeAlarm) -> Self {
        Self {
            id: alarm.id.to_string(),
            time: toml::Value::String(format_time_of_day(alarm.time)),
            enabled: alarm.enabled,
            days: alarm.days.iter().map(|day| i64::from(*day)).collect(),
            sound: alarm.sound.clone(),
            label: alarm.label.clone(),
        }
    }
}

impl TimeAlarmRecord {
    fn into_alarm(self) -> Option<TimeAlarm> {
        let Some(time) = self.time.as_str().and_then(parse_time_of_day) else {
            warn!("time alarm {}: unreadable time {}, skipping", self.id, self.time);
            return None;
        };
        let days = normalize_days(
            self.days
                .into_iter()
                .filter_map(|day| u8::try_from(day).ok()),
        );
        Some(TimeAlarm {
            id: AlarmId::from(self.id),
            time,
            enabled: self.enabled,
            days,
            sound: self.sound,
            label: self.label,
        })
    }
}

/// Parses the records of a collection document one by one, so a bad record
/// only costs that record.
fn read_records<T: DeserializeOwned>(kind: &str, text: &str) -> Vec<T> {
    let document: Document<toml::Value> = match toml::from_str(text) {
        Ok(document) => document,
        Err(e) => {
            warn!("couldn't parse stored {kind} alarms, starting empty: {e}");
            return vec![];
        }
    };
    document
        .alarms
        .into_iter()
        .enumerate()
        .filter_map(|(index, value)| match value.try_into::<T>() {
            Ok(record) => Some(record),
            Err(e) => {
                warn!("skipping stored {kind} alarm #{index}: {e}");
                None
            }
        })
        .collect()
}

/// drops every alarm whose id was already seen, keeping the first
fn dedup_by_id<T>(kind: &str, alarms: Vec<T>, id: impl Fn(&T) -> &AlarmId) -> Vec<T> {
    let mut seen = HashSet::new();
    alarms
        .into_iter()
        .filter(|alarm| {
            let fresh = seen.insert(id(alarm).clone());
            if !fresh {
                warn!("dropping {kind} alarm with duplicate id {}", id(alarm));
            }
            fresh
        })
        .collect()
}

pub fn encode_interval_alarms(alarms: &[IntervalAlarm]) -> Result<String> {
    let document = Document {
        alarms: alarms.iter().map(IntervalAlarmRecord::from).collect(),
    };
    Ok(toml::to_string(&document)?)
}

pub fn encode_time_alarms(alarms: &[TimeAlarm]) -> Result<String> {
    let document = Document {
        alarms: alarms.iter().map(TimeAlarmRecord::from).collect(),
    };
    Ok(toml::to_string(&document)?)
}

#[must_use]
pub fn decode_interval_alarms(text: &str) -> Vec<IntervalAlarm> {
    let alarms: Vec<IntervalAlarm> = read_records::<IntervalAlarmRecord>("interval", text)
        .into_iter()
        .map(IntervalAlarmRecord::into_alarm)
        .collect();
    dedup_by_id("interval", alarms, |alarm| &alarm.id)
}

#[must_use]
pub fn decode_time_alarms(text: &str) -> Vec<TimeAlarm> {
    let alarms: Vec<TimeAlarm> = read_records::<TimeAlarmRecord>("time", text)
        .into_iter()
        .filter_map(TimeAlarmRecord::into_alarm)
        .collect();
    dedup_by_id("time", alarms, |alarm| &alarm.id)
}

#[cfg(test)]
mod tests {
    use chrono::Timelike;

    use super::*;

    fn sample_interval(last_triggered: Option<DateTime<Local>>) -> IntervalAlarm {
        IntervalAlarm {
            id: AlarmId::from("k3j9x1a"),
            hours: 1,
            minutes: 15,
            enabled: false,
            last_triggered,
            sound: "alarm2".to_string(),
            label: "stretch".to_string(),
        }
    }

    fn sample_time() -> TimeAlarm {
        TimeAlarm {
            id: AlarmId::from("q8w2e4r"),
            time: NaiveTime::from_hms_opt(6, 45, 0).unwrap(),
            enabled: true,
            days: normalize_days([1, 2, 3, 4, 5]),
            sound: "alarm1".to_string(),
            label: String::new(),
        }
    }

    #[test]
    fn should_round_trip_interval_alarms() {
        let now = Local::now();
        let mut alarms = vec![sample_interval(Some(now)), sample_interval(None)];
        alarms[1].id = AlarmId::from("other");
        let text = encode_interval_alarms(&alarms).unwrap();
        assert_eq!(decode_interval_alarms(&text), alarms);
    }

    #[test]
    fn should_omit_null_last_triggered() {
        let text = encode_interval_alarms(&[sample_interval(None)]).unwrap();
        assert!(!text.contains("lastTriggered"));
        assert!(text.contains("id = \"k3j9x1a\""));
    }

    #[test]
    fn should_round_trip_time_alarms() {
        let alarms = vec![sample_time()];
        let text = encode_time_alarms(&alarms).unwrap();
        assert_eq!(decode_time_alarms(&text), alarms);
    }

    #[test]
    fn should_round_trip_empty_collections() {
        assert!(decode_interval_alarms(&encode_interval_alarms(&[]).unwrap()).is_empty());
        assert!(decode_time_alarms(&encode_time_alarms(&[]).unwrap()).is_empty());
    }

    #[test]
    fn should_null_malformed_last_triggered() {
        let text = r#"
            [[alarms]]
            id = "a"
            hours = 0
            minutes = 5
            enabled = true
            lastTriggered = "yesterday-ish"
            sound = "alarm1"
            label = ""

            [[alarms]]
            id = "b"
            minutes = 5
            lastTriggered = 42
        "#;
        let alarms = decode_interval_alarms(text);
        assert_eq!(alarms.len(), 2);
        assert!(alarms.iter().all(|alarm| alarm.last_triggered.is_none()));
        assert!(alarms[1].enabled);
        assert_eq!(alarms[1].hours, 0);
    }

    #[test]
    fn should_skip_unusable_records() {
        let text = r#"
            [[alarms]]
            hours = 1

            [[alarms]]
            id = "ok"
            hours = "two"

            [[alarms]]
            id = "kept"
            minutes = 10
        "#;
        let alarms = decode_interval_alarms(text);
        assert_eq!(alarms.len(), 1);
        assert_eq!(alarms[0].id.as_str(), "kept");
    }

    #[test]
    fn should_skip_time_alarm_with_bad_time() {
        let text = r#"
            [[alarms]]
            id = "bad"
            time = "quarter past"
            days = [1]

            [[alarms]]
            id = "good"
            time = "07:30"
            days = [1, 9, -1]
        "#;
        let alarms = decode_time_alarms(text);
        assert_eq!(alarms.len(), 1);
        assert_eq!(alarms[0].time, NaiveTime::from_hms_opt(7, 30, 0).unwrap());
        assert_eq!(alarms[0].days, normalize_days([1]));
    }

    #[test]
    fn should_start_empty_on_garbage() {
        assert!(decode_interval_alarms("this is [not toml").is_empty());
        assert!(decode_time_alarms("alarms = 3").is_empty());
    }

    #[test]
    fn should_keep_first_of_duplicate_ids() {
        let text = r#"
            [[alarms]]
            id = "dup"
            minutes = 1

            [[alarms]]
            id = "dup"
            minutes = 2
        "#;
        let alarms = decode_interval_alarms(text);
        assert_eq!(alarms.len(), 1);
        assert_eq!(alarms[0].minutes, 1);
    }

    #[test]
    fn should_read_times_in_several_shapes() {
        for text in ["08:15", "08:15:00", "2023-11-02T08:15:00", "2023-11-02T08:15"] {
            let time = parse_time_of_day(text).unwrap();
            assert_eq!((time.hour(), time.minute()), (8, 15), "{text}");
        }
        let stamped = format_time_of_day(NaiveTime::from_hms_opt(8, 15, 0).unwrap());
        assert_eq!(parse_time_of_day(&stamped), NaiveTime::from_hms_opt(8, 15, 0));
        assert!(parse_time_of_day("25:00").is_none());
    }
}
