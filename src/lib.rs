#![warn(clippy::pedantic, clippy::nursery, clippy::cargo)]
#![deny(clippy::use_self, rust_2018_idioms)]
#![allow(clippy::multiple_crate_versions, clippy::module_name_repetitions)]

//! Interval and time-of-day alarms: storage, evaluation and the single
//! ringing alarm.

pub mod alarm;
pub mod communication;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod notify;
pub mod playback;
mod record;
pub mod scheduler;
pub mod sound;
pub mod store;
pub mod time_source;
pub mod trigger;

pub use alarm::{Alarm, AlarmId, IntervalAlarm, TimeAlarm};
pub use error::{Error, Result};
pub use scheduler::{AlarmEngine, Scheduler, SharedEngine};
pub use store::{AlarmStore, FileStore, KeyValueStore, MemoryStore, StoreLock};
pub use trigger::{ControllerState, TriggerController};

/// parses `HH:MM` (or `HH:MM:SS`) as typed by a user
pub fn parse_time_of_day(text: &str) -> Result<chrono::NaiveTime> {
    record::parse_time_of_day(text).ok_or_else(|| Error::InvalidTime(text.to_string()))
}
