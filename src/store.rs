use std::{
    collections::HashMap,
    fs::{self, OpenOptions},
    io::{self, Write},
    path::{Path, PathBuf},
};

use chrono::{DateTime, Local, NaiveTime};
use log::{debug, error, info};

use crate::{
    alarm::{normalize_days, AlarmId, IntervalAlarm, TimeAlarm},
    error::{Error, Result},
    record,
};

pub const INTERVAL_ALARMS_KEY: &str = "intervalAlarms";
pub const TIME_ALARMS_KEY: &str = "timeAlarms";

const MAX_MINUTES: u32 = 59;
const LOCK_FILE: &str = "alarms.lock";

/// Durable string storage addressed by key.
pub trait KeyValueStore: Send {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&mut self, key: &str, value: &str) -> Result<()>;
}

/// keeps each key in `<dir>/<key>.toml`
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Claims the directory for this process until the lock is dropped.
    /// Fails with [`Error::Locked`] while someone else holds it.
    pub fn lock(&self) -> Result<StoreLock> {
        StoreLock::acquire(&self.dir)
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.toml"))
    }
}

/// Exclusive write access to a [`FileStore`] directory.
///
/// Collections are written out whole, so whoever loads the alarms must hold
/// this until they are done writing them.
#[derive(Debug)]
pub struct StoreLock {
    path: PathBuf,
}

impl StoreLock {
    fn acquire(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)?;
        let path = dir.join(LOCK_FILE);
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => return Err(Error::Locked(path)),
            Err(e) => return Err(e.into()),
        };
        let lock = Self { path };
        writeln!(file, "{}", std::process::id())?;
        debug!("locked {}", lock.path.display());
        Ok(lock)
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            error!("couldn't remove {}: {e}", self.path.display());
        }
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        match fs::read_to_string(self.path(key)) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        fs::write(self.path(key), value)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    values: HashMap<String, String>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// The interval and time alarm collections, mirrored to a [`KeyValueStore`]
/// after every change.
pub struct AlarmStore {
    interval_alarms: Vec<IntervalAlarm>,
    time_alarms: Vec<TimeAlarm>,
    backend: Box<dyn KeyValueStore>,
}

impl std::fmt::Debug for AlarmStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlarmStore")
            .field("interval_alarms", &self.interval_alarms)
            .field("time_alarms", &self.time_alarms)
            .finish_non_exhaustive()
    }
}

fn load_key(backend: &dyn KeyValueStore, key: &str) -> Option<String> {
    match backend.get(key) {
        Ok(value) => value,
        Err(e) => {
            error!("couldn't read {key}: {e}");
            None
        }
    }
}

impl AlarmStore {
    /// Loads both collections from `backend`. Missing or unreadable data
    /// gives empty collections.
    pub fn open(backend: impl KeyValueStore + 'static) -> Self {
        let backend: Box<dyn KeyValueStore> = Box::new(backend);
        let interval_alarms = load_key(backend.as_ref(), INTERVAL_ALARMS_KEY)
            .map(|text| record::decode_interval_alarms(&text))
            .unwrap_or_default();
        let time_alarms = load_key(backend.as_ref(), TIME_ALARMS_KEY)
            .map(|text| record::decode_time_alarms(&text))
            .unwrap_or_default();
        info!(
            "loaded {} interval and {} time alarms",
            interval_alarms.len(),
            time_alarms.len()
        );
        Self {
            interval_alarms,
            time_alarms,
            backend,
        }
    }

    #[must_use]
    pub fn interval_alarms(&self) -> &[IntervalAlarm] {
        &self.interval_alarms
    }

    #[must_use]
    pub fn time_alarms(&self) -> &[TimeAlarm] {
        &self.time_alarms
    }

    #[must_use]
    pub fn interval_alarm(&self, id: &str) -> Option<&IntervalAlarm> {
        self.interval_alarms.iter().find(|alarm| alarm.id.as_str() == id)
    }

    #[must_use]
    pub fn time_alarm(&self, id: &str) -> Option<&TimeAlarm> {
        self.time_alarms.iter().find(|alarm| alarm.id.as_str() == id)
    }

    /// New enabled interval alarm counting from `now`. `minutes` is clamped
    /// to 59; a zero period is accepted but never fires.
    pub fn add_interval_alarm(
        &mut self,
        hours: u32,
        minutes: u32,
        sound: impl Into<String>,
        label: impl Into<String>,
        now: DateTime<Local>,
    ) -> IntervalAlarm {
        let id = AlarmId::generate_unique(|id| self.interval_alarm(id.as_str()).is_some());
        let alarm = IntervalAlarm {
            id,
            hours,
            minutes: minutes.min(MAX_MINUTES),
            enabled: true,
            last_triggered: Some(now),
            sound: sound.into(),
            label: label.into(),
        };
        debug!("adding interval alarm {}", alarm.id);
        self.interval_alarms.push(alarm.clone());
        self.persist_interval_alarms();
        alarm
    }

    /// New enabled time alarm. An empty day set is accepted but never fires.
    pub fn add_time_alarm(
        &mut self,
        time: NaiveTime,
        days: impl IntoIterator<Item = u8>,
        sound: impl Into<String>,
        label: impl Into<String>,
    ) -> TimeAlarm {
        let id = AlarmId::generate_unique(|id| self.time_alarm(id.as_str()).is_some());
        let alarm = TimeAlarm {
            id,
            time,
            enabled: true,
            days: normalize_days(days),
            sound: sound.into(),
            label: label.into(),
        };
        debug!("adding time alarm {}", alarm.id);
        self.time_alarms.push(alarm.clone());
        self.persist_time_alarms();
        alarm
    }

    /// returns whether an alarm with `id` existed
    pub fn toggle_interval_alarm(&mut self, id: &str) -> bool {
        let found = self
            .interval_alarms
            .iter_mut()
            .find(|alarm| alarm.id.as_str() == id)
            .map(|alarm| alarm.enabled = !alarm.enabled)
            .is_some();
        self.persist_interval_alarms();
        found
    }

    /// returns whether an alarm with `id` existed
    pub fn toggle_time_alarm(&mut self, id: &str) -> bool {
        let found = self
            .time_alarms
            .iter_mut()
            .find(|alarm| alarm.id.as_str() == id)
            .map(|alarm| alarm.enabled = !alarm.enabled)
            .is_some();
        self.persist_time_alarms();
        found
    }

    /// returns whether an alarm with `id` existed
    pub fn delete_interval_alarm(&mut self, id: &str) -> bool {
        let before = self.interval_alarms.len();
        self.interval_alarms.retain(|alarm| alarm.id.as_str() != id);
        self.persist_interval_alarms();
        self.interval_alarms.len() != before
    }

    /// returns whether an alarm with `id` existed
    pub fn delete_time_alarm(&mut self, id: &str) -> bool {
        let before = self.time_alarms.len();
        self.time_alarms.retain(|alarm| alarm.id.as_str() != id);
        self.persist_time_alarms();
        self.time_alarms.len() != before
    }

    /// restarts the interval of the alarm with `id` from `now`
    pub fn mark_triggered(&mut self, id: &str, now: DateTime<Local>) {
        if let Some(alarm) = self
            .interval_alarms
            .iter_mut()
            .find(|alarm| alarm.id.as_str() == id)
        {
            alarm.last_triggered = Some(now);
            self.persist_interval_alarms();
        }
    }

    // a failed write leaves the in-memory change in place, the next mutation
    // writes the whole collection again
    fn persist_interval_alarms(&mut self) {
        let result = record::encode_interval_alarms(&self.interval_alarms)
            .and_then(|text| self.backend.set(INTERVAL_ALARMS_KEY, &text));
        if let Err(e) = result {
            error!("couldn't save interval alarms: {e}");
        }
    }

    fn persist_time_alarms(&mut self) {
        let result = record::encode_time_alarms(&self.time_alarms)
            .and_then(|text| self.backend.set(TIME_ALARMS_KEY, &text));
        if let Err(e) = result {
            error!("couldn't save time alarms: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;

    fn now() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 6, 3, 9, 0, 0).unwrap()
    }

    fn seven_thirty() -> NaiveTime {
        NaiveTime::from_hms_opt(7, 30, 0).unwrap()
    }

    #[derive(Clone, Default)]
    struct SharedStore(std::sync::Arc<parking_lot::Mutex<MemoryStore>>);

    impl KeyValueStore for SharedStore {
        fn get(&self, key: &str) -> Result<Option<String>> {
            self.0.lock().get(key)
        }

        fn set(&mut self, key: &str, value: &str) -> Result<()> {
            self.0.lock().set(key, value)
        }
    }

    struct BrokenStore;

    impl KeyValueStore for BrokenStore {
        fn get(&self, _key: &str) -> Result<Option<String>> {
            Err(Error::Io(std::io::Error::other("disk on fire")))
        }

        fn set(&mut self, _key: &str, _value: &str) -> Result<()> {
            Err(Error::Io(std::io::Error::other("disk on fire")))
        }
    }

    #[test]
    fn should_create_enabled_interval_alarm_seeded_with_now() {
        let mut store = AlarmStore::open(MemoryStore::new());
        let alarm = store.add_interval_alarm(0, 1, "alarm1", "tea", now());
        assert!(alarm.enabled);
        assert_eq!(alarm.last_triggered, Some(now()));
        assert_eq!(store.interval_alarms(), &[alarm]);
    }

    #[test]
    fn should_clamp_minutes_on_creation() {
        let mut store = AlarmStore::open(MemoryStore::new());
        let alarm = store.add_interval_alarm(2, 75, "alarm1", "", now());
        assert_eq!((alarm.hours, alarm.minutes), (2, 59));
    }

    #[test]
    fn should_accept_inert_alarms() {
        let mut store = AlarmStore::open(MemoryStore::new());
        store.add_interval_alarm(0, 0, "alarm1", "", now());
        let alarm = store.add_time_alarm(seven_thirty(), [], "alarm1", "");
        assert!(alarm.days.is_empty());
        assert_eq!(store.interval_alarms().len(), 1);
        assert_eq!(store.time_alarms().len(), 1);
    }

    #[test]
    fn should_toggle_only_matching_alarm() {
        let mut store = AlarmStore::open(MemoryStore::new());
        let first = store.add_time_alarm(seven_thirty(), [1], "alarm1", "");
        let second = store.add_time_alarm(seven_thirty(), [2], "alarm1", "");
        assert!(store.toggle_time_alarm(first.id.as_str()));
        assert!(!store.time_alarm(first.id.as_str()).unwrap().enabled);
        assert!(store.time_alarm(second.id.as_str()).unwrap().enabled);
        assert!(store.toggle_time_alarm(first.id.as_str()));
        assert!(store.time_alarm(first.id.as_str()).unwrap().enabled);
    }

    #[test]
    fn should_keep_namespaces_apart() {
        let mut store = AlarmStore::open(MemoryStore::new());
        let interval = store.add_interval_alarm(0, 5, "alarm1", "", now());
        assert!(!store.toggle_time_alarm(interval.id.as_str()));
        assert!(!store.delete_time_alarm(interval.id.as_str()));
        assert!(store.interval_alarm(interval.id.as_str()).unwrap().enabled);
    }

    #[test]
    fn should_ignore_unknown_ids() {
        let mut store = AlarmStore::open(MemoryStore::new());
        let alarm = store.add_interval_alarm(0, 5, "alarm1", "", now());
        let before = store.interval_alarms().to_vec();
        assert!(!store.delete_interval_alarm("nope"));
        assert!(!store.toggle_interval_alarm("nope"));
        store.mark_triggered("nope", now() + Duration::hours(1));
        assert_eq!(store.interval_alarms(), before.as_slice());
        assert!(store.delete_interval_alarm(alarm.id.as_str()));
        assert!(store.interval_alarms().is_empty());
    }

    #[test]
    fn should_mark_triggered() {
        let mut store = AlarmStore::open(MemoryStore::new());
        let alarm = store.add_interval_alarm(0, 5, "alarm1", "", now());
        let later = now() + Duration::minutes(5);
        store.mark_triggered(alarm.id.as_str(), later);
        assert_eq!(
            store.interval_alarm(alarm.id.as_str()).unwrap().last_triggered,
            Some(later)
        );
    }

    #[test]
    fn should_persist_every_mutation() {
        let backend = SharedStore::default();
        let mut store = AlarmStore::open(backend.clone());
        let interval = store.add_interval_alarm(1, 0, "alarm2", "water", now());
        let time = store.add_time_alarm(seven_thirty(), [1, 3, 5], "alarm3", "gym");
        store.toggle_interval_alarm(interval.id.as_str());

        let reopened = AlarmStore::open(backend.clone());
        assert_eq!(reopened.interval_alarms().len(), 1);
        assert!(!reopened.interval_alarms()[0].enabled);
        assert_eq!(reopened.time_alarms(), &[time.clone()]);

        store.delete_time_alarm(time.id.as_str());
        let reopened = AlarmStore::open(backend);
        assert!(reopened.time_alarms().is_empty());
    }

    #[test]
    fn should_survive_failing_backend() {
        let mut store = AlarmStore::open(BrokenStore);
        assert!(store.interval_alarms().is_empty());
        let alarm = store.add_interval_alarm(0, 1, "alarm1", "", now());
        assert_eq!(store.interval_alarms(), &[alarm]);
    }

    #[test]
    fn should_write_files_per_key() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = AlarmStore::open(FileStore::new(dir.path().join("alarms")));
        store.add_time_alarm(seven_thirty(), [0, 6], "alarm1", "weekend");
        assert!(dir.path().join("alarms").join("timeAlarms.toml").exists());

        let reopened = AlarmStore::open(FileStore::new(dir.path().join("alarms")));
        assert_eq!(reopened.time_alarms(), store.time_alarms());
        assert!(reopened.interval_alarms().is_empty());
    }

    #[test]
    fn should_hold_the_directory_until_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("alarms"));
        let lock = store.lock().unwrap();
        assert!(store.dir().join(LOCK_FILE).exists());
        assert!(matches!(
            FileStore::new(dir.path().join("alarms")).lock(),
            Err(Error::Locked(path)) if path == store.dir().join(LOCK_FILE)
        ));

        drop(lock);
        assert!(!store.dir().join(LOCK_FILE).exists());
        assert!(store.lock().is_ok());
    }
}
