//! The alarm engine and the tick that drives it.
//!
//! [`AlarmEngine`] owns everything with state: the stored alarms, the ringing
//! alarm and the clock. [`Scheduler`] runs [`AlarmEngine::tick`] on its own
//! thread, taking the engine lock for the whole pass so ticks never overlap
//! and mutations land between ticks. Dropping the scheduler stops that
//! thread.

use std::{
    collections::HashMap,
    sync::Arc,
    thread::{self, JoinHandle},
    time::Duration,
};

use chrono::{DateTime, Local, NaiveDateTime, NaiveTime, Timelike};
use crossbeam_channel::{select, Sender};
use log::{debug, error, info};
use parking_lot::Mutex;

use crate::{
    alarm::{Alarm, AlarmId, IntervalAlarm, TimeAlarm},
    error::Result,
    evaluator,
    store::AlarmStore,
    time_source::TimeSource,
    trigger::TriggerController,
};

pub type SharedEngine = Arc<Mutex<AlarmEngine>>;

pub struct AlarmEngine {
    store: AlarmStore,
    controller: TriggerController,
    clock: Arc<dyn TimeSource>,
    /// minute in which each time alarm last went off
    fired_in_minute: HashMap<AlarmId, NaiveDateTime>,
}

impl std::fmt::Debug for AlarmEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlarmEngine")
            .field("store", &self.store)
            .field("controller", &self.controller)
            .field("fired_in_minute", &self.fired_in_minute)
            .finish_non_exhaustive()
    }
}

fn minute_of(now: &DateTime<Local>) -> NaiveDateTime {
    let naive = now.naive_local();
    naive
        .with_second(0)
        .and_then(|minute| minute.with_nanosecond(0))
        .unwrap_or(naive)
}

impl AlarmEngine {
    #[must_use]
    pub fn new(
        store: AlarmStore,
        controller: TriggerController,
        clock: impl TimeSource + 'static,
    ) -> Self {
        Self {
            store,
            controller,
            clock: Arc::new(clock),
            fired_in_minute: HashMap::new(),
        }
    }

    #[must_use]
    pub fn shared(self) -> SharedEngine {
        Arc::new(Mutex::new(self))
    }

    #[must_use]
    pub fn now(&self) -> DateTime<Local> {
        self.clock.now()
    }

    #[must_use]
    pub fn interval_alarms(&self) -> &[IntervalAlarm] {
        self.store.interval_alarms()
    }

    #[must_use]
    pub fn time_alarms(&self) -> &[TimeAlarm] {
        self.store.time_alarms()
    }

    #[must_use]
    pub const fn active_alarm(&self) -> Option<&Alarm> {
        self.controller.active_alarm()
    }

    #[must_use]
    pub const fn controller(&self) -> &TriggerController {
        &self.controller
    }

    pub fn add_interval_alarm(
        &mut self,
        hours: u32,
        minutes: u32,
        sound: impl Into<String>,
        label: impl Into<String>,
    ) -> IntervalAlarm {
        let now = self.clock.now();
        self.store.add_interval_alarm(hours, minutes, sound, label, now)
    }

    pub fn add_time_alarm(
        &mut self,
        time: NaiveTime,
        days: impl IntoIterator<Item = u8>,
        sound: impl Into<String>,
        label: impl Into<String>,
    ) -> TimeAlarm {
        self.store.add_time_alarm(time, days, sound, label)
    }

    pub fn toggle_interval_alarm(&mut self, id: &str) -> bool {
        self.store.toggle_interval_alarm(id)
    }

    pub fn toggle_time_alarm(&mut self, id: &str) -> bool {
        self.store.toggle_time_alarm(id)
    }

    pub fn delete_interval_alarm(&mut self, id: &str) -> bool {
        self.store.delete_interval_alarm(id)
    }

    pub fn delete_time_alarm(&mut self, id: &str) -> bool {
        self.fired_in_minute.remove(id);
        self.store.delete_time_alarm(id)
    }

    pub fn stop_alarm(&mut self) {
        self.controller.stop_alarm();
    }

    /// One pass over both collections. Every match is handed to the
    /// controller, which rings the first one if nothing is ringing yet.
    ///
    /// A matching interval alarm restarts its interval even when the match is
    /// dropped. A time alarm matches at most once per minute. Returns the
    /// alarm that started ringing, if any.
    pub fn tick(&mut self) -> Option<Alarm> {
        let now = self.clock.now();
        let minute = minute_of(&now);
        self.fired_in_minute.retain(|_, fired| *fired == minute);

        let mut matched: Vec<Alarm> = self
            .store
            .interval_alarms()
            .iter()
            .filter(|alarm| evaluator::interval_alarm_due(alarm, &now))
            .cloned()
            .map(Alarm::Interval)
            .collect();
        for alarm in &matched {
            self.store.mark_triggered(alarm.id().as_str(), now);
        }

        for alarm in self.store.time_alarms() {
            if !evaluator::time_alarm_due(alarm, &now) {
                continue;
            }
            if self.fired_in_minute.contains_key(&alarm.id) {
                continue;
            }
            self.fired_in_minute.insert(alarm.id.clone(), minute);
            matched.push(Alarm::Time(alarm.clone()));
        }

        if !matched.is_empty() {
            debug!("{} alarm(s) matched at {now}", matched.len());
        }
        let mut activated = None;
        for alarm in matched {
            let candidate = alarm.clone();
            if self.controller.fire(alarm) {
                activated = Some(candidate);
            }
        }
        activated
    }
}

/// Handle to the tick thread. Stops and joins it when dropped.
#[derive(Debug)]
pub struct Scheduler {
    stop: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl Scheduler {
    /// Ticks `engine` every `period` until stopped.
    pub fn start(engine: SharedEngine, period: Duration) -> Result<Self> {
        let (stop, stopped) = crossbeam_channel::bounded::<()>(1);
        let thread = thread::Builder::new()
            .name("alarm-ticker".to_string())
            .spawn(move || {
                let ticker = crossbeam_channel::tick(period);
                info!("alarm scheduler started, ticking every {period:?}");
                loop {
                    select! {
                        recv(ticker) -> _ => {
                            engine.lock().tick();
                        }
                        // a stop message or the handle going away
                        recv(stopped) -> _ => break,
                    }
                }
                info!("alarm scheduler stopped");
            })?;
        Ok(Self {
            stop: Some(stop),
            thread: Some(thread),
        })
    }

    /// Stops ticking and waits for an in-flight tick to finish.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(stop) = self.stop.take() {
            // the thread may already be gone, dropping `stop` is enough then
            let _ = stop.try_send(());
        }
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("alarm scheduler thread panicked");
            }
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}
