//! The single ringing alarm.
//!
//! ```text
//!           fire(alarm)
//!   Idle ───────────────► Ringing(alarm)
//!    ▲                       │   fire(other): dropped
//!    └──── stop_alarm() ─────┘
//! ```
//!
//! At most one alarm rings at a time. Matches that arrive while an alarm is
//! ringing are dropped, not queued, and only the user stops a ringing alarm.

use std::time::Duration;

use log::{error, info, warn};

use crate::{
    alarm::Alarm,
    notify::{Notification, Notifier, Urgency},
    playback::{PlaybackHandle, Player},
    sound::SoundCatalog,
};

pub const NOTIFICATION_TITLE: &str = "Alarm!";

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ControllerState {
    #[default]
    Idle,
    Ringing {
        alarm: Alarm,
        /// `None` when playback couldn't be started
        playback: Option<PlaybackHandle>,
    },
}

pub struct TriggerController {
    state: ControllerState,
    sounds: SoundCatalog,
    player: Box<dyn Player>,
    notifier: Box<dyn Notifier>,
    notification_duration: Duration,
}

impl std::fmt::Debug for TriggerController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TriggerController")
            .field("state", &self.state)
            .field("sounds", &self.sounds)
            .field("notification_duration", &self.notification_duration)
            .finish_non_exhaustive()
    }
}

impl TriggerController {
    #[must_use]
    pub fn new(
        sounds: SoundCatalog,
        player: impl Player + 'static,
        notifier: impl Notifier + 'static,
    ) -> Self {
        Self {
            state: ControllerState::Idle,
            sounds,
            player: Box::new(player),
            notifier: Box::new(notifier),
            notification_duration: Duration::from_secs(60),
        }
    }

    #[must_use]
    pub fn with_notification_duration(mut self, duration: Duration) -> Self {
        self.notification_duration = duration;
        self
    }

    #[must_use]
    pub const fn state(&self) -> &ControllerState {
        &self.state
    }

    #[must_use]
    pub const fn active_alarm(&self) -> Option<&Alarm> {
        match &self.state {
            ControllerState::Idle => None,
            ControllerState::Ringing { alarm, .. } => Some(alarm),
        }
    }

    #[must_use]
    pub const fn is_ringing(&self) -> bool {
        matches!(self.state, ControllerState::Ringing { .. })
    }

    #[must_use]
    pub const fn sounds(&self) -> &SoundCatalog {
        &self.sounds
    }

    /// Starts ringing `alarm` unless something is already ringing. Returns
    /// whether `alarm` became the active alarm.
    pub fn fire(&mut self, alarm: Alarm) -> bool {
        if let ControllerState::Ringing { alarm: active, .. } = &self.state {
            info!("alarm {} matched while {} rings, dropping it", alarm.id(), active.id());
            return false;
        }

        let playback = match self.sounds.resolve(alarm.sound()) {
            Some(sound) => {
                if sound.id != alarm.sound() {
                    warn!(
                        "alarm {} has unknown sound {:?}, using {}",
                        alarm.id(),
                        alarm.sound(),
                        sound.id
                    );
                }
                match self.player.play(sound, true) {
                    Ok(handle) => Some(handle),
                    Err(e) => {
                        error!("couldn't play alarm sound: {e}");
                        None
                    }
                }
            }
            None => {
                warn!("no sounds configured, alarm {} rings silently", alarm.id());
                None
            }
        };

        let notification = Notification {
            title: NOTIFICATION_TITLE.to_string(),
            message: alarm.headline(),
            urgency: Urgency::Critical,
            duration: self.notification_duration,
        };
        if let Err(e) = self.notifier.notify(&notification) {
            error!("couldn't show notification for alarm {}: {e}", alarm.id());
        }

        info!("alarm {} ringing", alarm.id());
        self.state = ControllerState::Ringing { alarm, playback };
        true
    }

    /// Dismisses the ringing alarm, if any.
    pub fn stop_alarm(&mut self) {
        match std::mem::take(&mut self.state) {
            ControllerState::Idle => {}
            ControllerState::Ringing { alarm, playback } => {
                if let Some(handle) = playback {
                    if let Err(e) = self.player.stop(handle) {
                        error!("couldn't stop alarm sound: {e}");
                    }
                }
                info!("alarm {} stopped", alarm.id());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::NaiveTime;
    use parking_lot::Mutex;

    use super::*;
    use crate::{
        alarm::{normalize_days, AlarmId, TimeAlarm},
        error::{Error, Result},
        sound::Sound,
    };

    #[derive(Clone, Default)]
    struct Recorder {
        played: Arc<Mutex<Vec<String>>>,
        stopped: Arc<Mutex<Vec<PlaybackHandle>>>,
        notes: Arc<Mutex<Vec<Notification>>>,
        broken: bool,
    }

    impl Player for Recorder {
        fn play(&mut self, sound: &Sound, looped: bool) -> Result<PlaybackHandle> {
            assert!(looped);
            if self.broken {
                return Err(Error::Playback("no device".to_string()));
            }
            let mut played = self.played.lock();
            played.push(sound.id.clone());
            Ok(PlaybackHandle::new(played.len() as u64))
        }

        fn stop(&mut self, handle: PlaybackHandle) -> Result<()> {
            self.stopped.lock().push(handle);
            Ok(())
        }
    }

    impl Notifier for Recorder {
        fn notify(&self, notification: &Notification) -> Result<()> {
            self.notes.lock().push(notification.clone());
            Ok(())
        }
    }

    fn catalog() -> SoundCatalog {
        SoundCatalog::new(vec![
            Sound::new("alarm1", "Digital Alarm", "/tmp/a1.mp3"),
            Sound::new("alarm2", "School Bell", "/tmp/a2.mp3"),
        ])
    }

    fn alarm(id: &str, sound: &str, label: &str) -> Alarm {
        Alarm::Time(TimeAlarm {
            id: AlarmId::from(id),
            time: NaiveTime::from_hms_opt(6, 0, 0).unwrap(),
            enabled: true,
            days: normalize_days([1]),
            sound: sound.to_string(),
            label: label.to_string(),
        })
    }

    fn controller(recorder: &Recorder) -> TriggerController {
        TriggerController::new(catalog(), recorder.clone(), recorder.clone())
    }

    #[test]
    fn should_start_idle() {
        let recorder = Recorder::default();
        let controller = controller(&recorder);
        assert_eq!(controller.state(), &ControllerState::Idle);
        assert!(controller.active_alarm().is_none());
    }

    #[test]
    fn should_ring_first_alarm_and_drop_the_rest() {
        let recorder = Recorder::default();
        let mut controller = controller(&recorder);
        assert!(controller.fire(alarm("a", "alarm2", "")));
        assert!(!controller.fire(alarm("b", "alarm1", "")));
        assert_eq!(controller.active_alarm().unwrap().id().as_str(), "a");
        assert_eq!(*recorder.played.lock(), vec!["alarm2".to_string()]);
        assert_eq!(recorder.notes.lock().len(), 1);
    }

    #[test]
    fn should_fall_back_to_default_sound() {
        let recorder = Recorder::default();
        let mut controller = controller(&recorder);
        controller.fire(alarm("a", "kazoo", ""));
        assert_eq!(*recorder.played.lock(), vec!["alarm1".to_string()]);
    }

    #[test]
    fn should_notify_with_label_or_description() {
        let recorder = Recorder::default();
        let mut controller = controller(&recorder)
            .with_notification_duration(Duration::from_secs(30));
        controller.fire(alarm("a", "alarm1", "stand up"));
        controller.stop_alarm();
        controller.fire(alarm("b", "alarm1", ""));
        let notes = recorder.notes.lock();
        assert_eq!(notes[0].title, NOTIFICATION_TITLE);
        assert_eq!(notes[0].message, "stand up");
        assert_eq!(notes[0].urgency, Urgency::Critical);
        assert_eq!(notes[0].duration, Duration::from_secs(30));
        assert_eq!(notes[1].message, "Time Alarm (6:00:00 AM)");
    }

    #[test]
    fn should_ring_even_if_playback_fails() {
        let recorder = Recorder {
            broken: true,
            ..Recorder::default()
        };
        let mut controller = controller(&recorder);
        assert!(controller.fire(alarm("a", "alarm1", "")));
        assert!(matches!(
            controller.state(),
            ControllerState::Ringing { playback: None, .. }
        ));
        controller.stop_alarm();
        assert!(recorder.stopped.lock().is_empty());
        assert!(!controller.is_ringing());
    }

    #[test]
    fn should_ring_silently_without_sounds() {
        let recorder = Recorder::default();
        let mut controller =
            TriggerController::new(SoundCatalog::new(vec![]), recorder.clone(), recorder.clone());
        assert!(controller.fire(alarm("a", "alarm1", "")));
        assert!(recorder.played.lock().is_empty());
    }

    #[test]
    fn should_stop_back_to_idle() {
        let recorder = Recorder::default();
        let mut controller = controller(&recorder);
        controller.fire(alarm("a", "alarm1", ""));
        controller.stop_alarm();
        assert_eq!(controller.state(), &ControllerState::Idle);
        assert_eq!(*recorder.stopped.lock(), vec![PlaybackHandle::new(1)]);

        // stopping while idle is harmless
        controller.stop_alarm();
        assert_eq!(controller.state(), &ControllerState::Idle);
        assert!(controller.fire(alarm("b", "alarm1", "")));
    }
}
