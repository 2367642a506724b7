use std::{
    thread::{self, JoinHandle},
    time::Duration,
};

use crossbeam_channel::Sender;
use log::{error, warn};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Urgency {
    #[default]
    Normal,
    Critical,
}

/// what gets shown when an alarm starts ringing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub message: String,
    pub urgency: Urgency,
    /// how long the surface should keep it up
    pub duration: Duration,
}

/// Somewhere to show notifications. Failures are reported but nothing in the
/// engine depends on a notification being seen.
pub trait Notifier: Send {
    fn notify(&self, notification: &Notification) -> Result<()>;
}

/// writes notifications to the log
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notification: &Notification) -> Result<()> {
        warn!("{}: {}", notification.title, notification.message);
        Ok(())
    }
}

/// desktop notifications through the platform notification service
#[derive(Debug, Clone)]
pub struct DesktopNotifier {
    app_name: String,
}

impl DesktopNotifier {
    #[must_use]
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
        }
    }
}

impl Notifier for DesktopNotifier {
    fn notify(&self, notification: &Notification) -> Result<()> {
        let timeout = u32::try_from(notification.duration.as_millis()).unwrap_or(u32::MAX);
        let mut desktop = notify_rust::Notification::new();
        desktop
            .summary(&notification.title)
            .body(&notification.message)
            .appname(&self.app_name)
            .icon("alarm-clock")
            .timeout(notify_rust::Timeout::Milliseconds(timeout));
        #[cfg(all(unix, not(target_os = "macos")))]
        desktop.urgency(match notification.urgency {
            Urgency::Normal => notify_rust::Urgency::Normal,
            Urgency::Critical => notify_rust::Urgency::Critical,
        });
        desktop
            .show()
            .map_err(|e| Error::Notification(e.to_string()))?;
        Ok(())
    }
}

/// Sends to every notifier in turn. One failing doesn't keep the rest from
/// showing it.
impl Notifier for Vec<Box<dyn Notifier>> {
    fn notify(&self, notification: &Notification) -> Result<()> {
        for notifier in self {
            if let Err(e) = notifier.notify(notification) {
                error!("notification failed: {e}");
            }
        }
        Ok(())
    }
}

/// Shows notifications on a thread of its own, so `notify` returns as soon
/// as the notification is queued. Dropping it waits for the queue to drain.
#[derive(Debug)]
pub struct BackgroundNotifier {
    sender: Option<Sender<Notification>>,
    thread: Option<JoinHandle<()>>,
}

impl BackgroundNotifier {
    pub fn spawn(notifier: impl Notifier + 'static) -> Result<Self> {
        let (sender, receiver) = crossbeam_channel::unbounded::<Notification>();
        let thread = thread::Builder::new()
            .name("alarm-notify".to_string())
            .spawn(move || {
                for notification in &receiver {
                    if let Err(e) = notifier.notify(&notification) {
                        error!("notification failed: {e}");
                    }
                }
            })?;
        Ok(Self {
            sender: Some(sender),
            thread: Some(thread),
        })
    }
}

impl Notifier for BackgroundNotifier {
    fn notify(&self, notification: &Notification) -> Result<()> {
        self.sender
            .as_ref()
            .ok_or_else(|| Error::Notification("notification thread is gone".to_string()))?
            .send(notification.clone())
            .map_err(|_| Error::Notification("notification thread is gone".to_string()))
    }
}

impl Drop for BackgroundNotifier {
    fn drop(&mut self) {
        self.sender.take();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("notification thread panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::*;

    struct Failing;

    impl Notifier for Failing {
        fn notify(&self, _notification: &Notification) -> Result<()> {
            Err(Error::Notification("no display".to_string()))
        }
    }

    struct Counting(Arc<Mutex<usize>>);

    impl Notifier for Counting {
        fn notify(&self, _notification: &Notification) -> Result<()> {
            *self.0.lock() += 1;
            Ok(())
        }
    }

    /// waits for a go-ahead before each notification
    struct Gated {
        gate: crossbeam_channel::Receiver<()>,
        shown: Arc<Mutex<usize>>,
    }

    impl Notifier for Gated {
        fn notify(&self, _notification: &Notification) -> Result<()> {
            self.gate
                .recv()
                .map_err(|_| Error::Notification("gate closed".to_string()))?;
            *self.shown.lock() += 1;
            Ok(())
        }
    }

    fn alarm_notification() -> Notification {
        Notification {
            title: "Alarm!".to_string(),
            message: "tea".to_string(),
            urgency: Urgency::Critical,
            duration: Duration::from_secs(60),
        }
    }

    #[test]
    fn should_not_wait_for_a_slow_notifier() {
        let (open, gate) = crossbeam_channel::unbounded();
        let shown = Arc::new(Mutex::new(0));
        let background = BackgroundNotifier::spawn(Gated {
            gate,
            shown: shown.clone(),
        })
        .unwrap();

        // returns while the notifier is still blocked
        assert!(background.notify(&alarm_notification()).is_ok());
        assert!(background.notify(&alarm_notification()).is_ok());
        assert_eq!(*shown.lock(), 0);

        open.send(()).unwrap();
        open.send(()).unwrap();
        drop(background);
        assert_eq!(*shown.lock(), 2);
    }

    #[test]
    fn should_keep_fanning_out_after_failure() {
        let count = Arc::new(Mutex::new(0));
        let notifiers: Vec<Box<dyn Notifier>> = vec![
            Box::new(Failing),
            Box::new(Counting(count.clone())),
            Box::new(LogNotifier),
        ];
        assert!(notifiers.notify(&alarm_notification()).is_ok());
        assert_eq!(*count.lock(), 1);
    }
}
