use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    sound::SoundCatalog,
};

const APPLICATION: &str = "chanticleer";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Config {
    /// how often the alarms are checked
    #[serde(default = "default_tick_millis")]
    pub tick_millis: u64,
    /// how long a ringing alarm's notification should stay up
    #[serde(default = "default_notification_secs")]
    pub notification_secs: u64,
    #[serde(default = "always_true")]
    pub desktop_notifications: bool,
    /// where alarms are stored, the platform data dir if unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
    #[serde(default)]
    pub sounds: SoundCatalog,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tick_millis: default_tick_millis(),
            notification_secs: default_notification_secs(),
            desktop_notifications: true,
            data_dir: None,
            sounds: SoundCatalog::default(),
        }
    }
}

#[inline]
#[must_use]
pub const fn always_true() -> bool {
    true
}

/// ticks faster than this are slowed down to it
pub const MIN_TICK_MILLIS: u64 = 100;

const fn default_tick_millis() -> u64 {
    1000
}

const fn default_notification_secs() -> u64 {
    60
}

fn project_dirs() -> Result<ProjectDirs> {
    ProjectDirs::from("", "", APPLICATION).ok_or(Error::NoConfigDir)
}

impl Config {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads the config at `path`. A missing or broken file gives the defaults.
    #[must_use]
    pub fn load(path: &Path) -> Self {
        match Self::try_load(path) {
            Ok(config) => config,
            Err(Error::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("no config at {}, using defaults", path.display());
                Self::default()
            }
            Err(e) => {
                warn!("couldn't load config {}: {e}, using defaults", path.display());
                Self::default()
            }
        }
    }

    pub fn try_load(path: &Path) -> Result<Self> {
        let config = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&config)?;
        if config.tick_millis < MIN_TICK_MILLIS {
            warn!(
                "tick_millis = {} is too fast, ticking every {MIN_TICK_MILLIS}ms",
                config.tick_millis
            );
        }
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let config = toml::to_string(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, config)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let mut path = project_dirs()?.config_dir().to_path_buf();
        path.push("config.toml");
        Ok(path)
    }

    /// Directory the bundled sounds live in. Relative to the working directory
    /// on platforms without a data directory.
    #[must_use]
    pub fn sounds_path() -> PathBuf {
        project_dirs().map_or_else(
            |_| PathBuf::from("sounds"),
            |dirs| dirs.data_dir().join("sounds"),
        )
    }

    /// Directory the alarm collections are stored in.
    pub fn alarms_path(&self) -> Result<PathBuf> {
        match &self.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(project_dirs()?.data_dir().join("alarms")),
        }
    }

    #[must_use]
    pub fn is_config_present() -> bool {
        Self::config_path().is_ok_and(|path| path.exists())
    }

    #[must_use]
    pub const fn tick_interval(&self) -> std::time::Duration {
        let millis = if self.tick_millis < MIN_TICK_MILLIS {
            MIN_TICK_MILLIS
        } else {
            self.tick_millis
        };
        std::time::Duration::from_millis(millis)
    }

    #[must_use]
    pub const fn notification_duration(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.notification_secs)
    }
}
