use std::{io, path::PathBuf};

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    #[error("couldn't serialize: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("couldn't parse: {0}")]
    Deserialize(#[from] toml::de::Error),

    #[error("playback failed: {0}")]
    Playback(String),

    #[error("notification failed: {0}")]
    Notification(String),

    #[error("couldn't determine the config/data directories for this platform")]
    NoConfigDir,

    #[error("invalid time of day `{0}` (expected HH:MM)")]
    InvalidTime(String),

    #[error("the alarms are in use by another chanticleer (delete {} if none is running)", .0.display())]
    Locked(PathBuf),
}
