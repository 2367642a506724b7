use std::{fmt, path::PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::Config;

/// a playable sound, referenced by alarms through its id
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Sound {
    pub id: String,
    pub name: String,
    pub path: PathBuf,
}

impl fmt::Display for Sound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.path.display())
    }
}

impl Sound {
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            path: path.into(),
        }
    }

    fn bundled(id: &str, name: &str, file: &str) -> Self {
        Self::new(id, name, Config::sounds_path().join(file))
    }

    #[must_use]
    pub fn digital_alarm() -> Self {
        Self::bundled("alarm1", "Digital Alarm", "digital_alarm.mp3")
    }

    #[must_use]
    pub fn school_bell() -> Self {
        Self::bundled("alarm2", "School Bell", "school_bell.mp3")
    }

    #[must_use]
    pub fn emergency_siren() -> Self {
        Self::bundled("alarm3", "Emergency Siren", "emergency_siren.mp3")
    }

    #[must_use]
    pub fn police_siren() -> Self {
        Self::bundled("alarm4", "Police Siren", "police_siren.mp3")
    }

    #[must_use]
    pub fn fire_alarm() -> Self {
        Self::bundled("alarm5", "Fire Alarm", "fire_alarm.mp3")
    }
}

/// Ordered list of sounds. The first entry is the fallback for alarms that
/// reference a sound that isn't in the catalog.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(transparent)]
pub struct SoundCatalog {
    sounds: Vec<Sound>,
}

impl Default for SoundCatalog {
    fn default() -> Self {
        Self::new(vec![
            Sound::digital_alarm(),
            Sound::school_bell(),
            Sound::emergency_siren(),
            Sound::police_siren(),
            Sound::fire_alarm(),
        ])
    }
}

impl SoundCatalog {
    #[must_use]
    pub const fn new(sounds: Vec<Sound>) -> Self {
        Self { sounds }
    }

    #[must_use]
    pub fn default_sound(&self) -> Option<&Sound> {
        self.sounds.first()
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Sound> {
        self.sounds.iter().find(|sound| sound.id == id)
    }

    /// the sound with `id`, or the default one. `None` only for an empty catalog
    #[must_use]
    pub fn resolve(&self, id: &str) -> Option<&Sound> {
        self.get(id).or_else(|| self.default_sound())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Sound> {
        self.sounds.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sounds.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sounds.is_empty()
    }
}
