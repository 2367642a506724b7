use std::path::PathBuf;

/// what the audio thread is asked to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Play {
        handle: u64,
        path: PathBuf,
        looped: bool,
    },
    // the alarm was dismissed
    Stop {
        handle: u64,
    },
}
