//! Sound playback for ringing alarms.
//!
//! [`RodioPlayer`] owns a dedicated audio thread: requests are sent over a
//! channel and the caller never waits on decoding or the audio device.

use std::{
    collections::HashMap,
    fs::File,
    io::BufReader,
    path::Path,
    thread::{self, JoinHandle},
};

use crossbeam_channel::{Receiver, Sender};
use log::{debug, error, info, warn};
use rodio::{Decoder, OutputStream, OutputStreamBuilder, Sink, Source};

use crate::{
    communication::Message,
    error::{Error, Result},
    sound::Sound,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlaybackHandle(u64);

impl PlaybackHandle {
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn id(self) -> u64 {
        self.0
    }
}

pub trait Player: Send {
    /// Starts playing `sound`. Returning `Ok` only means the request was
    /// accepted, not that audio is audible.
    fn play(&mut self, sound: &Sound, looped: bool) -> Result<PlaybackHandle>;

    fn stop(&mut self, handle: PlaybackHandle) -> Result<()>;
}

#[derive(Debug)]
pub struct RodioPlayer {
    sender: Option<Sender<Message>>,
    thread: Option<JoinHandle<()>>,
    next_handle: u64,
}

impl RodioPlayer {
    /// Starts the audio thread. The output device is opened on that thread,
    /// a missing device is logged there and every later request is dropped.
    pub fn spawn() -> Result<Self> {
        let (sender, receiver) = crossbeam_channel::unbounded();
        let thread = thread::Builder::new()
            .name("alarm-audio".to_string())
            .spawn(move || audio_loop(&receiver))?;
        Ok(Self {
            sender: Some(sender),
            thread: Some(thread),
            next_handle: 0,
        })
    }

    fn send(&self, message: Message) -> Result<()> {
        self.sender
            .as_ref()
            .ok_or_else(|| Error::Playback("audio thread is gone".to_string()))?
            .send(message)
            .map_err(|_| Error::Playback("audio thread is gone".to_string()))
    }
}

impl Player for RodioPlayer {
    fn play(&mut self, sound: &Sound, looped: bool) -> Result<PlaybackHandle> {
        if !sound.path.exists() {
            return Err(Error::Playback(format!(
                "sound file {} doesn't exist",
                sound.path.display()
            )));
        }
        self.next_handle += 1;
        let handle = PlaybackHandle::new(self.next_handle);
        self.send(Message::Play {
            handle: handle.id(),
            path: sound.path.clone(),
            looped,
        })?;
        Ok(handle)
    }

    fn stop(&mut self, handle: PlaybackHandle) -> Result<()> {
        self.send(Message::Stop { handle: handle.id() })
    }
}

impl Drop for RodioPlayer {
    fn drop(&mut self) {
        // closing the channel ends the audio loop
        self.sender.take();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("audio thread panicked");
            }
        }
    }
}

fn audio_loop(receiver: &Receiver<Message>) {
    let stream = match OutputStreamBuilder::open_default_stream() {
        Ok(stream) => Some(stream),
        Err(e) => {
            error!("couldn't open audio output: {e}");
            None
        }
    };
    let mut sinks: HashMap<u64, Sink> = HashMap::new();
    for message in receiver {
        match message {
            Message::Play {
                handle,
                path,
                looped,
            } => {
                let Some(stream) = &stream else {
                    warn!("no audio output, not playing {}", path.display());
                    continue;
                };
                match start_sink(stream, &path, looped) {
                    Ok(sink) => {
                        info!("playing {} (handle {handle})", path.display());
                        sinks.insert(handle, sink);
                    }
                    Err(e) => error!("couldn't play {}: {e}", path.display()),
                }
            }
            Message::Stop { handle } => {
                if let Some(sink) = sinks.remove(&handle) {
                    debug!("stopping handle {handle}");
                    sink.stop();
                }
            }
        }
    }
    for sink in sinks.into_values() {
        sink.stop();
    }
}

fn start_sink(stream: &OutputStream, path: &Path, looped: bool) -> Result<Sink> {
    let file = BufReader::new(File::open(path)?);
    let source = Decoder::new(file).map_err(|e| Error::Playback(e.to_string()))?;
    let sink = Sink::connect_new(stream.mixer());
    // create source that repeatedly plays the sound
    if looped {
        sink.append(source.repeat_infinite());
    } else {
        sink.append(source);
    }
    sink.play();
    Ok(sink)
}

/// Plays nothing. For machines without audio, or `--silent` runs.
#[derive(Debug, Default)]
pub struct SilentPlayer {
    next_handle: u64,
}

impl Player for SilentPlayer {
    fn play(&mut self, sound: &Sound, _looped: bool) -> Result<PlaybackHandle> {
        self.next_handle += 1;
        debug!("silently \"playing\" {}", sound.name);
        Ok(PlaybackHandle(self.next_handle))
    }

    fn stop(&mut self, _handle: PlaybackHandle) -> Result<()> {
        Ok(())
    }
}
