//! Audio resources the session controller drives

use crate::audio::{AudioError, Track};
use std::path::{Path, PathBuf};

/// Identifies one opened player or recorder
///
/// Events carry the id of the resource that raised them, so a late event
/// from a resource that has since been replaced can be told apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceId(pub u64);

/// What a player should play
#[derive(Debug, Clone)]
pub enum PlaybackSource {
    /// Audio shipped with the application, already decoded
    Bundled { name: String, track: Track },
    /// A file on disk, decoded when the player is opened
    File(PathBuf),
}

impl PlaybackSource {
    pub fn path(&self) -> Option<&Path> {
        match self {
            PlaybackSource::Bundled { .. } => None,
            PlaybackSource::File(path) => Some(path),
        }
    }
}

/// Capture format requested for new recordings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordingFormat {
    pub sample_rate: u32,
    pub channels: u32,
}

impl Default for RecordingFormat {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            channels: 1,
        }
    }
}

/// A loaded, playable resource
///
/// `play`/`pause` are requests; natural completion is reported later as a
/// `SessionEvent`, not through a return value.
pub trait Player {
    fn play(&mut self) -> Result<(), AudioError>;
    fn pause(&mut self);
    /// Move the position back to the start
    fn rewind(&mut self);
    fn is_playing(&self) -> bool;
    /// Playback position in seconds
    fn current_time(&self) -> f64;
    /// Total length in seconds
    fn duration(&self) -> f64;
    /// Most recent average power in dBFS
    fn average_power(&self) -> f32;
    /// File this player was opened from, if any
    fn source_path(&self) -> Option<&Path>;
}

/// A microphone recording into a single file
pub trait Recorder {
    fn record(&mut self) -> Result<(), AudioError>;
    /// Request the recording to end; the outcome arrives as a `SessionEvent`
    fn stop(&mut self);
    fn is_recording(&self) -> bool;
    /// Seconds captured so far
    fn current_time(&self) -> f64;
    /// Most recent average power in dBFS
    fn average_power(&self) -> f32;
    fn path(&self) -> &Path;
}

/// Opens players and recorders
pub trait AudioBackend {
    type Player: Player;
    type Recorder: Recorder;

    fn open_player(
        &self,
        id: ResourceId,
        source: PlaybackSource,
    ) -> Result<Self::Player, AudioError>;

    fn open_recorder(
        &self,
        id: ResourceId,
        path: &Path,
        format: RecordingFormat,
    ) -> Result<Self::Recorder, AudioError>;
}
