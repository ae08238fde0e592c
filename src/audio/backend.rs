//! PipeWire-backed session resources

use super::capture::{AudioCapture, CaptureConfig, CaptureEnd, CaptureState, SharedCaptureState};
use super::playback::{AudioPlayer, PlaybackEnd, SharedPlaybackState};
use super::{wav, AudioError};
use crate::session::{
    AudioBackend, EventSender, PlaybackSource, Player, Recorder, RecordingFormat, ResourceId,
    SessionEvent,
};
use log::{debug, warn};
use std::path::{Path, PathBuf};

/// Opens PipeWire players and recorders that report back on `events`
pub struct PipeWireBackend {
    events: EventSender,
}

impl PipeWireBackend {
    pub fn new(events: EventSender) -> Self {
        Self { events }
    }
}

impl AudioBackend for PipeWireBackend {
    type Player = PipeWirePlayer;
    type Recorder = PipeWireRecorder;

    fn open_player(
        &self,
        id: ResourceId,
        source: PlaybackSource,
    ) -> Result<PipeWirePlayer, AudioError> {
        let (track, path) = match source {
            PlaybackSource::Bundled { track, .. } => (track, None),
            PlaybackSource::File(path) => (wav::decode_file(&path)?, Some(path)),
        };

        let player = AudioPlayer::new(track);
        Ok(PipeWirePlayer {
            id,
            path,
            state: player.shared_state(),
            player,
            events: self.events.clone(),
        })
    }

    fn open_recorder(
        &self,
        id: ResourceId,
        path: &Path,
        format: RecordingFormat,
    ) -> Result<PipeWireRecorder, AudioError> {
        let capture = AudioCapture::new(CaptureConfig {
            sample_rate: format.sample_rate,
            channels: format.channels,
        });

        Ok(PipeWireRecorder {
            id,
            path: path.to_path_buf(),
            state: capture.shared_state(),
            capture,
            events: self.events.clone(),
            stopped: false,
        })
    }
}

pub struct PipeWirePlayer {
    id: ResourceId,
    path: Option<PathBuf>,
    player: AudioPlayer,
    state: SharedPlaybackState,
    events: EventSender,
}

impl Player for PipeWirePlayer {
    fn play(&mut self) -> Result<(), AudioError> {
        let id = self.id;
        let events = self.events.clone();
        self.player.play(move |end| {
            let event = match end {
                PlaybackEnd::Finished => SessionEvent::PlayerFinished {
                    id,
                    successfully: true,
                },
                PlaybackEnd::Failed(message) => SessionEvent::PlayerDecodeError { id, message },
            };
            let _ = events.send(event);
        })
    }

    fn pause(&mut self) {
        self.player.stop();
    }

    fn rewind(&mut self) {
        self.state.rewind();
    }

    fn is_playing(&self) -> bool {
        self.state.is_playing()
    }

    fn current_time(&self) -> f64 {
        self.state.current_time()
    }

    fn duration(&self) -> f64 {
        self.state.duration()
    }

    fn average_power(&self) -> f32 {
        self.state.average_power()
    }

    fn source_path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

pub struct PipeWireRecorder {
    id: ResourceId,
    path: PathBuf,
    capture: AudioCapture,
    state: SharedCaptureState,
    events: EventSender,
    stopped: bool,
}

impl Recorder for PipeWireRecorder {
    fn record(&mut self) -> Result<(), AudioError> {
        let id = self.id;
        let path = self.path.clone();
        let events = self.events.clone();
        self.capture.start(move |end| {
            if events.send(finish_recording(id, &path, end)).is_err() {
                debug!("Session gone, dropping recorder event");
            }
        })
    }

    /// Signal the capture thread; it encodes the file and reports back
    fn stop(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        self.capture.stop();
    }

    fn is_recording(&self) -> bool {
        !self.stopped && self.state.state() == CaptureState::Capturing
    }

    fn current_time(&self) -> f64 {
        self.state.duration()
    }

    fn average_power(&self) -> f32 {
        self.state.average_power()
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

/// Encode a finished capture run and describe the outcome
///
/// Runs on the capture thread.
fn finish_recording(id: ResourceId, path: &Path, end: CaptureEnd) -> SessionEvent {
    let (samples, sample_rate) = match end {
        CaptureEnd::Failed(message) => return SessionEvent::RecorderEncodeError { id, message },
        CaptureEnd::Stopped {
            samples,
            sample_rate,
        } => (samples, sample_rate),
    };

    if samples.is_empty() {
        warn!("No audio captured for {}", path.display());
        return SessionEvent::RecorderFinished {
            id,
            successfully: false,
        };
    }

    match wav::write(path, &samples, sample_rate) {
        Ok(()) => {
            debug!(
                "Saved {} ({}Hz, {} samples)",
                path.display(),
                sample_rate,
                samples.len()
            );
            SessionEvent::RecorderFinished {
                id,
                successfully: true,
            }
        }
        Err(e) => SessionEvent::RecorderEncodeError {
            id,
            message: e.to_string(),
        },
    }
}
