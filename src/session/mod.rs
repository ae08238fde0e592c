//! Playback/record session
//!
//! `SessionController` owns at most one player and one recorder, the
//! sampling timer that meters whichever of them is active, and the list of
//! finished recordings. All methods run on the control thread; audio
//! backends report completions through `SessionEvent`s.

mod events;
mod permission;
mod resources;
mod timer;
mod visualizer;

pub use events::{channel, EventReceiver, EventSender, SessionEvent};
pub use permission::{DconfPermissionGate, PermissionGate, RecordPermission};
pub use resources::{
    AudioBackend, PlaybackSource, Player, Recorder, RecordingFormat, ResourceId,
};
pub use timer::{SamplingTimer, SAMPLE_INTERVAL};
pub use visualizer::Visualizer;

use crate::audio::wav;
use crate::models::{Recording, RecordingList};
use chrono::Local;
use log::{debug, error, info, warn};
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Logical state, derived from the loaded resources
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Playing,
    Recording,
    Paused,
}

/// Outcome of asking to record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordRequest {
    Started,
    /// Permission is being asked for; press record again once granted
    Prompting,
    Denied,
    Failed,
}

/// Values shown by the transport controls
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DisplayState {
    pub play_selected: bool,
    pub record_selected: bool,
    /// Playback position in seconds
    pub elapsed: f64,
    /// Length of the loaded playback resource in seconds
    pub duration: f64,
    /// Seconds captured by the active recording
    pub recording_elapsed: f64,
}

/// Position slider bounds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Slider {
    pub min: f32,
    pub max: f32,
    pub value: f32,
}

impl DisplayState {
    pub fn remaining(&self) -> f64 {
        (self.duration - self.elapsed).max(0.0)
    }

    pub fn slider(&self) -> Slider {
        Slider {
            min: 0.0,
            max: self.duration as f32,
            value: self.elapsed as f32,
        }
    }
}

/// Format seconds as zero-padded `mm:ss`
pub fn format_clock(seconds: f64) -> String {
    let total_seconds = seconds.max(0.0) as u64;
    format!("{:02}:{:02}", total_seconds / 60, total_seconds % 60)
}

struct Handle<T> {
    id: ResourceId,
    inner: T,
}

pub struct SessionController<B: AudioBackend, G: PermissionGate> {
    backend: B,
    permission: G,
    recordings_dir: PathBuf,
    format: RecordingFormat,
    player: Option<Handle<B::Player>>,
    recorder: Option<Handle<B::Recorder>>,
    /// Stopped recorders waiting for their completion event
    finishing: Vec<Handle<B::Recorder>>,
    recording_path: Option<PathBuf>,
    timer: SamplingTimer,
    visualizer: Visualizer,
    display: DisplayState,
    recordings: RecordingList,
    permission_prompt: bool,
    next_id: u64,
}

impl<B: AudioBackend, G: PermissionGate> SessionController<B, G> {
    pub fn new(backend: B, permission: G, recordings_dir: impl Into<PathBuf>) -> Self {
        Self {
            backend,
            permission,
            recordings_dir: recordings_dir.into(),
            format: RecordingFormat::default(),
            player: None,
            recorder: None,
            finishing: Vec::new(),
            recording_path: None,
            timer: SamplingTimer::new(),
            visualizer: Visualizer::default(),
            display: DisplayState::default(),
            recordings: RecordingList::new(),
            permission_prompt: false,
            next_id: 0,
        }
    }

    pub fn with_recordings(mut self, recordings: RecordingList) -> Self {
        self.recordings = recordings;
        self
    }

    pub fn with_visualizer_capacity(mut self, capacity: usize) -> Self {
        self.visualizer = Visualizer::new(capacity);
        self
    }

    pub fn is_playing(&self) -> bool {
        self.player.as_ref().is_some_and(|p| p.inner.is_playing())
    }

    pub fn is_recording(&self) -> bool {
        self.recorder.as_ref().is_some_and(|r| r.inner.is_recording())
    }

    pub fn state(&self) -> SessionState {
        if self.is_recording() {
            SessionState::Recording
        } else if self.is_playing() {
            SessionState::Playing
        } else if self
            .player
            .as_ref()
            .is_some_and(|p| p.inner.current_time() > 0.0)
        {
            SessionState::Paused
        } else {
            SessionState::Idle
        }
    }

    pub fn timer(&self) -> &SamplingTimer {
        &self.timer
    }

    pub fn visualizer(&self) -> &Visualizer {
        &self.visualizer
    }

    pub fn display(&self) -> DisplayState {
        self.display
    }

    pub fn recordings(&self) -> &RecordingList {
        &self.recordings
    }

    pub fn recordings_dir(&self) -> &Path {
        &self.recordings_dir
    }

    /// Target of the current or most recent recording
    pub fn recording_path(&self) -> Option<&Path> {
        self.recording_path.as_deref()
    }

    pub fn has_player(&self) -> bool {
        self.player.is_some()
    }

    /// File the loaded player reads from; `None` for bundled audio or no player
    pub fn player_source(&self) -> Option<&Path> {
        self.player.as_ref().and_then(|p| p.inner.source_path())
    }

    pub fn permission_prompt_pending(&self) -> bool {
        self.permission_prompt
    }

    /// Replace the playback resource
    ///
    /// On failure the previous player is gone as well and the session is
    /// left idle.
    pub fn load_playback(&mut self, source: PlaybackSource) -> bool {
        let id = self.allocate_id();
        let label = match &source {
            PlaybackSource::Bundled { name, .. } => name.clone(),
            PlaybackSource::File(path) => path.display().to_string(),
        };

        if let Some(mut old) = self.player.take() {
            old.inner.pause();
        }

        let loaded = match self.backend.open_player(id, source) {
            Ok(player) => {
                info!("Loaded {} ({:.1}s)", label, player.duration());
                self.player = Some(Handle { id, inner: player });
                true
            }
            Err(e) => {
                error!("Failed to load {}: {}", label, e);
                false
            }
        };

        self.settle();
        loaded
    }

    /// Load a recording picked from the list. Ignored while recording.
    pub fn load_recording(&mut self, path: &Path) -> bool {
        if self.is_recording() {
            debug!("Not loading {} while recording", path.display());
            return false;
        }
        self.load_playback(PlaybackSource::File(path.to_path_buf()))
    }

    pub fn play(&mut self, now: Instant) {
        let Some(player) = self.player.as_mut() else {
            debug!("Play ignored: nothing loaded");
            return;
        };
        if player.inner.is_playing() {
            return;
        }

        match player.inner.play() {
            Ok(()) => self.timer.start(now),
            Err(e) => error!("Failed to start playback: {}", e),
        }
        self.settle();
    }

    pub fn pause(&mut self) {
        if !self.is_playing() {
            return;
        }
        if let Some(player) = self.player.as_mut() {
            player.inner.pause();
        }
        self.settle();
    }

    pub fn toggle_playback(&mut self, now: Instant) {
        if self.is_playing() {
            self.pause();
        } else {
            self.play(now);
        }
    }

    pub fn request_permission_or_start_recording(&mut self, now: Instant) -> RecordRequest {
        match self.permission.status() {
            RecordPermission::Undetermined => {
                info!("Requesting microphone permission");
                self.permission_prompt = true;
                RecordRequest::Prompting
            }
            RecordPermission::Denied => {
                warn!("Microphone access has been blocked");
                RecordRequest::Denied
            }
            RecordPermission::Granted => {
                if self.start_recording(now) {
                    RecordRequest::Started
                } else {
                    RecordRequest::Failed
                }
            }
        }
    }

    /// Begin capturing into a new timestamp-named file
    pub fn start_recording(&mut self, now: Instant) -> bool {
        if self.is_recording() {
            return true;
        }

        let path = wav::recording_path(&self.recordings_dir, &Local::now());
        let id = self.allocate_id();
        info!("Recording to {}", path.display());

        let started = self
            .backend
            .open_recorder(id, &path, self.format)
            .and_then(|mut recorder| {
                recorder.record()?;
                Ok(recorder)
            });

        let ok = match started {
            Ok(recorder) => {
                self.recorder = Some(Handle { id, inner: recorder });
                self.recording_path = Some(path);
                self.visualizer.clear();
                self.timer.start(now);
                true
            }
            Err(e) => {
                error!("Failed to start recording: {}", e);
                false
            }
        };

        self.settle();
        ok
    }

    /// End the active recording; the file is handed over on completion
    pub fn stop_recording(&mut self) {
        if !self.is_recording() {
            return;
        }
        if let Some(mut handle) = self.recorder.take() {
            handle.inner.stop();
            self.finishing.push(handle);
        }
        self.settle();
    }

    pub fn toggle_recording(&mut self, now: Instant) -> Option<RecordRequest> {
        if self.is_recording() {
            self.stop_recording();
            None
        } else {
            Some(self.request_permission_or_start_recording(now))
        }
    }

    pub fn handle_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::PlayerFinished { id, successfully } => {
                if !self.is_current_player(id) {
                    debug!("Ignoring finish from replaced player {:?}", id);
                    return;
                }
                if successfully {
                    info!("Playback finished");
                    if let Some(player) = self.player.as_mut() {
                        player.inner.rewind();
                    }
                } else {
                    warn!("Playback stopped before the end");
                }
                self.settle();
            }
            SessionEvent::PlayerDecodeError { id, message } => {
                if !self.is_current_player(id) {
                    return;
                }
                error!("Error decoding audio: {}", message);
                if let Some(player) = self.player.as_mut() {
                    player.inner.pause();
                }
                self.settle();
            }
            SessionEvent::RecorderFinished { id, successfully } => {
                let Some(pos) = self.finishing.iter().position(|h| h.id == id) else {
                    debug!("Ignoring finish from unknown recorder {:?}", id);
                    return;
                };
                let handle = self.finishing.remove(pos);
                let path = handle.inner.path().to_path_buf();
                drop(handle);

                if !successfully {
                    warn!("Recording {} did not finish cleanly", path.display());
                    self.settle();
                    return;
                }

                // Play the new recording instead of whatever was loaded
                if self.load_playback(PlaybackSource::File(path.clone())) {
                    let duration = self.display.duration;
                    self.recordings.push(Recording::from_file(&path, duration));
                }
            }
            SessionEvent::RecorderEncodeError { id, message } => {
                if self.recorder.as_ref().is_some_and(|r| r.id == id) {
                    if let Some(mut handle) = self.recorder.take() {
                        handle.inner.stop();
                    }
                    self.recording_path = None;
                } else if let Some(pos) = self.finishing.iter().position(|h| h.id == id) {
                    self.finishing.remove(pos);
                } else {
                    return;
                }
                error!("Error recording: {}", message);
                self.settle();
            }
            SessionEvent::PermissionResolved { granted } => {
                self.permission_prompt = false;
                self.permission.store(granted);
                if granted {
                    info!("Recording permission has been granted");
                } else {
                    warn!("Microphone access was not granted");
                }
            }
        }
    }

    /// Run one sampling tick if one is due
    ///
    /// Returns whether the timer fired.
    pub fn tick(&mut self, now: Instant) -> bool {
        if !self.timer.fire(now) {
            return false;
        }

        self.refresh_display();
        match self.meter_reading() {
            Some(decibels) => self.visualizer.add_value(decibels),
            // Resource stopped on its own; its event may still be queued
            None => self.timer.cancel(),
        }
        true
    }

    /// One reading from the recorder if recording, else from the player
    fn meter_reading(&self) -> Option<f32> {
        if let Some(recorder) = self.recorder.as_ref().filter(|r| r.inner.is_recording()) {
            return Some(recorder.inner.average_power());
        }
        self.player
            .as_ref()
            .filter(|p| p.inner.is_playing())
            .map(|p| p.inner.average_power())
    }

    fn is_current_player(&self, id: ResourceId) -> bool {
        self.player.as_ref().is_some_and(|p| p.id == id)
    }

    fn allocate_id(&mut self) -> ResourceId {
        self.next_id += 1;
        ResourceId(self.next_id)
    }

    /// Cancel the timer if nothing is active and refresh the display
    fn settle(&mut self) {
        if !self.is_playing() && !self.is_recording() {
            self.timer.cancel();
        }
        self.refresh_display();
    }

    fn refresh_display(&mut self) {
        let player = self.player.as_ref().map(|p| &p.inner);
        let recorder = self
            .recorder
            .as_ref()
            .map(|r| &r.inner)
            .filter(|r| r.is_recording());

        self.display = DisplayState {
            play_selected: player.is_some_and(|p| p.is_playing()),
            record_selected: recorder.is_some(),
            elapsed: player.map(|p| p.current_time()).unwrap_or(0.0),
            duration: player.map(|p| p.duration()).unwrap_or(0.0),
            recording_elapsed: recorder.map(|r| r.current_time()).unwrap_or(0.0),
        };
    }
}

impl<B: AudioBackend, G: PermissionGate> Drop for SessionController<B, G> {
    fn drop(&mut self) {
        self.timer.cancel();
        if let Some(recorder) = self.recorder.as_mut() {
            if recorder.inner.is_recording() {
                recorder.inner.stop();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{AudioError, Track};
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::time::Duration;

    #[derive(Debug, Default)]
    struct PlayerState {
        playing: bool,
        position: f64,
        duration: f64,
        power: f32,
        path: Option<PathBuf>,
    }

    #[derive(Debug, Default)]
    struct RecorderState {
        recording: bool,
        stopped: bool,
        power: f32,
        path: PathBuf,
    }

    #[derive(Default)]
    struct Log {
        players: Vec<Rc<RefCell<PlayerState>>>,
        recorders: Vec<Rc<RefCell<RecorderState>>>,
        undecodable: Vec<PathBuf>,
        fail_open_recorder: bool,
    }

    #[derive(Clone, Default)]
    struct FakeBackend {
        log: Rc<RefCell<Log>>,
    }

    impl FakeBackend {
        fn last_player(&self) -> Rc<RefCell<PlayerState>> {
            self.log.borrow().players.last().cloned().unwrap()
        }

        fn last_recorder(&self) -> Rc<RefCell<RecorderState>> {
            self.log.borrow().recorders.last().cloned().unwrap()
        }

        fn recorders_opened(&self) -> usize {
            self.log.borrow().recorders.len()
        }
    }

    struct FakePlayer {
        state: Rc<RefCell<PlayerState>>,
        path: Option<PathBuf>,
    }

    impl Player for FakePlayer {
        fn play(&mut self) -> Result<(), AudioError> {
            self.state.borrow_mut().playing = true;
            Ok(())
        }
        fn pause(&mut self) {
            self.state.borrow_mut().playing = false;
        }
        fn rewind(&mut self) {
            self.state.borrow_mut().position = 0.0;
        }
        fn is_playing(&self) -> bool {
            self.state.borrow().playing
        }
        fn current_time(&self) -> f64 {
            self.state.borrow().position
        }
        fn duration(&self) -> f64 {
            self.state.borrow().duration
        }
        fn average_power(&self) -> f32 {
            self.state.borrow().power
        }
        fn source_path(&self) -> Option<&Path> {
            self.path.as_deref()
        }
    }

    struct FakeRecorder {
        state: Rc<RefCell<RecorderState>>,
        path: PathBuf,
    }

    impl Recorder for FakeRecorder {
        fn record(&mut self) -> Result<(), AudioError> {
            self.state.borrow_mut().recording = true;
            Ok(())
        }
        fn stop(&mut self) {
            let mut state = self.state.borrow_mut();
            state.recording = false;
            state.stopped = true;
        }
        fn is_recording(&self) -> bool {
            self.state.borrow().recording
        }
        fn current_time(&self) -> f64 {
            1.5
        }
        fn average_power(&self) -> f32 {
            self.state.borrow().power
        }
        fn path(&self) -> &Path {
            &self.path
        }
    }

    impl AudioBackend for FakeBackend {
        type Player = FakePlayer;
        type Recorder = FakeRecorder;

        fn open_player(
            &self,
            _id: ResourceId,
            source: PlaybackSource,
        ) -> Result<FakePlayer, AudioError> {
            let path = source.path().map(Path::to_path_buf);
            if let Some(p) = &path {
                if self.log.borrow().undecodable.contains(p) {
                    return Err(AudioError::Decode("bad header".to_string()));
                }
            }
            let duration = match &source {
                PlaybackSource::Bundled { track, .. } => track.duration(),
                PlaybackSource::File(_) => 4.0,
            };
            let state = Rc::new(RefCell::new(PlayerState {
                duration,
                power: -20.0,
                path: path.clone(),
                ..Default::default()
            }));
            self.log.borrow_mut().players.push(state.clone());
            Ok(FakePlayer { state, path })
        }

        fn open_recorder(
            &self,
            _id: ResourceId,
            path: &Path,
            format: RecordingFormat,
        ) -> Result<FakeRecorder, AudioError> {
            assert_eq!(format, RecordingFormat { sample_rate: 44_100, channels: 1 });
            if self.log.borrow().fail_open_recorder {
                return Err(AudioError::Device("no microphone".to_string()));
            }
            let state = Rc::new(RefCell::new(RecorderState {
                power: -35.0,
                path: path.to_path_buf(),
                ..Default::default()
            }));
            self.log.borrow_mut().recorders.push(state.clone());
            Ok(FakeRecorder {
                state,
                path: path.to_path_buf(),
            })
        }
    }

    struct FixedGate {
        status: RecordPermission,
        stored: Rc<RefCell<Vec<bool>>>,
    }

    impl PermissionGate for FixedGate {
        fn status(&self) -> RecordPermission {
            self.status
        }
        fn store(&mut self, granted: bool) {
            self.status = if granted {
                RecordPermission::Granted
            } else {
                RecordPermission::Denied
            };
            self.stored.borrow_mut().push(granted);
        }
    }

    fn gate(status: RecordPermission) -> FixedGate {
        FixedGate {
            status,
            stored: Rc::default(),
        }
    }

    fn bundled() -> PlaybackSource {
        PlaybackSource::Bundled {
            name: "piano.wav".to_string(),
            track: Track::new(vec![0.1; 88_200], 44_100),
        }
    }

    fn controller(
        status: RecordPermission,
    ) -> (SessionController<FakeBackend, FixedGate>, FakeBackend) {
        let backend = FakeBackend::default();
        let session = SessionController::new(backend.clone(), gate(status), "/tmp/voxmemo-test");
        (session, backend)
    }

    fn timer_matches_activity(session: &SessionController<FakeBackend, FixedGate>) -> bool {
        session.timer().is_active() == (session.is_playing() || session.is_recording())
    }

    fn stop_and_finish(session: &mut SessionController<FakeBackend, FixedGate>) -> PathBuf {
        let path = session.recording_path().unwrap().to_path_buf();
        session.stop_recording();
        let id = session.finishing.last().map(|h| h.id).unwrap();
        session.handle_event(SessionEvent::RecorderFinished {
            id,
            successfully: true,
        });
        path
    }

    #[test]
    fn test_play_without_player_is_noop() {
        let (mut session, _) = controller(RecordPermission::Granted);
        session.play(Instant::now());
        assert!(!session.is_playing());
        assert!(!session.timer().is_active());
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[test]
    fn test_play_pause_sequence_tracks_is_playing() {
        let (mut session, _) = controller(RecordPermission::Granted);
        assert!(session.load_playback(bundled()));
        let now = Instant::now();

        for (i, play) in [true, false, false, true, true, false, true].into_iter().enumerate() {
            if play {
                session.play(now);
            } else {
                session.pause();
            }
            assert_eq!(session.is_playing(), play, "step {}", i);
            assert_eq!(session.display().play_selected, play);
            assert!(timer_matches_activity(&session), "step {}", i);
        }
    }

    #[test]
    fn test_tick_samples_player_and_refreshes_display() {
        let (mut session, backend) = controller(RecordPermission::Granted);
        session.load_playback(bundled());
        let t0 = Instant::now();
        session.play(t0);

        backend.last_player().borrow_mut().position = 0.75;
        assert!(!session.tick(t0 + Duration::from_millis(10)));
        assert!(session.tick(t0 + SAMPLE_INTERVAL));

        assert_eq!(session.visualizer().values().collect::<Vec<_>>(), vec![-20.0]);
        let display = session.display();
        assert_eq!(display.elapsed, 0.75);
        assert_eq!(display.duration, 2.0);
        assert_eq!(display.remaining(), 1.25);
        assert_eq!(display.slider().max, 2.0);
    }

    #[test]
    fn test_pause_leaves_paused_state() {
        let (mut session, backend) = controller(RecordPermission::Granted);
        session.load_playback(bundled());
        session.play(Instant::now());
        backend.last_player().borrow_mut().position = 1.0;
        session.pause();
        assert_eq!(session.state(), SessionState::Paused);
        assert!(!session.timer().is_active());
    }

    #[test]
    fn test_denied_permission_never_opens_recorder() {
        let (mut session, backend) = controller(RecordPermission::Denied);
        let outcome = session.request_permission_or_start_recording(Instant::now());
        assert_eq!(outcome, RecordRequest::Denied);
        assert!(!session.is_recording());
        assert_eq!(backend.recorders_opened(), 0);
        assert!(!session.timer().is_active());
    }

    #[test]
    fn test_granted_permission_starts_recording() {
        let (mut session, backend) = controller(RecordPermission::Granted);
        let outcome = session.request_permission_or_start_recording(Instant::now());
        assert_eq!(outcome, RecordRequest::Started);
        assert!(session.is_recording());
        assert!(session.timer().is_active());
        assert_eq!(session.state(), SessionState::Recording);

        let path = backend.last_recorder().borrow().path.clone();
        assert_eq!(path.parent(), Some(Path::new("/tmp/voxmemo-test")));
        assert_eq!(path.extension().and_then(|e| e.to_str()), Some("wav"));
        assert_eq!(session.recording_path(), Some(path.as_path()));
    }

    #[test]
    fn test_undetermined_permission_prompts_without_recording() {
        let (mut session, backend) = controller(RecordPermission::Undetermined);
        let stored = session.permission.stored.clone();
        let now = Instant::now();

        assert_eq!(session.request_permission_or_start_recording(now), RecordRequest::Prompting);
        assert!(session.permission_prompt_pending());
        assert_eq!(backend.recorders_opened(), 0);

        session.handle_event(SessionEvent::PermissionResolved { granted: true });
        assert!(!session.permission_prompt_pending());
        assert_eq!(*stored.borrow(), vec![true]);
        assert!(!session.is_recording());

        assert_eq!(session.request_permission_or_start_recording(now), RecordRequest::Started);
        assert!(session.is_recording());
    }

    #[test]
    fn test_prompt_denial_blocks_later_requests() {
        let (mut session, backend) = controller(RecordPermission::Undetermined);
        let now = Instant::now();
        session.request_permission_or_start_recording(now);
        session.handle_event(SessionEvent::PermissionResolved { granted: false });

        assert_eq!(session.request_permission_or_start_recording(now), RecordRequest::Denied);
        assert_eq!(backend.recorders_opened(), 0);
    }

    #[test]
    fn test_finished_recording_replaces_player() {
        let (mut session, backend) = controller(RecordPermission::Granted);
        session.load_playback(bundled());
        assert_eq!(session.player_source(), None);

        session.start_recording(Instant::now());
        let path = stop_and_finish(&mut session);

        assert!(backend.last_recorder().borrow().stopped);
        assert_eq!(session.player_source(), Some(path.as_path()));
        assert!(!session.timer().is_active());

        let entries: Vec<_> = session.recordings().iter().collect();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].source_path.as_deref(), Some(path.as_path()));
        assert_eq!(entries[0].duration_seconds, 4.0);
    }

    #[test]
    fn test_stop_recording_cancels_timer_before_completion() {
        let (mut session, _) = controller(RecordPermission::Granted);
        session.start_recording(Instant::now());
        session.stop_recording();
        assert!(!session.is_recording());
        assert!(!session.timer().is_active());
        assert_eq!(session.recordings().len(), 0);
    }

    #[test]
    fn test_unknown_recorder_finish_is_ignored() {
        let (mut session, _) = controller(RecordPermission::Granted);
        session.load_playback(bundled());
        session.handle_event(SessionEvent::RecorderFinished {
            id: ResourceId(999),
            successfully: true,
        });
        assert_eq!(session.player_source(), None);
        assert!(session.has_player());
        assert!(session.recordings().is_empty());
    }

    #[test]
    fn test_unsuccessful_finish_keeps_previous_player() {
        let (mut session, _) = controller(RecordPermission::Granted);
        session.load_playback(bundled());
        session.start_recording(Instant::now());
        session.stop_recording();
        let id = session.finishing[0].id;
        session.handle_event(SessionEvent::RecorderFinished {
            id,
            successfully: false,
        });
        assert!(session.has_player());
        assert_eq!(session.player_source(), None);
        assert!(session.finishing.is_empty());
    }

    #[test]
    fn test_undecodable_recording_leaves_session_idle() {
        let (mut session, backend) = controller(RecordPermission::Granted);
        session.load_playback(bundled());
        session.start_recording(Instant::now());
        let path = session.recording_path().unwrap().to_path_buf();
        backend.log.borrow_mut().undecodable.push(path);

        stop_and_finish(&mut session);
        assert!(!session.has_player());
        assert_eq!(session.state(), SessionState::Idle);
        assert!(session.recordings().is_empty());
    }

    #[test]
    fn test_recorder_is_preferred_meter_source() {
        let (mut session, _) = controller(RecordPermission::Granted);
        session.load_playback(bundled());
        let t0 = Instant::now();
        session.play(t0);
        session.start_recording(t0);
        assert!(session.is_playing() && session.is_recording());

        assert!(session.tick(t0 + SAMPLE_INTERVAL));
        assert_eq!(session.visualizer().values().collect::<Vec<_>>(), vec![-35.0]);

        session.stop_recording();
        assert!(session.timer().is_active());
        assert!(session.tick(t0 + SAMPLE_INTERVAL * 2));
        assert_eq!(session.visualizer().latest(), Some(-20.0));
        assert_eq!(session.visualizer().values().count(), 2);
    }

    #[test]
    fn test_player_finished_cancels_timer_and_returns_to_idle() {
        let (mut session, backend) = controller(RecordPermission::Granted);
        session.load_playback(bundled());
        session.play(Instant::now());

        {
            let player = backend.last_player();
            let mut player = player.borrow_mut();
            player.playing = false;
            player.position = player.duration;
        }
        session.handle_event(SessionEvent::PlayerFinished {
            id: ResourceId(1),
            successfully: true,
        });
        assert!(!session.timer().is_active());
        assert!(!session.display().play_selected);
        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(session.display().elapsed, 0.0);
        assert_eq!(session.display().remaining(), 2.0);
    }

    #[test]
    fn test_stale_player_finish_is_ignored() {
        let (mut session, _) = controller(RecordPermission::Granted);
        session.load_playback(bundled());
        session.load_playback(bundled());
        session.play(Instant::now());

        session.handle_event(SessionEvent::PlayerFinished {
            id: ResourceId(1),
            successfully: true,
        });
        assert!(session.is_playing());
        assert!(session.timer().is_active());
    }

    #[test]
    fn test_decode_error_returns_to_idle() {
        let (mut session, _) = controller(RecordPermission::Granted);
        session.load_playback(bundled());
        session.play(Instant::now());
        session.handle_event(SessionEvent::PlayerDecodeError {
            id: ResourceId(1),
            message: "truncated".to_string(),
        });
        assert!(!session.is_playing());
        assert!(!session.timer().is_active());
    }

    #[test]
    fn test_encode_error_drops_recording() {
        let (mut session, _) = controller(RecordPermission::Granted);
        session.start_recording(Instant::now());
        let id = session.recorder.as_ref().map(|r| r.id).unwrap();

        session.handle_event(SessionEvent::RecorderEncodeError {
            id,
            message: "disk full".to_string(),
        });
        assert!(!session.is_recording());
        assert!(session.recording_path().is_none());
        assert!(!session.timer().is_active());
        assert!(timer_matches_activity(&session));
    }

    #[test]
    fn test_tick_cancels_timer_when_resource_stops_silently() {
        let (mut session, backend) = controller(RecordPermission::Granted);
        session.load_playback(bundled());
        let t0 = Instant::now();
        session.play(t0);

        backend.last_player().borrow_mut().playing = false;
        assert!(session.tick(t0 + SAMPLE_INTERVAL));
        assert!(!session.timer().is_active());
        assert!(session.visualizer().latest().is_none());
    }

    #[test]
    fn test_recorder_open_failure_reports_failed() {
        let (mut session, backend) = controller(RecordPermission::Granted);
        backend.log.borrow_mut().fail_open_recorder = true;
        assert_eq!(
            session.request_permission_or_start_recording(Instant::now()),
            RecordRequest::Failed
        );
        assert!(!session.is_recording());
        assert!(!session.timer().is_active());
    }

    #[test]
    fn test_load_recording_ignored_while_recording() {
        let (mut session, _) = controller(RecordPermission::Granted);
        session.start_recording(Instant::now());
        assert!(!session.load_recording(Path::new("/tmp/other.wav")));
        assert!(!session.has_player());
    }

    #[test]
    fn test_drop_stops_active_recorder() {
        let (mut session, backend) = controller(RecordPermission::Granted);
        session.start_recording(Instant::now());
        let recorder = backend.last_recorder();
        drop(session);
        assert!(recorder.borrow().stopped);
    }

    #[test]
    fn test_format_clock() {
        assert_eq!(format_clock(0.0), "00:00");
        assert_eq!(format_clock(67.9), "01:07");
        assert_eq!(format_clock(3599.0), "59:59");
        assert_eq!(format_clock(-3.0), "00:00");
    }
}
