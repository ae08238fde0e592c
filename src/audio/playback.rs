//! Audio playback using PipeWire
//!
//! Provides playback of a decoded track with position tracking, power
//! metering and end-of-track detection.

use super::{meter, AudioError, Track};
use pipewire as pw;
use pw::spa;
use pw::spa::param::format::{MediaSubtype, MediaType};
use pw::spa::param::format_utils;
use pw::spa::pod::Pod;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

/// How a playback run ended
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackEnd {
    /// Reached the end of the track
    Finished,
    /// The stream failed
    Failed(String),
}

/// Shared state for audio playback - thread-safe
#[derive(Clone)]
pub struct SharedPlaybackState {
    inner: Arc<Mutex<PlaybackStateInner>>,
}

struct PlaybackStateInner {
    samples: Vec<f32>,
    sample_rate: u32,
    /// Current playback position (sample index)
    position: usize,
    is_playing: bool,
    /// Average power of the last chunk handed to the device, in dBFS
    average_power: f32,
}

impl SharedPlaybackState {
    pub fn new(track: Track) -> Self {
        Self {
            inner: Arc::new(Mutex::new(PlaybackStateInner {
                samples: track.samples,
                sample_rate: track.sample_rate.max(1),
                position: 0,
                is_playing: false,
                average_power: meter::MIN_DECIBELS,
            })),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, PlaybackStateInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Current playback position in seconds
    pub fn current_time(&self) -> f64 {
        let inner = self.lock();
        inner.position as f64 / inner.sample_rate as f64
    }

    /// Total duration in seconds
    pub fn duration(&self) -> f64 {
        let inner = self.lock();
        inner.samples.len() as f64 / inner.sample_rate as f64
    }

    pub fn is_playing(&self) -> bool {
        self.lock().is_playing
    }

    pub fn average_power(&self) -> f32 {
        self.lock().average_power
    }

    /// Whether the position has reached the end of the track
    pub fn is_finished(&self) -> bool {
        let inner = self.lock();
        inner.position >= inner.samples.len()
    }

    fn set_playing(&self, playing: bool) {
        let mut inner = self.lock();
        inner.is_playing = playing;
        if !playing {
            inner.average_power = meter::MIN_DECIBELS;
        }
    }

    /// Reset playback position to start
    pub fn rewind(&self) {
        self.lock().position = 0;
    }

    /// Get samples for playback (advances position)
    fn next_chunk(&self, count: usize) -> Option<Vec<f32>> {
        let mut inner = self.lock();
        if inner.position >= inner.samples.len() {
            inner.is_playing = false;
            return None;
        }

        let end = (inner.position + count).min(inner.samples.len());
        let chunk = inner.samples[inner.position..end].to_vec();
        inner.position = end;
        inner.average_power = meter::average_power(&chunk);

        Some(chunk)
    }
}

/// Audio player using PipeWire
pub struct AudioPlayer {
    state: SharedPlaybackState,
    is_running: Arc<AtomicBool>,
    thread_handle: Option<JoinHandle<()>>,
    sender: Option<pw::channel::Sender<PlaybackCommand>>,
}

enum PlaybackCommand {
    Stop,
}

impl AudioPlayer {
    pub fn new(track: Track) -> Self {
        Self {
            state: SharedPlaybackState::new(track),
            is_running: Arc::new(AtomicBool::new(false)),
            thread_handle: None,
            sender: None,
        }
    }

    /// Get shared playback state for UI updates
    pub fn shared_state(&self) -> SharedPlaybackState {
        self.state.clone()
    }

    /// Start playback from the current position
    ///
    /// `on_end` runs on the playback thread when the track runs out or the
    /// stream fails, but not after `stop`.
    pub fn play<F>(&mut self, on_end: F) -> Result<(), AudioError>
    where
        F: FnOnce(PlaybackEnd) + Send + 'static,
    {
        if self.is_running.load(Ordering::SeqCst) {
            return Err(AudioError::Busy("playback"));
        }
        // Reap a thread that ended on its own
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }

        // Start over if we've finished
        if self.state.is_finished() {
            self.state.rewind();
        }

        self.state.set_playing(true);
        self.is_running.store(true, Ordering::SeqCst);

        let state = self.state.clone();
        let is_running = self.is_running.clone();

        // Create channel for stopping the loop
        let (sender, receiver) = pw::channel::channel::<PlaybackCommand>();
        self.sender = Some(sender);

        let handle = thread::Builder::new()
            .name("voxmemo-playback".to_string())
            .spawn(move || {
                let result = run_playback_loop(state.clone(), receiver);
                let stopped = !is_running.swap(false, Ordering::SeqCst);
                state.set_playing(false);
                if stopped {
                    return;
                }
                match result {
                    Err(e) => on_end(PlaybackEnd::Failed(e)),
                    Ok(()) if state.is_finished() => {
                        state.rewind();
                        on_end(PlaybackEnd::Finished);
                    }
                    Ok(()) => {}
                }
            })
            .map_err(|e| AudioError::Device(format!("failed to spawn playback thread: {}", e)))?;

        self.thread_handle = Some(handle);
        Ok(())
    }

    /// Stop playback, keeping the position
    pub fn stop(&mut self) {
        // Clear first so the playback thread knows this was requested
        self.is_running.store(false, Ordering::SeqCst);

        if let Some(sender) = self.sender.take() {
            let _ = sender.send(PlaybackCommand::Stop);
        }

        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }

        self.state.set_playing(false);
    }
}

impl Drop for AudioPlayer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Run the PipeWire playback loop in a background thread
fn run_playback_loop(
    state: SharedPlaybackState,
    receiver: pw::channel::Receiver<PlaybackCommand>,
) -> Result<(), String> {
    pw::init();

    let mainloop = pw::main_loop::MainLoopRc::new(None)
        .map_err(|e| format!("Failed to create PipeWire main loop: {}", e))?;

    let context = pw::context::ContextRc::new(&mainloop, None)
        .map_err(|e| format!("Failed to create PipeWire context: {}", e))?;

    let core = context
        .connect_rc(None)
        .map_err(|e| format!("Failed to connect to PipeWire: {}", e))?;

    // Set up channel receiver to stop the loop
    let mainloop_weak = mainloop.downgrade();
    let _receiver = receiver.attach(mainloop.loop_(), move |cmd| match cmd {
        PlaybackCommand::Stop => {
            if let Some(mainloop) = mainloop_weak.upgrade() {
                mainloop.quit();
            }
        }
    });

    struct UserData {
        format: spa::param::audio::AudioInfoRaw,
        state: SharedPlaybackState,
        mainloop_weak: pw::main_loop::MainLoopWeak,
    }

    let sample_rate = {
        let inner = state.lock();
        inner.sample_rate
    };

    let user_data = UserData {
        format: Default::default(),
        state: state.clone(),
        mainloop_weak: mainloop.downgrade(),
    };

    let props = pw::properties::properties! {
        *pw::keys::MEDIA_TYPE => "Audio",
        *pw::keys::MEDIA_CATEGORY => "Playback",
        *pw::keys::MEDIA_ROLE => "Music",
        *pw::keys::APP_NAME => "Voxmemo",
    };

    let stream = pw::stream::StreamBox::new(&core, "voxmemo-playback", props)
        .map_err(|e| format!("Failed to create PipeWire stream: {}", e))?;

    let _listener = stream
        .add_local_listener_with_user_data(user_data)
        .param_changed(|_, user_data, id, param| {
            let Some(param) = param else { return };
            if id != spa::param::ParamType::Format.as_raw() {
                return;
            }

            let (media_type, media_subtype) = match format_utils::parse_format(param) {
                Ok(v) => v,
                Err(_) => return,
            };

            if media_type != MediaType::Audio || media_subtype != MediaSubtype::Raw {
                return;
            }

            if let Err(e) = user_data.format.parse(param) {
                log::warn!("Failed to parse playback format: {:?}", e);
            }
        })
        .process(|stream, user_data| {
            let Some(mut buffer) = stream.dequeue_buffer() else {
                return;
            };

            let datas = buffer.datas_mut();
            if datas.is_empty() {
                return;
            }

            let data = &mut datas[0];
            let n_channels = user_data.format.channels().max(1) as usize;
            let stride = std::mem::size_of::<f32>() * n_channels;

            let Some(slice) = data.data() else {
                return;
            };

            let n_frames = slice.len() / stride;

            match user_data.state.next_chunk(n_frames) {
                Some(samples) => {
                    for (i, &sample) in samples.iter().enumerate() {
                        let bytes = sample.to_le_bytes();
                        // Same sample on every channel
                        for channel in 0..n_channels {
                            let offset = i * stride + channel * std::mem::size_of::<f32>();
                            if offset + 4 <= slice.len() {
                                slice[offset..offset + 4].copy_from_slice(&bytes);
                            }
                        }
                    }
                    // Fill remainder with silence
                    let written = samples.len() * stride;
                    if written < slice.len() {
                        slice[written..].fill(0);
                    }

                    let chunk = data.chunk_mut();
                    *chunk.offset_mut() = 0;
                    *chunk.stride_mut() = stride as i32;
                    *chunk.size_mut() = written as u32;
                }
                None => {
                    // Track exhausted
                    if let Some(mainloop) = user_data.mainloop_weak.upgrade() {
                        mainloop.quit();
                    }
                }
            }
        })
        .register()
        .map_err(|e| format!("Failed to register stream listener: {}", e))?;

    // Request F32LE mono at the track's rate; PipeWire converts as needed
    let mut audio_info = spa::param::audio::AudioInfoRaw::new();
    audio_info.set_format(spa::param::audio::AudioFormat::F32LE);
    audio_info.set_rate(sample_rate);
    audio_info.set_channels(1);

    let obj = spa::pod::Object {
        type_: spa::utils::SpaTypes::ObjectParamFormat.as_raw(),
        id: spa::param::ParamType::EnumFormat.as_raw(),
        properties: audio_info.into(),
    };

    let values: Vec<u8> = spa::pod::serialize::PodSerializer::serialize(
        std::io::Cursor::new(Vec::new()),
        &spa::pod::Value::Object(obj),
    )
    .map_err(|e| format!("Failed to serialize audio format: {:?}", e))?
    .0
    .into_inner();

    let pod = Pod::from_bytes(&values).ok_or("Failed to build format pod")?;
    let mut params = [pod];

    stream
        .connect(
            spa::utils::Direction::Output,
            None,
            pw::stream::StreamFlags::AUTOCONNECT
                | pw::stream::StreamFlags::MAP_BUFFERS
                | pw::stream::StreamFlags::RT_PROCESS,
            &mut params,
        )
        .map_err(|e| format!("Failed to connect stream: {}", e))?;

    // Run until stopped or playback ends
    mainloop.run();

    Ok(())
}
