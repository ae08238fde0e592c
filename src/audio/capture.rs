//! Audio capture using PipeWire
//!
//! Provides microphone capture with real-time power metering.

use super::meter;
use super::AudioError;
use pipewire as pw;
use pw::spa;
use pw::spa::param::format::{MediaSubtype, MediaType};
use pw::spa::param::format_utils;
use pw::spa::pod::Pod;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

/// Current state of audio capture
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CaptureState {
    Idle,
    Capturing,
    Error,
}

/// Audio capture configuration
#[derive(Clone, Copy, Debug)]
pub struct CaptureConfig {
    pub sample_rate: u32,
    pub channels: u32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            channels: 1,
        }
    }
}

/// How a capture run ended
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureEnd {
    /// Stopped on request with everything captured so far
    Stopped { samples: Vec<f32>, sample_rate: u32 },
    /// The stream failed
    Failed(String),
}

/// Shared state for audio capture - thread-safe
#[derive(Clone)]
pub struct SharedCaptureState {
    inner: Arc<Mutex<CaptureStateInner>>,
}

struct CaptureStateInner {
    /// Average power of the latest buffer in dBFS
    average_power: f32,
    /// Captured audio samples (f32, mono)
    samples: Vec<f32>,
    /// Total duration in seconds
    duration: f64,
    state: CaptureState,
    /// Sample rate negotiated with the device
    sample_rate: u32,
}

impl SharedCaptureState {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            inner: Arc::new(Mutex::new(CaptureStateInner {
                average_power: meter::MIN_DECIBELS,
                samples: Vec::new(),
                duration: 0.0,
                state: CaptureState::Idle,
                sample_rate,
            })),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CaptureStateInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn average_power(&self) -> f32 {
        self.lock().average_power
    }

    pub fn state(&self) -> CaptureState {
        self.lock().state
    }

    pub fn duration(&self) -> f64 {
        self.lock().duration
    }

    pub fn sample_rate(&self) -> u32 {
        self.lock().sample_rate
    }

    fn set_state(&self, state: CaptureState) {
        self.lock().state = state;
    }

    fn set_error(&self, error: &str) {
        log::error!("Capture failed: {}", error);
        self.set_state(CaptureState::Error);
    }

    fn take_samples(&self) -> Vec<f32> {
        std::mem::take(&mut self.lock().samples)
    }

    fn reset(&self) {
        let mut inner = self.lock();
        inner.samples.clear();
        inner.duration = 0.0;
        inner.average_power = meter::MIN_DECIBELS;
        inner.state = CaptureState::Idle;
    }

    /// Process incoming audio samples
    pub fn process_samples(&self, samples: &[f32], sample_rate: u32) {
        let mut inner = self.lock();
        if sample_rate > 0 {
            inner.sample_rate = sample_rate;
        }

        if samples.is_empty() {
            return;
        }

        inner.average_power = meter::average_power(samples);
        inner.samples.extend_from_slice(samples);
        inner.duration = inner.samples.len() as f64 / inner.sample_rate as f64;
    }
}

/// Audio capture manager using PipeWire
pub struct AudioCapture {
    config: CaptureConfig,
    state: SharedCaptureState,
    is_running: Arc<AtomicBool>,
    thread_handle: Option<JoinHandle<()>>,
    sender: Option<pw::channel::Sender<PipeWireCommand>>,
}

enum PipeWireCommand {
    Stop,
}

impl AudioCapture {
    pub fn new(config: CaptureConfig) -> Self {
        Self {
            config,
            state: SharedCaptureState::new(config.sample_rate),
            is_running: Arc::new(AtomicBool::new(false)),
            thread_handle: None,
            sender: None,
        }
    }

    /// Get shared capture state for metering
    pub fn shared_state(&self) -> SharedCaptureState {
        self.state.clone()
    }

    /// Start capturing audio
    ///
    /// `on_end` runs on the capture thread once the stream is gone, with the
    /// captured samples after `stop` or the error if the stream died.
    pub fn start<F>(&mut self, on_end: F) -> Result<(), AudioError>
    where
        F: FnOnce(CaptureEnd) + Send + 'static,
    {
        if self.is_running.load(Ordering::SeqCst) {
            return Err(AudioError::Busy("capture"));
        }
        // Reap a previous run
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }

        self.state.reset();
        self.state.set_state(CaptureState::Capturing);
        self.is_running.store(true, Ordering::SeqCst);

        let state = self.state.clone();
        let is_running = self.is_running.clone();
        let config = self.config;

        // Create channel for stopping the loop
        let (sender, receiver) = pw::channel::channel::<PipeWireCommand>();
        self.sender = Some(sender);

        let handle = thread::Builder::new()
            .name("voxmemo-capture".to_string())
            .spawn(move || {
                let result = run_capture_loop(state.clone(), config, receiver);
                is_running.store(false, Ordering::SeqCst);
                match result {
                    Err(e) => {
                        state.set_error(&e);
                        on_end(CaptureEnd::Failed(e));
                    }
                    Ok(()) => {
                        if state.state() == CaptureState::Capturing {
                            state.set_state(CaptureState::Idle);
                        }
                        on_end(CaptureEnd::Stopped {
                            samples: state.take_samples(),
                            sample_rate: state.sample_rate(),
                        });
                    }
                }
            })
            .map_err(|e| AudioError::Device(format!("failed to spawn capture thread: {}", e)))?;

        self.thread_handle = Some(handle);
        Ok(())
    }

    /// Ask the capture thread to wind down without waiting for it
    ///
    /// The samples are handed to the `on_end` callback given to `start`.
    pub fn stop(&mut self) {
        if let Some(sender) = self.sender.take() {
            let _ = sender.send(PipeWireCommand::Stop);
        }
    }
}

impl Drop for AudioCapture {
    fn drop(&mut self) {
        self.stop();
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }
}

/// Run the PipeWire capture loop in a background thread
fn run_capture_loop(
    state: SharedCaptureState,
    config: CaptureConfig,
    receiver: pw::channel::Receiver<PipeWireCommand>,
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
        PipeWireCommand::Stop => {
            if let Some(mainloop) = mainloop_weak.upgrade() {
                mainloop.quit();
            }
        }
    });

    struct UserData {
        format: spa::param::audio::AudioInfoRaw,
        state: SharedCaptureState,
    }

    let user_data = UserData {
        format: Default::default(),
        state: state.clone(),
    };

    let props = pw::properties::properties! {
        *pw::keys::MEDIA_TYPE => "Audio",
        *pw::keys::MEDIA_CATEGORY => "Capture",
        *pw::keys::MEDIA_ROLE => "Communication",
        *pw::keys::APP_NAME => "Voxmemo",
    };

    let stream = pw::stream::StreamBox::new(&core, "voxmemo-capture", props)
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
                log::warn!("Failed to parse capture format: {:?}", e);
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
            let n_channels = user_data.format.channels().max(1);
            let sample_rate = user_data.format.rate();
            let n_samples = data.chunk().size() / (std::mem::size_of::<f32>() as u32);

            if let Some(raw_samples) = data.data() {
                // Keep the first channel of each frame
                let mut mono_samples = Vec::with_capacity((n_samples / n_channels) as usize);

                for i in (0..n_samples).step_by(n_channels as usize) {
                    let start = i as usize * std::mem::size_of::<f32>();
                    let end = start + std::mem::size_of::<f32>();
                    if end <= raw_samples.len() {
                        let sample = f32::from_le_bytes(
                            raw_samples[start..end].try_into().unwrap_or([0; 4]),
                        );
                        mono_samples.push(sample);
                    }
                }

                user_data.state.process_samples(&mono_samples, sample_rate);
            }
        })
        .register()
        .map_err(|e| format!("Failed to register stream listener: {}", e))?;

    // Request mono F32LE at the configured rate
    let mut audio_info = spa::param::audio::AudioInfoRaw::new();
    audio_info.set_format(spa::param::audio::AudioFormat::F32LE);
    audio_info.set_rate(config.sample_rate);
    audio_info.set_channels(config.channels);

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
            spa::utils::Direction::Input,
            None,
            pw::stream::StreamFlags::AUTOCONNECT
                | pw::stream::StreamFlags::MAP_BUFFERS
                | pw::stream::StreamFlags::RT_PROCESS,
            &mut params,
        )
        .map_err(|e| format!("Failed to connect stream: {}", e))?;

    // Run until stopped
    mainloop.run();

    Ok(())
}
