//! Audio capture, playback and file I/O
//!
//! This module provides:
//! - Microphone capture with average-power metering (PipeWire)
//! - Playback of decoded tracks with metering and completion reporting
//! - WAV encoding/decoding via hound
//! - `PipeWireBackend`, which hands these to the session as resources

mod backend;
mod capture;
pub mod meter;
mod playback;
pub mod wav;

pub use backend::PipeWireBackend;

use thiserror::Error;

/// Errors raised by the audio layer
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode audio: {0}")]
    Decode(String),
    #[error("failed to encode audio: {0}")]
    Encode(String),
    #[error("audio device error: {0}")]
    Device(String),
    #[error("{0} already running")]
    Busy(&'static str),
}

/// Decoded mono audio
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl Track {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Length in seconds
    pub fn duration(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }
}
