//! WAV file encoding and decoding using hound
//!
//! Recordings are mono 32-bit float WAV files named after the instant the
//! recording started.

use super::{AudioError, Track};
use chrono::{DateTime, SecondsFormat, TimeZone};
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use std::fmt::Display;
use std::fs::File;
use std::io::{BufReader, BufWriter, Cursor, Read};
use std::path::{Path, PathBuf};

/// Extension given to every recording
pub const RECORDING_EXTENSION: &str = "wav";

/// File name for a recording started at `at`: RFC 3339, whole seconds
pub fn recording_file_name<Tz>(at: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    format!(
        "{}.{}",
        at.to_rfc3339_opts(SecondsFormat::Secs, false),
        RECORDING_EXTENSION
    )
}

/// Full path for a new recording inside `dir`
pub fn recording_path<Tz>(dir: &Path, at: &DateTime<Tz>) -> PathBuf
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    dir.join(recording_file_name(at))
}

/// Write mono samples to `path`, creating parent directories as needed
pub fn write(path: &Path, samples: &[f32], sample_rate: u32) -> Result<(), AudioError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| AudioError::Io {
            path: parent.display().to_string(),
            source,
        })?;
    }

    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };

    let file = File::create(path).map_err(|source| AudioError::Io {
        path: path.display().to_string(),
        source,
    })?;

    let mut wav_writer = WavWriter::new(BufWriter::new(file), spec)
        .map_err(|e| AudioError::Encode(format!("failed to create WAV writer: {}", e)))?;

    for &sample in samples {
        wav_writer
            .write_sample(sample)
            .map_err(|e| AudioError::Encode(format!("failed to write sample: {}", e)))?;
    }

    wav_writer
        .finalize()
        .map_err(|e| AudioError::Encode(format!("failed to finalize WAV file: {}", e)))
}

/// Decode a WAV file into a mono track
pub fn decode_file(path: &Path) -> Result<Track, AudioError> {
    let file = File::open(path).map_err(|source| AudioError::Io {
        path: path.display().to_string(),
        source,
    })?;
    decode(BufReader::new(file))
}

/// Decode an in-memory WAV image into a mono track
pub fn decode_bytes(bytes: &[u8]) -> Result<Track, AudioError> {
    decode(Cursor::new(bytes))
}

fn decode<R: Read>(source: R) -> Result<Track, AudioError> {
    let reader = WavReader::new(source).map_err(|e| AudioError::Decode(e.to_string()))?;

    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;

    let interleaved: Result<Vec<f32>, _> = match spec.sample_format {
        SampleFormat::Float => reader.into_samples::<f32>().collect(),
        SampleFormat::Int => {
            // Convert integer samples to float
            let max_value = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / max_value))
                .collect()
        }
    };
    let interleaved = interleaved.map_err(|e| AudioError::Decode(e.to_string()))?;

    // Mix down to mono
    let samples = if channels == 1 {
        interleaved
    } else {
        interleaved
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect()
    };

    Ok(Track::new(samples, spec.sample_rate))
}
