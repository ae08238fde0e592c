//! Power metering in dBFS

/// Quietest reading a meter reports, matching the usual -160 dB floor
pub const MIN_DECIBELS: f32 = -160.0;

/// Calculate RMS volume from samples
pub fn calculate_rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}

/// Convert a linear RMS level to dBFS, clamped to `[MIN_DECIBELS, 0]`
pub fn rms_to_decibels(rms: f32) -> f32 {
    if rms <= 0.0 || !rms.is_finite() {
        return MIN_DECIBELS;
    }
    (20.0 * rms.log10()).clamp(MIN_DECIBELS, 0.0)
}

/// Average power of a block of samples in dBFS
pub fn average_power(samples: &[f32]) -> f32 {
    rms_to_decibels(calculate_rms(samples))
}
