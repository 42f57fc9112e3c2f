//! Fixed-duration recording

use super::buffer::AudioBuffer;
use super::error::AudioError;
use super::microphone::CaptureSource;
use crate::config::RecordingConfig;

/// Records fixed-length mono buffers at the configured sample rate
pub struct Recorder<S: CaptureSource> {
    source: S,
    config: RecordingConfig,
}

impl<S: CaptureSource> Recorder<S> {
    pub fn new(source: S, config: RecordingConfig) -> Self {
        Self { source, config }
    }

    /// Record for `duration_secs` seconds, blocking until done.
    ///
    /// The returned buffer holds exactly `sample_rate * duration_secs` samples.
    pub fn record(&self, duration_secs: u32) -> Result<AudioBuffer, AudioError> {
        let sample_rate = self.config.sample_rate;
        let frames = frame_count(sample_rate, duration_secs)?;

        tracing::debug!(
            "Recording for {} second(s) ({} samples @ {}Hz)",
            duration_secs,
            frames,
            sample_rate
        );

        let mut samples = self.source.capture(frames, sample_rate)?;
        if samples.len() < frames {
            return Err(AudioError::CaptureError(format!(
                "short capture: {} of {} samples",
                samples.len(),
                frames
            )));
        }
        samples.truncate(frames);

        Ok(AudioBuffer::new(samples, sample_rate))
    }

    /// Record for the configured default duration
    pub fn record_default(&self) -> Result<AudioBuffer, AudioError> {
        self.record(self.config.record_secs)
    }
}

fn frame_count(sample_rate: u32, duration_secs: u32) -> Result<usize, AudioError> {
    if duration_secs == 0 {
        return Err(AudioError::InvalidDuration(duration_secs));
    }

    (sample_rate as usize)
        .checked_mul(duration_secs as usize)
        .ok_or(AudioError::InvalidDuration(duration_secs))
}
