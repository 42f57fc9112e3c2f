//! micbatch - fixed-duration microphone capture
//!
//! Records a batch of samples from the default microphone and writes
//! them to a mono WAV file.

pub mod audio;
pub mod config;

pub use audio::{
    list_input_devices, load, save, AudioBuffer, AudioContext, AudioError, CaptureSource,
    CpalSource, Recorder, SampleEncoding,
};
pub use config::{ConfigError, RecordingConfig};
