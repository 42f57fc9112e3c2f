//! Audio capture and persistence
//!
//! Device resolution, blocking microphone capture and WAV writing.

mod buffer;
mod device;
mod dsp;
mod error;
mod microphone;
mod recorder;
mod writer;

pub use buffer::AudioBuffer;
pub use device::{list_input_devices, AudioContext};
pub use error::AudioError;
pub use microphone::{CaptureSource, CpalSource};
pub use recorder::Recorder;
pub use writer::{load, save, SampleEncoding};
