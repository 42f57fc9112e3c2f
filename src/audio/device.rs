//! Default device resolution
//!
//! The host's default microphone is looked up once, at startup, and the
//! resulting [`AudioContext`] is handed to whatever needs it.

use cpal::traits::{DeviceTrait, HostTrait};

use super::error::AudioError;

/// Device identifiers resolved from the host audio subsystem
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioContext {
    microphone: String,
    speaker: Option<String>,
}

impl AudioContext {
    /// Resolve the default input (and, if any, output) device of the default host
    pub fn resolve() -> Result<Self, AudioError> {
        let host = cpal::default_host();

        let microphone = host
            .default_input_device()
            .ok_or_else(|| AudioError::DeviceUnavailable("no default input device".into()))?
            .name()
            .map_err(|e| AudioError::DeviceUnavailable(e.to_string()))?;

        let speaker = host.default_output_device().and_then(|d| d.name().ok());

        tracing::info!(
            "Default devices: microphone={:?} speaker={:?}",
            microphone,
            speaker
        );

        Ok(Self::new(microphone, speaker))
    }

    pub fn new(microphone: impl Into<String>, speaker: Option<String>) -> Self {
        Self {
            microphone: microphone.into(),
            speaker,
        }
    }

    /// Name of the microphone used for recording
    pub fn microphone(&self) -> &str {
        &self.microphone
    }

    pub fn speaker(&self) -> Option<&str> {
        self.speaker.as_deref()
    }
}

/// List available input devices
pub fn list_input_devices() -> Vec<String> {
    let host = cpal::default_host();
    host.input_devices()
        .map(|devices| devices.filter_map(|d| d.name().ok()).collect())
        .unwrap_or_default()
}
