//! Recording configuration
//!
//! Defaults can be overridden through `MICBATCH_*` environment variables.

use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

use crate::audio::SampleEncoding;

pub const DEFAULT_SAMPLE_RATE: u32 = 16000;
pub const DEFAULT_RECORD_SECS: u32 = 5;
pub const DEFAULT_OUTPUT_FILE: &str = "output.wav";

pub const SAMPLE_RATE_VAR: &str = "MICBATCH_SAMPLE_RATE";
pub const RECORD_SECS_VAR: &str = "MICBATCH_RECORD_SECS";
pub const OUTPUT_FILE_VAR: &str = "MICBATCH_OUTPUT_FILE";
pub const ENCODING_VAR: &str = "MICBATCH_ENCODING";

/// Configuration errors
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var}: invalid value {value:?} ({reason})")]
    InvalidValue {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Recording and output settings
#[derive(Debug, Clone, PartialEq)]
pub struct RecordingConfig {
    /// Sample rate of recorded buffers and written files (Hz)
    pub sample_rate: u32,
    /// Duration used by `record_default` (seconds)
    pub record_secs: u32,
    /// Where the driver writes its recording
    pub output_file: PathBuf,
    /// WAV sample encoding
    pub encoding: SampleEncoding,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            record_secs: DEFAULT_RECORD_SECS,
            output_file: PathBuf::from(DEFAULT_OUTPUT_FILE),
            encoding: SampleEncoding::default(),
        }
    }
}

impl RecordingConfig {
    /// Defaults overridden by the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each variable
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(value) = lookup(SAMPLE_RATE_VAR) {
            config.sample_rate = parse_positive(SAMPLE_RATE_VAR, &value)?;
        }
        if let Some(value) = lookup(RECORD_SECS_VAR) {
            config.record_secs = parse_positive(RECORD_SECS_VAR, &value)?;
        }
        if let Some(value) = lookup(OUTPUT_FILE_VAR) {
            if value.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    var: OUTPUT_FILE_VAR,
                    value,
                    reason: "empty path".into(),
                });
            }
            config.output_file = PathBuf::from(value);
        }
        if let Some(value) = lookup(ENCODING_VAR) {
            config.encoding =
                SampleEncoding::from_str(&value).map_err(|reason| ConfigError::InvalidValue {
                    var: ENCODING_VAR,
                    value: value.clone(),
                    reason,
                })?;
        }

        Ok(config)
    }
}

fn parse_positive(var: &'static str, value: &str) -> Result<u32, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidValue {
        var,
        value: value.to_string(),
        reason,
    };

    match value.trim().parse::<u32>() {
        Ok(0) => Err(invalid("must be positive".into())),
        Ok(n) => Ok(n),
        Err(e) => Err(invalid(e.to_string())),
    }
}
