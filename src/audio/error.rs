use std::path::PathBuf;
use thiserror::Error;

/// Audio capture and file errors
#[derive(Error, Debug)]
pub enum AudioError {
    #[error("No usable microphone: {0}")]
    DeviceUnavailable(String),

    #[error("Capture error: {0}")]
    CaptureError(String),

    #[error("Invalid recording duration: {0}s (must be positive)")]
    InvalidDuration(u32),

    #[error("Cannot write {}: {message}", path.display())]
    WriteError { path: PathBuf, message: String },

    #[error("Cannot read {}: {message}", path.display())]
    ReadError { path: PathBuf, message: String },
}

impl AudioError {
    pub(crate) fn write(path: impl Into<PathBuf>, err: impl ToString) -> Self {
        AudioError::WriteError {
            path: path.into(),
            message: err.to_string(),
        }
    }

    pub(crate) fn read(path: impl Into<PathBuf>, err: impl ToString) -> Self {
        AudioError::ReadError {
            path: path.into(),
            message: err.to_string(),
        }
    }
}
