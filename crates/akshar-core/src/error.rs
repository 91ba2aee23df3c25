//! Error types for GAN training.
//!
//! Tensor-level failures come from candle and are wrapped as-is; data,
//! checkpoint and I/O failures carry the path they occurred at.

use thiserror::Error;

/// Main error type for training operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum GanError {
    /// Errors from the candle tensor library (shapes, devices, OOM).
    #[error("Candle error: {0}")]
    Candle(#[from] candle_core::Error),

    /// Dataset missing, unreadable, or of the wrong shape.
    #[error("Dataset error at '{path}': {message}")]
    Dataset { message: String, path: String },

    /// Checkpoint save/load failures.
    #[error("Checkpoint error at '{path}': {message}")]
    Checkpoint { message: String, path: String },

    /// Configuration validation failures.
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors with path context.
    #[error("IO error at '{path}': {message}")]
    Io { message: String, path: String },

    /// Sample grid or loss curve could not be written.
    #[error("Render error: {0}")]
    Render(String),

    /// JSON (de)serialization of metadata.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for training operations.
pub type GanResult<T> = std::result::Result<T, GanError>;

impl GanError {
    /// Get the path associated with this error (if any).
    pub fn path(&self) -> Option<&str> {
        match self {
            GanError::Dataset { path, .. }
            | GanError::Checkpoint { path, .. }
            | GanError::Io { path, .. } => Some(path),
            _ => None,
        }
    }
}

impl From<std::io::Error> for GanError {
    fn from(err: std::io::Error) -> Self {
        GanError::Io {
            message: err.to_string(),
            path: String::new(),
        }
    }
}

/// Helper trait for adding path context to IO operations.
pub trait IoResultExt<T> {
    fn with_path<P: AsRef<std::path::Path>>(self, path: P) -> GanResult<T>;
}

impl<T> IoResultExt<T> for std::io::Result<T> {
    fn with_path<P: AsRef<std::path::Path>>(self, path: P) -> GanResult<T> {
        self.map_err(|e| GanError::Io {
            message: e.to_string(),
            path: path.as_ref().display().to_string(),
        })
    }
}

/// Helper for creating dataset errors.
pub fn dataset_error<P: AsRef<std::path::Path>>(message: impl Into<String>, path: P) -> GanError {
    GanError::Dataset {
        message: message.into(),
        path: path.as_ref().display().to_string(),
    }
}

/// Helper for creating checkpoint errors.
pub fn checkpoint_error<P: AsRef<std::path::Path>>(
    message: impl Into<String>,
    path: P,
) -> GanError {
    GanError::Checkpoint {
        message: message.into(),
        path: path.as_ref().display().to_string(),
    }
}

/// Helper for creating config errors.
pub fn config_error(message: impl Into<String>) -> GanError {
    GanError::Config(message.into())
}
