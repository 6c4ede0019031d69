//! Error types for the MMS View environment abstraction.

use thiserror::Error;

/// Errors that can occur in the environment abstraction layer.
#[derive(Debug, Error)]
pub enum EnvError {
    /// The media element refused a request (no source loaded, decoder error, etc.)
    #[error("Media error: {0}")]
    MediaError(String),

    /// Playback rate outside what the element supports
    #[error("Unsupported playback rate: {0}")]
    UnsupportedRate(f64),
}

impl EnvError {
    /// Creates a media error.
    pub fn media(msg: impl Into<String>) -> Self {
        Self::MediaError(msg.into())
    }
}
