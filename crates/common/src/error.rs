//! Error types shared across Shotform crates.

use std::path::PathBuf;

/// Top-level error type for Shotform operations.
#[derive(Debug, thiserror::Error)]
pub enum ShotformError {
    #[error("Pose estimation error: {message}")]
    Estimation { message: String },

    #[error("Session error: {message}")]
    Session { message: String },

    #[error("File not found: {}", .path.display())]
    FileNotFound { path: PathBuf },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using ShotformError.
pub type ShotformResult<T> = Result<T, ShotformError>;

impl ShotformError {
    pub fn estimation(msg: impl Into<String>) -> Self {
        Self::Estimation {
            message: msg.into(),
        }
    }

    pub fn session(msg: impl Into<String>) -> Self {
        Self::Session {
            message: msg.into(),
        }
    }
}
