//! Error types shared across Shotcraft crates.

use std::path::PathBuf;

/// Top-level error type for Shotcraft operations.
#[derive(Debug, thiserror::Error)]
pub enum ShotcraftError {
    /// Source media is unreachable or unreadable.
    #[error("Asset access error: {message}")]
    AssetAccess { message: String },

    #[error("The video file contains no video track: {path}")]
    NoVideoTrack { path: PathBuf },

    /// Destination container or one of its tracks could not be created.
    #[error("Pipeline setup error: {message}")]
    PipelineSetup { message: String },

    /// Decode, encode, or mux failure after streaming started.
    #[error("Stream error: {message}")]
    Stream { message: String },

    #[error("Render error: {message}")]
    Render { message: String },

    #[error("Project error: {message}")]
    Project { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Export cancelled")]
    Cancelled,

    #[error("Unsupported operation: {message}")]
    Unsupported { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using ShotcraftError.
pub type ShotcraftResult<T> = Result<T, ShotcraftError>;

impl ShotcraftError {
    pub fn asset_access(msg: impl Into<String>) -> Self {
        Self::AssetAccess {
            message: msg.into(),
        }
    }

    pub fn pipeline_setup(msg: impl Into<String>) -> Self {
        Self::PipelineSetup {
            message: msg.into(),
        }
    }

    pub fn stream(msg: impl Into<String>) -> Self {
        Self::Stream {
            message: msg.into(),
        }
    }

    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render {
            message: msg.into(),
        }
    }

    pub fn project(msg: impl Into<String>) -> Self {
        Self::Project {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported {
            message: msg.into(),
        }
    }

    /// Whether this error came from a cooperative cancellation rather than a fault.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_helper_constructors_format_messages() {
        let err = ShotcraftError::pipeline_setup("cannot add audio track");
        assert_eq!(
            err.to_string(),
            "Pipeline setup error: cannot add audio track"
        );

        let err = ShotcraftError::NoVideoTrack {
            path: PathBuf::from("/tmp/clip.mov"),
        };
        assert!(err.to_string().contains("/tmp/clip.mov"));
    }

    #[test]
    fn test_cancelled_is_distinguishable() {
        assert!(ShotcraftError::Cancelled.is_cancelled());
        assert!(!ShotcraftError::stream("decode failed").is_cancelled());
    }

    #[test]
    fn test_io_error_converts() {
        fn fails() -> ShotcraftResult<()> {
            Err(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"))?;
            Ok(())
        }
        assert!(matches!(fails(), Err(ShotcraftError::Io(_))));
    }
}
