//! Error types shared across Coverreel crates.

use std::path::PathBuf;

/// Top-level error type for Coverreel operations.
#[derive(Debug, thiserror::Error)]
pub enum CoverreelError {
    #[error("Private file area unavailable: {message}")]
    StoreUnsupported { message: String },

    #[error("Store error: {message}")]
    StoreIo { message: String },

    #[error("Engine initialization failed: {message}")]
    EngineInit { message: String },

    #[error("Staging error: {message}")]
    Staging { message: String },

    #[error("Encode failed: {message}")]
    Encode { message: String },

    #[error("Failed to read output: {message}")]
    OutputRead { message: String },

    #[error("{message}")]
    Validation { message: String },

    #[error("A video is already being produced")]
    Busy,

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using CoverreelError.
pub type CoverreelResult<T> = Result<T, CoverreelError>;

impl CoverreelError {
    pub fn store_unsupported(msg: impl Into<String>) -> Self {
        Self::StoreUnsupported {
            message: msg.into(),
        }
    }

    pub fn store_io(msg: impl Into<String>) -> Self {
        Self::StoreIo {
            message: msg.into(),
        }
    }

    pub fn engine_init(msg: impl Into<String>) -> Self {
        Self::EngineInit {
            message: msg.into(),
        }
    }

    pub fn staging(msg: impl Into<String>) -> Self {
        Self::Staging {
            message: msg.into(),
        }
    }

    pub fn encode(msg: impl Into<String>) -> Self {
        Self::Encode {
            message: msg.into(),
        }
    }

    pub fn output_read(msg: impl Into<String>) -> Self {
        Self::OutputRead {
            message: msg.into(),
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Short machine-friendly label for the error category.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::StoreUnsupported { .. } => "store_unsupported",
            Self::StoreIo { .. } => "store_io",
            Self::EngineInit { .. } => "engine_init",
            Self::Staging { .. } => "staging",
            Self::Encode { .. } => "encode",
            Self::OutputRead { .. } => "output_read",
            Self::Validation { .. } => "validation",
            Self::Busy => "busy",
            Self::Config { .. } => "config",
            Self::FileNotFound { .. } => "file_not_found",
            Self::Io(_) => "io",
            Self::Json(_) => "json",
            Self::Other(_) => "other",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_message_is_user_facing() {
        let err = CoverreelError::validation("Choose an audio file first");
        assert_eq!(err.to_string(), "Choose an audio file first");
        assert_eq!(err.kind(), "validation");
    }

    #[test]
    fn test_io_errors_convert() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: CoverreelError = io.into();
        assert_eq!(err.kind(), "io");
    }
}
