use thiserror::Error;

/// Main error type for the video-collage library
#[derive(Error, Debug)]
pub enum CollageError {
    #[error("Video processing error: {0}")]
    Video(#[from] VideoError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Video-specific errors
#[derive(Error, Debug)]
pub enum VideoError {
    #[error("Input video(s) not found: {}", .paths.join(", "))]
    InputsMissing { paths: Vec<String> },

    #[error("Could not open video: {path} ({reason})")]
    OpenFailed { path: String, reason: String },

    #[error("Could not open video writer for {path} with codec '{codec}': {reason}")]
    EncoderOpenFailed {
        path: String,
        codec: String,
        reason: String,
    },

    #[error("Required tool not available: {tool}")]
    ToolMissing { tool: String },

    #[error("Video decoding failed: {reason}")]
    DecodingFailed { reason: String },

    #[error("Video encoding failed: {reason}")]
    EncodingFailed { reason: String },

    #[error("Invalid video parameters: {details}")]
    InvalidParameters { details: String },
}

/// Configuration-specific errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to parse configuration file: {path}: {reason}")]
    ParseFailed { path: String, reason: String },

    #[error("Invalid configuration value: {key} = {value}")]
    InvalidValue { key: String, value: String },

    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },
}

/// Convenience type alias for Results using CollageError
pub type Result<T> = std::result::Result<T, CollageError>;

impl CollageError {
    /// Get a user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            Self::Video(VideoError::InputsMissing { paths }) => {
                format!(
                    "One or more input videos do not exist: {}",
                    paths.join(", ")
                )
            }
            Self::Video(VideoError::OpenFailed { path, reason }) => {
                format!(
                    "Could not open video '{}' ({}). Please check it is a readable video file.",
                    path, reason
                )
            }
            Self::Video(VideoError::EncoderOpenFailed { path, codec, .. }) => {
                format!(
                    "Could not open a video writer for '{}' with codec '{}'. Try codec 'avc1' or a different output extension.",
                    path, codec
                )
            }
            Self::Video(VideoError::ToolMissing { tool }) => {
                format!("'{}' was not found on PATH. Please install FFmpeg.", tool)
            }
            Self::Config(ConfigError::FileNotFound { path }) => {
                format!("Configuration file '{}' not found.", path)
            }
            _ => self.to_string(),
        }
    }
}
