use thiserror::Error;

/// Main error type for logward
#[derive(Debug, Error)]
pub enum LogwardError {
    // File transport errors
    #[error("Failed to open log file: {0}")]
    FileOpen(String),

    #[error("Failed to write log entry: {0}")]
    Write(String),

    #[error("Log rotation failed: {0}")]
    Rotation(String),

    #[error("Compression failed: {0}")]
    Compression(String),

    // Record construction errors
    #[error("Invalid metadata: {0}")]
    Metadata(String),

    #[error("Failed to serialize log record: {0}")]
    Serialize(String),

    // Dispatch errors
    #[error("Transport error: {0}")]
    Transport(String),
}

/// Result type alias using LogwardError
pub type Result<T> = std::result::Result<T, LogwardError>;
