// Transport module - log record output destinations

mod console;
mod file;
mod rotating;

pub use console::ConsoleTransport;
pub use file::FileTransport;
pub use rotating::{Clock, RotatingFileTransport, RotationMode, RotationPolicy};

use crate::error::Result;
use crate::record::LogRecord;
use async_trait::async_trait;

/// A destination for finished log records.
///
/// File-backed transports serialize the record to a single JSON line; the
/// console transport renders a human-readable colored line.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Deliver one record to this transport
    async fn write(&mut self, record: &LogRecord) -> Result<()>;

    /// Flush buffered output and release resources.
    ///
    /// Transports without buffered state use the default no-op.
    async fn shutdown(&mut self) -> Result<()> {
        Ok(())
    }
}
