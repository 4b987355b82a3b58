// Library exports for logward structured logging

pub mod error;
pub mod level;
pub mod logger;
pub mod record;
pub mod sanitize;
pub mod scrub;
pub mod transport;

pub use error::{LogwardError, Result};
pub use level::Level;
pub use logger::{Logger, LoggerBuilder};
pub use record::{metadata_value, LogFields, LogRecord};
pub use scrub::{Scrubber, REDACTED};
pub use transport::{
    ConsoleTransport, FileTransport, RotatingFileTransport, RotationMode, RotationPolicy,
    Transport,
};
