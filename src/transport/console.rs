use crate::error::Result;
use crate::level::Level;
use crate::record::LogRecord;
use crate::transport::Transport;
use async_trait::async_trait;
use colored::{Color, Colorize};

/// Pretty console transport.
///
/// Renders `[timestamp] LEVEL: message` to stdout with a per-level color.
#[derive(Debug, Default)]
pub struct ConsoleTransport;

impl ConsoleTransport {
    pub fn new() -> Self {
        Self
    }

    fn level_color(level: Level) -> Color {
        match level {
            Level::Info => Color::Cyan,
            Level::Warn => Color::Yellow,
            Level::Error => Color::Red,
            Level::Debug => Color::Magenta,
            _ => Color::White,
        }
    }

    fn format_line(record: &LogRecord) -> String {
        format!(
            "[{}] {}: {}",
            record.timestamp,
            record.level.as_str().to_uppercase(),
            record.message
        )
    }
}

#[async_trait]
impl Transport for ConsoleTransport {
    async fn write(&mut self, record: &LogRecord) -> Result<()> {
        let line = Self::format_line(record).color(Self::level_color(record.level));
        println!("{}", line);
        Ok(())
    }
}
