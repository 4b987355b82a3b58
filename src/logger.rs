//! Logger factory and dispatch.
//!
//! A [`Logger`] owns a scrubber and a set of transports. Each log call builds
//! one record (timestamp, sanitized fields, scrubbed metadata) and hands it
//! to every transport in order. A failing transport is reported through
//! `tracing` and skipped; a log call never returns an error to the caller.

use crate::error::Result;
use crate::level::Level;
use crate::record::{LogFields, LogRecord};
use crate::scrub::Scrubber;
use crate::transport::Transport;
use chrono::Utc;
use tokio::sync::Mutex;
use tracing::warn;

/// Structured logger dispatching records to one or more transports.
///
/// Transports sit behind a mutex, so `log` takes `&self` and concurrent
/// calls serialize per transport rather than racing the rotation logic.
pub struct Logger {
    scrubber: Scrubber,
    transports: Vec<Mutex<Box<dyn Transport>>>,
}

impl Logger {
    /// Build a logger from a scrubber and a set of transports
    pub fn new(scrubber: Scrubber, transports: Vec<Box<dyn Transport>>) -> Self {
        Self {
            scrubber,
            transports: transports.into_iter().map(Mutex::new).collect(),
        }
    }

    pub fn builder() -> LoggerBuilder {
        LoggerBuilder::default()
    }

    /// Dispatch one record at the given level.
    ///
    /// Never fails: per-transport errors are reported and swallowed.
    pub async fn log(&self, level: Level, fields: LogFields) {
        let record = LogRecord::build(level, fields, &self.scrubber, Utc::now());

        for transport in &self.transports {
            let mut transport = transport.lock().await;
            if let Err(e) = transport.write(&record).await {
                warn!(error = %e, "transport write failed, dropping log line for it");
            }
        }
    }

    /// Log a bare message at the given level
    pub async fn log_message(&self, level: Level, message: impl Into<String>) {
        self.log(level, LogFields::message(message)).await;
    }

    pub async fn trace(&self, message: impl Into<String>) {
        self.log_message(Level::Trace, message).await;
    }

    pub async fn debug(&self, message: impl Into<String>) {
        self.log_message(Level::Debug, message).await;
    }

    pub async fn info(&self, message: impl Into<String>) {
        self.log_message(Level::Info, message).await;
    }

    pub async fn warn(&self, message: impl Into<String>) {
        self.log_message(Level::Warn, message).await;
    }

    pub async fn error(&self, message: impl Into<String>) {
        self.log_message(Level::Error, message).await;
    }

    pub async fn fatal(&self, message: impl Into<String>) {
        self.log_message(Level::Fatal, message).await;
    }

    /// Shut down every transport, flushing buffers and waiting for any
    /// in-flight compression work.
    ///
    /// Every transport is attempted even when an earlier one fails; the
    /// first failure is returned once the rest have been closed.
    pub async fn shutdown(&self) -> Result<()> {
        let mut first_err = None;
        for transport in &self.transports {
            let mut transport = transport.lock().await;
            if let Err(e) = transport.shutdown().await {
                warn!(error = %e, "transport shutdown failed");
                if first_err.is_none() {
                    first_err = Some(e);
                }
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Builder for [`Logger`]
#[derive(Default)]
pub struct LoggerBuilder {
    scrubber: Option<Scrubber>,
    transports: Vec<Box<dyn Transport>>,
}

impl LoggerBuilder {
    /// Replace the default scrubber
    pub fn scrubber(mut self, scrubber: Scrubber) -> Self {
        self.scrubber = Some(scrubber);
        self
    }

    /// Add a transport
    pub fn transport(mut self, transport: Box<dyn Transport>) -> Self {
        self.transports.push(transport);
        self
    }

    pub fn build(self) -> Logger {
        Logger::new(self.scrubber.unwrap_or_default(), self.transports)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LogwardError;
    use async_trait::async_trait;
    use std::sync::Arc;

    /// Transport that records everything it is given
    struct CapturingTransport {
        records: Arc<std::sync::Mutex<Vec<LogRecord>>>,
    }

    #[async_trait]
    impl Transport for CapturingTransport {
        async fn write(&mut self, record: &LogRecord) -> Result<()> {
            self.records.lock().unwrap().push(record.clone());
            Ok(())
        }
    }

    /// Transport that always fails
    struct FailingTransport;

    #[async_trait]
    impl Transport for FailingTransport {
        async fn write(&mut self, _record: &LogRecord) -> Result<()> {
            Err(LogwardError::Transport("broken pipe".to_string()))
        }

        async fn shutdown(&mut self) -> Result<()> {
            Err(LogwardError::Transport("broken pipe".to_string()))
        }
    }

    /// Transport that records whether it was shut down
    struct ClosableTransport {
        closed: Arc<std::sync::atomic::AtomicBool>,
    }

    #[async_trait]
    impl Transport for ClosableTransport {
        async fn write(&mut self, _record: &LogRecord) -> Result<()> {
            Ok(())
        }

        async fn shutdown(&mut self) -> Result<()> {
            self.closed.store(true, std::sync::atomic::Ordering::SeqCst);
            Ok(())
        }
    }

    fn capturing() -> (Arc<std::sync::Mutex<Vec<LogRecord>>>, Box<dyn Transport>) {
        let records = Arc::new(std::sync::Mutex::new(Vec::new()));
        let transport = CapturingTransport {
            records: records.clone(),
        };
        (records, Box::new(transport))
    }

    #[tokio::test]
    async fn test_log_dispatches_to_all_transports() {
        let (records_a, transport_a) = capturing();
        let (records_b, transport_b) = capturing();
        let logger = Logger::builder()
            .transport(transport_a)
            .transport(transport_b)
            .build();

        logger.info("hello").await;

        assert_eq!(records_a.lock().unwrap().len(), 1);
        assert_eq!(records_b.lock().unwrap().len(), 1);
        assert_eq!(records_a.lock().unwrap()[0].message, "hello");
    }

    #[tokio::test]
    async fn test_failing_transport_does_not_block_others() {
        let (records, transport) = capturing();
        let logger = Logger::builder()
            .transport(Box::new(FailingTransport))
            .transport(transport)
            .build();

        logger.error("still delivered").await;

        let records = records.lock().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].message, "still delivered");
        assert_eq!(records[0].level, Level::Error);
    }

    #[tokio::test]
    async fn test_metadata_is_scrubbed_before_dispatch() {
        let (records, transport) = capturing();
        let logger = Logger::builder().transport(transport).build();

        logger
            .log(
                Level::Info,
                LogFields {
                    message: "login".to_string(),
                    metadata: serde_json::json!({"password": "hunter2"}),
                    ..Default::default()
                },
            )
            .await;

        let records = records.lock().unwrap();
        assert_eq!(records[0].metadata["password"], "[REDACTED]");
    }

    #[tokio::test]
    async fn test_shutdown_attempts_all_transports_after_failure() {
        let closed = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let logger = Logger::builder()
            .transport(Box::new(FailingTransport))
            .transport(Box::new(ClosableTransport {
                closed: closed.clone(),
            }))
            .build();

        let result = logger.shutdown().await;

        // The first transport's failure is surfaced, but the second
        // transport was still flushed and closed
        assert!(result.is_err());
        assert!(closed.load(std::sync::atomic::Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_level_helpers_set_level() {
        let (records, transport) = capturing();
        let logger = Logger::builder().transport(transport).build();

        logger.trace("t").await;
        logger.debug("d").await;
        logger.warn("w").await;
        logger.fatal("f").await;

        let levels: Vec<Level> = records.lock().unwrap().iter().map(|r| r.level).collect();
        assert_eq!(
            levels,
            vec![Level::Trace, Level::Debug, Level::Warn, Level::Fatal]
        );
    }
}
