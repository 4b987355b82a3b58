use crate::error::{LogwardError, Result};
use crate::record::LogRecord;
use crate::transport::Transport;
use async_trait::async_trait;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use tokio::fs::File as TokioFile;
use tokio::io::AsyncWriteExt;

/// Plain append-only file transport with no rotation.
pub struct FileTransport {
    path: PathBuf,
    file: TokioFile,
}

impl FileTransport {
    /// Open (creating parent directories as needed) an append-mode transport
    pub async fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    LogwardError::FileOpen(format!("Failed to create log directory: {}", e))
                })?;
            }
        }

        let file = open_append(&path)?;

        Ok(Self { path, file })
    }

    /// Append one entry plus a trailing newline
    pub async fn write_entry(&mut self, entry: &str) -> Result<()> {
        self.file
            .write_all(entry.as_bytes())
            .await
            .map_err(|e| LogwardError::Write(format!("Failed to write to log: {}", e)))?;
        self.file
            .write_all(b"\n")
            .await
            .map_err(|e| LogwardError::Write(format!("Failed to write to log: {}", e)))?;
        self.file
            .flush()
            .await
            .map_err(|e| LogwardError::Write(format!("Failed to flush log: {}", e)))?;
        Ok(())
    }

    /// Path of the target log file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Open a file in create+append mode as a tokio file handle
pub(crate) fn open_append(path: &Path) -> Result<TokioFile> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| LogwardError::FileOpen(format!("Failed to open log file: {}", e)))?;

    Ok(TokioFile::from_std(file))
}

#[async_trait]
impl Transport for FileTransport {
    async fn write(&mut self, record: &LogRecord) -> Result<()> {
        let line = record.to_json_line()?;
        self.write_entry(&line).await
    }

    async fn shutdown(&mut self) -> Result<()> {
        self.file
            .flush()
            .await
            .map_err(|e| LogwardError::Write(format!("Failed to flush log: {}", e)))
    }
}
