//! Rotating file transport.
//!
//! Wraps an append-only log file with a rotation policy. Rotation is
//! evaluated before every write: daily mode rotates when the UTC calendar
//! date changes, size mode rotates when the file has reached `max_size`
//! bytes. Rotated files keep the active file's name plus a suffix (the
//! period key for daily mode, the smallest unused integer for size mode),
//! are optionally gzipped in a detached task, and old rotations are pruned
//! down to `max_files` by a best-effort directory sweep.
//!
//! A transport assumes it is the sole writer to its path. Rotation failures
//! never fail the write that triggered them; the entry lands on whichever
//! stream is open once rotation handling finishes.

use crate::error::{LogwardError, Result};
use crate::record::LogRecord;
use crate::transport::file::open_append;
use crate::transport::Transport;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::UNIX_EPOCH;
use tokio::fs::File as TokioFile;
use tokio::io::AsyncWriteExt;
use tokio::task::JoinHandle;
use tracing::{error, warn};

/// Default maximum file size before rotation in size mode (5 MiB)
const DEFAULT_MAX_SIZE: u64 = 5 * 1024 * 1024;

/// Default number of rotated files to retain
const DEFAULT_MAX_FILES: usize = 5;

/// Source of "now" for rotation decisions; replaceable for deterministic tests
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// When the transport rotates its file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RotationMode {
    /// Rotate when the UTC calendar date changes
    #[default]
    Daily,
    /// Rotate when the file reaches `max_size` bytes
    Size,
}

/// Rotation configuration for a [`RotatingFileTransport`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RotationPolicy {
    #[serde(default)]
    pub rotation: RotationMode,

    /// Maximum file size in bytes before rotation (size mode only)
    #[serde(default = "default_max_size")]
    pub max_size: u64,

    /// Maximum number of rotated files to retain
    #[serde(default = "default_max_files")]
    pub max_files: usize,

    /// Gzip rotated files
    #[serde(default)]
    pub compress: bool,
}

fn default_max_size() -> u64 {
    DEFAULT_MAX_SIZE
}

fn default_max_files() -> usize {
    DEFAULT_MAX_FILES
}

impl Default for RotationPolicy {
    fn default() -> Self {
        Self {
            rotation: RotationMode::Daily,
            max_size: DEFAULT_MAX_SIZE,
            max_files: DEFAULT_MAX_FILES,
            compress: false,
        }
    }
}

impl RotationPolicy {
    /// Daily rotation with default retention
    pub fn daily() -> Self {
        Self::default()
    }

    /// Size-based rotation at the given threshold
    pub fn size(max_size: u64) -> Self {
        Self {
            rotation: RotationMode::Size,
            max_size,
            ..Self::default()
        }
    }

    /// Enable gzip compression of rotated files
    pub fn with_compress(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    /// Set the number of rotated files to retain
    pub fn with_max_files(mut self, max_files: usize) -> Self {
        self.max_files = max_files;
        self
    }

    /// Replace out-of-range values with defaults rather than failing
    fn normalized(mut self) -> Self {
        if self.max_size == 0 {
            self.max_size = DEFAULT_MAX_SIZE;
        }
        if self.max_files == 0 {
            self.max_files = DEFAULT_MAX_FILES;
        }
        self
    }
}

/// Append-only file transport with rotation, optional compression, and
/// retention pruning. See the module docs for the lifecycle.
pub struct RotatingFileTransport {
    file_path: PathBuf,
    file: TokioFile,
    policy: RotationPolicy,
    /// Period key (`YYYY-MM-DD`, UTC) of the currently open file; daily mode only
    current_day: Option<String>,
    clock: Clock,
    /// In-flight compression tasks, awaited on shutdown
    compressions: Vec<JoinHandle<()>>,
}

impl RotatingFileTransport {
    /// Open a rotating transport at `path` with the given policy.
    ///
    /// Parent directories are created as needed and the file is opened in
    /// append mode immediately.
    pub async fn new<P: AsRef<Path>>(path: P, policy: RotationPolicy) -> Result<Self> {
        Self::with_clock(path, policy, Arc::new(Utc::now)).await
    }

    /// Like [`RotatingFileTransport::new`] but with an injected clock, so
    /// tests can drive daily rotation without waiting for midnight.
    pub async fn with_clock<P: AsRef<Path>>(
        path: P,
        policy: RotationPolicy,
        clock: Clock,
    ) -> Result<Self> {
        let file_path = path.as_ref().to_path_buf();
        let policy = policy.normalized();

        if let Some(parent) = file_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    LogwardError::FileOpen(format!("Failed to create log directory: {}", e))
                })?;
            }
        }

        let file = open_append(&file_path)?;

        let current_day = match policy.rotation {
            RotationMode::Daily => Some(day_key(clock())),
            RotationMode::Size => None,
        };

        Ok(Self {
            file_path,
            file,
            policy,
            current_day,
            clock,
            compressions: Vec::new(),
        })
    }

    /// Append one entry plus a trailing newline, rotating first if due.
    ///
    /// Rotation failures are reported and swallowed; the entry is appended to
    /// whichever stream is open afterwards.
    pub async fn write(&mut self, entry: &str) -> Result<()> {
        if let Err(e) = self.rotate_if_due().await {
            warn!(
                path = %self.file_path.display(),
                error = %e,
                "log rotation failed, continuing on current file"
            );
        }

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

    /// Flush the stream and wait for any in-flight compression tasks
    pub async fn shutdown(&mut self) -> Result<()> {
        self.file
            .flush()
            .await
            .map_err(|e| LogwardError::Write(format!("Failed to flush log: {}", e)))?;

        for handle in self.compressions.drain(..) {
            if let Err(e) = handle.await {
                warn!(error = %e, "compression task did not complete cleanly");
            }
        }

        Ok(())
    }

    /// Path of the active log file
    pub fn path(&self) -> &Path {
        &self.file_path
    }

    pub fn policy(&self) -> &RotationPolicy {
        &self.policy
    }

    async fn rotate_if_due(&mut self) -> Result<()> {
        match self.policy.rotation {
            RotationMode::Daily => {
                let today = day_key((self.clock)());
                if self.current_day.as_deref() != Some(today.as_str()) {
                    self.rotate_daily(&today).await?;
                }
            }
            RotationMode::Size => {
                // Stat failures (file not created yet) mean no rotation
                let size = match tokio::fs::metadata(&self.file_path).await {
                    Ok(meta) => meta.len(),
                    Err(_) => return Ok(()),
                };
                if size >= self.policy.max_size {
                    self.rotate_size().await?;
                }
            }
        }
        Ok(())
    }

    /// The date changed: move the open file aside under the old period key
    /// and start a fresh one. A missing file (nothing written since startup
    /// on a fresh path) skips the rename but still advances the period key.
    async fn rotate_daily(&mut self, today: &str) -> Result<()> {
        let stored_key = self
            .current_day
            .clone()
            .unwrap_or_else(|| today.to_string());
        let rotated = suffixed(&self.file_path, &stored_key);

        let _ = self.file.flush().await;

        match tokio::fs::rename(&self.file_path, &rotated).await {
            Ok(()) => {
                if self.policy.compress {
                    self.spawn_compression(rotated);
                }
                self.cleanup().await;
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                warn!(
                    path = %self.file_path.display(),
                    error = %e,
                    "daily rotation rename failed"
                );
            }
        }

        self.current_day = Some(today.to_string());
        self.file = open_append(&self.file_path)?;

        Ok(())
    }

    /// The file reached `max_size`: move it to the lowest unused numeric
    /// suffix and start a fresh one.
    async fn rotate_size(&mut self) -> Result<()> {
        let rotated = next_rotation_slot(&self.file_path).await;

        let _ = self.file.flush().await;

        tokio::fs::rename(&self.file_path, &rotated)
            .await
            .map_err(|e| LogwardError::Rotation(format!("Failed to rotate log: {}", e)))?;

        if self.policy.compress {
            self.spawn_compression(rotated);
        }
        self.cleanup().await;

        self.file = open_append(&self.file_path)?;

        Ok(())
    }

    /// Gzip a rotated file in a detached blocking task. The triggering write
    /// does not wait; `shutdown` collects the handle.
    fn spawn_compression(&mut self, rotated: PathBuf) {
        let handle = tokio::task::spawn_blocking(move || {
            if let Err(e) = compress_file(&rotated) {
                error!(
                    path = %rotated.display(),
                    error = %e,
                    "failed to compress rotated log, leaving uncompressed file in place"
                );
            }
        });
        self.compressions.push(handle);
    }

    /// Prune rotated files beyond `max_files`, newest (by mtime) first.
    /// Every failure here is ignored; retention is best-effort.
    async fn cleanup(&self) {
        prune_rotated_files(&self.file_path, self.policy.max_files).await;
    }
}

#[async_trait]
impl Transport for RotatingFileTransport {
    async fn write(&mut self, record: &LogRecord) -> Result<()> {
        let line = record.to_json_line()?;
        RotatingFileTransport::write(self, &line).await
    }

    async fn shutdown(&mut self) -> Result<()> {
        RotatingFileTransport::shutdown(self).await
    }
}

/// Append `.{suffix}` to the file name of `path`
fn suffixed(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(format!(".{}", suffix));
    path.with_file_name(name)
}

/// UTC period key for daily rotation
fn day_key(now: DateTime<Utc>) -> String {
    now.format("%Y-%m-%d").to_string()
}

/// Find the lowest positive integer suffix with no file (compressed or not)
/// already in the way.
async fn next_rotation_slot(path: &Path) -> PathBuf {
    let mut n: u32 = 1;
    loop {
        let candidate = suffixed(path, &n.to_string());
        let gz = suffixed(&candidate, "gz");
        let taken = tokio::fs::try_exists(&candidate).await.unwrap_or(false)
            || tokio::fs::try_exists(&gz).await.unwrap_or(false);
        if !taken {
            return candidate;
        }
        n += 1;
    }
}

/// Delete rotated files for `path` past `max_files`, keeping the most
/// recently modified. Per-file failures are logged and skipped.
async fn prune_rotated_files(path: &Path, max_files: usize) {
    let file_name = match path.file_name().and_then(|n| n.to_str()) {
        Some(name) => name,
        None => return,
    };
    let prefix = format!("{}.", file_name);
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut read_dir = match tokio::fs::read_dir(dir).await {
        Ok(rd) => rd,
        Err(_) => return,
    };

    let mut rotated = Vec::new();
    while let Ok(Some(entry)) = read_dir.next_entry().await {
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if !name.starts_with(&prefix) {
            continue;
        }
        let modified = match entry.metadata().await {
            Ok(meta) => meta.modified().unwrap_or(UNIX_EPOCH),
            Err(_) => UNIX_EPOCH,
        };
        rotated.push((entry.path(), modified));
    }

    // Most recent first; name as tie-break for stable ordering
    rotated.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| b.0.cmp(&a.0)));

    for (stale, _) in rotated.iter().skip(max_files) {
        if let Err(e) = tokio::fs::remove_file(stale).await {
            warn!(path = %stale.display(), error = %e, "failed to delete rotated log");
        }
    }
}

/// Gzip `src` to `src.gz`, deleting `src` only once the compressed file is
/// fully written and closed. On failure the partial `.gz` is removed and
/// `src` is left intact for manual recovery.
fn compress_file(src: &Path) -> std::io::Result<()> {
    let gz_path = suffixed(src, "gz");

    let written = (|| -> std::io::Result<()> {
        let input = std::fs::File::open(src)?;
        let output = std::fs::File::create(&gz_path)?;
        let mut encoder = GzEncoder::new(output, Compression::default());
        std::io::copy(&mut std::io::BufReader::new(input), &mut encoder)?;
        encoder.finish()?;
        Ok(())
    })();

    match written {
        Ok(()) => std::fs::remove_file(src),
        Err(e) => {
            let _ = std::fs::remove_file(&gz_path);
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use tempfile::TempDir;

    #[test]
    fn test_suffixed_appends_to_full_file_name() {
        let path = Path::new("/var/log/app.log");
        assert_eq!(suffixed(path, "1"), Path::new("/var/log/app.log.1"));
        assert_eq!(
            suffixed(path, "2024-03-15"),
            Path::new("/var/log/app.log.2024-03-15")
        );
        assert_eq!(
            suffixed(&suffixed(path, "1"), "gz"),
            Path::new("/var/log/app.log.1.gz")
        );
    }

    #[test]
    fn test_day_key_format() {
        use chrono::TimeZone;
        let now = Utc.with_ymd_and_hms(2024, 3, 5, 23, 59, 59).unwrap();
        assert_eq!(day_key(now), "2024-03-05");
    }

    #[test]
    fn test_policy_defaults() {
        let policy = RotationPolicy::default();
        assert_eq!(policy.rotation, RotationMode::Daily);
        assert_eq!(policy.max_size, 5 * 1024 * 1024);
        assert_eq!(policy.max_files, 5);
        assert!(!policy.compress);
    }

    #[test]
    fn test_policy_deserializes_with_missing_fields() {
        let policy: RotationPolicy = serde_json::from_str(r#"{"rotation": "size"}"#).unwrap();
        assert_eq!(policy.rotation, RotationMode::Size);
        assert_eq!(policy.max_size, 5 * 1024 * 1024);
        assert_eq!(policy.max_files, 5);
        assert!(!policy.compress);

        let policy: RotationPolicy = serde_json::from_str("{}").unwrap();
        assert_eq!(policy.rotation, RotationMode::Daily);
    }

    #[test]
    fn test_policy_normalizes_zero_values_to_defaults() {
        let policy = RotationPolicy {
            rotation: RotationMode::Size,
            max_size: 0,
            max_files: 0,
            compress: false,
        }
        .normalized();
        assert_eq!(policy.max_size, 5 * 1024 * 1024);
        assert_eq!(policy.max_files, 5);
    }

    #[tokio::test]
    async fn test_next_rotation_slot_skips_existing_and_gz() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("app.log");

        assert_eq!(next_rotation_slot(&path).await, suffixed(&path, "1"));

        tokio::fs::write(suffixed(&path, "1"), b"x").await.unwrap();
        assert_eq!(next_rotation_slot(&path).await, suffixed(&path, "2"));

        // A compressed artifact claims the slot too
        tokio::fs::write(suffixed(&suffixed(&path, "2"), "gz"), b"x")
            .await
            .unwrap();
        assert_eq!(next_rotation_slot(&path).await, suffixed(&path, "3"));
    }

    #[tokio::test]
    async fn test_prune_keeps_most_recent() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("app.log");

        for n in 1..=5 {
            tokio::fs::write(suffixed(&path, &n.to_string()), b"x")
                .await
                .unwrap();
            // Distinct mtimes so the retention order is unambiguous
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }

        prune_rotated_files(&path, 2).await;

        let mut remaining = Vec::new();
        let mut read_dir = tokio::fs::read_dir(temp_dir.path()).await.unwrap();
        while let Ok(Some(entry)) = read_dir.next_entry().await {
            remaining.push(entry.file_name().to_string_lossy().into_owned());
        }
        remaining.sort();
        assert_eq!(remaining, vec!["app.log.4", "app.log.5"]);
    }

    #[tokio::test]
    async fn test_prune_ignores_unrelated_files() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("app.log");

        tokio::fs::write(&path, b"active").await.unwrap();
        tokio::fs::write(temp_dir.path().join("other.log"), b"x")
            .await
            .unwrap();
        tokio::fs::write(suffixed(&path, "1"), b"x").await.unwrap();

        prune_rotated_files(&path, 0).await;

        assert!(path.exists());
        assert!(temp_dir.path().join("other.log").exists());
        assert!(!suffixed(&path, "1").exists());
    }

    #[test]
    fn test_compress_file_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let src = temp_dir.path().join("app.log.1");
        let payload = b"entry one\nentry two\n";
        std::fs::write(&src, payload).unwrap();

        compress_file(&src).unwrap();

        let gz_path = suffixed(&src, "gz");
        assert!(!src.exists());
        assert!(gz_path.exists());

        let mut decoder = flate2::read::GzDecoder::new(std::fs::File::open(&gz_path).unwrap());
        let mut decompressed = Vec::new();
        decoder.read_to_end(&mut decompressed).unwrap();
        assert_eq!(decompressed, payload);
    }

    #[test]
    fn test_compress_file_missing_source_leaves_no_artifact() {
        let temp_dir = TempDir::new().unwrap();
        let src = temp_dir.path().join("absent.log.1");

        assert!(compress_file(&src).is_err());
        assert!(!suffixed(&src, "gz").exists());
    }
}
