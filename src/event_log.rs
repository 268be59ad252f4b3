//! Append-only diagnostic event log
//!
//! Each entry is one line prefixed with the uptime since boot, e.g.
//! `[01:02:03] MQTT publish failed: ...`. Writing is best-effort: a failing
//! log never propagates into the caller's control flow.

use crate::error::sanitize_error_message;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::time::{Duration, Instant};
use tracing::warn;

/// Best-effort timestamped diagnostic sink
pub trait EventLog: Send + Sync {
    /// Append one message. Must never panic or fail the caller.
    fn append(&self, message: &str);
}

/// Format uptime as `[HH:MM:SS]`
pub fn format_uptime(uptime: Duration) -> String {
    let total = uptime.as_secs();
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;
    format!("[{hours:02}:{minutes:02}:{seconds:02}]")
}

/// Build a complete log line (including trailing newline)
pub fn format_entry(uptime: Duration, message: &str) -> String {
    format!(
        "{} {}\n",
        format_uptime(uptime),
        sanitize_error_message(message)
    )
}

/// Event log backed by a file on the local filesystem
pub struct FileEventLog {
    path: PathBuf,
    boot: Instant,
}

impl FileEventLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            boot: Instant::now(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn try_append(&self, entry: &str) -> std::io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(entry.as_bytes())
    }
}

impl EventLog for FileEventLog {
    fn append(&self, message: &str) {
        let entry = format_entry(self.boot.elapsed(), message);
        if let Err(e) = self.try_append(&entry) {
            // Console is the only fallback left
            warn!(
                path = %self.path.display(),
                error = %e,
                "Failed to write to event log: {}",
                entry.trim_end()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_uptime() {
        assert_eq!(format_uptime(Duration::from_secs(0)), "[00:00:00]");
        assert_eq!(format_uptime(Duration::from_secs(59)), "[00:00:59]");
        assert_eq!(format_uptime(Duration::from_secs(3723)), "[01:02:03]");
        assert_eq!(format_uptime(Duration::from_secs(100 * 3600)), "[100:00:00]");
    }

    #[test]
    fn test_format_entry_sanitizes() {
        let entry = format_entry(Duration::from_secs(5), "join failed password=pw1");
        assert_eq!(entry, "[00:00:05] join failed password=***\n");
    }

    #[tokio::test(start_paused = true)]
    async fn test_file_event_log_appends_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("error.log");
        let log = FileEventLog::new(&path);

        log.append("WiFi connection lost");
        tokio::time::advance(Duration::from_secs(61)).await;
        log.append("WiFi reconnected");

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(
            lines,
            vec![
                "[00:00:00] WiFi connection lost",
                "[00:01:01] WiFi reconnected"
            ]
        );
    }

    #[test]
    fn test_file_event_log_failure_is_swallowed() {
        let dir = tempfile::tempdir().unwrap();
        // A directory cannot be opened for appending
        let log = FileEventLog::new(dir.path());
        log.append("this goes nowhere");
        assert!(log.path().is_dir());
    }
}
