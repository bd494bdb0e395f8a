//! Audit log writer — append-only JSONL.
//!
//! Every decision gets logged, even allowed ones. One JSON object per line,
//! flushed after every write for crash safety. Lives under the runtime
//! directory next to the sockets.

use crate::audit::types::LogEntry;
use anyhow::{Context, Result};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Append-only audit logger.
pub struct AuditLogger {
    log_path: PathBuf,
    file: File,
    entry_count: usize,
}

impl AuditLogger {
    /// Open (or create) the audit log under the given runtime directory.
    pub fn open(runtime_dir: &Path) -> Result<Self> {
        Self::with_path(runtime_dir.join("audit.jsonl"))
    }

    /// Open a logger at a specific path (used by tests).
    pub fn with_path(path: impl AsRef<Path>) -> Result<Self> {
        let log_path = path.as_ref().to_path_buf();
        if let Some(parent) = log_path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create log directory: {}", parent.display())
            })?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .with_context(|| format!("Failed to open audit log: {}", log_path.display()))?;

        Ok(Self {
            log_path,
            file,
            entry_count: 0,
        })
    }

    /// Append one entry and flush.
    pub fn log(&mut self, entry: &LogEntry) -> Result<()> {
        let json = serde_json::to_string(entry).context("Failed to serialize log entry")?;
        writeln!(self.file, "{}", json).context("Failed to write log entry")?;
        self.file.flush().context("Failed to flush audit log")?;
        self.entry_count += 1;
        Ok(())
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    pub fn entry_count(&self) -> usize {
        self.entry_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::daemon::protocol::FinalAction;
    use chrono::Utc;
    use tempfile::TempDir;

    fn entry(command: &str, action: FinalAction) -> LogEntry {
        LogEntry {
            timestamp: Utc::now(),
            request_id: "req-1".to_string(),
            tool: "shell-shim".to_string(),
            command: command.to_string(),
            arguments: String::new(),
            rule: None,
            action,
            reason: "test".to_string(),
            approved_by: None,
            eval_duration_us: Some(12),
        }
    }

    #[test]
    fn test_write_and_read_back() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("audit.jsonl");
        let mut logger = AuditLogger::with_path(&path).unwrap();

        logger.log(&entry("ls", FinalAction::Allow)).unwrap();
        assert_eq!(logger.entry_count(), 1);

        let content = fs::read_to_string(&path).unwrap();
        let parsed: LogEntry = serde_json::from_str(content.trim()).unwrap();
        assert_eq!(parsed.command, "ls");
        assert_eq!(parsed.action, FinalAction::Allow);
    }

    #[test]
    fn test_append_only() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("audit.jsonl");
        let mut logger = AuditLogger::with_path(&path).unwrap();

        for cmd in ["ls", "rm", "git"] {
            logger.log(&entry(cmd, FinalAction::Deny)).unwrap();
        }
        assert_eq!(logger.entry_count(), 3);

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content.trim().lines().count(), 3);
    }
}
