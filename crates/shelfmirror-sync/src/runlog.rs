//! Run log implementations
//!
//! [`FileSyncLog`] is the production sink: an append-only file behind a
//! mutex, one formatted line per entry, with console echo through
//! `tracing` for entries flagged as console-visible. [`MemorySyncLog`] is
//! a capture double for asserting on log traffic in tests.

use std::{
    fs::{File, OpenOptions},
    io::Write,
    path::Path,
    sync::Mutex,
};

use chrono::Utc;
use shelfmirror_core::ports::run_log::{ISyncLog, Severity};
use tracing::{error, info, warn};

/// File-backed append-only run log
///
/// The file is opened once in append mode; each entry is a single
/// `write_all` of one formatted line, so concurrent writers behind the
/// mutex never interleave partial entries. A write failure is reported
/// through `tracing` and swallowed: logging must never fail a sync run.
pub struct FileSyncLog {
    file: Mutex<File>,
}

impl FileSyncLog {
    /// Opens (creating if needed) the log file at `path` for appending
    ///
    /// Parent directories are created as needed. Failure here is
    /// setup-fatal for the caller: a run without a persistent log is not
    /// allowed to start.
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

impl ISyncLog for FileSyncLog {
    fn log(&self, severity: Severity, console: bool, message: &str) {
        let line = format!(
            "{} [{}] {}\n",
            Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ"),
            severity,
            message
        );

        match self.file.lock() {
            Ok(mut file) => {
                if let Err(e) = file.write_all(line.as_bytes()) {
                    warn!(error = %e, "Failed to append run log entry");
                }
            }
            Err(poisoned) => {
                // A panicked writer leaves the file usable; keep logging.
                let mut file = poisoned.into_inner();
                if let Err(e) = file.write_all(line.as_bytes()) {
                    warn!(error = %e, "Failed to append run log entry");
                }
            }
        }

        if console {
            match severity {
                Severity::Info => info!("{message}"),
                Severity::Warning => warn!("{message}"),
                Severity::Error => error!("{message}"),
            }
        }
    }
}

/// One captured log entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedEntry {
    pub severity: Severity,
    pub console: bool,
    pub message: String,
}

/// In-memory run log for tests
#[derive(Default)]
pub struct MemorySyncLog {
    entries: Mutex<Vec<CapturedEntry>>,
}

impl MemorySyncLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all captured entries
    pub fn entries(&self) -> Vec<CapturedEntry> {
        self.entries.lock().expect("log mutex").clone()
    }

    /// All captured messages at the given severity
    pub fn messages_at(&self, severity: Severity) -> Vec<String> {
        self.entries()
            .into_iter()
            .filter(|e| e.severity == severity)
            .map(|e| e.message)
            .collect()
    }

    /// Whether any captured message contains `needle`
    pub fn contains(&self, needle: &str) -> bool {
        self.entries().iter().any(|e| e.message.contains(needle))
    }
}

impl ISyncLog for MemorySyncLog {
    fn log(&self, severity: Severity, console: bool, message: &str) {
        self.entries.lock().expect("log mutex").push(CapturedEntry {
            severity,
            console,
            message: message.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn test_file_log_appends_one_line_per_entry() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("run.log");
        let log = FileSyncLog::open(&path).expect("open log");

        log.info(false, "first entry");
        log.warning(false, "second entry");
        log.error(true, "third entry");

        let content = std::fs::read_to_string(&path).expect("read log");
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("[INFO] first entry"));
        assert!(lines[1].contains("[WARNING] second entry"));
        assert!(lines[2].contains("[ERROR] third entry"));
    }

    #[test]
    fn test_file_log_creates_parent_directories() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested/deeper/run.log");
        let log = FileSyncLog::open(&path).expect("open log");
        log.info(false, "entry");
        assert!(path.exists());
    }

    #[test]
    fn test_file_log_appends_across_reopens() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("run.log");

        {
            let log = FileSyncLog::open(&path).expect("open log");
            log.info(false, "run one");
        }
        {
            let log = FileSyncLog::open(&path).expect("reopen log");
            log.info(false, "run two");
        }

        let content = std::fs::read_to_string(&path).expect("read log");
        assert_eq!(content.lines().count(), 2);
        assert!(content.contains("run one"));
        assert!(content.contains("run two"));
    }

    #[test]
    fn test_file_log_entries_stay_whole_under_concurrency() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("run.log");
        let log = Arc::new(FileSyncLog::open(&path).expect("open log"));

        let handles: Vec<_> = (0..8)
            .map(|worker| {
                let log = log.clone();
                std::thread::spawn(move || {
                    for i in 0..50 {
                        log.info(false, &format!("worker {worker} entry {i}"));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let content = std::fs::read_to_string(&path).expect("read log");
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 400);
        for line in lines {
            assert!(line.contains("[INFO] worker"), "corrupt line: {line}");
        }
    }

    #[test]
    fn test_memory_log_captures_entries() {
        let log = MemorySyncLog::new();
        log.info(true, "progress");
        log.error(true, "boom");
        log.info(false, "skip detail");

        assert_eq!(log.entries().len(), 3);
        assert_eq!(log.messages_at(Severity::Error), vec!["boom".to_string()]);
        assert!(log.contains("skip"));
        assert!(!log.contains("missing"));

        let first = &log.entries()[0];
        assert!(first.console);
        let third = &log.entries()[2];
        assert!(!third.console);
    }
}
