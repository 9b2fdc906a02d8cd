//! Local store port (driven/secondary port)
//!
//! Interface for the local mirror directory: a small key-value surface of
//! create-directory, write-file, stat, and set-timestamps. Timestamps are
//! the engine's only persistent sync state (a local entry whose created
//! stamp matches the remote one is considered up to date), so the adapter
//! must round-trip whatever it is given through `set_timestamps` back out
//! of `get_state`.
//!
//! ## Design Notes
//!
//! - `create_dir` is idempotent; concurrent tasks may both attempt to
//!   create the same ancestor and the loser's "already exists" is not an
//!   error.
//! - `get_state` returns [`LocalEntryState::not_found`] for missing paths
//!   instead of an error.

use std::path::Path;

use chrono::{DateTime, Utc};

/// Snapshot of a path on the local mirror
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalEntryState {
    /// Whether the path exists on disk
    pub exists: bool,
    /// Whether it is a regular file (false for directories)
    pub is_file: bool,
    /// Observed creation timestamp, when available
    pub created: Option<DateTime<Utc>>,
    /// Observed modification timestamp, when available
    pub modified: Option<DateTime<Utc>>,
}

impl LocalEntryState {
    /// A state representing a non-existent path
    pub fn not_found() -> Self {
        Self {
            exists: false,
            is_file: false,
            created: None,
            modified: None,
        }
    }
}

/// Port trait for local mirror operations
#[async_trait::async_trait]
pub trait ILocalStore: Send + Sync {
    /// Stats a path; missing paths yield [`LocalEntryState::not_found`]
    async fn get_state(&self, path: &Path) -> anyhow::Result<LocalEntryState>;

    /// Creates a directory and any missing parents (idempotent)
    async fn create_dir(&self, path: &Path) -> anyhow::Result<()>;

    /// Writes file content, replacing any existing file
    ///
    /// Parent directories are created as needed; the write lands
    /// atomically (temp + rename) so a crash never leaves partial bytes.
    async fn write_file(&self, path: &Path, data: &[u8]) -> anyhow::Result<()>;

    /// Overwrites the created/modified timestamps of a file or directory
    ///
    /// Called after every download and on every revisit, which is what
    /// makes the equality-based skip check of later runs valid.
    async fn set_timestamps(
        &self,
        path: &Path,
        created: DateTime<Utc>,
        modified: DateTime<Utc>,
    ) -> anyhow::Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_state_is_empty() {
        let state = LocalEntryState::not_found();
        assert!(!state.exists);
        assert!(!state.is_file);
        assert!(state.created.is_none());
        assert!(state.modified.is_none());
    }
}
