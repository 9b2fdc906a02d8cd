//! Local mirror adapter (secondary/driven adapter)
//!
//! Implements [`ILocalStore`] using `tokio::fs` for async file operations.
//!
//! ## Design Decisions
//!
//! - **Atomic writes**: Uses write-to-temp + rename to avoid partial writes
//!   on crash or power loss.
//! - **Created stamp in atime**: Unix offers no portable way to *set* a
//!   file's birth time, so the remote created stamp is persisted in the
//!   access time and read back from it. The mirror tree is not expected to
//!   be read by other processes, and `relatime`-style kernel updates only
//!   ever move atime forward past mtime, which a fresh stamp overwrites on
//!   the next visit anyway.
//! - **Second precision**: Stamps are truncated to whole seconds in both
//!   directions so a value written by `set_timestamps` compares equal when
//!   read back through `get_state`.

use std::{io::ErrorKind, path::Path, time::SystemTime};

use chrono::{DateTime, SubsecRound, Utc};
use shelfmirror_core::ports::local_store::{ILocalStore, LocalEntryState};
use tracing::debug;

/// Adapter that bridges the [`ILocalStore`] port to the real filesystem.
///
/// Zero-sized: all operations derive their context from the path
/// arguments. The mirror root lives at a higher layer.
#[derive(Debug, Clone, Default)]
pub struct LocalStoreAdapter;

impl LocalStoreAdapter {
    /// Create a new `LocalStoreAdapter`.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

fn to_utc_seconds(st: SystemTime) -> Option<DateTime<Utc>> {
    Some(DateTime::<Utc>::from(st).trunc_subsecs(0))
}

#[async_trait::async_trait]
impl ILocalStore for LocalStoreAdapter {
    async fn get_state(&self, path: &Path) -> anyhow::Result<LocalEntryState> {
        let metadata = match tokio::fs::metadata(path).await {
            Ok(m) => m,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Ok(LocalEntryState::not_found());
            }
            Err(e) => return Err(e.into()),
        };

        Ok(LocalEntryState {
            exists: true,
            is_file: metadata.is_file(),
            created: metadata.accessed().ok().and_then(to_utc_seconds),
            modified: metadata.modified().ok().and_then(to_utc_seconds),
        })
    }

    async fn create_dir(&self, path: &Path) -> anyhow::Result<()> {
        tokio::fs::create_dir_all(path).await?;
        Ok(())
    }

    async fn write_file(&self, path: &Path, data: &[u8]) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // Write to a temporary file in the same directory so rename is
        // atomic (same filesystem).
        let tmp_path = {
            let mut p = path.as_os_str().to_owned();
            p.push(".tmp");
            std::path::PathBuf::from(p)
        };

        debug!(?tmp_path, "writing to temporary file");
        tokio::fs::write(&tmp_path, data).await?;
        tokio::fs::rename(&tmp_path, path).await?;

        debug!(path = %path.display(), bytes = data.len(), "write complete");
        Ok(())
    }

    async fn set_timestamps(
        &self,
        path: &Path,
        created: DateTime<Utc>,
        modified: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        let path = path.to_path_buf();
        let accessed: SystemTime = created.trunc_subsecs(0).into();
        let modified: SystemTime = modified.trunc_subsecs(0).into();

        // futimens needs an open handle; read access suffices for both
        // files and directories.
        tokio::task::spawn_blocking(move || -> anyhow::Result<()> {
            let file = std::fs::File::open(&path)?;
            let times = std::fs::FileTimes::new()
                .set_accessed(accessed)
                .set_modified(modified);
            file.set_times(times)?;
            Ok(())
        })
        .await?
    }
}
