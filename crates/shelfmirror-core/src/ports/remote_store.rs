//! Remote store port (driven/secondary port)
//!
//! Interface for the remote hierarchical document store. The primary
//! implementation targets the SharePoint REST API, but the trait only
//! assumes a store that can enumerate document libraries, list one level
//! of folder children, answer date-range queries with a row cap, and
//! serve file content by server-relative path.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because errors at port boundaries are
//!   adapter-specific and don't need domain-level classification, with
//!   one exception: the result-set-too-large refusal, which the engine
//!   must recognize to drive the window-splitting ladder. That one is
//!   classified by message signature via [`is_threshold_error`].
//! - `get_folder` and `get_library` return `Ok(None)` for "not found" so
//!   the walker can classify a start path without treating the probe as
//!   a failure.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::remote_item::{FileEntry, FolderEntry, LibraryEntry, RemoteItem};

/// Created/modified timestamp pair for a single remote item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemTimes {
    /// When the item was created on the remote store
    pub created: DateTime<Utc>,
    /// When the item was last modified on the remote store
    pub modified: DateTime<Utc>,
}

/// Which remote date column a range query filters on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DateField {
    /// Filter on the creation timestamp
    Created,
    /// Filter on the last-modified timestamp
    Modified,
}

impl std::fmt::Display for DateField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DateField::Created => write!(f, "Created"),
            DateField::Modified => write!(f, "Modified"),
        }
    }
}

/// A structured date-range query over one library, scoped recursively
/// across all of its folders and capped at `row_limit` rows.
#[derive(Debug, Clone)]
pub struct DateRangeQuery {
    /// The date column to filter on
    pub field: DateField,
    /// Range start (inclusive)
    pub start: DateTime<Utc>,
    /// Range end (exclusive)
    pub end: DateTime<Utc>,
    /// Maximum number of rows the store may return before refusing
    pub row_limit: u32,
}

/// Port trait for remote document store operations
///
/// Implementations handle the store-specific API calls and error mapping.
/// All listing calls return one level only; recursion is the engine's job
/// so name filtering can happen per level before expanding deeper.
#[async_trait::async_trait]
pub trait IRemoteStore: Send + Sync {
    /// Enumerates the visible document libraries of the site
    async fn list_libraries(&self) -> anyhow::Result<Vec<LibraryEntry>>;

    /// Looks up a document library by title
    ///
    /// Returns `Ok(None)` when no library with that title exists.
    async fn get_library(&self, title: &str) -> anyhow::Result<Option<LibraryEntry>>;

    /// Retrieves a folder by server-relative path
    ///
    /// Returns `Ok(None)` when the path does not resolve to a folder;
    /// the walker then falls back to library classification.
    async fn get_folder(&self, server_relative_path: &str)
        -> anyhow::Result<Option<FolderEntry>>;

    /// Lists the immediate children of a folder, classified into the
    /// [`RemoteItem`] union. Never recurses.
    async fn list_children(&self, server_relative_path: &str)
        -> anyhow::Result<Vec<RemoteItem>>;

    /// Runs a date-range query for files across one library
    ///
    /// The store may refuse with a result-set-too-large error when more
    /// than `query.row_limit` rows match; see [`is_threshold_error`].
    async fn query_files(
        &self,
        library: &LibraryEntry,
        query: &DateRangeQuery,
    ) -> anyhow::Result<Vec<FileEntry>>;

    /// Fetches the created/modified pair for a folder by path
    ///
    /// Used to reconcile ancestor directory timestamps in ranged mode.
    async fn get_item_times(&self, server_relative_path: &str) -> anyhow::Result<ItemTimes>;

    /// Downloads the full content of a file by server-relative path
    async fn download_file(&self, server_relative_path: &str) -> anyhow::Result<Vec<u8>>;
}

/// Determines whether an error is the store's result-set-size refusal
///
/// SharePoint phrases this as an operation that "exceeds the list view
/// threshold", surfaced either in the message text or as an
/// `SPQueryThrottledException` error code. Only this class of failure is
/// recoverable (by splitting the query window); everything else from a
/// range query is treated as fatal.
pub fn is_threshold_error(err: &anyhow::Error) -> bool {
    let err_str = format!("{err:#}").to_lowercase();
    err_str.contains("view threshold") || err_str.contains("spquerythrottledexception")
}
