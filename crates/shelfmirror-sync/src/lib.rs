//! ShelfMirror Sync - Incremental download synchronization engine
//!
//! Provides:
//! - Recursive tree mirroring with per-level name filtering
//! - Timestamp-anchored incremental skip decisions
//! - Adaptive date-window partitioning against the remote row cap
//! - Bounded-concurrency download scheduling
//!
//! ## Modules
//!
//! - [`engine`] - Sync engine orchestrating tree-mode and ranged-mode runs
//! - [`partition`] - Worklist-based date-range partitioner
//! - [`scheduler`] - Global semaphore gate over remote operations
//! - [`inspector`] - Local-vs-remote state comparison
//! - [`filter`] - Token-based name filter for libraries and folders
//! - [`filesystem`] - Local mirror adapter (atomic writes, timestamps)
//! - [`runlog`] - File-backed and in-memory run log implementations

pub mod engine;
pub mod filesystem;
pub mod filter;
pub mod inspector;
pub mod partition;
pub mod runlog;
pub mod scheduler;

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur during synchronization operations
#[derive(Debug, Error)]
pub enum SyncError {
    /// The configured start path resolved to neither a folder nor a library
    #[error("Start path not found on remote: {0}")]
    StartPathNotFound(String),

    /// The local mirror root could not be prepared
    #[error("Local root not usable: {0}")]
    LocalRootUnusable(PathBuf),

    /// A domain-level error propagated from shelfmirror-core
    #[error("Domain error: {0}")]
    DomainError(#[from] shelfmirror_core::domain::errors::DomainError),
}
