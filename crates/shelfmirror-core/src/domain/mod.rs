//! Domain types for the mirror engine
//!
//! - Remote item model (tagged union decided at listing time)
//! - Time windows for the adaptive date-range partitioner
//! - Domain-specific error types

pub mod errors;
pub mod remote_item;
pub mod window;

pub use errors::DomainError;
pub use remote_item::{FileEntry, FolderEntry, LibraryEntry, RemoteItem};
pub use window::TimeWindow;
