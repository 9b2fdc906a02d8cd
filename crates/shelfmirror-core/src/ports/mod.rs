//! Port definitions (hexagonal architecture interfaces)
//!
//! Ports are interfaces the engine depends on, with implementations in
//! adapter crates:
//!
//! - [`IRemoteStore`] - listing, metadata, and download operations against
//!   the remote document store (`shelfmirror-remote`)
//! - [`ILocalStore`] - the local mirror directory (`shelfmirror-sync`)
//! - [`ISyncLog`] - the append-only run log shared by concurrent tasks

pub mod local_store;
pub mod remote_store;
pub mod run_log;

pub use local_store::{ILocalStore, LocalEntryState};
pub use remote_store::{is_threshold_error, DateField, DateRangeQuery, IRemoteStore, ItemTimes};
pub use run_log::{ISyncLog, Severity};
