//! ShelfMirror Remote - SharePoint REST adapter
//!
//! Implements the remote-store port against the SharePoint REST API.
//!
//! ## Modules
//!
//! - [`client`] - Authenticated HTTP client for `_api` endpoints
//! - [`provider`] - [`IRemoteStore`] implementation and DTO mapping
//!
//! [`IRemoteStore`]: shelfmirror_core::ports::remote_store::IRemoteStore

pub mod client;
pub mod provider;

pub use client::SpClient;
pub use provider::SpRemoteStore;
