//! shelfmirror core - domain logic and port definitions
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain types** - `RemoteItem`, `LibraryEntry`, `TimeWindow`
//! - **Port definitions** - Traits for adapters: `IRemoteStore`, `ILocalStore`, `ISyncLog`
//! - **Configuration** - Typed config with validation and a builder
//!
//! # Architecture
//!
//! The domain module contains pure logic with no I/O. Ports define trait
//! interfaces that adapter crates implement: the SharePoint REST adapter
//! lives in `shelfmirror-remote`, the local filesystem adapter and the
//! sync engine in `shelfmirror-sync`.

pub mod config;
pub mod domain;
pub mod ports;
