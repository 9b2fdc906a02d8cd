//! Remote item model
//!
//! Items coming back from the document store are classified exactly once,
//! at listing time, into a tagged union of folders and files. The rest of
//! the engine matches on the variant instead of re-checking type flags.
//!
//! The server-relative path doubles as the content reference: it is the
//! key the remote store accepts for metadata lookups and downloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A folder one level below some container
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FolderEntry {
    /// Folder name (last path segment)
    pub name: String,
    /// Full server-relative path, e.g. `/sites/acme/Shared Documents/Proj_A`
    pub server_relative_path: String,
    /// Creation timestamp reported by the remote store
    pub created: DateTime<Utc>,
    /// Last-modified timestamp reported by the remote store
    pub modified: DateTime<Utc>,
}

/// A file with the minimal metadata the engine needs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileEntry {
    /// File name (last path segment)
    pub name: String,
    /// Full server-relative path, usable as a download reference
    pub server_relative_path: String,
    /// Creation timestamp reported by the remote store
    pub created: DateTime<Utc>,
    /// Last-modified timestamp reported by the remote store
    pub modified: DateTime<Utc>,
    /// Size in bytes, when the listing endpoint reports it
    pub size: Option<u64>,
}

/// A document library root: a listable container addressed by title
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LibraryEntry {
    /// Library title, e.g. `Proj_Reports`
    pub title: String,
    /// Server-relative path of the library's root folder
    pub root_path: String,
    /// Creation timestamp of the root folder
    pub created: DateTime<Utc>,
    /// Last-modified timestamp of the root folder
    pub modified: DateTime<Utc>,
}

/// One child of a container, classified at listing time
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteItem {
    /// A sub-folder that can itself be listed
    Folder(FolderEntry),
    /// A downloadable file
    File(FileEntry),
}

impl RemoteItem {
    /// Item name (file or folder name)
    pub fn name(&self) -> &str {
        match self {
            RemoteItem::Folder(f) => &f.name,
            RemoteItem::File(f) => &f.name,
        }
    }

    /// Full server-relative path
    pub fn server_relative_path(&self) -> &str {
        match self {
            RemoteItem::Folder(f) => &f.server_relative_path,
            RemoteItem::File(f) => &f.server_relative_path,
        }
    }

    /// Returns true for the folder variant
    pub fn is_folder(&self) -> bool {
        matches!(self, RemoteItem::Folder(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    #[test]
    fn accessors_dispatch_on_variant() {
        let folder = RemoteItem::Folder(FolderEntry {
            name: "Proj_A".into(),
            server_relative_path: "/sites/acme/Docs/Proj_A".into(),
            created: ts("2024-01-01T00:00:00Z"),
            modified: ts("2024-01-02T00:00:00Z"),
        });
        assert_eq!(folder.name(), "Proj_A");
        assert_eq!(folder.server_relative_path(), "/sites/acme/Docs/Proj_A");
        assert!(folder.is_folder());

        let file = RemoteItem::File(FileEntry {
            name: "report.docx".into(),
            server_relative_path: "/sites/acme/Docs/Proj_A/report.docx".into(),
            created: ts("2024-01-01T00:00:00Z"),
            modified: ts("2024-01-01T00:00:00Z"),
            size: Some(1024),
        });
        assert_eq!(file.name(), "report.docx");
        assert!(!file.is_folder());
    }

    #[test]
    fn file_entry_serializes_round_trip() {
        let file = FileEntry {
            name: "a.txt".into(),
            server_relative_path: "/Docs/a.txt".into(),
            created: ts("2024-06-01T12:00:00Z"),
            modified: ts("2024-06-02T12:00:00Z"),
            size: None,
        };
        let json = serde_json::to_string(&file).unwrap();
        let back: FileEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(file, back);
    }
}
