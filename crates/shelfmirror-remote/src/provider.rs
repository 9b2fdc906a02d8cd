//! SpRemoteStore - IRemoteStore implementation for the SharePoint REST API
//!
//! Maps the port's operations onto `_api` endpoints and the response DTOs
//! onto domain entries.
//!
//! ## Design Notes
//!
//! - Libraries are lists with `BaseTemplate eq 101` that are not hidden,
//!   expanded with their root folder so the server-relative path comes
//!   back in one round trip.
//! - `get_library` and `get_folder` translate a 404 into `Ok(None)`; the
//!   walker uses them to classify a start path.
//! - The hidden `Forms` system folder every library carries is dropped
//!   while listing children.
//! - Date-range queries go through the list items endpoint with an OData
//!   `$filter` on the chosen date column; the row-cap refusal arrives as
//!   a non-2xx response whose body names `SPQueryThrottledException`, and
//!   the client keeps that body in the error message.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::debug;

use shelfmirror_core::domain::remote_item::{FileEntry, FolderEntry, LibraryEntry, RemoteItem};
use shelfmirror_core::ports::remote_store::{DateRangeQuery, IRemoteStore, ItemTimes};

use crate::client::{odata_quote, SpClient};

/// Name of the system folder SharePoint keeps in every library root
const FORMS_FOLDER: &str = "Forms";

// ============================================================================
// Response DTOs (odata=nometadata)
// ============================================================================

/// Collection envelope: `{"value": [...]}`
#[derive(Debug, Deserialize)]
struct SpCollection<T> {
    value: Vec<T>,
}

/// A document library from `web/lists`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SpList {
    title: String,
    created: DateTime<Utc>,
    last_item_modified_date: DateTime<Utc>,
    root_folder: SpRootFolder,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SpRootFolder {
    server_relative_url: String,
}

/// A folder from `web/GetFolderByServerRelativeUrl`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SpFolder {
    name: String,
    server_relative_url: String,
    time_created: DateTime<Utc>,
    time_last_modified: DateTime<Utc>,
}

/// A file from the expanded `Files` collection
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SpFile {
    name: String,
    server_relative_url: String,
    time_created: DateTime<Utc>,
    time_last_modified: DateTime<Utc>,
    length: Option<u64>,
}

/// A folder with its children expanded in one request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SpFolderListing {
    #[serde(default)]
    folders: Vec<SpFolder>,
    #[serde(default)]
    files: Vec<SpFile>,
}

/// A list item row from a date-range query
#[derive(Debug, Deserialize)]
struct SpListItem {
    #[serde(rename = "FileLeafRef")]
    file_leaf_ref: String,
    #[serde(rename = "FileRef")]
    file_ref: String,
    #[serde(rename = "Created")]
    created: DateTime<Utc>,
    #[serde(rename = "Modified")]
    modified: DateTime<Utc>,
    /// SharePoint serializes the size column as a decimal string
    #[serde(rename = "File_x0020_Size")]
    file_size: Option<String>,
}

// ============================================================================
// DTO -> domain mapping
// ============================================================================

impl From<SpList> for LibraryEntry {
    fn from(list: SpList) -> Self {
        LibraryEntry {
            title: list.title,
            root_path: list.root_folder.server_relative_url,
            created: list.created,
            modified: list.last_item_modified_date,
        }
    }
}

impl From<SpFolder> for FolderEntry {
    fn from(folder: SpFolder) -> Self {
        FolderEntry {
            name: folder.name,
            server_relative_path: folder.server_relative_url,
            created: folder.time_created,
            modified: folder.time_last_modified,
        }
    }
}

impl From<SpFile> for FileEntry {
    fn from(file: SpFile) -> Self {
        FileEntry {
            name: file.name,
            server_relative_path: file.server_relative_url,
            created: file.time_created,
            modified: file.time_last_modified,
            size: file.length,
        }
    }
}

impl From<SpListItem> for FileEntry {
    fn from(item: SpListItem) -> Self {
        let size = item.file_size.as_deref().and_then(|s| s.parse().ok());
        FileEntry {
            name: item.file_leaf_ref,
            server_relative_path: item.file_ref,
            created: item.created,
            modified: item.modified,
            size,
        }
    }
}

fn odata_datetime(t: DateTime<Utc>) -> String {
    format!("datetime'{}'", t.format("%Y-%m-%dT%H:%M:%SZ"))
}

// ============================================================================
// SpRemoteStore
// ============================================================================

/// Remote store implementation backed by the SharePoint REST API
pub struct SpRemoteStore {
    client: SpClient,
    page_size: u32,
}

impl SpRemoteStore {
    /// Creates a store over the given client
    pub fn new(client: SpClient, page_size: u32) -> Self {
        Self { client, page_size }
    }
}

#[async_trait::async_trait]
impl IRemoteStore for SpRemoteStore {
    async fn list_libraries(&self) -> anyhow::Result<Vec<LibraryEntry>> {
        let path = format!(
            "/web/lists?$filter=BaseTemplate eq 101 and Hidden eq false\
             &$expand=RootFolder\
             &$select=Title,Created,LastItemModifiedDate,RootFolder/ServerRelativeUrl\
             &$top={}",
            self.page_size
        );
        let lists: SpCollection<SpList> = self.client.get_json(&path).await?;
        debug!(count = lists.value.len(), "listed document libraries");
        Ok(lists.value.into_iter().map(LibraryEntry::from).collect())
    }

    async fn get_library(&self, title: &str) -> anyhow::Result<Option<LibraryEntry>> {
        let path = format!(
            "/web/lists/getbytitle('{}')?$expand=RootFolder\
             &$select=Title,Created,LastItemModifiedDate,RootFolder/ServerRelativeUrl",
            odata_quote(title)
        );
        let list: Option<SpList> = self.client.get_json_optional(&path).await?;
        Ok(list.map(LibraryEntry::from))
    }

    async fn get_folder(&self, server_relative_path: &str) -> anyhow::Result<Option<FolderEntry>> {
        let path = format!(
            "/web/GetFolderByServerRelativeUrl('{}')",
            odata_quote(server_relative_path)
        );
        let folder: Option<SpFolder> = self.client.get_json_optional(&path).await?;
        Ok(folder.map(FolderEntry::from))
    }

    async fn list_children(&self, server_relative_path: &str) -> anyhow::Result<Vec<RemoteItem>> {
        let path = format!(
            "/web/GetFolderByServerRelativeUrl('{}')?$expand=Folders,Files",
            odata_quote(server_relative_path)
        );
        let listing: SpFolderListing = self.client.get_json(&path).await?;

        let mut items: Vec<RemoteItem> = listing
            .folders
            .into_iter()
            .filter(|f| f.name != FORMS_FOLDER)
            .map(|f| RemoteItem::Folder(f.into()))
            .collect();
        items.extend(listing.files.into_iter().map(|f| RemoteItem::File(f.into())));
        Ok(items)
    }

    async fn query_files(
        &self,
        library: &LibraryEntry,
        query: &DateRangeQuery,
    ) -> anyhow::Result<Vec<FileEntry>> {
        let field = query.field.to_string();
        let path = format!(
            "/web/lists/getbytitle('{}')/items\
             ?$filter=FSObjType eq 0 and {field} ge {} and {field} lt {}\
             &$select=FileLeafRef,FileRef,Created,Modified,File_x0020_Size\
             &$top={}",
            odata_quote(&library.title),
            odata_datetime(query.start),
            odata_datetime(query.end),
            query.row_limit
        );
        let items: SpCollection<SpListItem> = self.client.get_json(&path).await?;
        Ok(items.value.into_iter().map(FileEntry::from).collect())
    }

    async fn get_item_times(&self, server_relative_path: &str) -> anyhow::Result<ItemTimes> {
        let path = format!(
            "/web/GetFolderByServerRelativeUrl('{}')",
            odata_quote(server_relative_path)
        );
        let folder: SpFolder = self.client.get_json(&path).await?;
        Ok(ItemTimes {
            created: folder.time_created,
            modified: folder.time_last_modified,
        })
    }

    async fn download_file(&self, server_relative_path: &str) -> anyhow::Result<Vec<u8>> {
        let path = format!(
            "/web/GetFileByServerRelativeUrl('{}')/$value",
            odata_quote(server_relative_path)
        );
        self.client.get_bytes(&path).await
    }
}
