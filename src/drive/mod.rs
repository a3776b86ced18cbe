//! Remote object storage (Google Drive v3).
//!
//! [`DriveApi`] is the seam the walker, uploader and pipeline depend on;
//! [`DriveClient`] is the REST implementation.

mod client;
mod error;

pub use client::{DriveClient, DriveClientConfig};
pub use error::{DriveError, DriveResult};

use crate::constants::FOLDER_MIME_TYPE;
use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use std::path::Path;

/// A file or folder in the remote store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteFile {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub mime_type: String,
    #[serde(default)]
    pub parents: Vec<String>,
    /// Byte length; the API reports it as a decimal string and omits it for folders.
    #[serde(default, deserialize_with = "size_from_string", skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

impl RemoteFile {
    pub fn is_folder(&self) -> bool {
        self.mime_type == FOLDER_MIME_TYPE
    }
}

fn size_from_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u64>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Size {
        Text(String),
        Number(u64),
    }

    match Option::<Size>::deserialize(deserializer)? {
        Some(Size::Text(s)) => s.parse().map(Some).map_err(serde::de::Error::custom),
        Some(Size::Number(n)) => Ok(Some(n)),
        None => Ok(None),
    }
}

/// One page of a listing.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileList {
    #[serde(default)]
    pub files: Vec<RemoteFile>,
    pub next_page_token: Option<String>,
}

/// Builder for the Drive search language (`q=` parameter).
///
/// Trashed items are excluded unless asked for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileQuery {
    pub parent: Option<String>,
    pub name: Option<String>,
    pub mime_type: Option<String>,
    pub exclude_mime_type: Option<String>,
    pub include_trashed: bool,
}

impl FileQuery {
    pub fn children_of(parent: impl Into<String>) -> Self {
        Self { parent: Some(parent.into()), ..Self::default() }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    pub fn folders_only(self) -> Self {
        self.mime_type(FOLDER_MIME_TYPE)
    }

    pub fn files_only(mut self) -> Self {
        self.exclude_mime_type = Some(FOLDER_MIME_TYPE.to_string());
        self
    }

    /// Renders the query string.
    pub fn to_q(&self) -> String {
        let mut clauses = Vec::new();
        if let Some(name) = &self.name {
            clauses.push(format!("name = '{}'", escape_literal(name)));
        }
        if let Some(mime) = &self.mime_type {
            clauses.push(format!("mimeType = '{}'", escape_literal(mime)));
        }
        if let Some(mime) = &self.exclude_mime_type {
            clauses.push(format!("mimeType != '{}'", escape_literal(mime)));
        }
        if let Some(parent) = &self.parent {
            clauses.push(format!("'{}' in parents", escape_literal(parent)));
        }
        if !self.include_trashed {
            clauses.push("trashed = false".to_string());
        }
        clauses.join(" and ")
    }

    /// True if `file` satisfies the query. Used by in-memory stores.
    pub fn matches(&self, file: &RemoteFile, trashed: bool) -> bool {
        (self.include_trashed || !trashed)
            && self.parent.as_ref().map_or(true, |p| file.parents.contains(p))
            && self.name.as_ref().map_or(true, |n| &file.name == n)
            && self.mime_type.as_ref().map_or(true, |m| &file.mime_type == m)
            && self.exclude_mime_type.as_ref().map_or(true, |m| &file.mime_type != m)
    }
}

fn escape_literal(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

/// Operations the pipeline needs from the remote store.
#[async_trait]
pub trait DriveApi: Send + Sync {
    /// Lists one page of items matching `query`.
    async fn list_page(&self, query: &FileQuery, page_token: Option<&str>) -> DriveResult<FileList>;

    async fn get_metadata(&self, file_id: &str) -> DriveResult<RemoteFile>;

    /// Streams a file's content to `destination`, returning the bytes written.
    async fn download(&self, file_id: &str, destination: &Path) -> DriveResult<u64>;

    async fn create_folder(&self, name: &str, parent_id: &str) -> DriveResult<RemoteFile>;

    /// Uploads `source` as a new file named `name` under `parent_id`.
    async fn create_file(
        &self,
        name: &str,
        parent_id: &str,
        mime_type: &str,
        source: &Path,
    ) -> DriveResult<RemoteFile>;

    /// Replaces the content of an existing file, keeping its id.
    async fn update_file(&self, file_id: &str, mime_type: &str, source: &Path) -> DriveResult<RemoteFile>;

    /// Every item matching `query`, following continuation tokens until exhausted.
    async fn list_all(&self, query: &FileQuery) -> DriveResult<Vec<RemoteFile>> {
        let mut items = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let page = self.list_page(query, page_token.as_deref()).await?;
            items.extend(page.files);
            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        Ok(items)
    }

    /// The first item matching `query`, if any.
    async fn find_first(&self, query: &FileQuery) -> DriveResult<Option<RemoteFile>> {
        Ok(self.list_all(query).await?.into_iter().next())
    }
}
