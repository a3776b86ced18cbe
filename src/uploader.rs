//! Folder lookup and idempotent uploads.

use std::path::Path;

use tracing::{debug, info};

use crate::drive::{DriveApi, DriveResult, FileQuery, RemoteFile};

/// What [`Uploader::upload_or_replace`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadAction {
    Created(RemoteFile),
    /// An item with the same name existed; its content was replaced and its id kept.
    Replaced(RemoteFile),
}

impl UploadAction {
    pub fn file(&self) -> &RemoteFile {
        match self {
            UploadAction::Created(file) | UploadAction::Replaced(file) => file,
        }
    }
}

/// Dedup guard over a [`DriveApi`]: nothing is ever created twice under the same name.
pub struct Uploader<'a> {
    drive: &'a dyn DriveApi,
}

impl<'a> Uploader<'a> {
    pub fn new(drive: &'a dyn DriveApi) -> Self {
        Self { drive }
    }

    /// Id of the non-trashed folder named `name` under `parent_id`, creating it if absent.
    pub async fn find_or_create_folder(&self, name: &str, parent_id: &str) -> DriveResult<String> {
        let query = FileQuery::children_of(parent_id).named(name).folders_only();
        if let Some(folder) = self.drive.find_first(&query).await? {
            debug!(folder_id = %folder.id, name, "found existing folder");
            return Ok(folder.id);
        }

        let folder = self.drive.create_folder(name, parent_id).await?;
        info!(folder_id = %folder.id, name, parent_id, "created folder");
        Ok(folder.id)
    }

    /// The non-trashed, non-folder item named `name` under `folder_id`.
    pub async fn find_file(&self, name: &str, folder_id: &str) -> DriveResult<Option<RemoteFile>> {
        let query = FileQuery::children_of(folder_id).named(name).files_only();
        self.drive.find_first(&query).await
    }

    pub async fn file_exists(&self, name: &str, folder_id: &str) -> DriveResult<bool> {
        Ok(self.find_file(name, folder_id).await?.is_some())
    }

    /// Uploads `local` as `name` into `folder_id`, replacing the content of an
    /// existing same-named file instead of adding a duplicate.
    pub async fn upload_or_replace(
        &self,
        local: &Path,
        name: &str,
        mime_type: &str,
        folder_id: &str,
    ) -> DriveResult<UploadAction> {
        match self.find_file(name, folder_id).await? {
            Some(existing) => {
                let file = self.drive.update_file(&existing.id, mime_type, local).await?;
                info!(file_id = %file.id, name, folder_id, "replaced existing file");
                Ok(UploadAction::Replaced(file))
            }
            None => {
                let file = self.drive.create_file(name, folder_id, mime_type, local).await?;
                info!(file_id = %file.id, name, folder_id, "uploaded file");
                Ok(UploadAction::Created(file))
            }
        }
    }
}
