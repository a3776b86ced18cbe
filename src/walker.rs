//! Depth-first traversal of a remote folder tree.
//!
//! A folder is *actionable* when it directly contains at least one file of the
//! trigger mime type. The handler sees the first such file; the walk then
//! descends into every sub-folder whether or not the parent was actionable.

use std::fmt::Display;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::drive::{DriveApi, DriveError, FileQuery, RemoteFile};

/// Work done for each actionable folder.
#[async_trait]
pub trait FolderHandler: Send {
    type Error: Display + Send;

    async fn handle(&mut self, folder_id: &str, trigger: &RemoteFile) -> Result<(), Self::Error>;

    /// Fatal errors stop the walk instead of being logged and skipped.
    fn is_fatal(_error: &Self::Error) -> bool {
        false
    }
}

#[derive(Debug, Error)]
pub enum WalkError<E: Display> {
    #[error("listing folder {folder_id} failed: {source}")]
    Listing { folder_id: String, source: DriveError },

    #[error("handler aborted the walk: {0}")]
    Handler(E),
}

/// Counters for one walk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WalkSummary {
    pub folders_visited: usize,
    pub actionable: usize,
    pub failed: usize,
}

pub struct TreeWalker<'a> {
    drive: &'a dyn DriveApi,
    trigger_mime_type: String,
    every_trigger: bool,
}

impl<'a> TreeWalker<'a> {
    pub fn new(drive: &'a dyn DriveApi, trigger_mime_type: impl Into<String>) -> Self {
        Self { drive, trigger_mime_type: trigger_mime_type.into(), every_trigger: false }
    }

    /// Hands every trigger file to the handler instead of only the first.
    pub fn every_trigger(mut self) -> Self {
        self.every_trigger = true;
        self
    }

    /// Visits `root_id` and every folder below it, pre-order, sub-folders in listing order.
    ///
    /// Listing and handler failures are contained to their folder. Only
    /// authentication failures and handler errors flagged fatal end the walk.
    pub async fn walk<H: FolderHandler>(
        &self,
        root_id: &str,
        handler: &mut H,
    ) -> Result<WalkSummary, WalkError<H::Error>> {
        let mut summary = WalkSummary::default();
        let mut stack = vec![root_id.to_string()];

        while let Some(folder_id) = stack.pop() {
            summary.folders_visited += 1;
            debug!(folder_id = %folder_id, "visiting folder");

            let children = match self.drive.list_all(&FileQuery::children_of(&folder_id)).await {
                Ok(children) => children,
                Err(e) if e.is_auth() => return Err(WalkError::Listing { folder_id, source: e }),
                Err(e) => {
                    error!(folder_id = %folder_id, error = %e, "could not list folder");
                    summary.failed += 1;
                    continue;
                }
            };

            let triggers: Vec<&RemoteFile> =
                children.iter().filter(|f| f.mime_type == self.trigger_mime_type).collect();
            if let Some(first) = triggers.first() {
                let selected = if self.every_trigger {
                    triggers.as_slice()
                } else {
                    if triggers.len() > 1 {
                        warn!(
                            folder_id = %folder_id,
                            count = triggers.len(),
                            using = %first.name,
                            "folder has several trigger files, using the first"
                        );
                    }
                    &triggers[..1]
                };

                summary.actionable += 1;
                for trigger in selected {
                    info!(
                        folder_id = %folder_id,
                        file_id = %trigger.id,
                        name = %trigger.name,
                        "processing trigger file"
                    );
                    if let Err(e) = handler.handle(&folder_id, trigger).await {
                        if H::is_fatal(&e) {
                            return Err(WalkError::Handler(e));
                        }
                        error!(folder_id = %folder_id, file_id = %trigger.id, error = %e, "folder processing failed");
                        summary.failed += 1;
                    }
                }
            }

            let subfolders: Vec<String> = children.iter().filter(|f| f.is_folder()).map(|f| f.id.clone()).collect();
            stack.extend(subfolders.into_iter().rev());
        }

        info!(
            root_id,
            folders = summary.folders_visited,
            actionable = summary.actionable,
            failed = summary.failed,
            "walk complete"
        );
        Ok(summary)
    }
}
