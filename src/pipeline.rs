//! The crawl-extract-fetch-upload job.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tempfile::TempDir;
use thiserror::Error;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::config::AppConfig;
use crate::constants::VIDEO_MIME_TYPE;
use crate::deck::{self, SlideSelector};
use crate::drive::{DriveApi, DriveError, FileQuery, RemoteFile};
use crate::fields::{market_prefix, FieldExtractor, ZoneMarketExtractor, MARKET_KEY, ZONE_KEY};
use crate::links::{classify, destination_file_name, sanitize_filename, ExtractedLink, LinkKind};
use crate::parser_config::ParserConfig;
use crate::uploader::Uploader;
use crate::video::{VideoError, VideoHost};
use crate::walker::{FolderHandler, TreeWalker, WalkError, WalkSummary};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Drive(#[from] DriveError),

    #[error(transparent)]
    Video(#[from] VideoError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("downloaded file is {size} bytes, below the {min} byte minimum")]
    Undersized { size: u64, min: u64 },

    #[error("deck extraction task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl PipelineError {
    /// Authentication failures end the run; everything else is confined to a link or folder.
    pub fn is_auth(&self) -> bool {
        matches!(self, PipelineError::Drive(e) if e.is_auth())
    }
}

/// What happened to one link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LinkOutcome {
    Uploaded { file_id: String, name: String },
    /// A file with the computed name already sat in the folder.
    Skipped { name: String },
    Failed { reason: String },
    Unsupported,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkReport {
    pub url: String,
    pub name: Option<String>,
    #[serde(flatten)]
    pub outcome: LinkOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FolderReport {
    pub folder_id: String,
    pub deck_id: String,
    pub deck_name: String,
    pub zone: Option<String>,
    pub market: Option<String>,
    pub links: Vec<LinkReport>,
}

impl FolderReport {
    pub fn count(&self, predicate: impl Fn(&LinkOutcome) -> bool) -> usize {
        self.links.iter().filter(|l| predicate(&l.outcome)).count()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub root_id: String,
    pub summary: WalkSummary,
    pub folders: Vec<FolderReport>,
}

impl RunReport {
    pub fn uploaded(&self) -> usize {
        self.folders.iter().map(|f| f.count(|o| matches!(o, LinkOutcome::Uploaded { .. }))).sum()
    }

    pub fn skipped(&self) -> usize {
        self.folders.iter().map(|f| f.count(|o| matches!(o, LinkOutcome::Skipped { .. }))).sum()
    }

    pub fn failed(&self) -> usize {
        self.folders.iter().map(|f| f.count(|o| matches!(o, LinkOutcome::Failed { .. }))).sum()
    }
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Parent of the per-run scratch directories.
    pub work_dir: PathBuf,
    pub min_video_bytes: u64,
    pub parser: ParserConfig,
    pub trigger_mime_type: String,
}

impl From<&AppConfig> for PipelineConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            work_dir: config.work_dir.clone(),
            min_video_bytes: config.min_video_bytes,
            parser: config.parser(),
            trigger_mime_type: config.trigger_mime_type.clone(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

/// Finds each folder's deck, fetches the videos it links to and files them beside it.
pub struct VideoPipeline {
    drive: Arc<dyn DriveApi>,
    video: Arc<dyn VideoHost>,
    config: PipelineConfig,
}

impl VideoPipeline {
    pub fn new(drive: Arc<dyn DriveApi>, video: Arc<dyn VideoHost>, config: PipelineConfig) -> Self {
        Self { drive, video, config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    fn scratch_dir(&self) -> Result<TempDir, PipelineError> {
        std::fs::create_dir_all(&self.config.work_dir)?;
        Ok(tempfile::Builder::new().prefix("run-").tempdir_in(&self.config.work_dir)?)
    }

    /// Processes every actionable folder under `root_id`.
    ///
    /// The scratch directory is removed when this returns, on success or error.
    pub async fn run_recursive(&self, root_id: &str) -> Result<RunReport, PipelineError> {
        let scratch = self.scratch_dir()?;
        info!(root_id, scratch = %scratch.path().display(), "starting recursive run");

        let walker = TreeWalker::new(self.drive.as_ref(), self.config.trigger_mime_type.clone());
        let mut runner = FolderRunner { pipeline: self, scratch: scratch.path(), reports: Vec::new() };

        let summary = walker.walk(root_id, &mut runner).await.map_err(|e| match e {
            WalkError::Listing { source, .. } => PipelineError::Drive(source),
            WalkError::Handler(e) => e,
        })?;

        let report = RunReport { root_id: root_id.to_string(), summary, folders: runner.reports };
        info!(
            root_id,
            uploaded = report.uploaded(),
            skipped = report.skipped(),
            failed = report.failed(),
            "run complete"
        );
        Ok(report)
    }

    /// Processes a single folder without descending. `None` when it holds no deck.
    pub async fn process_folder(&self, folder_id: &str) -> Result<Option<FolderReport>, PipelineError> {
        let query = FileQuery::children_of(folder_id).mime_type(self.config.trigger_mime_type.clone());
        let Some(deck) = self.drive.find_first(&query).await? else {
            warn!(folder_id, "no deck in folder");
            return Ok(None);
        };

        let scratch = self.scratch_dir()?;
        self.process_deck(folder_id, &deck, scratch.path()).await.map(Some)
    }

    /// Downloads `deck`, derives the name prefix, then handles each of its links.
    pub async fn process_deck(
        &self,
        folder_id: &str,
        deck: &RemoteFile,
        scratch: &Path,
    ) -> Result<FolderReport, PipelineError> {
        let span = info_span!("folder", folder_id, file_id = %deck.id);
        async {
            let deck_path = scratch.join(sanitize_filename(&deck.name));
            self.drive.download(&deck.id, &deck_path).await?;

            let parser = self.config.parser.clone();
            let path = deck_path.clone();
            let (text, links) = tokio::task::spawn_blocking(move || {
                (deck::slide_text(&path, SlideSelector::First), deck::extract_links(&path, &parser))
            })
            .await?;

            let fields = ZoneMarketExtractor.extract(&text);
            let zone = fields.value(ZONE_KEY).map(str::to_string);
            let market = fields.value(MARKET_KEY).map(str::to_string);
            let prefix = market_prefix(market.as_deref());
            info!(zone = ?zone, market = ?market, prefix = %prefix, links = links.len(), "deck scanned");

            let mut reports = Vec::with_capacity(links.len());
            for link in &links {
                reports.push(self.process_link(link, &prefix, folder_id, scratch).await?);
            }

            if let Err(e) = tokio::fs::remove_file(&deck_path).await {
                debug!(path = %deck_path.display(), error = %e, "could not remove deck");
            }

            Ok(FolderReport {
                folder_id: folder_id.to_string(),
                deck_id: deck.id.clone(),
                deck_name: deck.name.clone(),
                zone,
                market,
                links: reports,
            })
        }
        .instrument(span)
        .await
    }

    /// Handles one link. Only authentication failures are returned as errors;
    /// anything else becomes a [`LinkOutcome::Failed`].
    pub async fn process_link(
        &self,
        link: &ExtractedLink,
        prefix: &str,
        folder_id: &str,
        scratch: &Path,
    ) -> Result<LinkReport, PipelineError> {
        let outcome = match self.try_process_link(link, prefix, folder_id, scratch).await {
            Ok(outcome) => outcome,
            Err(e) if e.is_auth() => return Err(e),
            Err(e) => {
                error!(url = %link.url, error = %e, "link failed");
                LinkOutcome::Failed { reason: e.to_string() }
            }
        };

        Ok(LinkReport { url: link.url.clone(), name: link.name.clone(), outcome })
    }

    async fn try_process_link(
        &self,
        link: &ExtractedLink,
        prefix: &str,
        folder_id: &str,
        scratch: &Path,
    ) -> Result<LinkOutcome, PipelineError> {
        let kind = classify(&link.url);

        let remote = match &kind {
            LinkKind::Unsupported => {
                warn!(url = %link.url, "unsupported link, skipping");
                return Ok(LinkOutcome::Unsupported);
            }
            LinkKind::Internal { file_id } => Some(self.drive.get_metadata(file_id).await?),
            LinkKind::External { .. } => None,
        };

        let name = destination_file_name(prefix, link, &kind, remote.as_ref().map(|f| f.name.as_str()));
        let uploader = Uploader::new(self.drive.as_ref());
        if uploader.file_exists(&name, folder_id).await? {
            info!(url = %link.url, name = %name, "already uploaded, skipping");
            return Ok(LinkOutcome::Skipped { name });
        }

        let local = scratch.join(&name);
        let result = self.fetch_and_upload(link, &kind, remote.as_ref(), &local, &name, folder_id).await;
        if tokio::fs::try_exists(&local).await.unwrap_or(false) {
            if let Err(e) = tokio::fs::remove_file(&local).await {
                debug!(path = %local.display(), error = %e, "could not remove local copy");
            }
        }
        result
    }

    async fn fetch_and_upload(
        &self,
        link: &ExtractedLink,
        kind: &LinkKind,
        remote: Option<&RemoteFile>,
        local: &Path,
        name: &str,
        folder_id: &str,
    ) -> Result<LinkOutcome, PipelineError> {
        let size = match kind {
            LinkKind::Internal { file_id } => self.drive.download(file_id, local).await?,
            _ => self.video.fetch(&link.url, local).await?,
        };

        if size < self.config.min_video_bytes {
            warn!(url = %link.url, size, "download too small, discarding");
            return Err(PipelineError::Undersized { size, min: self.config.min_video_bytes });
        }

        let mime_type = remote
            .map(|f| f.mime_type.as_str())
            .filter(|m| m.starts_with("video/"))
            .unwrap_or(VIDEO_MIME_TYPE);

        // Another writer may have filed the same name while the video was fetched.
        let action = Uploader::new(self.drive.as_ref()).upload_or_replace(local, name, mime_type, folder_id).await?;
        Ok(LinkOutcome::Uploaded { file_id: action.file().id.clone(), name: name.to_string() })
    }
}

struct FolderRunner<'p> {
    pipeline: &'p VideoPipeline,
    scratch: &'p Path,
    reports: Vec<FolderReport>,
}

#[async_trait]
impl FolderHandler for FolderRunner<'_> {
    type Error = PipelineError;

    async fn handle(&mut self, folder_id: &str, trigger: &RemoteFile) -> Result<(), PipelineError> {
        let report = self.pipeline.process_deck(folder_id, trigger, self.scratch).await?;
        self.reports.push(report);
        Ok(())
    }

    fn is_fatal(error: &PipelineError) -> bool {
        error.is_auth()
    }
}
