//! External video host downloads through `yt-dlp`.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info};

/// Highest-resolution stream, mp4 first. Anything else is remuxed after download.
const FORMAT_SELECTOR: &str = "bestvideo[ext=mp4]/best[ext=mp4]/bestvideo/best";

/// Container used when the destination has no extension.
const DEFAULT_CONTAINER: &str = "mp4";

#[derive(Debug, Error)]
pub enum VideoError {
    #[error("{0} not found in PATH")]
    ToolNotFound(String),

    #[error("Download failed: {message}")]
    DownloadFailed { message: String },

    #[error("Download produced no file at {0}")]
    MissingOutput(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Fetches a video from an external host into a local file.
#[async_trait]
pub trait VideoHost: Send + Sync {
    /// Downloads `url` to `destination`, returning the resulting byte size.
    async fn fetch(&self, url: &str, destination: &Path) -> Result<u64, VideoError>;
}

/// `yt-dlp` subprocess wrapper.
#[derive(Debug, Clone)]
pub struct YtDlp {
    program: String,
}

impl Default for YtDlp {
    fn default() -> Self {
        Self::new("yt-dlp")
    }
}

impl YtDlp {
    pub fn new(program: impl Into<String>) -> Self {
        Self { program: program.into() }
    }

    fn locate(&self) -> Result<PathBuf, VideoError> {
        which::which(&self.program).map_err(|_| VideoError::ToolNotFound(self.program.clone()))
    }

    /// Arguments that leave the video at exactly `destination`, remuxed into
    /// the container its extension names.
    fn args(url: &str, destination: &Path) -> Vec<OsString> {
        let container = Self::container(destination);
        let stem = destination.file_stem().map(|s| s.to_string_lossy().replace('%', "%%")).unwrap_or_default();
        let template = destination.with_file_name(format!("{stem}.%(ext)s"));

        let mut args: Vec<OsString> = ["--no-playlist", "--no-progress", "-f", FORMAT_SELECTOR]
            .into_iter()
            .map(OsString::from)
            .collect();
        args.push("--remux-video".into());
        args.push(container.into());
        args.push("-o".into());
        args.push(template.into_os_string());
        args.push(url.into());
        args
    }

    fn container(destination: &Path) -> String {
        destination
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_else(|| DEFAULT_CONTAINER.to_string())
    }
}

#[async_trait]
impl VideoHost for YtDlp {
    async fn fetch(&self, url: &str, destination: &Path) -> Result<u64, VideoError> {
        let program = self.locate()?;
        info!(url, path = %destination.display(), "downloading external video");

        let output = Command::new(program)
            .args(Self::args(url, destination))
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            debug!(url, "yt-dlp stderr: {}", stderr);
            let message = stderr.lines().last().unwrap_or("unknown error").to_string();
            return Err(VideoError::DownloadFailed { message });
        }

        // yt-dlp names the remuxed file with a lowercase extension.
        let produced = destination.with_extension(Self::container(destination));
        if produced != destination && tokio::fs::try_exists(&produced).await.unwrap_or(false) {
            tokio::fs::rename(&produced, destination).await?;
        }

        match tokio::fs::metadata(destination).await {
            Ok(meta) => Ok(meta.len()),
            Err(_) => Err(VideoError::MissingOutput(destination.to_path_buf())),
        }
    }
}
