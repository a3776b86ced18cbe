//! Runtime configuration.

use std::path::PathBuf;
use std::time::Duration;

use crate::auth::{OAuthConfig, DRIVE_SCOPE};
use crate::constants::{MIN_VIDEO_BYTES, PPTX_MIME_TYPE};
use crate::drive::DriveClientConfig;
use crate::parser_config::{LinkScope, ParserConfig};

/// Everything the pipeline needs, passed explicitly to each component.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// OAuth client secrets (installed-app JSON).
    pub client_secrets_path: PathBuf,
    /// Where the user's token is cached between runs.
    pub token_path: PathBuf,
    pub scopes: Vec<String>,
    /// Run the browser consent flow when no usable token exists.
    pub interactive_auth: bool,
    /// Parent directory for per-run scratch directories.
    pub work_dir: PathBuf,
    /// Downloads smaller than this are treated as failures.
    pub min_video_bytes: u64,
    /// Whole-request timeout for Drive metadata calls; media transfers only time out when idle.
    pub http_timeout: Duration,
    /// Path or name of the yt-dlp executable.
    pub ytdlp_program: String,
    pub link_scope: LinkScope,
    /// Mime type of the deck that makes a folder actionable.
    pub trigger_mime_type: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            client_secrets_path: PathBuf::from("bdstorage_credentials.json"),
            token_path: PathBuf::from("token_cache.json"),
            scopes: vec![DRIVE_SCOPE.to_string()],
            interactive_auth: true,
            work_dir: PathBuf::from("temp_drive_downloads"),
            min_video_bytes: MIN_VIDEO_BYTES,
            http_timeout: Duration::from_secs(300),
            ytdlp_program: "yt-dlp".to_string(),
            link_scope: LinkScope::default(),
            trigger_mime_type: PPTX_MIME_TYPE.to_string(),
        }
    }
}

impl AppConfig {
    /// Reads `DECKVAULT_*` variables, falling back to defaults for anything unset
    /// or unparsable.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            client_secrets_path: env_var("DECKVAULT_CLIENT_SECRETS")
                .map(PathBuf::from)
                .unwrap_or(defaults.client_secrets_path),
            token_path: env_var("DECKVAULT_TOKEN_FILE").map(PathBuf::from).unwrap_or(defaults.token_path),
            scopes: env_var("DECKVAULT_SCOPES")
                .map(|s| {
                    s.split([',', ' '])
                        .filter(|scope| !scope.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .filter(|scopes: &Vec<String>| !scopes.is_empty())
                .unwrap_or(defaults.scopes),
            interactive_auth: env_var("DECKVAULT_INTERACTIVE_AUTH")
                .map(|v| !matches!(v.to_ascii_lowercase().as_str(), "0" | "false" | "no"))
                .unwrap_or(defaults.interactive_auth),
            work_dir: env_var("DECKVAULT_WORK_DIR").map(PathBuf::from).unwrap_or(defaults.work_dir),
            min_video_bytes: env_parse("DECKVAULT_MIN_VIDEO_BYTES").unwrap_or(defaults.min_video_bytes),
            http_timeout: env_parse("DECKVAULT_HTTP_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.http_timeout),
            ytdlp_program: env_var("DECKVAULT_YTDLP").unwrap_or(defaults.ytdlp_program),
            link_scope: env_parse("DECKVAULT_LINK_SCOPE").unwrap_or(defaults.link_scope),
            trigger_mime_type: defaults.trigger_mime_type,
        }
    }

    pub fn oauth(&self) -> OAuthConfig {
        OAuthConfig {
            client_secrets_path: self.client_secrets_path.clone(),
            token_path: self.token_path.clone(),
            scopes: self.scopes.clone(),
            interactive: self.interactive_auth,
        }
    }

    pub fn drive_client(&self) -> DriveClientConfig {
        DriveClientConfig { timeout: self.http_timeout, ..DriveClientConfig::default() }
    }

    /// Parser settings for the configured link scope.
    pub fn parser(&self) -> ParserConfig {
        match self.link_scope {
            LinkScope::LastSlide => ParserConfig::default(),
            LinkScope::AllSlides => ParserConfig::all_slides(),
        }
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    env_var(name).and_then(|v| v.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.min_video_bytes, 1024);
        assert_eq!(config.token_path, PathBuf::from("token_cache.json"));
        assert_eq!(config.scopes, vec![DRIVE_SCOPE.to_string()]);
        assert_eq!(config.parser().link_scope, LinkScope::LastSlide);
    }

    #[test]
    fn test_all_slides_parser_uses_wider_headers() {
        let config = AppConfig { link_scope: LinkScope::AllSlides, ..AppConfig::default() };
        let parser = config.parser();
        assert_eq!(parser.link_scope, LinkScope::AllSlides);
        assert!(parser.is_name_header("Store"));
    }
}
