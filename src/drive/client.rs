//! Drive v3 REST client.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::{header, Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::json;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info_span, Instrument};

use super::{DriveApi, DriveError, DriveResult, FileList, FileQuery, RemoteFile};
use crate::auth::TokenSource;

/// Fields requested for every file resource.
const FILE_FIELDS: &str = "id,name,mimeType,parents,size";
const LIST_FIELDS: &str = "nextPageToken,files(id,name,mimeType,parents,size)";
const PAGE_SIZE: &str = "1000";

#[derive(Debug, Clone)]
pub struct DriveClientConfig {
    pub base_url: String,
    pub upload_base_url: String,
    /// Whole-request timeout for metadata calls. Media transfers are bounded
    /// by `read_timeout` only.
    pub timeout: Duration,
    pub connect_timeout: Duration,
    /// Longest wait for the next chunk of any response.
    pub read_timeout: Duration,
}

impl Default for DriveClientConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.googleapis.com/drive/v3".to_string(),
            upload_base_url: "https://www.googleapis.com/upload/drive/v3".to_string(),
            timeout: Duration::from_secs(300),
            connect_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_secs(60),
        }
    }
}

impl DriveClientConfig {
    /// Points both endpoints at one host, e.g. a mock server.
    pub fn with_base(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            base_url: format!("{base}/drive/v3"),
            upload_base_url: format!("{base}/upload/drive/v3"),
            ..Self::default()
        }
    }
}

/// Drive API client authenticated through a [`TokenSource`].
#[derive(Clone)]
pub struct DriveClient {
    http: Client,
    config: DriveClientConfig,
    tokens: Arc<dyn TokenSource>,
}

impl DriveClient {
    pub fn new(config: DriveClientConfig, tokens: Arc<dyn TokenSource>) -> DriveResult<Self> {
        let http = Client::builder()
            .connect_timeout(config.connect_timeout)
            .read_timeout(config.read_timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .user_agent(concat!("deck-vault/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { http, config, tokens })
    }

    fn file_url(&self, file_id: &str) -> String {
        format!("{}/files/{}", self.config.base_url, file_id)
    }

    /// Sends the request built by `build`, retrying once with a fresh token on 401.
    async fn send_authorized<F>(&self, context: &str, build: F) -> DriveResult<Response>
    where
        F: Fn(&str) -> RequestBuilder,
    {
        let token = self.tokens.access_token().await?;
        let response = build(&token).send().await?;

        let response = if response.status() == StatusCode::UNAUTHORIZED {
            debug!(context, "access token rejected, refreshing");
            self.tokens.invalidate().await;
            let token = self.tokens.access_token().await?;
            build(&token).send().await?
        } else {
            response
        };

        Self::check(context, response).await
    }

    async fn check(context: &str, response: Response) -> DriveResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(DriveError::from_http_status(status.as_u16(), context, body))
    }

    async fn json<T: DeserializeOwned>(context: &str, response: Response) -> DriveResult<T> {
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes)
            .map_err(|e| DriveError::InvalidResponse(format!("{context}: {e}")))
    }

    /// Opens a resumable session and streams `source` into it.
    async fn resumable_upload(
        &self,
        context: &str,
        start: impl Fn(&str) -> RequestBuilder,
        mime_type: &str,
        source: &Path,
    ) -> DriveResult<RemoteFile> {
        let length = tokio::fs::metadata(source).await?.len();

        let response = self
            .send_authorized(context, |token| {
                start(token)
                    .timeout(self.config.timeout)
                    .header("X-Upload-Content-Type", mime_type)
                    .header("X-Upload-Content-Length", length)
            })
            .await?;

        let session = response
            .headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| DriveError::InvalidResponse(format!("{context}: no upload session location")))?;

        let token = self.tokens.access_token().await?;
        let file = tokio::fs::File::open(source).await?;
        let response = self
            .http
            .put(&session)
            .bearer_auth(&token)
            .header(header::CONTENT_TYPE, mime_type)
            .header(header::CONTENT_LENGTH, length)
            .body(file)
            .send()
            .await?;

        let response = Self::check(context, response).await?;
        Self::json(context, response).await
    }
}

#[async_trait]
impl DriveApi for DriveClient {
    async fn list_page(&self, query: &FileQuery, page_token: Option<&str>) -> DriveResult<FileList> {
        let url = format!("{}/files", self.config.base_url);
        let q = query.to_q();

        async {
            let response = self
                .send_authorized("files.list", |token| {
                    let mut params = vec![
                        ("q", q.as_str()),
                        ("fields", LIST_FIELDS),
                        ("pageSize", PAGE_SIZE),
                        ("spaces", "drive"),
                    ];
                    if let Some(page_token) = page_token {
                        params.push(("pageToken", page_token));
                    }
                    self.http.get(&url).bearer_auth(token).timeout(self.config.timeout).query(&params)
                })
                .await?;
            Self::json("files.list", response).await
        }
        .instrument(info_span!("drive_list", q = %q))
        .await
    }

    async fn get_metadata(&self, file_id: &str) -> DriveResult<RemoteFile> {
        let url = self.file_url(file_id);
        let response = self
            .send_authorized(&format!("files.get {file_id}"), |token| {
                self.http.get(&url).bearer_auth(token).timeout(self.config.timeout).query(&[("fields", FILE_FIELDS)])
            })
            .await?;
        Self::json("files.get", response).await
    }

    async fn download(&self, file_id: &str, destination: &Path) -> DriveResult<u64> {
        let url = self.file_url(file_id);

        async {
            let response = self
                .send_authorized(&format!("download {file_id}"), |token| {
                    self.http.get(&url).bearer_auth(token).query(&[("alt", "media")])
                })
                .await?;

            let mut file = tokio::fs::File::create(destination).await?;
            let mut stream = response.bytes_stream();
            let mut written = 0u64;
            while let Some(chunk) = stream.next().await {
                let chunk = chunk?;
                file.write_all(&chunk).await?;
                written += chunk.len() as u64;
            }
            file.flush().await?;

            debug!(bytes = written, path = %destination.display(), "download complete");
            Ok(written)
        }
        .instrument(info_span!("drive_download", file_id))
        .await
    }

    async fn create_folder(&self, name: &str, parent_id: &str) -> DriveResult<RemoteFile> {
        let url = format!("{}/files", self.config.base_url);
        let body = json!({
            "name": name,
            "mimeType": crate::constants::FOLDER_MIME_TYPE,
            "parents": [parent_id],
        });

        let response = self
            .send_authorized(&format!("create folder {name}"), |token| {
                self.http
                    .post(&url)
                    .bearer_auth(token)
                    .timeout(self.config.timeout)
                    .query(&[("fields", FILE_FIELDS)])
                    .json(&body)
            })
            .await?;
        Self::json("files.create", response).await
    }

    async fn create_file(
        &self,
        name: &str,
        parent_id: &str,
        mime_type: &str,
        source: &Path,
    ) -> DriveResult<RemoteFile> {
        let url = format!("{}/files", self.config.upload_base_url);
        let metadata = json!({ "name": name, "parents": [parent_id], "mimeType": mime_type });

        self.resumable_upload(
            &format!("upload {name}"),
            |token| {
                self.http
                    .post(&url)
                    .bearer_auth(token)
                    .query(&[("uploadType", "resumable"), ("fields", FILE_FIELDS)])
                    .json(&metadata)
            },
            mime_type,
            source,
        )
        .instrument(info_span!("drive_upload", name, parent_id))
        .await
    }

    async fn update_file(&self, file_id: &str, mime_type: &str, source: &Path) -> DriveResult<RemoteFile> {
        let url = format!("{}/files/{}", self.config.upload_base_url, file_id);

        self.resumable_upload(
            &format!("update {file_id}"),
            |token| {
                self.http
                    .patch(&url)
                    .bearer_auth(token)
                    .query(&[("uploadType", "resumable"), ("fields", FILE_FIELDS)])
                    .json(&json!({}))
            },
            mime_type,
            source,
        )
        .instrument(info_span!("drive_update", file_id))
        .await
    }
}
