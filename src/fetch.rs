//! Default source fetcher and authenticated client factory.
//!
//! A source reference is resolved as follows:
//! - `http://` / `https://` URL: downloaded as markdown, modification time from `Last-Modified`
//! - existing local path: read as markdown, modification time from the file
//! - anything else: a Google Doc id, exported as markdown through the Drive v3 API

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, LAST_MODIFIED};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::contract::{BoxError, ClientFactory, ParsedCodelab, SourceFetcher, SourceKind};
use crate::parse::parse_markdown;

/// Environment variable holding the OAuth access token for Drive.
pub const ACCESS_TOKEN_ENV: &str = "CLAAT_ACCESS_TOKEN";

const DRIVE_API: &str = "https://www.googleapis.com/drive/v3";

/// Builds reqwest clients that send a bearer token with every request.
pub struct TokenClientFactory {
    token: Option<String>,
}

impl TokenClientFactory {
    pub fn new(token: Option<String>) -> Self {
        Self { token }
    }

    /// Reads the token from [`ACCESS_TOKEN_ENV`]. A missing token only fails
    /// when a client is actually requested.
    pub fn from_env() -> Self {
        Self::new(std::env::var(ACCESS_TOKEN_ENV).ok().filter(|t| !t.is_empty()))
    }
}

#[async_trait]
impl ClientFactory for TokenClientFactory {
    async fn new_client(&self) -> Result<reqwest::Client, BoxError> {
        let token = self
            .token
            .as_deref()
            .ok_or_else(|| format!("{ACCESS_TOKEN_ENV} is not set"))?;
        let mut auth = HeaderValue::from_str(&format!("Bearer {token}"))?;
        auth.set_sensitive(true);
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);
        Ok(reqwest::Client::builder().default_headers(headers).build()?)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
    Url,
    File,
    Doc,
}

fn origin(source: &str) -> Origin {
    if source.starts_with("http://") || source.starts_with("https://") {
        Origin::Url
    } else if Path::new(source).exists() {
        Origin::File
    } else {
        Origin::Doc
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveFile {
    modified_time: DateTime<Utc>,
}

/// Fetches markdown sources from URLs, local files and Google Docs.
pub struct MarkdownFetcher {
    http: reqwest::Client,
    drive: Arc<dyn ClientFactory>,
    drive_api: String,
}

impl MarkdownFetcher {
    pub fn new(drive: Arc<dyn ClientFactory>) -> Self {
        Self {
            http: reqwest::Client::new(),
            drive,
            drive_api: DRIVE_API.to_string(),
        }
    }

    /// Uses a different Drive API base URL (e.g. a local stub server).
    pub fn with_drive_api(mut self, base: impl Into<String>) -> Self {
        self.drive_api = base.into();
        self
    }

    async fn fetch_url(&self, url: &str) -> Result<(String, DateTime<Utc>), BoxError> {
        let resp = self.http.get(url).send().await?.error_for_status()?;
        let modified = resp
            .headers()
            .get(LAST_MODIFIED)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| DateTime::parse_from_rfc2822(v).ok())
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or_else(|| {
                warn!(url, "No usable Last-Modified header, using current time");
                Utc::now()
            });
        Ok((resp.text().await?, modified))
    }

    async fn fetch_file(&self, path: &str) -> Result<(String, DateTime<Utc>), BoxError> {
        let text = tokio::fs::read_to_string(path).await?;
        let modified = tokio::fs::metadata(path).await?.modified()?;
        Ok((text, DateTime::<Utc>::from(modified)))
    }

    async fn fetch_doc(&self, id: &str) -> Result<(String, DateTime<Utc>), BoxError> {
        let client = self.drive.new_client().await?;
        let file: DriveFile = client
            .get(format!("{}/files/{id}", self.drive_api))
            .query(&[("fields", "modifiedTime")])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        let text = client
            .get(format!("{}/files/{id}/export", self.drive_api))
            .query(&[("mimeType", "text/markdown")])
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        Ok((text, file.modified_time))
    }
}

#[async_trait]
impl SourceFetcher for MarkdownFetcher {
    async fn fetch(&self, source: &str) -> Result<ParsedCodelab, BoxError> {
        let origin = origin(source);
        debug!(source, ?origin, "Resolving codelab source");
        let ((text, modified), kind) = match origin {
            Origin::Url => (self.fetch_url(source).await?, SourceKind::Markdown),
            Origin::File => (self.fetch_file(source).await?, SourceKind::Markdown),
            Origin::Doc => (self.fetch_doc(source).await?, SourceKind::GoogleDoc),
        };
        let codelab = parse_markdown(&text);
        info!(source, id = %codelab.meta.id, steps = codelab.steps.len(), "Parsed codelab source");
        Ok(ParsedCodelab {
            codelab,
            modified,
            kind,
        })
    }
}
