//! Mirrors the local snapshot to a versioned contents API (GitHub-style
//! `/repos/{repo}/contents/{path}`).
//!
//! A push is two requests: a GET that learns the current revision `sha` of
//! the remote file (404 means it does not exist yet), then a PUT carrying the
//! base64 content and, when updating, that `sha`.

use crate::config::BackupConfig;
use crate::error::RemoteSyncError;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{SecondsFormat, Utc};
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

const ACCEPT_JSON: &str = "application/vnd.github+json";

/// How the remote store acknowledged a push.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PushReceipt {
    Created,
    Updated,
}

#[derive(Deserialize)]
struct ContentsMetadata {
    sha: Option<String>,
}

#[derive(Serialize)]
struct PutContents<'a> {
    message: String,
    content: String,
    branch: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<String>,
}

pub struct BackupClient {
    client: Client,
    config: BackupConfig,
}

impl BackupClient {
    pub fn new(config: BackupConfig) -> Result<Self, RemoteSyncError> {
        let client = Client::builder()
            .user_agent(concat!("dinnerclub/", env!("CARGO_PKG_VERSION")))
            .timeout(config.timeout)
            .build()?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &BackupConfig {
        &self.config
    }

    fn contents_url(&self) -> String {
        format!(
            "{}/repos/{}/contents/{}",
            self.config.api_base.trim_end_matches('/'),
            encode_segments(&self.config.repo),
            encode_segments(&self.config.path),
        )
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header(AUTHORIZATION, format!("token {}", self.config.token))
            .header(ACCEPT, ACCEPT_JSON)
    }

    // Revision token of the remote file, None when it has never been pushed
    async fn current_sha(&self) -> Result<Option<String>, RemoteSyncError> {
        let request = self
            .client
            .get(self.contents_url())
            .query(&[("ref", self.config.branch.as_str())]);
        let response = self.authorized(request).send().await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let body = response.bytes().await?;
                let metadata: ContentsMetadata =
                    serde_json::from_slice(&body).map_err(RemoteSyncError::Decode)?;
                Ok(metadata.sha)
            }
            _ => Err(status_error(response).await),
        }
    }

    /// Creates or updates the remote copy of `snapshot`.
    pub async fn push_snapshot(&self, snapshot: &[u8]) -> Result<PushReceipt, RemoteSyncError> {
        let sha = self.current_sha().await?;
        debug!(repo = %self.config.repo, path = %self.config.path, sha = ?sha, "pushing snapshot");

        let body = PutContents {
            message: format!(
                "Update snapshot {}",
                Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
            ),
            content: STANDARD.encode(snapshot),
            branch: &self.config.branch,
            sha,
        };
        let request = self.client.put(self.contents_url()).json(&body);
        let response = self.authorized(request).send().await?;

        let receipt = match response.status() {
            StatusCode::CREATED => PushReceipt::Created,
            StatusCode::OK => PushReceipt::Updated,
            _ => return Err(status_error(response).await),
        };
        info!(repo = %self.config.repo, path = %self.config.path, ?receipt, "snapshot mirrored");
        Ok(receipt)
    }
}

async fn status_error(response: Response) -> RemoteSyncError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    RemoteSyncError::Status { status, body }
}

// Percent-encode each path segment, keeping the separators
fn encode_segments(path: &str) -> String {
    path.split('/')
        .filter(|s| !s.is_empty())
        .map(|s| urlencoding::encode(s).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}
