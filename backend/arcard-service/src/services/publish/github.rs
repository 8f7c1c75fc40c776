//! GitHub contents API client
//!
//! Each file is a create-or-update: the current blob sha is looked up first
//! (404 means the file is new) and sent back with the PUT.

use super::{RemoteStore, StoreError};
use crate::config::PublishConfig;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::Bytes;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

const USER_AGENT: &str = concat!("arcard-service/", env!("CARGO_PKG_VERSION"));

#[derive(Serialize)]
struct PutContentsRequest<'a> {
    message: &'a str,
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    branch: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<String>,
}

#[derive(Deserialize)]
struct ContentsEntry {
    sha: String,
}

pub struct GithubContentsStore {
    http_client: Client,
    api_base_url: String,
    owner: String,
    repo: String,
    branch: Option<String>,
    token: Option<String>,
}

impl GithubContentsStore {
    pub fn new(
        api_base_url: &str,
        owner: &str,
        repo: &str,
        branch: Option<String>,
        token: Option<String>,
        request_timeout: Duration,
    ) -> Result<Self, StoreError> {
        let http_client = Client::builder()
            .timeout(request_timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| StoreError::Transport(format!("failed to create HTTP client: {e}")))?;

        info!(owner = %owner, repo = %repo, branch = ?branch, "GitHub contents store initialized");

        Ok(Self {
            http_client,
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
            owner: owner.to_string(),
            repo: repo.to_string(),
            branch,
            token,
        })
    }

    pub fn from_config(cfg: &PublishConfig) -> Result<Self, StoreError> {
        Self::new(
            &cfg.api_base_url,
            &cfg.owner,
            &cfg.repo,
            cfg.branch.clone(),
            cfg.token.clone(),
            Duration::from_secs(cfg.request_timeout_secs),
        )
    }

    fn contents_url(&self, path: &str) -> String {
        let encoded: Vec<_> = path
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| urlencoding::encode(s).into_owned())
            .collect();
        format!(
            "{}/repos/{}/{}/contents/{}",
            self.api_base_url,
            urlencoding::encode(&self.owner),
            urlencoding::encode(&self.repo),
            encoded.join("/")
        )
    }

    fn authorize(&self, req: RequestBuilder) -> RequestBuilder {
        let req = req
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28");
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    /// Blob sha of the file at `path`, or `None` if it does not exist
    async fn current_sha(&self, path: &str) -> Result<Option<String>, StoreError> {
        let mut req = self.http_client.get(self.contents_url(path));
        if let Some(branch) = &self.branch {
            req = req.query(&[("ref", branch.as_str())]);
        }

        let resp = self
            .authorize(req)
            .send()
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;

        match resp.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let entry: ContentsEntry = resp
                    .json()
                    .await
                    .map_err(|e| StoreError::Protocol(format!("invalid contents response: {e}")))?;
                Ok(Some(entry.sha))
            }
            status => Err(status_error(status, resp).await),
        }
    }
}

async fn status_error(status: StatusCode, resp: reqwest::Response) -> StoreError {
    let body = resp.text().await.unwrap_or_default();
    StoreError::Status {
        status: status.as_u16(),
        body,
    }
}

#[async_trait]
impl RemoteStore for GithubContentsStore {
    async fn put_file(
        &self,
        path: &str,
        content: Bytes,
        message: &str,
    ) -> Result<(), StoreError> {
        let sha = self.current_sha(path).await?;
        debug!(path, exists = sha.is_some(), size = content.len(), "writing file");

        let body = PutContentsRequest {
            message,
            content: STANDARD.encode(&content),
            branch: self.branch.as_deref(),
            sha,
        };

        let resp = self
            .authorize(self.http_client.put(self.contents_url(path)))
            .json(&body)
            .send()
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(status_error(status, resp).await);
        }
        Ok(())
    }
}
