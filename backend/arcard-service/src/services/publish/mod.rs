/// Publishing of session artifacts to the remote versioned store
///
/// Files are written one at a time, media first and the scene document
/// last. Publishing is not transactional: a failure leaves the files
/// written so far in place and reports them.
mod github;

pub use github::GithubContentsStore;

use crate::models::{PublishRecord, SCENE_DOCUMENT_NAME};
use async_trait::async_trait;
use bytes::Bytes;
use resilience::{with_retry_if, RetryConfig, RetryError};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("remote store returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("unexpected response: {0}")]
    Protocol(String),
}

impl StoreError {
    /// Transport failures, 5xx and 429 are worth retrying
    pub fn is_transient(&self) -> bool {
        match self {
            StoreError::Transport(_) => true,
            StoreError::Status { status, .. } => *status >= 500 || *status == 429,
            StoreError::Protocol(_) => false,
        }
    }
}

#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Create or replace the file at `path`
    async fn put_file(&self, path: &str, content: Bytes, message: &str)
        -> Result<(), StoreError>;
}

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("failed to list {dir}: {source}")]
    Listing {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to read {file}: {source}")]
    Read {
        file: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to publish {file} to {remote_path} after {attempts} attempt(s): {source}")]
    Remote {
        file: String,
        remote_path: String,
        attempts: u32,
        /// Remote paths written before the failure
        published: Vec<String>,
        #[source]
        source: StoreError,
    },
}

impl PublishError {
    pub fn published(&self) -> &[String] {
        match self {
            PublishError::Remote { published, .. } => published,
            _ => &[],
        }
    }
}

pub struct Publisher {
    store: Arc<dyn RemoteStore>,
    namespace: String,
    retry: RetryConfig,
}

impl Publisher {
    pub fn new(
        store: Arc<dyn RemoteStore>,
        namespace: impl Into<String>,
        retry: RetryConfig,
    ) -> Self {
        Self {
            store,
            namespace: namespace.into().trim_matches('/').to_string(),
            retry,
        }
    }

    pub fn remote_path(&self, session_id: &str, file_name: &str) -> String {
        if self.namespace.is_empty() {
            format!("{session_id}/{file_name}")
        } else {
            format!("{}/{session_id}/{file_name}", self.namespace)
        }
    }

    /// Regular files directly inside `dir`, sorted by name with the scene
    /// document moved to the end.
    pub async fn list_artifacts(dir: &Path) -> Result<Vec<PathBuf>, PublishError> {
        let listing_err = |source| PublishError::Listing {
            dir: dir.to_path_buf(),
            source,
        };

        let mut entries = tokio::fs::read_dir(dir).await.map_err(listing_err)?;
        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(listing_err)? {
            if entry.file_type().await.map_err(listing_err)?.is_file() {
                files.push(entry.path());
            }
        }

        files.sort_by_key(|p| (is_scene_document(p), p.file_name().map(|n| n.to_owned())));
        Ok(files)
    }

    pub async fn publish(
        &self,
        session_id: &str,
        dir: &Path,
    ) -> Result<Vec<PublishRecord>, PublishError> {
        let files = Self::list_artifacts(dir).await?;
        let message = format!("Add files for {session_id}");
        let mut records: Vec<PublishRecord> = Vec::with_capacity(files.len());

        for path in files {
            let file = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let content = Bytes::from(tokio::fs::read(&path).await.map_err(|source| {
                PublishError::Read {
                    file: file.clone(),
                    source,
                }
            })?);
            let remote_path = self.remote_path(session_id, &file);
            let payload_bytes = content.len() as u64;

            let store = self.store.as_ref();
            let (path_ref, message_ref) = (remote_path.as_str(), message.as_str());
            let result = with_retry_if(self.retry.clone(), StoreError::is_transient, move || {
                store.put_file(path_ref, content.clone(), message_ref)
            })
            .await;

            if let Err(e) = result {
                let attempts = match &e {
                    RetryError::Exhausted { attempts, .. } => *attempts,
                    RetryError::Permanent(_) => 1,
                };
                let published = records.into_iter().map(|r| r.remote_path).collect();
                warn!(
                    session_id,
                    file = %file,
                    attempts,
                    error = %e,
                    "publish failed, earlier files remain published"
                );
                return Err(PublishError::Remote {
                    file,
                    remote_path,
                    attempts,
                    published,
                    source: e.into_inner(),
                });
            }

            info!(session_id, remote_path = %remote_path, payload_bytes, "file published");
            records.push(PublishRecord {
                remote_path,
                payload_bytes,
                message: message.clone(),
            });
        }

        Ok(records)
    }
}

fn is_scene_document(path: &Path) -> bool {
    path.file_name().map_or(false, |n| n == SCENE_DOCUMENT_NAME)
}
