/// Session ingestion
///
/// Validates the access code, allocates a unique staging directory and
/// persists the uploaded assets under sanitized names.
mod filename;

pub use filename::{sanitize_file_name, FileNamePlanner};

use crate::models::{
    AssetKind, IngestAssets, Session, StoredAsset, UploadedAsset, SOURCE_DIR_NAME,
};
use crate::services::access::{AccessDecision, AccessGate};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;
use tracing::{debug, info, warn};

const MAX_ALLOCATION_ATTEMPTS: u32 = 64;

/// Prefix of encoder attempt files inside `source/`
pub const ATTEMPT_FILE_PREFIX: &str = "attempt-";

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("access denied: {0:?}")]
    AccessDenied(AccessDecision),
    #[error("missing required asset: {0}")]
    MissingAsset(AssetKind),
    #[error("could not allocate a session directory after {0} attempts")]
    Allocation(u32),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub struct SessionIngestor {
    gate: AccessGate,
    staging_root: PathBuf,
    require_marker: bool,
    video_extension: String,
    seq: AtomicU64,
}

impl SessionIngestor {
    pub fn new(
        gate: AccessGate,
        staging_root: impl Into<PathBuf>,
        require_marker: bool,
        video_extension: impl Into<String>,
    ) -> Self {
        Self {
            gate,
            staging_root: staging_root.into(),
            require_marker,
            video_extension: video_extension.into(),
            seq: AtomicU64::new(0),
        }
    }

    /// Validate `code` and persist `assets` into a fresh session directory.
    ///
    /// Nothing is written unless the code is valid and every required asset
    /// is present and non-empty.
    pub async fn begin(
        &self,
        code: &str,
        assets: IngestAssets,
        now: DateTime<Utc>,
    ) -> Result<Session, IngestError> {
        let decision = self.gate.validate(code, now);
        if !decision.is_valid() {
            warn!(?decision, "upload rejected by access gate");
            return Err(IngestError::AccessDenied(decision));
        }

        let IngestAssets {
            photo,
            video,
            marker,
        } = assets;
        let photo = require(photo, AssetKind::Photo)?;
        let video = require(video, AssetKind::Video)?;
        let marker = match marker.filter(|m| !m.bytes.is_empty()) {
            Some(m) => Some(m),
            None if self.require_marker => return Err(IngestError::MissingAsset(AssetKind::Marker)),
            None => None,
        };

        let mut planner = FileNamePlanner::new();
        let photo_name = planner.claim(AssetKind::Photo, photo.file_name.as_deref());
        let marker_name = marker
            .as_ref()
            .map(|m| planner.claim(AssetKind::Marker, m.file_name.as_deref()));

        let raw_video_name = {
            let mut scratch = FileNamePlanner::new();
            let name = scratch.claim(AssetKind::Video, video.file_name.as_deref());
            if name.starts_with(ATTEMPT_FILE_PREFIX) {
                format!("{}-{}", AssetKind::Video.as_str(), name)
            } else {
                name
            }
        };
        let stem = Path::new(&raw_video_name)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| AssetKind::Video.as_str().to_string());
        let video_output_name = planner.claim(
            AssetKind::Video,
            Some(&format!("{}.{}", stem, self.video_extension)),
        );

        let (id, staging_dir) = self.allocate(now).await?;
        let source_dir = staging_dir.join(SOURCE_DIR_NAME);
        tokio::fs::create_dir(&source_dir).await?;

        let photo = store(AssetKind::Photo, &staging_dir, photo_name, photo).await?;
        let video = store(AssetKind::Video, &source_dir, raw_video_name, video).await?;
        let marker = match (marker, marker_name) {
            (Some(asset), Some(name)) => {
                Some(store(AssetKind::Marker, &staging_dir, name, asset).await?)
            }
            _ => None,
        };

        info!(
            session_id = %id,
            photo = %photo.file_name,
            video = %video.file_name,
            marker = marker.as_ref().map(|m| m.file_name.as_str()).unwrap_or("-"),
            "session ingested"
        );

        Ok(Session {
            id,
            staging_dir,
            created_at: now,
            photo,
            video,
            marker,
            video_output_name,
        })
    }

    /// Create `<root>/client<millis>-<seq>` exclusively, skipping ids whose
    /// directory already exists.
    async fn allocate(&self, now: DateTime<Utc>) -> Result<(String, PathBuf), IngestError> {
        tokio::fs::create_dir_all(&self.staging_root).await?;

        for _ in 0..MAX_ALLOCATION_ATTEMPTS {
            let seq = self.seq.fetch_add(1, Ordering::Relaxed);
            let id = format!("client{}-{}", now.timestamp_millis(), seq);
            let dir = self.staging_root.join(&id);
            match tokio::fs::create_dir(&dir).await {
                Ok(()) => return Ok((id, dir)),
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    debug!(session_id = %id, "session directory exists, trying next id");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(IngestError::Allocation(MAX_ALLOCATION_ATTEMPTS))
    }
}

fn require(asset: Option<UploadedAsset>, kind: AssetKind) -> Result<UploadedAsset, IngestError> {
    asset
        .filter(|a| !a.bytes.is_empty())
        .ok_or(IngestError::MissingAsset(kind))
}

async fn store(
    kind: AssetKind,
    dir: &Path,
    file_name: String,
    asset: UploadedAsset,
) -> Result<StoredAsset, IngestError> {
    let path = dir.join(&file_name);
    tokio::fs::write(&path, &asset.bytes).await?;
    Ok(StoredAsset {
        kind,
        file_name,
        path,
        size_bytes: asset.bytes.len() as u64,
    })
}
