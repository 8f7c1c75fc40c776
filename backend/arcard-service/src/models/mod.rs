/// Data models for arcard-service
///
/// This module defines structures for:
/// - Uploaded assets and the session that owns them
/// - Transcode attempts and publish records
/// - HTTP response payloads
///
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

// ========================================
// Artifact names
// ========================================

/// Scene document served to end users
pub const SCENE_DOCUMENT_NAME: &str = "index.html";

/// QR code image pointing at the scene document
pub const CODE_IMAGE_NAME: &str = "qr.png";

/// Photo with the QR code printed on it
pub const COMPOSITE_PHOTO_NAME: &str = "final_with_qr.png";

/// Session subdirectory holding the raw video and encoder attempts; never published
pub const SOURCE_DIR_NAME: &str = "source";

/// Names an uploaded asset may never take inside a session directory
pub const RESERVED_NAMES: [&str; 4] = [
    SCENE_DOCUMENT_NAME,
    CODE_IMAGE_NAME,
    COMPOSITE_PHOTO_NAME,
    SOURCE_DIR_NAME,
];

// ========================================
// Upload Models
// ========================================

/// Role of an uploaded file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetKind {
    Photo,
    Video,
    Marker,
}

impl AssetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Photo => "photo",
            Self::Video => "video",
            Self::Marker => "marker",
        }
    }

    /// Multipart field names accepted for this asset
    pub fn field_names(&self) -> &'static [&'static str] {
        match self {
            Self::Photo => &["photo"],
            Self::Video => &["video"],
            Self::Marker => &["mind", "marker"],
        }
    }

    pub fn from_field_name(name: &str) -> Option<Self> {
        [Self::Photo, Self::Video, Self::Marker]
            .into_iter()
            .find(|kind| kind.field_names().contains(&name))
    }

    /// Used when the client sends no usable file name
    pub fn default_file_name(&self) -> &'static str {
        match self {
            Self::Photo => "photo.jpg",
            Self::Video => "video.mp4",
            Self::Marker => "marker.mind",
        }
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One file received from the client, name untrusted
#[derive(Debug, Clone)]
pub struct UploadedAsset {
    pub file_name: Option<String>,
    pub bytes: Bytes,
}

impl UploadedAsset {
    pub fn new(file_name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            file_name: Some(file_name.into()),
            bytes: bytes.into(),
        }
    }
}

/// The asset set submitted with one request
#[derive(Debug, Clone, Default)]
pub struct IngestAssets {
    pub photo: Option<UploadedAsset>,
    pub video: Option<UploadedAsset>,
    pub marker: Option<UploadedAsset>,
}

impl IngestAssets {
    pub fn slot_mut(&mut self, kind: AssetKind) -> &mut Option<UploadedAsset> {
        match kind {
            AssetKind::Photo => &mut self.photo,
            AssetKind::Video => &mut self.video,
            AssetKind::Marker => &mut self.marker,
        }
    }
}

// ========================================
// Session Models
// ========================================

/// An asset persisted into a session directory under its sanitized name
#[derive(Debug, Clone)]
pub struct StoredAsset {
    pub kind: AssetKind,
    pub file_name: String,
    pub path: PathBuf,
    pub size_bytes: u64,
}

/// One ingestion-to-publish unit of work; owns `staging_dir` exclusively
#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub staging_dir: PathBuf,
    pub created_at: DateTime<Utc>,
    pub photo: StoredAsset,
    pub video: StoredAsset,
    pub marker: Option<StoredAsset>,
    /// Name the transcoded video is published under
    pub video_output_name: String,
}

impl Session {
    pub fn source_dir(&self) -> PathBuf {
        self.staging_dir.join(SOURCE_DIR_NAME)
    }

    pub fn artifact_path(&self, name: &str) -> PathBuf {
        self.staging_dir.join(name)
    }
}

/// Files synthesized for a session
#[derive(Debug, Clone)]
pub struct DerivedArtifacts {
    pub scene_document: PathBuf,
    pub code_image: PathBuf,
    pub composite_photo: PathBuf,
    pub transcoded_video: PathBuf,
}

// ========================================
// Transcode / Publish Models
// ========================================

/// One encoder run during the bitrate search
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscodeAttempt {
    pub bitrate_kbps: u32,
    pub size_bytes: u64,
    pub accepted: bool,
}

/// One file written to the remote store
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishRecord {
    pub remote_path: String,
    pub payload_bytes: u64,
    pub message: String,
}

// ========================================
// Response DTOs
// ========================================

/// Summary of the accepted transcode
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoSummary {
    pub file_name: String,
    pub bitrate_kbps: u32,
    pub size_bytes: u64,
    pub within_budget: bool,
    pub attempts: Vec<TranscodeAttempt>,
}

/// Body returned by the ingestion endpoint on success
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub message: String,
    pub session_id: String,
    pub public_url: String,
    pub code_image_path: String,
    pub composite_photo_path: String,
    pub video: VideoSummary,
}
