#![allow(dead_code)]

use arcard_service::config::{
    AccessConfig, AppConfig, PipelineConfig, PublishConfig, StorageConfig, TranscodeConfig,
};
use arcard_service::models::{IngestAssets, UploadedAsset};
use arcard_service::services::transcode::{EncodeJob, TranscodeError};
use arcard_service::services::{
    CodeRepository, InMemoryCodeRepository, RemoteStore, SessionPipeline, StoreError,
    VideoEncoder,
};
use arcard_service::Config;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{Duration, Utc};
use image::{DynamicImage, ImageOutputFormat, Rgb, RgbImage};
use parking_lot::Mutex;
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;

pub const VALID_CODE: &str = "ABC";
pub const EXPIRED_CODE: &str = "OLD";

/// Remote store that keeps every write in memory
#[derive(Default)]
pub struct RecordingStore {
    pub writes: Mutex<Vec<(String, Bytes, String)>>,
    /// Path suffix whose write fails with a 422
    pub reject_suffix: Mutex<Option<String>>,
}

impl RecordingStore {
    pub fn paths(&self) -> Vec<String> {
        self.writes.lock().iter().map(|w| w.0.clone()).collect()
    }

    pub fn reject(&self, suffix: &str) {
        *self.reject_suffix.lock() = Some(suffix.to_string());
    }
}

#[async_trait]
impl RemoteStore for RecordingStore {
    async fn put_file(&self, path: &str, content: Bytes, message: &str) -> Result<(), StoreError> {
        if let Some(suffix) = self.reject_suffix.lock().as_deref() {
            if path.ends_with(suffix) {
                return Err(StoreError::Status {
                    status: 422,
                    body: "rejected".into(),
                });
            }
        }
        self.writes
            .lock()
            .push((path.to_string(), content, message.to_string()));
        Ok(())
    }
}

/// Encoder whose output size is proportional to the bitrate
pub struct ScriptedEncoder {
    pub bytes_per_kbps: u64,
    pub delay: Option<std::time::Duration>,
    pub jobs: Mutex<Vec<EncodeJob>>,
}

impl ScriptedEncoder {
    pub fn sized(bytes_per_kbps: u64) -> Self {
        Self {
            bytes_per_kbps,
            delay: None,
            jobs: Mutex::new(Vec::new()),
        }
    }

    pub fn slow(delay: std::time::Duration) -> Self {
        Self {
            bytes_per_kbps: 1,
            delay: Some(delay),
            jobs: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl VideoEncoder for ScriptedEncoder {
    async fn encode(&self, job: &EncodeJob) -> Result<(), TranscodeError> {
        self.jobs.lock().push(job.clone());
        tokio::fs::metadata(&job.input).await?;
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let len = (self.bytes_per_kbps * job.bitrate_kbps as u64) as usize;
        tokio::fs::write(&job.output, vec![0u8; len]).await?;
        Ok(())
    }
}

pub fn jpeg(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| Rgb([(x % 256) as u8, (y % 256) as u8, 90]));
    let mut buf = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut buf), ImageOutputFormat::Jpeg(85))
        .unwrap();
    buf
}

pub fn code_repository() -> Arc<dyn CodeRepository> {
    let repo = InMemoryCodeRepository::default();
    repo.put(VALID_CODE, Utc::now() + Duration::days(1)).unwrap();
    repo.put(EXPIRED_CODE, Utc::now() - Duration::days(1)).unwrap();
    Arc::new(repo)
}

pub fn test_config(staging_root: &Path) -> Config {
    Config {
        app: AppConfig {
            host: "127.0.0.1".into(),
            port: 0,
            env: "test".into(),
            max_upload_bytes: 64 * 1024 * 1024,
            log_json: false,
        },
        access: AccessConfig {
            codes_path: staging_root.join("codes.json"),
            require_marker: true,
            fallback_marker_src: "targets.mind".into(),
        },
        storage: StorageConfig {
            staging_root: staging_root.to_path_buf(),
        },
        transcode: TranscodeConfig::default(),
        publish: PublishConfig {
            namespace: "clients".into(),
            max_retries: 0,
            ..Default::default()
        },
        pipeline: PipelineConfig::default(),
    }
}

pub fn pipeline(
    config: &Config,
    encoder: Arc<ScriptedEncoder>,
    store: Arc<RecordingStore>,
) -> SessionPipeline {
    SessionPipeline::from_config(config, code_repository(), encoder, store).unwrap()
}

/// Photo, 10 MB video and marker
pub fn full_assets(photo_side: u32) -> IngestAssets {
    IngestAssets {
        photo: Some(UploadedAsset::new("postcard.jpg", jpeg(photo_side, photo_side))),
        video: Some(UploadedAsset::new("greeting.mp4", vec![7u8; 10 * 1000 * 1000])),
        marker: Some(UploadedAsset::new("postcard.mind", b"mind-marker".to_vec())),
    }
}

/// Session directories directly under the staging root
pub fn session_dirs(root: &Path) -> Vec<std::path::PathBuf> {
    std::fs::read_dir(root)
        .map(|rd| {
            rd.filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| p.is_dir())
                .collect()
        })
        .unwrap_or_default()
}
