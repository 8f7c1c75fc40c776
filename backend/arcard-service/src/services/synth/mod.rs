/// Derived artifact synthesis
///
/// Produces the files a session publishes besides the uploaded assets:
/// - Scene document rendered from the embedded template
/// - QR code image pointing at the scene document
/// - Photo with the code image printed on it
pub mod composite;
pub mod qr;
pub mod template;
mod url;

pub use template::SceneParams;
pub use url::{session_path, PublicUrl};

use crate::models::{Session, CODE_IMAGE_NAME, COMPOSITE_PHOTO_NAME, SCENE_DOCUMENT_NAME};
use crate::services::transcode::TranscodeProfile;
use std::path::PathBuf;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum SynthError {
    #[error("template error: {0}")]
    Template(String),
    #[error("cannot encode code image: {0}")]
    CodeEncoding(String),
    #[error(
        "photo is {width}x{height}, needs at least {min_width}x{min_height} to carry the code"
    )]
    PhotoTooSmall {
        width: u32,
        height: u32,
        min_width: u32,
        min_height: u32,
    },
    #[error("{0}")]
    Image(String),
    #[error("image task failed: {0}")]
    Join(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub struct ArtifactSynthesizer {
    fallback_marker_src: String,
}

impl ArtifactSynthesizer {
    /// `fallback_marker_src` is referenced when a session has no marker
    pub fn new(fallback_marker_src: impl Into<String>) -> Self {
        Self {
            fallback_marker_src: fallback_marker_src.into(),
        }
    }

    pub async fn write_scene_document(
        &self,
        session: &Session,
        profile: TranscodeProfile,
        page_url: &str,
    ) -> Result<PathBuf, SynthError> {
        let marker_src = session
            .marker
            .as_ref()
            .map(|m| m.file_name.clone())
            .unwrap_or_else(|| self.fallback_marker_src.clone());

        let html = template::render(&SceneParams {
            session_id: session.id.clone(),
            marker_src,
            video_src: session.video_output_name.clone(),
            video_type: profile.mime_type().to_string(),
            page_url: page_url.to_string(),
        })?;

        let path = session.artifact_path(SCENE_DOCUMENT_NAME);
        tokio::fs::write(&path, html).await?;
        info!(session_id = %session.id, "scene document written");
        Ok(path)
    }

    pub async fn write_code_image(
        &self,
        session: &Session,
        url: &str,
    ) -> Result<PathBuf, SynthError> {
        let data = url.to_string();
        let png = tokio::task::spawn_blocking(move || qr::encode_png(qr::render_code(&data)?))
            .await
            .map_err(|e| SynthError::Join(e.to_string()))??;

        let path = session.artifact_path(CODE_IMAGE_NAME);
        tokio::fs::write(&path, png).await?;
        info!(session_id = %session.id, url, "code image written");
        Ok(path)
    }

    /// Requires the code image to have been written already
    pub async fn write_composite(&self, session: &Session) -> Result<PathBuf, SynthError> {
        let photo = tokio::fs::read(&session.photo.path).await?;
        let code = tokio::fs::read(session.artifact_path(CODE_IMAGE_NAME)).await?;

        let result = tokio::task::spawn_blocking(move || composite::compose(&photo, &code))
            .await
            .map_err(|e| SynthError::Join(e.to_string()))??;

        let path = session.artifact_path(COMPOSITE_PHOTO_NAME);
        tokio::fs::write(&path, &result.png).await?;
        info!(
            session_id = %session.id,
            width = result.width,
            height = result.height,
            "composite photo written"
        );
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AssetKind, StoredAsset};
    use chrono::Utc;
    use image::{DynamicImage, ImageOutputFormat, Rgb, RgbImage};
    use std::io::Cursor;
    use std::path::Path;

    fn session_in(dir: &Path, with_marker: bool) -> Session {
        let mut jpeg = Vec::new();
        DynamicImage::ImageRgb8(RgbImage::from_pixel(640, 480, Rgb([10, 120, 10])))
            .write_to(&mut Cursor::new(&mut jpeg), ImageOutputFormat::Jpeg(85))
            .unwrap();
        let photo_path = dir.join("card.jpg");
        std::fs::write(&photo_path, &jpeg).unwrap();

        Session {
            id: "client1-0".into(),
            staging_dir: dir.to_path_buf(),
            created_at: Utc::now(),
            photo: StoredAsset {
                kind: AssetKind::Photo,
                file_name: "card.jpg".into(),
                path: photo_path,
                size_bytes: jpeg.len() as u64,
            },
            video: StoredAsset {
                kind: AssetKind::Video,
                file_name: "clip.mov".into(),
                path: dir.join("source").join("clip.mov"),
                size_bytes: 0,
            },
            marker: with_marker.then(|| StoredAsset {
                kind: AssetKind::Marker,
                file_name: "card.mind".into(),
                path: dir.join("card.mind"),
                size_bytes: 1,
            }),
            video_output_name: "clip.mp4".into(),
        }
    }

    #[tokio::test]
    async fn test_scene_document_references_session_assets() {
        let dir = tempfile::tempdir().unwrap();
        let session = session_in(dir.path(), true);
        let synth = ArtifactSynthesizer::new("targets.mind");

        let path = synth
            .write_scene_document(
                &session,
                TranscodeProfile::H264Mp4,
                "https://x/client1-0/index.html",
            )
            .await
            .unwrap();

        let html = std::fs::read_to_string(path).unwrap();
        assert!(html.contains("imageTargetSrc: card.mind;"));
        assert!(html.contains(r#"src="clip.mp4""#));
    }

    #[tokio::test]
    async fn test_scene_document_uses_fallback_marker() {
        let dir = tempfile::tempdir().unwrap();
        let session = session_in(dir.path(), false);
        let synth = ArtifactSynthesizer::new("targets.mind");

        let path = synth
            .write_scene_document(&session, TranscodeProfile::Vp9AlphaWebm, "https://x/")
            .await
            .unwrap();

        let html = std::fs::read_to_string(path).unwrap();
        assert!(html.contains("imageTargetSrc: targets.mind;"));
        assert!(html.contains(r#"type="video/webm""#));
    }

    #[tokio::test]
    async fn test_code_then_composite() {
        let dir = tempfile::tempdir().unwrap();
        let session = session_in(dir.path(), true);
        let synth = ArtifactSynthesizer::new("targets.mind");
        let original = std::fs::read(&session.photo.path).unwrap();

        let code = synth
            .write_code_image(&session, "https://x/client1-0/index.html")
            .await
            .unwrap();
        let composite = synth.write_composite(&session).await.unwrap();

        assert_eq!(code, dir.path().join("qr.png"));
        assert_eq!(composite, dir.path().join("final_with_qr.png"));
        let img = image::open(&composite).unwrap();
        assert_eq!((img.width(), img.height()), (640, 480));
        assert_eq!(std::fs::read(&session.photo.path).unwrap(), original);
    }

    #[tokio::test]
    async fn test_composite_without_code_image_fails() {
        let dir = tempfile::tempdir().unwrap();
        let session = session_in(dir.path(), true);
        let synth = ArtifactSynthesizer::new("targets.mind");

        assert!(matches!(
            synth.write_composite(&session).await,
            Err(SynthError::Io(_))
        ));
    }
}
