/// End-to-end pipeline tests with a scripted encoder and an in-memory store
mod common;

use actix_web::ResponseError;
use arcard_service::error::Stage;
use arcard_service::models::{IngestAssets, UploadedAsset};
use arcard_service::services::access::AccessGate;
use arcard_service::services::transcode::AdaptiveTranscoder;
use arcard_service::services::{
    ArtifactSynthesizer, PipelineRequest, PublicUrl, Publisher, SessionIngestor, SessionPipeline,
};
use arcard_service::AppError;
use common::*;
use resilience::RetryConfig;
use std::sync::Arc;
use std::time::Duration;

const MIB: u64 = 1024 * 1024;

fn request(code: &str, assets: IngestAssets) -> PipelineRequest {
    PipelineRequest {
        code: code.to_string(),
        assets,
        scheme: "https".into(),
        host: "cards.test".into(),
    }
}

fn decode_code_image(path: &std::path::Path) -> String {
    let img = image::open(path).unwrap().to_luma8();
    let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(
        img.width() as usize,
        img.height() as usize,
        |x, y| img.get_pixel(x as u32, y as u32).0[0],
    );
    let grids = prepared.detect_grids();
    grids[0].decode().unwrap().1
}

#[tokio::test]
async fn test_valid_upload_is_published() {
    let root = tempfile::tempdir().unwrap();
    let config = test_config(root.path());
    // 10 KiB per kbps: only 400 kbps and below fit in 5 MiB
    let encoder = Arc::new(ScriptedEncoder::sized(10 * 1024));
    let store = Arc::new(RecordingStore::default());
    let pipeline = pipeline(&config, encoder.clone(), store.clone());

    let outcome = pipeline
        .run(request(VALID_CODE, full_assets(1000)))
        .await
        .unwrap();

    assert_eq!(outcome.message, "Готово");
    assert!(outcome.video.size_bytes <= 5 * MIB);
    assert!(outcome.video.within_budget);
    assert_eq!(outcome.video.bitrate_kbps, 400);
    assert_eq!(outcome.video.attempts.len(), 4);
    assert!(outcome.public_url.ends_with("/index.html"));
    assert_eq!(
        outcome.public_url,
        format!("https://cards.test/{}/index.html", outcome.session_id)
    );
    assert_eq!(
        outcome.code_image_path,
        format!("/{}/qr.png", outcome.session_id)
    );

    let dir = root.path().join(&outcome.session_id);
    let composite = image::open(dir.join("final_with_qr.png")).unwrap();
    assert_eq!((composite.width(), composite.height()), (1000, 1000));
    assert_eq!(decode_code_image(&dir.join("qr.png")), outcome.public_url);

    let writes = store.writes.lock().clone();
    assert_eq!(writes.len(), 6);
    assert_eq!(outcome.published.len(), 6);
    let prefix = format!("clients/{}/", outcome.session_id);
    for (path, bytes, _) in &writes {
        let name = path.strip_prefix(&prefix).unwrap();
        assert_eq!(&std::fs::read(dir.join(name)).unwrap()[..], &bytes[..]);
    }
    assert_eq!(writes.last().unwrap().0, format!("{prefix}index.html"));
    assert!(!writes.iter().any(|w| w.0.contains("source")));

    let html = std::fs::read_to_string(dir.join("index.html")).unwrap();
    assert!(html.contains("imageTargetSrc: postcard.mind;"));
    assert!(html.contains(r#"src="greeting.mp4""#));
}

#[tokio::test]
async fn test_expired_code_creates_nothing() {
    let root = tempfile::tempdir().unwrap();
    let config = test_config(root.path());
    let encoder = Arc::new(ScriptedEncoder::sized(1));
    let store = Arc::new(RecordingStore::default());
    let pipeline = pipeline(&config, encoder.clone(), store.clone());

    let err = pipeline
        .run(request(EXPIRED_CODE, full_assets(300)))
        .await
        .unwrap_err();

    assert_eq!(err.status_code().as_u16(), 403);
    assert_eq!(err.root().to_string(), "Срок действия секретного кода истёк");
    assert!(session_dirs(root.path()).is_empty());
    assert!(store.writes.lock().is_empty());
    assert!(encoder.jobs.lock().is_empty());
}

#[tokio::test]
async fn test_unknown_code_rejected() {
    let root = tempfile::tempdir().unwrap();
    let config = test_config(root.path());
    let store = Arc::new(RecordingStore::default());
    let pipeline = pipeline(&config, Arc::new(ScriptedEncoder::sized(1)), store.clone());

    let err = pipeline
        .run(request("NOPE", full_assets(300)))
        .await
        .unwrap_err();

    assert_eq!(err.status_code().as_u16(), 403);
    assert_eq!(err.root().to_string(), "Неверный или просроченный секретный код");
    assert!(store.writes.lock().is_empty());
}

#[tokio::test]
async fn test_floor_bitrate_still_succeeds() {
    let root = tempfile::tempdir().unwrap();
    let config = test_config(root.path());
    // even 300 kbps produces ~5.9 MiB
    let encoder = Arc::new(ScriptedEncoder::sized(20 * 1024));
    let store = Arc::new(RecordingStore::default());
    let pipeline = pipeline(&config, encoder.clone(), store.clone());

    let outcome = pipeline
        .run(request(VALID_CODE, full_assets(400)))
        .await
        .unwrap();

    assert_eq!(outcome.video.bitrate_kbps, 300);
    assert!(!outcome.video.within_budget);
    assert!(outcome.video.size_bytes > 5 * MIB);
    assert_eq!(outcome.video.attempts.len(), 5);
    assert_eq!(store.writes.lock().len(), 6);
}

#[tokio::test]
async fn test_small_photo_fails_composite_stage() {
    let root = tempfile::tempdir().unwrap();
    let config = test_config(root.path());
    let store = Arc::new(RecordingStore::default());
    let pipeline = pipeline(&config, Arc::new(ScriptedEncoder::sized(1)), store.clone());

    let err = pipeline
        .run(request(VALID_CODE, full_assets(150)))
        .await
        .unwrap_err();

    assert_eq!(err.stage(), Some(Stage::Composite));
    assert_eq!(err.status_code().as_u16(), 500);
    assert!(store.writes.lock().is_empty());
    // raw assets stay staged
    assert_eq!(session_dirs(root.path()).len(), 1);
}

#[tokio::test]
async fn test_publish_failure_reports_partial_state() {
    let root = tempfile::tempdir().unwrap();
    let config = test_config(root.path());
    let store = Arc::new(RecordingStore::default());
    store.reject("qr.png");
    let pipeline = pipeline(&config, Arc::new(ScriptedEncoder::sized(1)), store.clone());

    let err = pipeline
        .run(request(VALID_CODE, full_assets(300)))
        .await
        .unwrap_err();

    assert_eq!(err.stage(), Some(Stage::Publish));
    match err.root() {
        AppError::Publish(publish) => {
            assert_eq!(publish.published(), store.paths().as_slice());
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(store.writes.lock().len(), 4);
    assert!(!store.paths().iter().any(|p| p.ends_with("index.html")));
}

#[tokio::test]
async fn test_optional_marker_uses_fallback() {
    let root = tempfile::tempdir().unwrap();
    let mut config = test_config(root.path());
    config.access.require_marker = false;
    let store = Arc::new(RecordingStore::default());
    let pipeline = pipeline(&config, Arc::new(ScriptedEncoder::sized(1)), store.clone());

    let mut assets = full_assets(300);
    assets.marker = None;
    let outcome = pipeline.run(request(VALID_CODE, assets)).await.unwrap();

    assert_eq!(store.writes.lock().len(), 5);
    let html = std::fs::read_to_string(
        root.path().join(&outcome.session_id).join("index.html"),
    )
    .unwrap();
    assert!(html.contains("imageTargetSrc: targets.mind;"));
}

#[tokio::test]
async fn test_missing_video_is_bad_request() {
    let root = tempfile::tempdir().unwrap();
    let config = test_config(root.path());
    let store = Arc::new(RecordingStore::default());
    let pipeline = pipeline(&config, Arc::new(ScriptedEncoder::sized(1)), store.clone());

    let mut assets = full_assets(300);
    assets.video = None;
    let err = pipeline.run(request(VALID_CODE, assets)).await.unwrap_err();

    assert_eq!(err.status_code().as_u16(), 400);
    assert!(session_dirs(root.path()).is_empty());
}

#[tokio::test]
async fn test_stage_timeout_aborts_session() {
    let root = tempfile::tempdir().unwrap();
    let config = test_config(root.path());
    let encoder = Arc::new(ScriptedEncoder::slow(Duration::from_secs(5)));
    let store = Arc::new(RecordingStore::default());

    let transcoder = AdaptiveTranscoder::new(encoder, config.transcode.clone()).unwrap();
    let pipeline = SessionPipeline::new(
        SessionIngestor::new(
            AccessGate::new(code_repository()),
            root.path(),
            true,
            transcoder.profile().extension(),
        ),
        transcoder,
        ArtifactSynthesizer::new("targets.mind"),
        Publisher::new(store.clone(), "clients", RetryConfig::no_retry()),
        PublicUrl::new(None, "clients"),
        Duration::from_millis(300),
    );

    let mut assets = full_assets(300);
    assets.video = Some(UploadedAsset::new("greeting.mp4", vec![7u8; 1024]));
    let err = pipeline
        .run(request(VALID_CODE, assets))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        AppError::Timeout {
            stage: Stage::Transcode,
            ..
        }
    ));
    assert_eq!(err.status_code().as_u16(), 504);
    assert!(store.writes.lock().is_empty());
}
