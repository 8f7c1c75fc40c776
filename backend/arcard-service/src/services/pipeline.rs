/// Session pipeline
///
/// Drives one upload through ingest → transcode → scene document → code
/// image → composite → publish. Every stage runs under the stage deadline;
/// on expiry the stage future is dropped, which kills a running encoder and
/// aborts in-flight store writes.
use crate::config::Config;
use crate::error::{AppError, Stage};
use crate::models::{
    DerivedArtifacts, IngestAssets, PublishRecord, Session, UploadResponse, VideoSummary,
    CODE_IMAGE_NAME, COMPOSITE_PHOTO_NAME,
};
use crate::services::access::{AccessGate, CodeRepository};
use crate::services::publish::{Publisher, RemoteStore};
use crate::services::session::SessionIngestor;
use crate::services::synth::{session_path, ArtifactSynthesizer, PublicUrl};
use crate::services::transcode::{AdaptiveTranscoder, TranscodeRequest, VideoEncoder};
use chrono::Utc;
use resilience::{presets, with_timeout_result, RetryConfig, TimeoutError};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

pub const SUCCESS_MESSAGE: &str = "Готово";

#[derive(Debug, Clone)]
pub struct PipelineRequest {
    pub code: String,
    pub assets: IngestAssets,
    /// Scheme and host the upload arrived on, used for the public URL
    pub scheme: String,
    pub host: String,
}

#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub session_id: String,
    pub message: String,
    pub public_url: String,
    pub code_image_path: String,
    pub composite_photo_path: String,
    pub video: VideoSummary,
    /// Local paths of the synthesized files
    pub artifacts: DerivedArtifacts,
    pub published: Vec<PublishRecord>,
}

impl PipelineOutcome {
    pub fn into_response(self) -> UploadResponse {
        UploadResponse {
            message: self.message,
            session_id: self.session_id,
            public_url: self.public_url,
            code_image_path: self.code_image_path,
            composite_photo_path: self.composite_photo_path,
            video: self.video,
        }
    }
}

pub struct SessionPipeline {
    ingestor: SessionIngestor,
    transcoder: AdaptiveTranscoder,
    synth: ArtifactSynthesizer,
    publisher: Publisher,
    public_url: PublicUrl,
    stage_timeout: Duration,
}

impl SessionPipeline {
    pub fn new(
        ingestor: SessionIngestor,
        transcoder: AdaptiveTranscoder,
        synth: ArtifactSynthesizer,
        publisher: Publisher,
        public_url: PublicUrl,
        stage_timeout: Duration,
    ) -> Self {
        Self {
            ingestor,
            transcoder,
            synth,
            publisher,
            public_url,
            stage_timeout,
        }
    }

    /// Assemble the pipeline from configuration and its three external seams
    pub fn from_config(
        config: &Config,
        codes: Arc<dyn CodeRepository>,
        encoder: Arc<dyn VideoEncoder>,
        store: Arc<dyn RemoteStore>,
    ) -> Result<Self, AppError> {
        let transcoder = AdaptiveTranscoder::new(encoder, config.transcode.clone())?;

        let ingestor = SessionIngestor::new(
            AccessGate::new(codes),
            config.storage.staging_root.clone(),
            config.access.require_marker,
            transcoder.profile().extension(),
        );

        let retry = RetryConfig {
            max_retries: config.publish.max_retries,
            ..presets::remote_store_config().retry.unwrap_or_default()
        };
        let publisher = Publisher::new(store, config.publish.namespace.clone(), retry);

        Ok(Self::new(
            ingestor,
            transcoder,
            ArtifactSynthesizer::new(config.access.fallback_marker_src.clone()),
            publisher,
            PublicUrl::new(
                config.publish.public_base_url.clone(),
                config.publish.namespace.clone(),
            ),
            Duration::from_secs(config.pipeline.stage_timeout_secs),
        ))
    }

    pub async fn run(&self, request: PipelineRequest) -> Result<PipelineOutcome, AppError> {
        let PipelineRequest {
            code,
            assets,
            scheme,
            host,
        } = request;

        let session = self
            .stage(Stage::Ingest, self.ingestor.begin(&code, assets, Utc::now()))
            .await?;
        let session_id = session.id.clone();

        match self.process(&session, &scheme, &host).await {
            Ok(outcome) => {
                info!(
                    session_id = %session_id,
                    public_url = %outcome.public_url,
                    files = outcome.published.len(),
                    "session published"
                );
                Ok(outcome)
            }
            Err(e) => {
                error!(
                    session_id = %session_id,
                    stage = e.stage().map(|s| s.as_str()).unwrap_or("-"),
                    error = %e,
                    "session failed"
                );
                Err(e)
            }
        }
    }

    async fn process(
        &self,
        session: &Session,
        scheme: &str,
        host: &str,
    ) -> Result<PipelineOutcome, AppError> {
        let overlay = self
            .transcoder
            .overlay_photo()
            .then(|| session.photo.path.clone());
        let transcode = self
            .stage(
                Stage::Transcode,
                self.transcoder.transcode(TranscodeRequest {
                    session_id: session.id.clone(),
                    input: session.video.path.clone(),
                    work_dir: session.source_dir(),
                    output: session.artifact_path(&session.video_output_name),
                    overlay,
                }),
            )
            .await?;

        let public_url = self.public_url.scene_url(scheme, host, &session.id);

        let scene_document = self
            .stage(
                Stage::SceneDocument,
                self.synth
                    .write_scene_document(session, self.transcoder.profile(), &public_url),
            )
            .await?;
        let code_image = self
            .stage(Stage::CodeImage, self.synth.write_code_image(session, &public_url))
            .await?;
        let composite_photo = self
            .stage(Stage::Composite, self.synth.write_composite(session))
            .await?;

        let published = self
            .stage(
                Stage::Publish,
                self.publisher.publish(&session.id, &session.staging_dir),
            )
            .await?;

        Ok(PipelineOutcome {
            session_id: session.id.clone(),
            message: SUCCESS_MESSAGE.to_string(),
            public_url,
            code_image_path: session_path(&session.id, CODE_IMAGE_NAME),
            composite_photo_path: session_path(&session.id, COMPOSITE_PHOTO_NAME),
            video: VideoSummary {
                file_name: session.video_output_name.clone(),
                bitrate_kbps: transcode.bitrate_kbps,
                size_bytes: transcode.size_bytes,
                within_budget: transcode.within_budget,
                attempts: transcode.attempts,
            },
            artifacts: DerivedArtifacts {
                scene_document,
                code_image,
                composite_photo,
                transcoded_video: transcode.output,
            },
            published,
        })
    }

    async fn stage<T, E, F>(&self, stage: Stage, fut: F) -> Result<T, AppError>
    where
        F: Future<Output = Result<T, E>>,
        AppError: From<E>,
    {
        match with_timeout_result(self.stage_timeout, fut).await {
            Ok(value) => Ok(value),
            Err(TimeoutError::Elapsed(after)) => Err(AppError::Timeout { stage, after }),
            Err(TimeoutError::Inner(e)) => Err(AppError::from(e).at_stage(stage)),
        }
    }
}
