/// Adaptive video transcoding
///
/// Re-encodes the session video at decreasing bitrates until the result fits
/// the size budget, or the floor bitrate is reached.
mod ffmpeg;

pub use ffmpeg::{FfmpegCommand, FfmpegEncoder, TranscodeProfile};

use crate::config::TranscodeConfig;
use crate::models::TranscodeAttempt;
use crate::services::session::ATTEMPT_FILE_PREFIX;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum TranscodeError {
    #[error("failed to start encoder {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("encoder exited with status {code:?}: {stderr}")]
    EncoderFailed { code: Option<i32>, stderr: String },
    #[error("encoder produced no output at {0}")]
    MissingOutput(PathBuf),
    #[error("invalid transcode configuration: {0}")]
    InvalidConfig(String),
    #[error("transcode pool closed")]
    PoolClosed,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// One encoder invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodeJob {
    pub input: PathBuf,
    pub output: PathBuf,
    pub bitrate_kbps: u32,
    pub profile: TranscodeProfile,
    /// Image inset into the video during the encode
    pub overlay: Option<PathBuf>,
}

#[async_trait]
pub trait VideoEncoder: Send + Sync {
    /// Encode `job.input` into `job.output`; the output exists on success
    async fn encode(&self, job: &EncodeJob) -> Result<(), TranscodeError>;
}

#[derive(Debug, Clone)]
pub struct TranscodeRequest {
    pub session_id: String,
    pub input: PathBuf,
    /// Directory receiving the attempt files
    pub work_dir: PathBuf,
    /// Final location of the accepted encode
    pub output: PathBuf,
    pub overlay: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct TranscodeOutcome {
    pub output: PathBuf,
    pub bitrate_kbps: u32,
    pub size_bytes: u64,
    pub within_budget: bool,
    pub attempts: Vec<TranscodeAttempt>,
}

/// Bitrates tried in order: `initial`, lowered by `step`, clamped to and
/// ending at `floor`.
pub fn bitrate_schedule(initial_kbps: u32, floor_kbps: u32, step_kbps: u32) -> Vec<u32> {
    let step = step_kbps.max(1);
    let mut schedule = Vec::new();
    let mut kbps = initial_kbps.max(floor_kbps);
    loop {
        schedule.push(kbps);
        if kbps <= floor_kbps {
            break;
        }
        kbps = kbps.saturating_sub(step).max(floor_kbps);
    }
    schedule
}

/// Bitrate search over a [`VideoEncoder`], with encodes admitted through a
/// shared semaphore.
pub struct AdaptiveTranscoder {
    encoder: Arc<dyn VideoEncoder>,
    config: TranscodeConfig,
    schedule: Vec<u32>,
    pool: Arc<Semaphore>,
}

impl AdaptiveTranscoder {
    pub fn new(
        encoder: Arc<dyn VideoEncoder>,
        config: TranscodeConfig,
    ) -> Result<Self, TranscodeError> {
        config
            .validate()
            .map_err(|e| TranscodeError::InvalidConfig(e.to_string()))?;
        let schedule = bitrate_schedule(config.initial_kbps, config.floor_kbps, config.step_kbps);
        let pool = Arc::new(Semaphore::new(config.max_concurrent));
        Ok(Self {
            encoder,
            config,
            schedule,
            pool,
        })
    }

    pub fn profile(&self) -> TranscodeProfile {
        self.config.profile
    }

    pub fn overlay_photo(&self) -> bool {
        self.config.overlay_photo
    }

    pub async fn transcode(
        &self,
        request: TranscodeRequest,
    ) -> Result<TranscodeOutcome, TranscodeError> {
        let profile = self.config.profile;
        let budget = self.config.budget_bytes;
        let mut attempts = Vec::with_capacity(self.schedule.len());

        for (i, &kbps) in self.schedule.iter().enumerate() {
            let attempt_path = request.work_dir.join(format!(
                "{}{}.{}",
                ATTEMPT_FILE_PREFIX,
                kbps,
                profile.extension()
            ));
            let job = EncodeJob {
                input: request.input.clone(),
                output: attempt_path.clone(),
                bitrate_kbps: kbps,
                profile,
                overlay: request.overlay.clone(),
            };

            {
                let _permit = self
                    .pool
                    .acquire()
                    .await
                    .map_err(|_| TranscodeError::PoolClosed)?;
                if let Err(e) = self.encoder.encode(&job).await {
                    let _ = tokio::fs::remove_file(&attempt_path).await;
                    return Err(e);
                }
            }

            let size_bytes = match tokio::fs::metadata(&attempt_path).await {
                Ok(meta) => meta.len(),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    return Err(TranscodeError::MissingOutput(attempt_path));
                }
                Err(e) => return Err(e.into()),
            };

            let within_budget = size_bytes <= budget;
            let at_floor = i + 1 == self.schedule.len();
            let accepted = within_budget || at_floor;
            attempts.push(TranscodeAttempt {
                bitrate_kbps: kbps,
                size_bytes,
                accepted,
            });

            if !accepted {
                info!(
                    session_id = %request.session_id,
                    bitrate_kbps = kbps,
                    size_bytes,
                    budget_bytes = budget,
                    "encode over budget, lowering bitrate"
                );
                tokio::fs::remove_file(&attempt_path).await?;
                continue;
            }

            if !within_budget {
                warn!(
                    session_id = %request.session_id,
                    bitrate_kbps = kbps,
                    size_bytes,
                    budget_bytes = budget,
                    "floor bitrate still over budget, keeping best effort encode"
                );
            }

            tokio::fs::rename(&attempt_path, &request.output).await?;
            info!(
                session_id = %request.session_id,
                bitrate_kbps = kbps,
                size_bytes,
                attempts = attempts.len(),
                "transcode accepted"
            );

            return Ok(TranscodeOutcome {
                output: request.output,
                bitrate_kbps: kbps,
                size_bytes,
                within_budget,
                attempts,
            });
        }

        Err(TranscodeError::InvalidConfig("empty bitrate schedule".into()))
    }
}
