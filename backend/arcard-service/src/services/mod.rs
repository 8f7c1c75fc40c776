/// Service layer for AR postcard sessions
///
/// This module provides business logic for:
/// - Access: secret-code gate and its persistent code repository
/// - Session: ingestion of uploaded assets into a staging directory
/// - Transcode: bitrate search keeping the video under its size budget
/// - Synth: scene document, QR code image and composite photo
/// - Publish: writing session artifacts to the remote store
/// - Pipeline: the stage sequence tying the above together
pub mod access;
pub mod pipeline;
pub mod publish;
pub mod session;
pub mod synth;
pub mod transcode;

pub use access::{
    AccessDecision, AccessGate, CodeRepository, InMemoryCodeRepository, JsonFileCodeRepository,
};
pub use pipeline::{PipelineOutcome, PipelineRequest, SessionPipeline};
pub use publish::{GithubContentsStore, Publisher, RemoteStore, StoreError};
pub use session::SessionIngestor;
pub use synth::{ArtifactSynthesizer, PublicUrl};
pub use transcode::{AdaptiveTranscoder, FfmpegEncoder, TranscodeProfile, VideoEncoder};
