use crate::services::publish::PublishError;
use crate::services::session::IngestError;
use crate::services::synth::SynthError;
use crate::services::transcode::TranscodeError;
use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use serde::Serialize;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppError>;

/// Pipeline stage an error or timeout is attributed to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Ingest,
    Transcode,
    SceneDocument,
    CodeImage,
    Composite,
    Publish,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Ingest => "ingest",
            Stage::Transcode => "transcode",
            Stage::SceneDocument => "scene_document",
            Stage::CodeImage => "code_image",
            Stage::Composite => "composite",
            Stage::Publish => "publish",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    /// Carries the user-facing denial message
    #[error("{0}")]
    AccessDenied(String),

    #[error("Missing required file: {0}")]
    MissingAsset(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Upload exceeds {0} bytes")]
    PayloadTooLarge(usize),

    #[error("Composite error: {0}")]
    Composite(String),

    #[error("Transcode error: {0}")]
    Transcode(#[from] TranscodeError),

    #[error("Publish error: {0}")]
    Publish(#[from] PublishError),

    #[error("{stage} stage timed out after {after:?}")]
    Timeout { stage: Stage, after: Duration },

    #[error("{stage} stage failed: {source}")]
    Stage {
        stage: Stage,
        #[source]
        source: Box<AppError>,
    },

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    stage: Option<String>,
}

impl AppError {
    /// Attribute this error to a pipeline stage; timeouts already carry one
    pub fn at_stage(self, stage: Stage) -> Self {
        match self {
            AppError::Timeout { .. } | AppError::Stage { .. } => self,
            other => AppError::Stage {
                stage,
                source: Box::new(other),
            },
        }
    }

    pub fn stage(&self) -> Option<Stage> {
        match self {
            AppError::Timeout { stage, .. } | AppError::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// The error with any stage wrapper removed
    pub fn root(&self) -> &AppError {
        match self {
            AppError::Stage { source, .. } => source.root(),
            other => other,
        }
    }

    /// Message safe to hand to the client; encoder output and local I/O
    /// details carry server paths and stay in the logs
    pub fn public_message(&self) -> String {
        match self.root() {
            AppError::Transcode(_) => "Video transcoding failed".to_string(),
            AppError::Io(_) | AppError::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }

    fn error_type(&self) -> &'static str {
        match self.root() {
            AppError::AccessDenied(_) => "ACCESS_DENIED",
            AppError::MissingAsset(_) => "MISSING_ASSET",
            AppError::BadRequest(_) => "BAD_REQUEST",
            AppError::PayloadTooLarge(_) => "PAYLOAD_TOO_LARGE",
            AppError::Composite(_) => "COMPOSITE_ERROR",
            AppError::Transcode(_) => "TRANSCODE_ERROR",
            AppError::Publish(_) => "PUBLISH_ERROR",
            AppError::Timeout { .. } => "TIMEOUT",
            AppError::Internal(_) | AppError::Io(_) | AppError::Stage { .. } => "INTERNAL_ERROR",
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self.root() {
            AppError::AccessDenied(_) => StatusCode::FORBIDDEN,
            AppError::MissingAsset(_) => StatusCode::BAD_REQUEST,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            AppError::Composite(_)
            | AppError::Transcode(_)
            | AppError::Publish(_)
            | AppError::Internal(_)
            | AppError::Io(_)
            | AppError::Stage { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, status = status.as_u16(), "request failed");
        }

        let error_response = ErrorResponse {
            error: self.error_type().to_string(),
            message: self.public_message(),
            stage: self.stage().map(|s| s.as_str().to_string()),
        };

        HttpResponse::build(status).json(error_response)
    }
}

impl From<IngestError> for AppError {
    fn from(error: IngestError) -> Self {
        match error {
            IngestError::AccessDenied(decision) => {
                AppError::AccessDenied(decision.denial_message().to_string())
            }
            IngestError::MissingAsset(kind) => AppError::MissingAsset(kind.as_str().to_string()),
            IngestError::Io(e) => AppError::Io(e),
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl From<SynthError> for AppError {
    fn from(error: SynthError) -> Self {
        match error {
            SynthError::Io(e) => AppError::Io(e),
            other => AppError::Composite(other.to_string()),
        }
    }
}
