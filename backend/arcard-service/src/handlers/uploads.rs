/// Upload handler
///
/// POST /upload accepts `multipart/form-data` with fields:
/// - `secretCode`: access code (text)
/// - `photo`: postcard photo
/// - `video`: video played over the photo
/// - `mind` (alias `marker`): tracking marker
use crate::config::Config;
use crate::error::{AppError, Result};
use crate::models::{AssetKind, IngestAssets, UploadedAsset};
use crate::services::{PipelineRequest, SessionPipeline};
use actix_multipart::Multipart;
use actix_web::{web, HttpRequest, HttpResponse};
use bytes::BytesMut;
use futures_util::StreamExt;
use tracing::{debug, info};

pub const SECRET_CODE_FIELD: &str = "secretCode";

/// Fields extracted from one upload request
#[derive(Debug, Default)]
pub struct UploadForm {
    pub code: String,
    pub assets: IngestAssets,
}

/// Read every multipart field, keeping at most `max_bytes` in total.
///
/// Unknown fields are drained and ignored. A repeated asset field keeps
/// the last file.
pub async fn read_upload_form(mut payload: Multipart, max_bytes: usize) -> Result<UploadForm> {
    let mut form = UploadForm::default();
    let mut total = 0usize;

    while let Some(field) = payload.next().await {
        let mut field =
            field.map_err(|e| AppError::BadRequest(format!("Multipart error: {}", e)))?;

        let field_name = field.name().unwrap_or_default().to_string();
        let file_name = field
            .content_disposition()
            .and_then(|cd| cd.get_filename())
            .map(str::to_string);

        let mut data = BytesMut::new();
        while let Some(chunk) = field.next().await {
            let chunk =
                chunk.map_err(|e| AppError::BadRequest(format!("Field read error: {}", e)))?;
            total += chunk.len();
            if total > max_bytes {
                return Err(AppError::PayloadTooLarge(max_bytes));
            }
            data.extend_from_slice(&chunk);
        }

        if field_name == SECRET_CODE_FIELD {
            form.code = String::from_utf8_lossy(&data).trim().to_string();
            continue;
        }

        match AssetKind::from_field_name(&field_name) {
            Some(kind) => {
                debug!(field = %field_name, size = data.len(), "received asset");
                *form.assets.slot_mut(kind) = Some(UploadedAsset {
                    file_name,
                    bytes: data.freeze(),
                });
            }
            None => debug!(field = %field_name, "ignoring unknown field"),
        }
    }

    Ok(form)
}

/// Create, render and publish a session from the uploaded files
/// POST /upload
pub async fn upload_session(
    req: HttpRequest,
    payload: Multipart,
    pipeline: web::Data<SessionPipeline>,
    config: web::Data<Config>,
) -> Result<HttpResponse> {
    let form = read_upload_form(payload, config.app.max_upload_bytes).await?;

    let (scheme, host) = {
        let conn = req.connection_info();
        (conn.scheme().to_string(), conn.host().to_string())
    };

    info!(host = %host, "processing upload");

    let outcome = pipeline
        .run(PipelineRequest {
            code: form.code,
            assets: form.assets,
            scheme,
            host,
        })
        .await?;

    Ok(HttpResponse::Ok().json(outcome.into_response()))
}
