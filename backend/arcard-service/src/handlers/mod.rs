/// HTTP handlers
///
/// - Uploads: session creation from a multipart upload
/// - Health: liveness and readiness probes
pub mod uploads;

pub use uploads::{read_upload_form, upload_session, UploadForm};

use crate::config::Config;
use actix_web::{web, HttpResponse};

pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({"status": "ok"}))
}

pub async fn live() -> HttpResponse {
    HttpResponse::Ok().finish()
}

/// Ready once the staging root is usable
pub async fn ready(config: web::Data<Config>) -> HttpResponse {
    match tokio::fs::create_dir_all(&config.storage.staging_root).await {
        Ok(()) => HttpResponse::Ok().finish(),
        Err(e) => {
            tracing::warn!(error = %e, "staging root unavailable");
            HttpResponse::ServiceUnavailable().finish()
        }
    }
}

/// Register all routes; shared by the server and the endpoint tests
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health))
        .route("/health/live", web::get().to(live))
        .route("/health/ready", web::get().to(ready))
        .route("/upload", web::post().to(upload_session));
}
