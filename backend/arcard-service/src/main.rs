/// Arcard Service - HTTP Server
///
/// Accepts postcard uploads, builds the AR scene and publishes it.
use actix_web::{web, App, HttpServer};
use anyhow::Context;
use arcard_service::handlers;
use arcard_service::services::{
    CodeRepository, FfmpegEncoder, GithubContentsStore, JsonFileCodeRepository, RemoteStore,
    SessionPipeline, VideoEncoder,
};
use arcard_service::Config;
use std::sync::Arc;
use tracing_actix_web::TracingLogger;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    let config = Config::from_env().context("Failed to load configuration")?;
    init_tracing(config.app.log_json);

    let codes: Arc<dyn CodeRepository> = Arc::new(
        JsonFileCodeRepository::open(&config.access.codes_path)
            .context("Failed to load access codes")?,
    );
    let encoder: Arc<dyn VideoEncoder> =
        Arc::new(FfmpegEncoder::new(config.transcode.ffmpeg_path.clone()));
    let store: Arc<dyn RemoteStore> = Arc::new(
        GithubContentsStore::from_config(&config.publish)
            .context("Failed to create remote store client")?,
    );

    if config.publish.owner.is_empty() || config.publish.repo.is_empty() {
        tracing::warn!("GITHUB_OWNER/GITHUB_REPO not set; publishing will fail");
    }
    if config.publish.token.is_none() {
        tracing::warn!("GITHUB_TOKEN not set; remote writes are unauthenticated");
    }

    tokio::fs::create_dir_all(&config.storage.staging_root)
        .await
        .with_context(|| {
            format!(
                "Failed to create staging root {}",
                config.storage.staging_root.display()
            )
        })?;

    let pipeline = web::Data::new(
        SessionPipeline::from_config(&config, codes.clone(), encoder, store)
            .context("Failed to build session pipeline")?,
    );

    let bind_address = format!("{}:{}", config.app.host, config.app.port);
    tracing::info!(
        address = %bind_address,
        env = %config.app.env,
        codes = codes.len(),
        staging_root = %config.storage.staging_root.display(),
        "arcard-service starting"
    );

    let config_data = web::Data::new(config);

    HttpServer::new(move || {
        App::new()
            .app_data(config_data.clone())
            .app_data(pipeline.clone())
            .wrap(TracingLogger::default())
            .configure(handlers::configure)
    })
    .bind(&bind_address)
    .with_context(|| format!("Failed to bind {bind_address}"))?
    .run()
    .await?;

    tracing::info!("arcard-service shutting down");
    Ok(())
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("arcard_service=info,info"));
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(false))
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
