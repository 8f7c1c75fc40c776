/// Configuration management for arcard-service
///
/// Loads configuration from environment variables with sensible defaults.
/// A `.env` file in the working directory is honoured (see `main.rs`).
use crate::services::transcode::TranscodeProfile;
use resilience::presets;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

/// 5 MiB, the largest video a scene page should pull over mobile data
pub const DEFAULT_VIDEO_BUDGET_BYTES: u64 = 5 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}")]
    Invalid { key: &'static str, value: String },
    #[error("{0}")]
    Inconsistent(String),
}

#[derive(Clone, Debug)]
pub struct Config {
    pub app: AppConfig,
    pub access: AccessConfig,
    pub storage: StorageConfig,
    pub transcode: TranscodeConfig,
    pub publish: PublishConfig,
    pub pipeline: PipelineConfig,
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub env: String,
    /// Upper bound on the summed size of all multipart fields
    pub max_upload_bytes: usize,
    pub log_json: bool,
}

#[derive(Clone, Debug)]
pub struct AccessConfig {
    /// JSON object file mapping code → ISO-8601 expiry
    pub codes_path: PathBuf,
    /// Whether the marker asset must be uploaded
    pub require_marker: bool,
    /// Marker the scene document points at when none was uploaded
    pub fallback_marker_src: String,
}

#[derive(Clone, Debug)]
pub struct StorageConfig {
    /// Root under which every session gets its own directory
    pub staging_root: PathBuf,
}

#[derive(Clone, Debug)]
pub struct TranscodeConfig {
    pub ffmpeg_path: String,
    pub budget_bytes: u64,
    pub initial_kbps: u32,
    pub floor_kbps: u32,
    pub step_kbps: u32,
    pub profile: TranscodeProfile,
    /// Inset the photo into the video during the same encoder pass
    pub overlay_photo: bool,
    /// Encoder processes allowed to run at once across all sessions
    pub max_concurrent: usize,
}

impl Default for TranscodeConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: "ffmpeg".to_string(),
            budget_bytes: DEFAULT_VIDEO_BUDGET_BYTES,
            initial_kbps: 1000,
            floor_kbps: 300,
            step_kbps: 200,
            profile: TranscodeProfile::default(),
            overlay_photo: false,
            max_concurrent: 2,
        }
    }
}

impl TranscodeConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.floor_kbps == 0 || self.step_kbps == 0 {
            return Err(ConfigError::Inconsistent(
                "transcode floor and step must be positive".into(),
            ));
        }
        if self.initial_kbps < self.floor_kbps {
            return Err(ConfigError::Inconsistent(format!(
                "initial bitrate {}k is below floor {}k",
                self.initial_kbps, self.floor_kbps
            )));
        }
        if self.max_concurrent == 0 {
            return Err(ConfigError::Inconsistent(
                "at least one concurrent transcode is required".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub struct PublishConfig {
    /// GitHub REST API root, overridable for GitHub Enterprise or tests
    pub api_base_url: String,
    pub token: Option<String>,
    pub owner: String,
    pub repo: String,
    pub branch: Option<String>,
    /// Top-level folder every session is published under
    pub namespace: String,
    /// Public site serving the store, e.g. a Pages URL; when unset the
    /// request's own scheme and host are used
    pub public_base_url: Option<String>,
    pub max_retries: u32,
    pub request_timeout_secs: u64,
}

impl Default for PublishConfig {
    fn default() -> Self {
        let preset = presets::remote_store_config();
        Self {
            api_base_url: "https://api.github.com".to_string(),
            token: None,
            owner: String::new(),
            repo: String::new(),
            branch: None,
            namespace: "clients".to_string(),
            public_base_url: None,
            max_retries: preset.retry.map(|r| r.max_retries).unwrap_or(0),
            request_timeout_secs: preset.timeout.duration.as_secs(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct PipelineConfig {
    pub stage_timeout_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            stage_timeout_secs: presets::stage_config().timeout.duration.as_secs(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = TranscodeConfig::default();
        let transcode = TranscodeConfig {
            ffmpeg_path: env_or("FFMPEG_PATH", &defaults.ffmpeg_path),
            budget_bytes: env_parse("ARCARD_VIDEO_BUDGET_BYTES", defaults.budget_bytes)?,
            initial_kbps: env_parse("ARCARD_TRANSCODE_INITIAL_KBPS", defaults.initial_kbps)?,
            floor_kbps: env_parse("ARCARD_TRANSCODE_FLOOR_KBPS", defaults.floor_kbps)?,
            step_kbps: env_parse("ARCARD_TRANSCODE_STEP_KBPS", defaults.step_kbps)?,
            profile: env_parse("ARCARD_TRANSCODE_PROFILE", defaults.profile)?,
            overlay_photo: env_bool("ARCARD_TRANSCODE_OVERLAY_PHOTO", defaults.overlay_photo)?,
            max_concurrent: env_parse("ARCARD_TRANSCODE_CONCURRENCY", defaults.max_concurrent)?,
        };
        transcode.validate()?;

        let publish_defaults = PublishConfig::default();
        let pipeline_defaults = PipelineConfig::default();

        Ok(Config {
            app: AppConfig {
                host: env_or("ARCARD_HOST", "0.0.0.0"),
                port: env_parse("ARCARD_PORT", 3000)?,
                env: env_or("APP_ENV", "development"),
                max_upload_bytes: env_parse("ARCARD_MAX_UPLOAD_BYTES", 200 * 1024 * 1024)?,
                log_json: env_bool("ARCARD_LOG_JSON", false)?,
            },
            access: AccessConfig {
                codes_path: PathBuf::from(env_or("ARCARD_CODES_PATH", "codes.json")),
                require_marker: env_bool("ARCARD_REQUIRE_MARKER", true)?,
                fallback_marker_src: env_or("ARCARD_FALLBACK_MARKER_SRC", "targets.mind"),
            },
            storage: StorageConfig {
                staging_root: PathBuf::from(env_or("ARCARD_STAGING_ROOT", "clients")),
            },
            transcode,
            publish: PublishConfig {
                api_base_url: env_or("GITHUB_API_URL", &publish_defaults.api_base_url),
                token: std::env::var("GITHUB_TOKEN").ok().filter(|t| !t.is_empty()),
                owner: env_or("GITHUB_OWNER", ""),
                repo: env_or("GITHUB_REPO", ""),
                branch: std::env::var("GITHUB_BRANCH").ok().filter(|b| !b.is_empty()),
                namespace: env_or("ARCARD_PUBLISH_NAMESPACE", &publish_defaults.namespace),
                public_base_url: std::env::var("ARCARD_PUBLIC_BASE_URL")
                    .ok()
                    .filter(|u| !u.is_empty()),
                max_retries: env_parse("ARCARD_PUBLISH_MAX_RETRIES", publish_defaults.max_retries)?,
                request_timeout_secs: env_parse(
                    "ARCARD_PUBLISH_TIMEOUT_SECS",
                    publish_defaults.request_timeout_secs,
                )?,
            },
            pipeline: PipelineConfig {
                stage_timeout_secs: env_parse(
                    "ARCARD_STAGE_TIMEOUT_SECS",
                    pipeline_defaults.stage_timeout_secs,
                )?,
            },
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value: raw }),
        _ => Ok(default),
    }
}

fn env_bool(key: &'static str, default: bool) -> Result<bool, ConfigError> {
    match std::env::var(key) {
        Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "" => Ok(default),
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::Invalid { key, value: raw }),
        },
        Err(_) => Ok(default),
    }
}
