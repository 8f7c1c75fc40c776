/// Preset configurations for the external calls the pipeline makes
use crate::retry::RetryConfig;
use crate::timeout::TimeoutConfig;
use std::time::Duration;

/// Configuration bundle for one kind of external dependency
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub timeout: TimeoutConfig,
    pub retry: Option<RetryConfig>,
}

/// Versioned remote store writes (one HTTP request per file)
///
/// - Timeout: 60s per request
/// - Retry: 4 attempts with exponential backoff (create-or-update is idempotent)
pub fn remote_store_config() -> ServiceConfig {
    ServiceConfig {
        timeout: TimeoutConfig {
            duration: Duration::from_secs(60),
        },
        retry: Some(RetryConfig {
            max_retries: 3,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(8),
            backoff_multiplier: 2.0,
            jitter: true,
        }),
    }
}

/// Whole pipeline stages, e.g. a complete bitrate search
///
/// - Timeout: 300s per stage
/// - No retry (a failed encode is deterministic for the same input)
pub fn stage_config() -> ServiceConfig {
    ServiceConfig {
        timeout: TimeoutConfig {
            duration: Duration::from_secs(300),
        },
        retry: None,
    }
}
