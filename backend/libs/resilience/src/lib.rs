/// Resilience helpers shared by the backend services
///
/// - **Timeout**: deadlines around whole pipeline stages, cancelling the stage on expiry
/// - **Retry**: exponential backoff with jitter, optionally limited to transient errors
/// - **Preset Configurations**: tuned settings for remote store writes and pipeline stages
///
/// # Example: remote write with retry on transient failures
///
/// ```rust,no_run
/// use resilience::{presets, with_retry_if};
///
/// #[tokio::main]
/// async fn main() {
///     let retry = presets::remote_store_config().retry.unwrap_or_default();
///
///     let result = with_retry_if(
///         retry,
///         |e: &String| e.starts_with("503"),
///         || async {
///             // Your HTTP PUT here
///             Ok::<_, String>(())
///         },
///     )
///     .await;
/// }
/// ```

pub mod presets;
pub mod retry;
pub mod timeout;

pub use presets::{remote_store_config, stage_config, ServiceConfig};
pub use retry::{with_retry_if, RetryConfig, RetryError};
pub use timeout::{with_timeout_result, TimeoutConfig, TimeoutError};
