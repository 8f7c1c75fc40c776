//! Arcard Service
//!
//! Turns an uploaded photo, video and tracking marker into a published AR
//! postcard: a scene document, a QR code pointing at it, the photo with the
//! code printed on it, and a size-capped video, all written to a versioned
//! remote store under one session path.

pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod services;

// Public re-exports
pub use config::Config;
pub use error::{AppError, Result};
pub use services::SessionPipeline;
