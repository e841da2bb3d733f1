//! Core utilities, configuration, errors, and shared types

pub mod config;
pub mod error;
pub mod logging;
pub mod types;
pub mod validation;

// Re-exports for convenience
pub use error::{AppError, AppResult};
pub use logging::init_logger;
