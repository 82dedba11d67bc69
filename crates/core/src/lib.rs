//! Orgmem Core Library
//!
//! This crate provides the foundational utilities shared by every orgmem crate:
//! - Error taxonomy (`AppError`, `AppResult`, `ProviderError`)
//! - Logging infrastructure
//! - Process configuration

pub mod config;
pub mod error;
pub mod logging;

// Re-export commonly used types
pub use config::AppConfig;
pub use error::{AppError, AppResult, GenerationFailure, ProviderError};
