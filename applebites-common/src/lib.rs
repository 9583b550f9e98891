//! AppleBites Common - Shared configuration and observability utilities.
//!
//! This crate provides:
//! - Configuration types and loading (single JSON file + env overrides)
//! - Logging setup with structured JSON output and noise filtering
//! - A unified error type with HTTP status mapping

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod config;
pub mod error;
pub mod logging;

pub use config::{Config, ExportConfig, ObservabilityConfig, ServerConfig, StorageConfig};
pub use error::{Error, Result};

/// Re-export commonly used types for convenience
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::error::{Error, Result, ResultExt};
    pub use crate::logging::init_logging;
}
