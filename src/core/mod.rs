//! Core domain models for podstats.
//!
//! This module contains the reading type, its merge rules, configuration
//! and the error type shared by every other module.

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod types;

// Re-export commonly used types
pub use config::{Config, ConfigBuilder, ExpositionFormat};
pub use error::{PodstatsError, Result};
pub use types::{MetricKey, MetricType, Reading};
