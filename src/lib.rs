//! podstats - pod statistics exporter for Kubernetes.
//!
//! podstats follows pod changes in one namespace through a reconnecting watch
//! stream, polls per-container usage from the metrics API, folds every reading
//! into an in-memory aggregation table and serves the table as plain text.
//!
//! # Architecture
//!
//! - `collector`: watch reconnector, list poller and the Kubernetes capabilities
//! - `metrics`: single-writer aggregation table
//! - `api`: text exposition endpoint
//! - `core`: readings, configuration and errors
//! - `cli`: command-line interface
//!
//! # Example
//!
//! ```no_run
//! use podstats_lib::collector::k8s::{self, PodMetricsLister, PodWatcher};
//! use podstats_lib::core::Config;
//! use podstats_lib::Application;
//!
//! #[tokio::main]
//! async fn main() -> podstats_lib::Result<()> {
//!     let config = Config::default();
//!     let client = k8s::connect(None).await?;
//!     let watcher = PodWatcher::new(client.clone(), "default");
//!     let lister = PodMetricsLister::new(client, "default");
//!
//!     let app = Application::new(config, Some(watcher), Some(lister))?;
//!     app.run(async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     })
//!     .await
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod api;
pub mod application;
pub mod cli;
pub mod collector;
pub mod core;
pub mod metrics;

pub use crate::application::Application;
pub use crate::core::{Config, PodstatsError, Result};
