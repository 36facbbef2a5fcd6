//! Command-line interface for podstats.
//!
//! Run `podstats` to watch the `default` namespace with the local kubeconfig
//! and serve readings on port 8080.

use crate::application::Application;
use crate::collector::k8s::{self, PodMetricsLister, PodWatcher};
use crate::core::config::ConfigBuilder;
use crate::core::{Config, PodstatsError, Result};
use clap::Parser;
use std::path::PathBuf;

/// Pod statistics exporter for Kubernetes
#[derive(Parser, Debug)]
#[command(name = "podstats")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to the kubeconfig file (default: ~/.kube/config)
    #[arg(long, env = "PODSTATS_KUBECONFIG")]
    pub kubeconfig: Option<PathBuf>,

    /// Namespace to collect from
    #[arg(short, long, env = "PODSTATS_NAMESPACE")]
    pub namespace: Option<String>,

    /// Port for the exposition endpoint
    #[arg(short, long, env = "PODSTATS_PORT")]
    pub port: Option<u16>,

    /// Configuration file path (default: ~/.config/podstats/config.yaml)
    #[arg(short, long, env = "PODSTATS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, env = "PODSTATS_DEBUG")]
    pub debug: bool,

    /// Validate configuration and exit
    #[arg(long)]
    pub check_config: bool,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Cli::parse()
    }

    /// Load configuration with precedence CLI, then config file, then defaults.
    pub async fn load_config(&self) -> Result<Config> {
        let mut builder = ConfigBuilder::new();

        let config_path = match &self.config {
            Some(path) => Some(path.clone()),
            None => dirs::config_dir()
                .map(|dir| dir.join("podstats").join("config.yaml"))
                .filter(|path| path.exists()),
        };

        if let Some(path) = config_path {
            match tokio::fs::read_to_string(&path).await {
                Ok(content) => {
                    builder = builder.from_yaml(&content)?;
                    tracing::info!("Loaded configuration from: {:?}", path);
                }
                Err(e) if self.config.is_some() => {
                    return Err(PodstatsError::config(format!(
                        "Failed to read config file {:?}: {}",
                        path, e
                    )));
                }
                Err(_) => {
                    tracing::debug!("No config file found at {:?}, using defaults", path);
                }
            }
        }

        self.apply_overrides(builder).build()
    }

    fn apply_overrides(&self, mut builder: ConfigBuilder) -> ConfigBuilder {
        if let Some(path) = &self.kubeconfig {
            builder = builder.kubeconfig(path.clone());
        }
        if let Some(namespace) = &self.namespace {
            builder = builder.namespace(namespace.clone());
        }
        if let Some(port) = self.port {
            builder = builder.port(port);
        }
        if self.debug {
            builder = builder.debug(true);
        }
        builder
    }

    /// Initialize logging. `RUST_LOG` wins over `--debug`, which wins over the
    /// configured level.
    pub fn init_logging(&self, config: &Config) -> Result<()> {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

        let level = if self.debug || config.debug {
            "debug"
        } else {
            config.logging.level.as_str()
        };

        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_target(self.debug)
            .compact();

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .try_init()
            .map_err(|e| PodstatsError::config(format!("Failed to initialize logging: {}", e)))?;

        Ok(())
    }
}

/// `~/.kube/config`, if a home directory is known
fn default_kubeconfig() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".kube").join("config"))
}

/// An explicitly configured kubeconfig is used as given, even if missing.
/// The implicit default is only used when it exists; otherwise the client
/// configuration is inferred.
fn resolve_kubeconfig(configured: Option<PathBuf>) -> Option<PathBuf> {
    configured.or_else(|| default_kubeconfig().filter(|path| path.exists()))
}

/// Execute podstats.
pub async fn execute(cli: Cli) -> Result<()> {
    let config = cli.load_config().await?;
    cli.init_logging(&config)?;

    if cli.check_config {
        println!("Configuration is valid!");
        println!("  Namespace: {}", config.collector.namespace);
        println!("  Listen: {}:{}", config.server.bind_address, config.server.port);
        println!("  Watch backoff: {:?}", config.collector.watch_backoff);
        println!("  List interval: {:?}", config.collector.list_interval);
        return Ok(());
    }

    let kubeconfig = resolve_kubeconfig(config.collector.kubeconfig.clone());
    let client = k8s::connect(kubeconfig.as_deref()).await?;

    let namespace = config.collector.namespace.clone();
    let watcher = PodWatcher::new(client.clone(), &namespace);
    let lister = PodMetricsLister::new(client, &namespace);

    let app = Application::new(config, Some(watcher), Some(lister))?;
    app.run(async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Listening for shutdown signal: {}", e);
            return;
        }
        tracing::info!("Received shutdown signal, stopping...");
    })
    .await
}
