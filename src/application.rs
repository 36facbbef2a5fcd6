//! Process wiring for podstats.

use crate::api::{self, ApiState};
use crate::collector::{ListPoller, Lister, TaskHandle, WatchReconnector, Watcher};
use crate::core::{Config, PodstatsError, Result};
use crate::metrics::AggregationTable;
use std::future::Future;
use std::net::SocketAddr;
use tokio::net::TcpListener;

/// Coordinates the aggregation table, both collectors and the exposition server.
pub struct Application<W: Watcher, L: Lister> {
    config: Config,
    watcher: Option<W>,
    lister: Option<L>,
}

impl<W: Watcher, L: Lister> Application<W, L> {
    /// Create an application. Either capability may be absent, in which case the
    /// matching collector is not started.
    pub fn new(config: Config, watcher: Option<W>, lister: Option<L>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            watcher,
            lister,
        })
    }

    /// Address the exposition server binds to
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.config.server.bind_address, self.config.server.port)
    }

    /// Bind the configured address and run until `shutdown` resolves.
    ///
    /// Failing to bind is fatal.
    pub async fn run<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = self.bind_addr();
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            PodstatsError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to bind to {}: {}", addr, e),
            ))
        })?;

        self.run_with_listener(listener, shutdown).await
    }

    /// Run on an already-bound listener until `shutdown` resolves, then close
    /// the collectors and wait for them and the table writer to finish.
    pub async fn run_with_listener<F>(self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let collector = &self.config.collector;
        tracing::info!(namespace = %collector.namespace, "Starting podstats");

        let (table, writer) = AggregationTable::spawn(collector.channel_capacity);
        let mut handles: Vec<(&'static str, TaskHandle)> = Vec::with_capacity(2);

        match self.watcher {
            Some(watcher) if collector.enable_watch => {
                let handle = WatchReconnector::new(watcher, table.sender())
                    .with_backoff(collector.watch_backoff)
                    .spawn();
                handles.push(("watcher", handle));
            }
            _ => tracing::info!("Watch collector disabled"),
        }

        match self.lister {
            Some(lister) if collector.enable_list => {
                let handle = ListPoller::new(lister, table.sender())
                    .with_interval(collector.list_interval)
                    .spawn();
                handles.push(("list poller", handle));
            }
            _ => tracing::info!("List collector disabled"),
        }

        let state = ApiState::new(table.clone(), &self.config.exposition);
        let served = api::serve(listener, state, shutdown).await;

        for (name, handle) in handles {
            if let Err(e) = handle.shutdown().await {
                tracing::warn!("Stopping {}: {}", name, e);
            }
        }

        drop(table);
        writer.await?;

        tracing::info!("podstats stopped");
        served
    }
}
