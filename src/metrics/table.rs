//! Aggregation table: the latest merged reading per metric key.
//!
//! Readings arrive on a bounded channel and are merged by one writer task,
//! which is the only code that mutates the map. Readers take snapshots
//! through the same `DashMap`, whose per-shard locks make every entry
//! replacement atomic with respect to readers.

use crate::core::{PodstatsError, Reading, Result};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// Messages consumed by the writer task
#[derive(Debug)]
enum TableMessage {
    /// Merge a reading into the table
    Reading(Reading),
    /// Acknowledge once everything queued before it has been merged
    Flush(oneshot::Sender<()>),
}

/// Producer handle for the aggregation table.
#[derive(Debug, Clone)]
pub struct ReadingSender {
    tx: mpsc::Sender<TableMessage>,
}

impl ReadingSender {
    /// Queue a reading for merging, waiting for channel capacity if needed.
    ///
    /// Readings for the same key are merged in the order they are submitted.
    pub async fn submit(&self, reading: Reading) -> Result<()> {
        self.tx
            .send(TableMessage::Reading(reading))
            .await
            .map_err(|_| PodstatsError::ChannelClosed)
    }
}

/// Latest-known-value table keyed by metric identity.
///
/// Cloning is cheap: clones share the same entries and input channel.
#[derive(Debug, Clone)]
pub struct AggregationTable {
    entries: Arc<DashMap<String, Reading>>,
    sender: ReadingSender,
}

impl AggregationTable {
    /// Create an empty table and spawn its writer task.
    ///
    /// The writer runs until every `ReadingSender` (including the one held by
    /// the table and its clones) has been dropped.
    pub fn spawn(capacity: usize) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let entries = Arc::new(DashMap::new());

        let writer = tokio::spawn(run_writer(Arc::clone(&entries), rx));

        let table = Self {
            entries,
            sender: ReadingSender { tx },
        };
        (table, writer)
    }

    /// Producer handle for collectors
    pub fn sender(&self) -> ReadingSender {
        self.sender.clone()
    }

    /// Queue a reading for merging
    pub async fn submit(&self, reading: Reading) -> Result<()> {
        self.sender.submit(reading).await
    }

    /// Wait until every reading submitted before this call has been merged.
    pub async fn flush(&self) -> Result<()> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.sender
            .tx
            .send(TableMessage::Flush(ack_tx))
            .await
            .map_err(|_| PodstatsError::ChannelClosed)?;
        ack_rx.await.map_err(|_| PodstatsError::ChannelClosed)
    }

    /// Copy of every stored reading, in unspecified order.
    pub fn snapshot(&self) -> Vec<Reading> {
        self.entries
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Stored reading for a key
    pub fn get(&self, key: &str) -> Option<Reading> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    /// Number of distinct keys observed
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no reading has been merged yet
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

async fn run_writer(entries: Arc<DashMap<String, Reading>>, mut rx: mpsc::Receiver<TableMessage>) {
    tracing::debug!("Aggregation table writer started");

    while let Some(message) = rx.recv().await {
        match message {
            TableMessage::Reading(reading) => merge(&entries, reading),
            TableMessage::Flush(ack) => {
                let _ = ack.send(());
            }
        }
    }

    tracing::debug!(keys = entries.len(), "Aggregation table writer stopped");
}

/// First observation of a key is stored verbatim; later ones go through `Reading::accept`.
fn merge(entries: &DashMap<String, Reading>, reading: Reading) {
    match entries.get_mut(&reading.key) {
        Some(mut stored) => {
            let merged = stored.accept(&reading);
            *stored = merged;
        }
        None => {
            tracing::trace!(key = %reading.key, "New metric key");
            entries.insert(reading.key.clone(), reading);
        }
    }
}
