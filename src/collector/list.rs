//! Periodic list poller.

use super::{Closer, Lister, TaskHandle};
use crate::metrics::ReadingSender;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};

/// Default interval between listings
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(10);

/// Calls a [`Lister`] on a fixed interval and forwards the converted readings.
///
/// A failed listing is logged and the poller waits for the next tick; there is
/// no retry within a tick. The first listing happens one full interval after
/// start.
pub struct ListPoller<L: Lister> {
    lister: L,
    sink: ReadingSender,
    interval: Duration,
    closer: Closer,
}

impl<L: Lister> ListPoller<L> {
    pub fn new(lister: L, sink: ReadingSender) -> Self {
        Self {
            lister,
            sink,
            interval: DEFAULT_INTERVAL,
            closer: Closer::new(),
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Start polling on the runtime.
    pub fn spawn(self) -> TaskHandle {
        let closer = self.closer.clone();
        let join = tokio::spawn(self.run());
        TaskHandle::new(closer, join)
    }

    async fn run(self) {
        let mut ticker = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                () = self.closer.closed() => break,
                _ = ticker.tick() => {},
            }

            if !self.poll_once().await {
                break;
            }
        }

        tracing::info!("List poller closed");
    }

    /// One listing. Returns false when the poller should stop.
    async fn poll_once(&self) -> bool {
        let items = match self.lister.list().await {
            Ok(items) => items,
            Err(e) => {
                tracing::error!(category = e.category(), "Listing: {}", e);
                return true;
            }
        };

        tracing::debug!(items = items.len(), "Listed items");

        for item in items {
            let readings = match self.lister.convert(item) {
                Ok(readings) => readings,
                Err(e) => {
                    tracing::error!(category = e.category(), "Converting list item: {}", e);
                    continue;
                }
            };

            for reading in readings {
                let submitted = tokio::select! {
                    biased;
                    () = self.closer.closed() => return false,
                    result = self.sink.submit(reading) => result,
                };
                if let Err(e) = submitted {
                    tracing::error!("Aggregation table unavailable: {}", e);
                    return false;
                }
            }
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{MetricType, PodstatsError, Reading, Result};
    use crate::metrics::AggregationTable;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    struct CountingLister {
        calls: Arc<AtomicU32>,
    }

    #[async_trait::async_trait]
    impl Lister for CountingLister {
        type Item = (String, f64);

        async fn list(&self) -> Result<Vec<(String, f64)>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call == 2 {
                return Err(PodstatsError::list("metrics server unavailable"));
            }
            Ok(vec![
                ("cpu".to_string(), f64::from(call)),
                ("bad".to_string(), f64::NAN),
            ])
        }

        fn convert(&self, (key, value): (String, f64)) -> Result<Vec<Reading>> {
            if value.is_nan() {
                return Err(PodstatsError::conversion("not a number"));
            }
            Ok(vec![Reading::instant(key, value, "t")])
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_poll_after_one_interval() {
        let calls = Arc::new(AtomicU32::new(0));
        let (table, _writer) = AggregationTable::spawn(16);

        let handle = ListPoller::new(CountingLister { calls: Arc::clone(&calls) }, table.sender())
            .spawn();

        tokio::time::sleep(Duration::from_secs(9)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        handle.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_listing_waits_for_next_tick() {
        let calls = Arc::new(AtomicU32::new(0));
        let (table, _writer) = AggregationTable::spawn(16);

        let handle = ListPoller::new(CountingLister { calls: Arc::clone(&calls) }, table.sender())
            .with_interval(Duration::from_secs(1))
            .spawn();

        // Ticks at 1s, 2s (fails), 3s
        tokio::time::sleep(Duration::from_millis(3500)).await;
        handle.shutdown().await.unwrap();
        table.flush().await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        let cpu = table.get("cpu").unwrap();
        assert_eq!(cpu.value, 3.0);
        assert_eq!(cpu.metric_type, MetricType::Instant);
        assert!(table.get("bad").is_none());
    }
}
