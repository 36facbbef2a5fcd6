//! Acquisition of readings from the cluster API.
//!
//! Two long-running tasks feed the aggregation table:
//! - [`WatchReconnector`]: follows a change stream and resumes from the last
//!   bookmark after every disconnect
//! - [`ListPoller`]: takes a periodic snapshot through a listing call
//!
//! Both depend only on the [`Watcher`] and [`Lister`] capabilities; the
//! Kubernetes-backed implementations live in [`k8s`].

pub mod k8s;
pub mod list;
pub mod watch;

pub use list::ListPoller;
pub use watch::{WatchReconnector, WatchState};

use crate::core::{Reading, Result};
use futures::stream::BoxStream;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// One item of a change stream.
#[derive(Debug, Clone, PartialEq)]
pub enum WatchEvent<R> {
    /// Resume token marking a position in the change feed
    Bookmark(String),
    /// A change to convert into readings
    Data(R),
}

/// Stream returned by [`Watcher::watch`]. The stream ending means the peer closed it.
pub type EventStream<R> = BoxStream<'static, Result<WatchEvent<R>>>;

/// Streaming capability: opens change streams and converts their events.
#[async_trait::async_trait]
pub trait Watcher: Send + Sync + 'static {
    /// Raw event payload
    type Raw: Send + 'static;

    /// Open a change stream, resuming after `resume_from` when given.
    async fn watch(&self, resume_from: Option<&str>) -> Result<EventStream<Self::Raw>>;

    /// Convert one raw event into readings.
    fn convert(&self, raw: Self::Raw) -> Result<Vec<Reading>>;
}

/// Listing capability: one snapshot per call.
#[async_trait::async_trait]
pub trait Lister: Send + Sync + 'static {
    /// Listed item
    type Item: Send + 'static;

    /// Fetch the current list of items.
    async fn list(&self) -> Result<Vec<Self::Item>>;

    /// Convert one item into readings.
    fn convert(&self, item: Self::Item) -> Result<Vec<Reading>>;
}

/// Signals shutdown to a collector task. Closing more than once is a no-op.
#[derive(Debug, Clone, Default)]
pub struct Closer {
    token: CancellationToken,
}

impl Closer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request shutdown
    pub fn close(&self) {
        self.token.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once `close` has been called
    pub async fn closed(&self) {
        self.token.cancelled().await;
    }
}

/// A spawned collector task together with its closer.
#[derive(Debug)]
pub struct TaskHandle {
    closer: Closer,
    join: JoinHandle<()>,
}

impl TaskHandle {
    pub(crate) fn new(closer: Closer, join: JoinHandle<()>) -> Self {
        Self { closer, join }
    }

    /// Closer for this task
    pub fn closer(&self) -> Closer {
        self.closer.clone()
    }

    /// Request shutdown without waiting
    pub fn close(&self) {
        self.closer.close();
    }

    /// Request shutdown and wait for the task to stop.
    pub async fn shutdown(self) -> Result<()> {
        self.closer.close();
        self.join.await?;
        Ok(())
    }
}
