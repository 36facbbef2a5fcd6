//! Reconnecting watch stream with bookmark-based resume.
//!
//! The reconnector cycles `Connecting -> Streaming -> Disconnected` until
//! closed. Every entry into `Disconnected`, whether after a failed connect or
//! a stream closed by the peer, waits the same fixed backoff before the next
//! connect. Shutdown is observed while waiting for the next stream event,
//! while backing off and at the top of the reconnect loop; a connect call or
//! conversion in progress is never interrupted.

use super::{Closer, EventStream, TaskHandle, WatchEvent, Watcher};
use crate::core::{PodstatsError, Reading};
use crate::metrics::ReadingSender;
use futures::StreamExt;
use std::time::Duration;
use tokio::sync::watch as state_channel;

/// Default delay before reconnecting
pub const DEFAULT_BACKOFF: Duration = Duration::from_secs(2);

/// Connection state of a [`WatchReconnector`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    /// Waiting out the backoff before the next connect
    Disconnected,
    /// Watch request in flight
    Connecting,
    /// Consuming events
    Streaming,
    /// Shut down; terminal
    Closed,
}

/// Follows a [`Watcher`] change stream and forwards converted readings.
pub struct WatchReconnector<W: Watcher> {
    watcher: W,
    sink: ReadingSender,
    backoff: Duration,
    closer: Closer,
    state: state_channel::Sender<WatchState>,
}

impl<W: Watcher> WatchReconnector<W> {
    pub fn new(watcher: W, sink: ReadingSender) -> Self {
        let (state, _) = state_channel::channel(WatchState::Disconnected);
        Self {
            watcher,
            sink,
            backoff: DEFAULT_BACKOFF,
            closer: Closer::new(),
            state,
        }
    }

    /// Set the fixed reconnect delay
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Observe state transitions
    pub fn subscribe_state(&self) -> state_channel::Receiver<WatchState> {
        self.state.subscribe()
    }

    /// Start the reconnect loop on the runtime.
    pub fn spawn(self) -> TaskHandle {
        let closer = self.closer.clone();
        let join = tokio::spawn(self.run());
        TaskHandle::new(closer, join)
    }

    async fn run(self) {
        let mut bookmark: Option<String> = None;

        loop {
            if self.closer.is_closed() {
                break;
            }

            self.transition(WatchState::Connecting);
            tracing::info!(resume_from = bookmark.as_deref().unwrap_or(""), "Watcher connecting");

            let next = match self.watcher.watch(bookmark.as_deref()).await {
                Ok(events) => {
                    self.transition(WatchState::Streaming);
                    self.stream(events, &mut bookmark).await
                }
                Err(e) => {
                    tracing::error!(category = e.category(), "Watcher connecting: {}", e);
                    WatchState::Disconnected
                }
            };

            if next == WatchState::Closed {
                break;
            }

            self.transition(WatchState::Disconnected);
            tokio::select! {
                biased;
                () = self.closer.closed() => break,
                () = tokio::time::sleep(self.backoff) => {},
            }
        }

        self.transition(WatchState::Closed);
        tracing::info!("Watcher closed");
    }

    /// Consume one session. Returns `Disconnected` or `Closed`.
    async fn stream(
        &self,
        mut events: EventStream<W::Raw>,
        bookmark: &mut Option<String>,
    ) -> WatchState {
        loop {
            let event = tokio::select! {
                biased;
                () = self.closer.closed() => return WatchState::Closed,
                event = events.next() => event,
            };

            match event {
                None => {
                    tracing::info!("Watcher disconnected");
                    return WatchState::Disconnected;
                }
                Some(Ok(WatchEvent::Bookmark(token))) => {
                    tracing::debug!(bookmark = %token, "Bookmark received");
                    *bookmark = Some(token).filter(|t| !t.is_empty());
                }
                Some(Ok(WatchEvent::Data(raw))) => match self.watcher.convert(raw) {
                    Ok(readings) => {
                        for reading in readings {
                            if let Some(state) = self.forward(reading).await {
                                return state;
                            }
                        }
                    }
                    Err(e) => {
                        tracing::error!(category = e.category(), "Converting object: {}", e);
                    }
                }
                Some(Err(PodstatsError::ResourceExpired(reason))) => {
                    tracing::warn!("Bookmark expired, resuming from default: {}", reason);
                    *bookmark = None;
                    return WatchState::Disconnected;
                }
                Some(Err(e)) => {
                    tracing::error!(category = e.category(), "Watch stream error: {}", e);
                    return WatchState::Disconnected;
                }
            }
        }
    }

    /// Submit a reading unless shutdown wins the race. `Some` ends the session.
    async fn forward(&self, reading: Reading) -> Option<WatchState> {
        tokio::select! {
            biased;
            () = self.closer.closed() => Some(WatchState::Closed),
            result = self.sink.submit(reading) => match result {
                Ok(()) => None,
                Err(e) => {
                    tracing::error!("Aggregation table unavailable: {}", e);
                    self.closer.close();
                    Some(WatchState::Closed)
                }
            },
        }
    }

    fn transition(&self, next: WatchState) {
        self.state.send_replace(next);
    }
}
