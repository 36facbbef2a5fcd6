//! Common test utilities and fakes.

#![allow(dead_code)]

use futures::channel::mpsc;
use futures::stream::{self, StreamExt};
use podstats_lib::collector::{EventStream, Lister, WatchEvent, Watcher};
use podstats_lib::core::{PodstatsError, Reading, Result};
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Notify;
use tokio::time::Instant;

/// Raw watch object: a key and a counter increment
pub type Sample = (String, f64);

/// Sender side of a live watch session
pub type LiveSender = mpsc::UnboundedSender<Result<WatchEvent<Sample>>>;

/// One scripted connect outcome
pub enum Session {
    /// Yields the events, then the peer closes the stream
    Events(Vec<Result<WatchEvent<Sample>>>),
    /// Yields whatever the test pushes; closes when the sender is dropped
    Live(mpsc::UnboundedReceiver<Result<WatchEvent<Sample>>>),
    /// The connect call itself fails
    Fail,
}

/// Watch capability that serves one scripted session per connect and fails
/// every connect once the script runs out.
pub struct ScriptedWatcher {
    sessions: Mutex<VecDeque<Session>>,
    connects: Arc<Mutex<Vec<(Instant, Option<String>)>>>,
}

impl ScriptedWatcher {
    pub fn new(sessions: Vec<Session>) -> Self {
        Self {
            sessions: Mutex::new(sessions.into()),
            connects: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Time and resume token of every connect attempt
    pub fn connects(&self) -> Arc<Mutex<Vec<(Instant, Option<String>)>>> {
        Arc::clone(&self.connects)
    }
}

#[async_trait::async_trait]
impl Watcher for ScriptedWatcher {
    type Raw = Sample;

    async fn watch(&self, resume_from: Option<&str>) -> Result<EventStream<Sample>> {
        self.connects
            .lock()
            .unwrap()
            .push((Instant::now(), resume_from.map(str::to_string)));

        match self.sessions.lock().unwrap().pop_front() {
            Some(Session::Events(events)) => Ok(stream::iter(events).boxed()),
            Some(Session::Live(rx)) => Ok(rx.boxed()),
            Some(Session::Fail) | None => Err(PodstatsError::watch("connection refused")),
        }
    }

    fn convert(&self, (key, value): Sample) -> Result<Vec<Reading>> {
        if key.is_empty() {
            return Err(PodstatsError::conversion("missing key"));
        }
        Ok(vec![Reading::counter(key, value, "2024-05-01T10:00:00Z")])
    }
}

/// A live session and the sender that feeds it
pub fn live_session() -> (Session, LiveSender) {
    let (tx, rx) = mpsc::unbounded();
    (Session::Live(rx), tx)
}

/// List capability that returns the same gauges on every call.
pub struct StaticLister {
    items: Vec<Sample>,
    calls: Arc<AtomicUsize>,
}

impl StaticLister {
    pub fn new(items: &[(&str, f64)]) -> Self {
        Self {
            items: items.iter().map(|(k, v)| ((*k).to_string(), *v)).collect(),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

#[async_trait::async_trait]
impl Lister for StaticLister {
    type Item = Sample;

    async fn list(&self) -> Result<Vec<Sample>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.items.clone())
    }

    fn convert(&self, (key, value): Sample) -> Result<Vec<Reading>> {
        Ok(vec![Reading::instant(key, value, "2024-05-01T10:00:00Z")])
    }
}

/// List capability whose `list` call parks until the test releases it.
pub struct GatedLister {
    items: Vec<Sample>,
    entered: Arc<Notify>,
    release: Arc<Notify>,
}

impl GatedLister {
    pub fn new(items: &[(&str, f64)]) -> Self {
        Self {
            items: items.iter().map(|(k, v)| ((*k).to_string(), *v)).collect(),
            entered: Arc::new(Notify::new()),
            release: Arc::new(Notify::new()),
        }
    }

    /// Notified when a listing starts, and the gate that lets it finish
    pub fn gates(&self) -> (Arc<Notify>, Arc<Notify>) {
        (Arc::clone(&self.entered), Arc::clone(&self.release))
    }
}

#[async_trait::async_trait]
impl Lister for GatedLister {
    type Item = Sample;

    async fn list(&self) -> Result<Vec<Sample>> {
        self.entered.notify_one();
        self.release.notified().await;
        Ok(self.items.clone())
    }

    fn convert(&self, (key, value): Sample) -> Result<Vec<Reading>> {
        Ok(vec![Reading::instant(key, value, "2024-05-01T10:00:00Z")])
    }
}

/// Plain HTTP/1.1 GET returning the response body.
pub async fn http_get(addr: SocketAddr, path: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let request = format!("GET {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n");
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();

    response
        .split_once("\r\n\r\n")
        .map(|(_, body)| body.to_string())
        .unwrap_or_default()
}

/// Body lines in sorted order
pub fn sorted_lines(body: &str) -> Vec<String> {
    let mut lines: Vec<String> = body.lines().map(str::to_string).collect();
    lines.sort_unstable();
    lines
}
