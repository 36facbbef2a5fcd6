//! Time-boxed cache for rendered exposition bodies.

use arc_swap::ArcSwapOption;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug)]
struct CachedBody {
    body: String,
    rendered_at: Instant,
}

/// Caches one rendered body for a fixed TTL.
///
/// A request carrying the refresh key re-renders and replaces the cached body.
/// A zero TTL disables caching. Concurrent misses may render more than once;
/// the last render wins.
#[derive(Debug)]
pub struct ResponseCache {
    ttl: Duration,
    refresh_key: String,
    entry: ArcSwapOption<CachedBody>,
}

impl ResponseCache {
    pub fn new(ttl: Duration, refresh_key: impl Into<String>) -> Self {
        Self {
            ttl,
            refresh_key: refresh_key.into(),
            entry: ArcSwapOption::empty(),
        }
    }

    /// Returns true if a raw query string names the refresh key
    pub fn wants_refresh(&self, query: Option<&str>) -> bool {
        query.is_some_and(|query| {
            query
                .split('&')
                .any(|pair| pair.split('=').next() == Some(self.refresh_key.as_str()))
        })
    }

    /// Cached body if still fresh, otherwise the result of `render` (which is cached).
    pub fn get_or_render(&self, refresh: bool, render: impl FnOnce() -> String) -> String {
        if self.ttl.is_zero() {
            return render();
        }

        if !refresh {
            if let Some(cached) = self.entry.load_full() {
                if cached.rendered_at.elapsed() < self.ttl {
                    return cached.body.clone();
                }
            }
        }

        let body = render();
        self.entry.store(Some(Arc::new(CachedBody {
            body: body.clone(),
            rendered_at: Instant::now(),
        })));
        body
    }
}
