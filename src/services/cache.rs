//! Short-lived cache for weather records.
//!
//! Two backends implement [`WeatherCache`]: [`NoOpCache`] when caching is
//! disabled and [`InMemoryCache`], a TTL map swept by a background task.
//! A miss is reported as `None` and is the normal path into the upstream
//! lookup, never an error.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::models::WeatherRecord;

/// Default time-to-live for cached records (5 minutes).
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);
/// Added to the TTL to get the sweep interval.
const SWEEP_GRACE: Duration = Duration::from_secs(60);

/// Lookup/store port consulted before every upstream fetch.
///
/// Methods are synchronous: implementations are expected to be in-memory and
/// must tolerate concurrent calls from every lookup of a request.
pub trait WeatherCache: Send + Sync {
    /// Return the cached record for `city`, or `None` on a miss or expiry.
    fn check(&self, city: &str) -> Option<WeatherRecord>;

    /// Store `record` under `city`, replacing any previous entry.
    fn save(&self, city: &str, record: WeatherRecord);
}

/// Cache that never holds anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpCache;

impl WeatherCache for NoOpCache {
    fn check(&self, _city: &str) -> Option<WeatherRecord> {
        None
    }

    fn save(&self, _city: &str, _record: WeatherRecord) {}
}

struct CacheEntry {
    record: WeatherRecord,
    expires_at: Instant,
}

/// In-process TTL cache keyed by the requested city string (case-sensitive).
pub struct InMemoryCache {
    entries: DashMap<String, CacheEntry>,
    ttl: Duration,
    sweep_interval: Duration,
}

/// Whether `ttl` is usable: non-zero, and neither the sweep interval nor an
/// expiry deadline computed from it overflows.
pub fn supports_ttl(ttl: Duration) -> bool {
    !ttl.is_zero()
        && ttl
            .checked_add(SWEEP_GRACE)
            .and_then(|span| Instant::now().checked_add(span))
            .is_some()
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            sweep_interval: ttl + SWEEP_GRACE,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn sweep_interval(&self) -> Duration {
        self.sweep_interval
    }

    /// Number of stored entries, expired ones included until the next sweep.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Drop every expired entry and return how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.expires_at > now);
        before.saturating_sub(self.entries.len())
    }

    /// Run [`purge_expired`](Self::purge_expired) every sweep interval until
    /// `shutdown` is cancelled.
    pub fn spawn_sweeper(self: Arc<Self>, shutdown: CancellationToken) -> JoinHandle<()> {
        tracing::info!(
            ttl_secs = self.ttl().as_secs(),
            sweep_secs = self.sweep_interval().as_secs(),
            "Starting weather cache sweeper"
        );

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.sweep_interval());
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        tracing::info!("Weather cache sweeper shutting down");
                        break;
                    }
                    _ = interval.tick() => {
                        let removed = self.purge_expired();
                        if removed > 0 {
                            tracing::debug!(removed, remaining = self.len(), "Swept expired cache entries");
                        }
                    }
                }
            }
        })
    }
}

impl Default for InMemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl WeatherCache for InMemoryCache {
    fn check(&self, city: &str) -> Option<WeatherRecord> {
        let entry = self.entries.get(city)?;
        if entry.expires_at > Instant::now() {
            Some(entry.record.clone())
        } else {
            None
        }
    }

    fn save(&self, city: &str, record: WeatherRecord) {
        self.entries.insert(
            city.to_string(),
            CacheEntry {
                record,
                expires_at: Instant::now() + self.ttl,
            },
        );
    }
}
