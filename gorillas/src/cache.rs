//! Keyed query cache with shared in-flight requests.
//!
//! Every read resource gets a stable [`QueryKey`]. Concurrent readers of the
//! same key share one request and one cached result. Results stay fresh until
//! invalidated (Discord status additionally expires after five minutes).
//!
//! Each entry carries a generation drawn from a cache-wide counter.
//! Invalidating or evicting a key bumps it, so a response that was in flight
//! at the time is discarded instead of overwriting newer state.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures_util::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::debug;

use crate::error::{GorillasError, Result};

/// Freshness window of the cached Discord link status.
pub const DISCORD_STATUS_TTL: Duration = Duration::from_secs(5 * 60);

/// Everything a confirmed coin flip can change.
pub const FLIP_AFFECTED: &[QueryKind] = &[
    QueryKind::UserStats,
    QueryKind::FlipHistory,
    QueryKind::Quests,
    QueryKind::Achievements,
    QueryKind::Leaderboard,
    QueryKind::FlipCount,
    QueryKind::GlobalStats,
];

/// Read resource, without its parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKind {
    UserStats,
    GlobalStats,
    Achievements,
    Quests,
    ReferralInfo,
    FlipHistory,
    GlobalFlipHistory,
    FlipCount,
    Leaderboard,
    DiscordStatus,
}

impl QueryKind {
    /// Whether reads of this kind need a session token.
    pub fn requires_auth(self) -> bool {
        !matches!(
            self,
            Self::GlobalStats | Self::GlobalFlipHistory | Self::Leaderboard
        )
    }

    pub fn ttl(self) -> Option<Duration> {
        match self {
            Self::DiscordStatus => Some(DISCORD_STATUS_TTL),
            _ => None,
        }
    }
}

/// Stable cache key of one read.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueryKey {
    UserStats,
    GlobalStats,
    Achievements,
    /// Quests for a lowercase wallet address.
    Quests(String),
    ReferralInfo,
    FlipHistory,
    GlobalFlipHistory,
    FlipCount,
    Leaderboard,
    DiscordStatus,
}

impl QueryKey {
    pub fn quests(address: &str) -> Self {
        Self::Quests(address.to_lowercase())
    }

    pub fn kind(&self) -> QueryKind {
        match self {
            Self::UserStats => QueryKind::UserStats,
            Self::GlobalStats => QueryKind::GlobalStats,
            Self::Achievements => QueryKind::Achievements,
            Self::Quests(_) => QueryKind::Quests,
            Self::ReferralInfo => QueryKind::ReferralInfo,
            Self::FlipHistory => QueryKind::FlipHistory,
            Self::GlobalFlipHistory => QueryKind::GlobalFlipHistory,
            Self::FlipCount => QueryKind::FlipCount,
            Self::Leaderboard => QueryKind::Leaderboard,
            Self::DiscordStatus => QueryKind::DiscordStatus,
        }
    }

    pub fn requires_auth(&self) -> bool {
        self.kind().requires_auth()
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UserStats => write!(f, "stats/me"),
            Self::GlobalStats => write!(f, "stats/global"),
            Self::Achievements => write!(f, "achievements/me"),
            Self::Quests(address) => write!(f, "quests/{address}"),
            Self::ReferralInfo => write!(f, "referrals/me"),
            Self::FlipHistory => write!(f, "flip-history/me"),
            Self::GlobalFlipHistory => write!(f, "flip-history/global"),
            Self::FlipCount => write!(f, "flip-count/me"),
            Self::Leaderboard => write!(f, "leaderboard"),
            Self::DiscordStatus => write!(f, "discord/status"),
        }
    }
}

/// Cache change notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheEvent {
    /// The key is stale; the next read refetches.
    Invalidated(QueryKey),
    /// The key was removed entirely.
    Evicted(QueryKey),
}

type AnyValue = Arc<dyn Any + Send + Sync>;
type SharedFetch = Shared<BoxFuture<'static, Result<AnyValue>>>;

struct Entry {
    value: Option<AnyValue>,
    fetched_at: Option<Instant>,
    stale: bool,
    generation: u64,
    inflight: Option<SharedFetch>,
}

impl Entry {
    fn new(generation: u64) -> Self {
        Self {
            value: None,
            fetched_at: None,
            stale: false,
            generation,
            inflight: None,
        }
    }

    fn fresh_value(&self, ttl: Option<Duration>) -> Option<AnyValue> {
        if self.stale {
            return None;
        }
        let value = self.value.as_ref()?;
        if let (Some(ttl), Some(fetched_at)) = (ttl, self.fetched_at) {
            if fetched_at.elapsed() >= ttl {
                return None;
            }
        }
        Some(Arc::clone(value))
    }
}

#[derive(Default)]
struct Inner {
    entries: HashMap<QueryKey, Entry>,
    next_generation: u64,
}

impl Inner {
    fn bump(&mut self) -> u64 {
        self.next_generation += 1;
        self.next_generation
    }
}

/// Process-wide query cache. Cloning yields another handle to the same cache.
#[derive(Clone)]
pub struct QueryCache {
    inner: Arc<Mutex<Inner>>,
    events: broadcast::Sender<CacheEvent>,
}

impl QueryCache {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            inner: Arc::new(Mutex::new(Inner::default())),
            events,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Return the cached value for `key` if fresh, otherwise run `fetcher`
    /// (or join a request already in flight) and cache its result.
    ///
    /// If the key is invalidated while the request is in flight, the response
    /// is dropped and the read starts over. If the key is evicted, the read
    /// fails with [`GorillasError::Cancelled`].
    pub async fn fetch<T, F, Fut>(&self, key: QueryKey, fetcher: F) -> Result<Arc<T>>
    where
        T: Send + Sync + 'static,
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        loop {
            let (generation, request) = {
                let mut guard = self.lock();
                let inner = &mut *guard;
                let next_generation = &mut inner.next_generation;
                let entry = inner.entries.entry(key.clone()).or_insert_with(|| {
                    *next_generation += 1;
                    Entry::new(*next_generation)
                });

                if let Some(value) = entry.fresh_value(key.kind().ttl()) {
                    return downcast(&key, value);
                }

                let request = match &entry.inflight {
                    Some(request) => request.clone(),
                    None => {
                        debug!(%key, "query fetch started");
                        let request = fetcher()
                            .map(|result| result.map(|value| Arc::new(value) as AnyValue))
                            .boxed()
                            .shared();
                        entry.inflight = Some(request.clone());
                        request
                    }
                };
                (entry.generation, request)
            };

            let result = request.await;

            {
                let mut inner = self.lock();
                match inner.entries.get_mut(&key) {
                    Some(entry) if entry.generation == generation => {
                        entry.inflight = None;
                        if let Ok(value) = &result {
                            entry.value = Some(Arc::clone(value));
                            entry.fetched_at = Some(Instant::now());
                            entry.stale = false;
                        }
                    }
                    Some(_) => {
                        debug!(%key, "discarding superseded response");
                        continue;
                    }
                    None => {
                        debug!(%key, "discarding response for evicted key");
                        return Err(GorillasError::Cancelled);
                    }
                }
            }

            return result.and_then(|value| downcast(&key, value));
        }
    }

    /// Cached value for `key`, fresh or not.
    pub fn get<T: Send + Sync + 'static>(&self, key: &QueryKey) -> Option<Arc<T>> {
        let value = self.lock().entries.get(key)?.value.clone()?;
        value.downcast::<T>().ok()
    }

    /// Whether the next read of `key` would hit the network.
    pub fn is_stale(&self, key: &QueryKey) -> bool {
        self.lock()
            .entries
            .get(key)
            .and_then(|entry| entry.fresh_value(key.kind().ttl()))
            .is_none()
    }

    /// Whether any result, fresh or stale, is held for `key`.
    pub fn contains(&self, key: &QueryKey) -> bool {
        self.lock()
            .entries
            .get(key)
            .is_some_and(|entry| entry.value.is_some())
    }

    /// Mark one key stale and abandon its in-flight request.
    pub fn invalidate_key(&self, key: &QueryKey) {
        let invalidated = {
            let mut guard = self.lock();
            let inner = &mut *guard;
            match inner.entries.get_mut(key) {
                Some(entry) => {
                    inner.next_generation += 1;
                    entry.generation = inner.next_generation;
                    entry.stale = true;
                    entry.inflight = None;
                    true
                }
                None => false,
            }
        };
        if invalidated {
            debug!(%key, "query invalidated");
            let _ = self.events.send(CacheEvent::Invalidated(key.clone()));
        }
    }

    /// Mark every key of the given kinds stale.
    pub fn invalidate(&self, kinds: &[QueryKind]) {
        let keys: Vec<QueryKey> = self
            .lock()
            .entries
            .keys()
            .filter(|key| kinds.contains(&key.kind()))
            .cloned()
            .collect();
        for key in &keys {
            self.invalidate_key(key);
        }
    }

    /// Mark every authenticated key stale, e.g. after a new token is stored.
    pub fn invalidate_authenticated(&self) {
        let keys: Vec<QueryKey> = self
            .lock()
            .entries
            .keys()
            .filter(|key| key.requires_auth())
            .cloned()
            .collect();
        for key in &keys {
            self.invalidate_key(key);
        }
    }

    /// Remove every authenticated key, e.g. on logout.
    pub fn clear_authenticated(&self) {
        self.evict_where(|key| key.requires_auth());
    }

    /// Remove everything.
    pub fn clear(&self) {
        self.evict_where(|_| true);
    }

    fn evict_where(&self, predicate: impl Fn(&QueryKey) -> bool) {
        let evicted: Vec<QueryKey> = {
            let mut guard = self.lock();
            let inner = &mut *guard;
            let keys: Vec<QueryKey> = inner
                .entries
                .keys()
                .filter(|key| predicate(key))
                .cloned()
                .collect();
            for key in &keys {
                inner.entries.remove(key);
            }
            if !keys.is_empty() {
                inner.bump();
            }
            keys
        };
        for key in evicted {
            debug!(%key, "query evicted");
            let _ = self.events.send(CacheEvent::Evicted(key));
        }
    }

    /// Subscribe to invalidation and eviction events.
    pub fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
        self.events.subscribe()
    }
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for QueryCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.lock();
        f.debug_struct("QueryCache")
            .field("entries", &inner.entries.len())
            .field("generation", &inner.next_generation)
            .finish()
    }
}

fn downcast<T: Send + Sync + 'static>(key: &QueryKey, value: AnyValue) -> Result<Arc<T>> {
    value
        .downcast::<T>()
        .map_err(|_| GorillasError::CacheMismatch(key.to_string()))
}
