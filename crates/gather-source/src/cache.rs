//! Cache contract and built-in implementations.
//!
//! The runtime consults the cache before every round and writes every
//! fetched value back, so a value fetched once is never fetched again
//! within a run (or across runs, when the caller shares the cache).
//! Keys pair the source name with the erased identity and are opaque to
//! implementations, which may hash them into their own key space.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;

use crate::identity::{BoxedValue, FetchId};

/// Key identifying one record of one source: `(source-name, identity)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    source_name: Arc<str>,
    id: FetchId,
}

impl CacheKey {
    /// Creates a key for the named source and identity.
    pub fn new(source_name: impl Into<Arc<str>>, id: FetchId) -> Self {
        Self {
            source_name: source_name.into(),
            id,
        }
    }

    /// The source half of the key.
    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    /// The identity half of the key.
    pub fn id(&self) -> &FetchId {
        &self.id
    }
}

/// Pluggable cache consulted before every round.
///
/// Implementations may mutate internally; the runtime threads one
/// handle through a run and never inserts the same key twice within a
/// round, so no per-key synchronization is required beyond what the
/// implementation already does for itself.
#[async_trait]
pub trait DataCache: Send + Sync + 'static {
    /// Looks up a previously inserted value.
    async fn lookup(&self, key: &CacheKey) -> Option<BoxedValue>;

    /// Stores a fetched value. Insert followed by lookup of the same
    /// key returns the value, unless the implementation voluntarily
    /// forgets.
    async fn insert(&self, key: CacheKey, value: BoxedValue);
}

/// Shared cache handle.
pub type DynCache = Arc<dyn DataCache>;

/// In-memory cache over a concurrent map.
///
/// Thread-safe without external locking; suitable as the default cache
/// for a run and for sharing across runs.
#[derive(Default)]
pub struct InMemoryCache {
    entries: DashMap<CacheKey, BoxedValue>,
}

impl InMemoryCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty cache wrapped in Arc.
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Number of cached values.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no values.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for InMemoryCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryCache")
            .field("entry_count", &self.entries.len())
            .finish()
    }
}

#[async_trait]
impl DataCache for InMemoryCache {
    async fn lookup(&self, key: &CacheKey) -> Option<BoxedValue> {
        let result = self.entries.get(key).map(|entry| entry.value().clone());
        if result.is_some() {
            metrics::counter!("gather_cache_hits_total").increment(1);
        } else {
            metrics::counter!("gather_cache_misses_total").increment(1);
        }
        result
    }

    async fn insert(&self, key: CacheKey, value: BoxedValue) {
        self.entries.insert(key, value);
    }
}

/// Cache that forgets every insert immediately.
///
/// Disables caching for a run without changing the contract; every
/// round sees a miss for every identity.
#[derive(Debug, Default, Clone, Copy)]
pub struct ForgetfulCache;

impl ForgetfulCache {
    /// Creates a forgetful cache.
    pub fn new() -> Self {
        Self
    }

    /// Creates a forgetful cache wrapped in Arc.
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self)
    }
}

#[async_trait]
impl DataCache for ForgetfulCache {
    async fn lookup(&self, _key: &CacheKey) -> Option<BoxedValue> {
        None
    }

    async fn insert(&self, _key: CacheKey, _value: BoxedValue) {}
}
