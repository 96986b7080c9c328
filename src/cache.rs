//! Process-wide road-graph cache.
//!
//! Lazily loads and caches [`Graph`] instances keyed by a rounded geographic
//! center and search radius, using a `Lazy<Mutex<...>>` singleton split into
//! two parts: an LRU of completed graphs (bounded, so memory doesn't grow
//! unbounded across many distinct request areas) and a per-key single-flight
//! table so concurrent requests for the same key load the graph exactly
//! once.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};

use log::debug;
use once_cell::sync::Lazy;

use crate::error::Result;
use crate::graph::{Graph, RoadGraphProvider};
use crate::lru_cache::LruCache;

/// Maximum number of distinct graphs held at once.
const MAX_CACHED_GRAPHS: usize = 4;

/// Key derived from `(round(lat, 3), round(lng, 3), radius_m)`, matching the
/// persisted graph cache's on-disk key scheme.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    lat_milli: i64,
    lng_milli: i64,
    radius_m: i64,
}

impl CacheKey {
    pub fn new(lat: f64, lng: f64, radius_m: f64) -> Self {
        Self {
            lat_milli: (lat * 1000.0).round() as i64,
            lng_milli: (lng * 1000.0).round() as i64,
            radius_m: radius_m.round() as i64,
        }
    }
}

struct GraphCache {
    lru: LruCache<CacheKey, Arc<Graph>>,
    inflight: HashMap<CacheKey, Arc<OnceLock<Result<Arc<Graph>>>>>,
}

impl GraphCache {
    fn new() -> Self {
        Self {
            lru: LruCache::new(MAX_CACHED_GRAPHS),
            inflight: HashMap::new(),
        }
    }
}

static CACHE: Lazy<Mutex<GraphCache>> = Lazy::new(|| Mutex::new(GraphCache::new()));

/// Fetch the graph for `(center_lat, center_lng, radius_m)`, loading it via
/// `provider` on a cache miss. Concurrent callers requesting the same key
/// share a single load.
pub fn get_or_load_graph(
    provider: &dyn RoadGraphProvider,
    center_lat: f64,
    center_lng: f64,
    radius_m: f64,
) -> Result<Arc<Graph>> {
    let key = CacheKey::new(center_lat, center_lng, radius_m);

    if let Some(graph) = lookup(&key) {
        debug!("graph cache hit for {key:?}");
        return Ok(graph);
    }

    let once = {
        let mut cache = CACHE.lock().unwrap();
        if let Some(graph) = cache.lru.get_cloned(&key) {
            debug!("graph cache hit for {key:?}");
            return Ok(graph);
        }
        cache
            .inflight
            .entry(key.clone())
            .or_insert_with(|| Arc::new(OnceLock::new()))
            .clone()
    };

    debug!("graph cache miss for {key:?}, loading");
    let result = once
        .get_or_init(|| {
            provider
                .get_graph(center_lat, center_lng, radius_m)
                .map(Arc::new)
        })
        .clone();

    let mut cache = CACHE.lock().unwrap();
    if let Ok(graph) = &result {
        cache.lru.insert(key.clone(), graph.clone());
    }
    cache.inflight.remove(&key);

    result
}

fn lookup(key: &CacheKey) -> Option<Arc<Graph>> {
    CACHE.lock().unwrap().lru.get_cloned(key)
}

/// Drop all cached graphs. Exposed for tests; production callers never need
/// this since entries are evicted LRU-style.
#[cfg(test)]
fn clear() {
    let mut cache = CACHE.lock().unwrap();
    cache.lru.clear();
    cache.inflight.clear();
}
