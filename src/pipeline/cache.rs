//! Process-wide codec/workspace caches keyed by shape and compression
//! level, grounded in `original_source/src/data_io/data_compressor.cpp`'s
//! `Impl` struct: maps from `(depth, features, level)` / `(num_features,
//! level)` / `level` to a lazily-constructed codec+workspace pair, guarded
//! per-bucket rather than by one global lock, so two differently-shaped
//! pipelines never contend.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};

use crate::pipeline::PrevState;
use crate::workspace::WorkspacePool;

/// Identifies one codec instance's cache bucket: the shape it operates on
/// plus the compression level, matching the
/// `original_source`-present `(shape, level)` cache keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub shape: Vec<u32>,
    pub level: i32,
}

impl CacheKey {
    pub fn new(shape: &[u32], level: i32) -> Self {
        Self { shape: shape.to_vec(), level }
    }
}

type WorkspacePoolCache = Mutex<HashMap<CacheKey, Arc<WorkspacePool>>>;

static OB_CODEC_CACHE: OnceLock<WorkspacePoolCache> = OnceLock::new();
static T1D_CODEC_CACHE: OnceLock<WorkspacePoolCache> = OnceLock::new();
static T2D_CODEC_CACHE: OnceLock<WorkspacePoolCache> = OnceLock::new();
static ZERO_STATE_CACHE: OnceLock<Mutex<HashMap<CacheKey, PrevState>>> = OnceLock::new();

fn get_or_create_pool(cache: &OnceLock<WorkspacePoolCache>, key: &CacheKey) -> Arc<WorkspacePool> {
    let map = cache.get_or_init(|| Mutex::new(HashMap::new()));
    let mut guard = map.lock().expect("codec cache mutex poisoned");
    guard
        .entry(key.clone())
        .or_insert_with(|| WorkspacePool::new(1, 4, 1))
        .clone()
}

/// Workspace pool for order-book codecs, bucketed by `(depth, features,
/// level)` via [`CacheKey`].
pub fn ob_codec_cache(key: &CacheKey) -> Arc<WorkspacePool> {
    get_or_create_pool(&OB_CODEC_CACHE, key)
}

/// Workspace pool for 1D temporal codecs, bucketed by `(length, level)`.
pub fn t1d_codec_cache(key: &CacheKey) -> Arc<WorkspacePool> {
    get_or_create_pool(&T1D_CODEC_CACHE, key)
}

/// Workspace pool for 2D temporal codecs, bucketed by `(rows, cols, level)`.
pub fn t2d_codec_cache(key: &CacheKey) -> Arc<WorkspacePool> {
    get_or_create_pool(&T2D_CODEC_CACHE, key)
}

/// Returns the zero-initialized [`PrevState`] a brand-new codec instance for
/// `key` should start from, caching the (shape-dependent) allocation shape
/// rather than reconstructing it on every new writer/reader.
pub fn zero_state_cache(key: &CacheKey, make_zero: impl FnOnce() -> PrevState) -> PrevState {
    let map = ZERO_STATE_CACHE.get_or_init(|| Mutex::new(HashMap::new()));
    let mut guard = map.lock().expect("zero-state cache mutex poisoned");
    guard.entry(key.clone()).or_insert_with(make_zero).clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_key_returns_same_pool_instance() {
        let key = CacheKey::new(&[50, 3], 3);
        let a = ob_codec_cache(&key);
        let b = ob_codec_cache(&key);
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn different_shapes_get_different_pools() {
        let key_a = CacheKey::new(&[256, 8], 3);
        let key_b = CacheKey::new(&[50, 3], 3);
        let a = ob_codec_cache(&key_a);
        let b = ob_codec_cache(&key_b);
        assert!(!Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn zero_state_cache_returns_consistent_shape() {
        let key = CacheKey::new(&[4], 3);
        let z1 = zero_state_cache(&key, || PrevState::U64(0));
        let z2 = zero_state_cache(&key, || PrevState::U64(99));
        assert!(matches!(z1, PrevState::U64(0)));
        assert!(matches!(z2, PrevState::U64(0)));
    }
}
