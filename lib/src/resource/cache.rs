use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use dashmap::DashMap;
use once_cell::sync::OnceCell;

use crate::error::Result;
use crate::resource::{ContentDigest, Resource, ResourceTransformation, TransformationKey};

type Hasher = std::hash::BuildHasherDefault<rustc_hash::FxHasher>;

/// Identifies the output of applying a chain of transformations to one
/// source resource.
///
/// The source path and digest pin down the input; the transformation keys and
/// their [cache salts](ResourceTransformation::cache_salt) pin down the work.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub(crate) source: Arc<str>,
    pub(crate) digest: ContentDigest,
    pub(crate) chain: Vec<TransformationKey>,
    pub(crate) salts: Vec<Option<u64>>,
}

impl CacheKey {
    pub fn new(source: &Resource, chain: &[&dyn ResourceTransformation]) -> Self {
        CacheKey {
            source: source.path().into(),
            digest: source.digest(),
            chain: chain.iter().map(|t| t.key()).collect(),
            salts: chain.iter().map(|t| t.cache_salt()).collect(),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn digest(&self) -> ContentDigest {
        self.digest
    }

    pub fn chain(&self) -> &[TransformationKey] {
        &self.chain
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
    pub entries: usize,
}

/// A concurrent, build-scoped cache of transformation results.
///
/// Concurrent requests for the same key run the computation once; the other
/// requesters block until it finishes. Failed computations are not cached.
#[derive(Debug, Default)]
pub struct TransformCache {
    entries: DashMap<CacheKey, Arc<OnceCell<Resource>>, Hasher>,
    hits: AtomicUsize,
    misses: AtomicUsize,
}

impl TransformCache {
    pub fn new() -> Self {
        TransformCache::default()
    }

    pub fn get(&self, key: &CacheKey) -> Option<Resource> {
        self.entries.get(key)?.get().cloned()
    }

    /// Returns the cached resource for `key` or computes, caches, and returns
    /// it with `compute`.
    pub fn get_or_try_insert<F>(&self, key: CacheKey, compute: F) -> Result<Resource>
        where F: FnOnce() -> Result<Resource>
    {
        // The map guard must be released before `compute` runs.
        let cell = Arc::clone(&*self.entries.entry(key.clone()).or_default());

        let mut computed = false;
        let result = cell.get_or_try_init(|| {
            computed = true;
            compute()
        });

        match result {
            Ok(resource) => {
                let counter = if computed { &self.misses } else { &self.hits };
                counter.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(source = %key.source, hit = !computed, "transform cache lookup");
                Ok(resource.clone())
            }
            Err(e) => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                self.entries.remove_if(&key, |_, cell| cell.get().is_none());
                Err(e)
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.entries.len(),
        }
    }
}
