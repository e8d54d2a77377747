use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;

use crate::dataset::Instance;
use crate::generator::{FeatureMatrix, MatrixRow};

/// Point-in-time view of a cache's lookup counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStatsSnapshot {
    /// Lookups answered from cached rows.
    pub hits: u64,
    /// Lookups that had to compute a row.
    pub misses: u64,
}

/// Shared map from instance to extracted feature row, consulted by the
/// online training loop's worker threads. Cloning the handle shares the
/// same storage.
///
/// Absent rows are stored as `None` so an instance that produced no
/// features is not re-extracted on every epoch.
#[derive(Clone, Default)]
pub struct FeatureCache {
    inner: Arc<CacheInner>,
}

#[derive(Default)]
struct CacheInner {
    rows: DashMap<Instance, Option<MatrixRow>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl FeatureCache {
    /// An empty cache with zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached row for `instance`, computing and storing it on a
    /// miss. The compute closure runs outside the map's shard locks; two
    /// workers racing on the same instance may both compute it, and the
    /// later insert wins with an equal row.
    pub fn get_or_compute(
        &self,
        instance: Instance,
        compute: impl FnOnce(Instance) -> Option<MatrixRow>,
    ) -> Option<MatrixRow> {
        if let Some(cached) = self.inner.rows.get(&instance) {
            self.inner.hits.fetch_add(1, Ordering::Relaxed);
            return cached.value().clone();
        }
        self.inner.misses.fetch_add(1, Ordering::Relaxed);
        let row = compute(instance);
        self.inner.rows.insert(instance, row.clone());
        row
    }

    /// Collect the present cached rows into a matrix. Row order follows the
    /// map's iteration order, not the order the instances were cached in.
    pub fn materialize_rows(&self) -> FeatureMatrix {
        let rows = self
            .inner
            .rows
            .iter()
            .filter_map(|entry| entry.value().clone())
            .collect();
        FeatureMatrix::new(rows)
    }

    /// Drop every cached row. The counters carry across clears.
    pub fn clear(&self) {
        self.inner.rows.clear();
    }

    /// Number of cached instances, absent rows included.
    pub fn len(&self) -> usize {
        self.inner.rows.len()
    }

    /// Whether no instance is cached.
    pub fn is_empty(&self) -> bool {
        self.inner.rows.is_empty()
    }

    /// The lookup counters at this moment.
    pub fn stats(&self) -> CacheStatsSnapshot {
        CacheStatsSnapshot {
            hits: self.inner.hits.load(Ordering::Relaxed),
            misses: self.inner.misses.load(Ordering::Relaxed),
        }
    }
}
