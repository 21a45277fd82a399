//! The deferred tile task graph.
//!
//! A [`TaskGraph`] maps tile keys — `(band_chunk, tile_row, tile_col)`,
//! normalized to start at zero — to deferred computations that each produce
//! one chunk-sized `Array3<f32>`. Graph construction registers work without
//! performing any of it; tasks run only when a
//! [`crate::DeferredArray::read`] needs their tile.

use ahash::AHashMap;
use ndarray::Array3;
use std::sync::Arc;

use crate::error::Result;

/// A deferred tile computation. Tasks must be pure: the same task yields the
/// same tile on every invocation, since reads recompute rather than cache.
pub type TileFn = Arc<dyn Fn() -> Result<Array3<f32>> + Send + Sync>;

/// Key of one tile task within a graph's namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileKey {
    /// Chunk index along the band axis (0 when one chunk spans all bands).
    pub band: usize,
    /// Tile row within the chunk grid.
    pub row: usize,
    /// Tile column within the chunk grid.
    pub col: usize,
}

impl TileKey {
    #[must_use]
    pub fn new(band: usize, row: usize, col: usize) -> Self {
        Self { band, row, col }
    }
}

/// Mapping from tile keys to deferred tile computations.
#[derive(Clone)]
pub struct TaskGraph {
    name: String,
    tasks: AHashMap<TileKey, TileFn>,
}

impl TaskGraph {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tasks: AHashMap::new(),
        }
    }

    /// Root-key namespace this graph's tiles belong to.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn insert(&mut self, key: TileKey, task: TileFn) {
        self.tasks.insert(key, task);
    }

    /// Register a closure as a tile task.
    pub fn insert_fn<F>(&mut self, key: TileKey, f: F)
    where
        F: Fn() -> Result<Array3<f32>> + Send + Sync + 'static,
    {
        self.tasks.insert(key, Arc::new(f));
    }

    #[must_use]
    pub fn get(&self, key: &TileKey) -> Option<&TileFn> {
        self.tasks.get(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &TileKey> {
        self.tasks.keys()
    }
}

impl std::fmt::Debug for TaskGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskGraph")
            .field("name", &self.name)
            .field("tasks", &self.tasks.len())
            .finish()
    }
}
