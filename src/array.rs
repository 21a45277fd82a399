//! The deferred chunked array.
//!
//! A [`DeferredArray`] binds a metadata record (task graph, chunk layout,
//! dtype, shape) to a window into the virtual array. Slicing and band
//! selection rewrap the window without computing anything; only
//! [`DeferredArray::read`] executes tile tasks, on a bounded worker pool,
//! and it recomputes on every call — there is no caching layer.

use ndarray::{s, Array3};
use rand::Rng;
use rayon::prelude::*;
use std::ops::Range;
use std::sync::Arc;
use tracing::{debug, trace};

use crate::error::{RasterError, Result};
use crate::graph::{TaskGraph, TileKey};
use crate::meta::{DeferredMeta, MetaRecord, PixelType};

/// Materialization settings. The pool size is an explicit value threaded
/// into the read rather than a process-wide environment lookup.
#[derive(Debug, Clone, Copy)]
pub struct ReadOptions {
    /// Worker threads used to compute tile tasks.
    pub num_workers: usize,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self { num_workers: 8 }
    }
}

/// A lazily-evaluated chunked array with an attached metadata capability.
#[derive(Clone)]
pub struct DeferredArray {
    meta: Arc<MetaRecord>,
    /// Selected root band indices, in output order.
    bands: Vec<usize>,
    /// Root-relative row window.
    rows: Range<usize>,
    /// Root-relative column window.
    cols: Range<usize>,
}

impl DeferredArray {
    /// Promote a metadata capability into a deferred array spanning the
    /// declared shape. Fails on contract violations: shape must have 2 or 3
    /// axes and chunks must match it axis for axis.
    pub fn create<M: DeferredMeta + ?Sized>(meta: &M) -> Result<Self> {
        let record = MetaRecord {
            graph: meta.graph().clone(),
            name: meta.name().to_string(),
            chunks: meta.chunks().to_vec(),
            dtype: meta.dtype(),
            shape: meta.shape().to_vec(),
        };
        record.validate()?;

        let (nbands, nrows, ncols) = root_dims(&record);
        Ok(Self {
            meta: Arc::new(record),
            bands: (0..nbands).collect(),
            rows: 0..nrows,
            cols: 0..ncols,
        })
    }

    /// The attached metadata capability.
    #[must_use]
    pub fn meta(&self) -> &MetaRecord {
        &self.meta
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.meta.name
    }

    #[must_use]
    pub fn graph(&self) -> &TaskGraph {
        &self.meta.graph
    }

    #[must_use]
    pub fn dtype(&self) -> PixelType {
        self.meta.dtype
    }

    /// Chunk layout declared by the metadata.
    #[must_use]
    pub fn chunks(&self) -> &[usize] {
        &self.meta.chunks
    }

    /// Shape of the current window, with the same number of axes as the
    /// declared shape.
    #[must_use]
    pub fn shape(&self) -> Vec<usize> {
        if self.meta.shape.len() == 2 {
            vec![self.rows.len(), self.cols.len()]
        } else {
            vec![self.bands.len(), self.rows.len(), self.cols.len()]
        }
    }

    #[must_use]
    pub fn num_bands(&self) -> usize {
        self.bands.len()
    }

    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn num_cols(&self) -> usize {
        self.cols.len()
    }

    /// Rewrap to a sub-window. Ranges are relative to the current window, so
    /// repeated slicing composes additively.
    pub fn slice(&self, rows: Range<usize>, cols: Range<usize>) -> Result<Self> {
        if rows.start > rows.end
            || cols.start > cols.end
            || rows.end > self.rows.len()
            || cols.end > self.cols.len()
        {
            return Err(RasterError::InvalidMetadata(format!(
                "window rows {rows:?} cols {cols:?} out of range for {}x{} view",
                self.rows.len(),
                self.cols.len()
            )));
        }
        Ok(Self {
            meta: Arc::clone(&self.meta),
            bands: self.bands.clone(),
            rows: self.rows.start + rows.start..self.rows.start + rows.end,
            cols: self.cols.start + cols.start..self.cols.start + cols.end,
        })
    }

    /// Rewrap to a band subset (indices into the current band axis, output
    /// in the given order).
    pub fn select_bands(&self, bands: &[usize]) -> Result<Self> {
        let bands = bands
            .iter()
            .map(|&i| {
                self.bands.get(i).copied().ok_or_else(|| {
                    RasterError::InvalidMetadata(format!(
                        "band index {i} out of range for {} bands",
                        self.bands.len()
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            meta: Arc::clone(&self.meta),
            bands,
            rows: self.rows.clone(),
            cols: self.cols.clone(),
        })
    }

    /// One uniformly random window of `(rows, cols)` shape, placed so it
    /// fits entirely inside the current window.
    pub fn randwindow(&self, window_shape: (usize, usize)) -> Result<Self> {
        let (wr, wc) = window_shape;
        let (nr, nc) = (self.rows.len(), self.cols.len());
        if wr == 0 || wc == 0 || wr > nr || wc > nc {
            return Err(RasterError::InvalidMetadata(format!(
                "window {wr}x{wc} does not fit inside {nr}x{nc}"
            )));
        }
        let mut rng = rand::thread_rng();
        let r0 = rng.gen_range(0..=nr - wr);
        let c0 = rng.gen_range(0..=nc - wc);
        self.slice(r0..r0 + wr, c0..c0 + wc)
    }

    /// Lazy sequence of independent random windows; `None` count makes it
    /// infinite. Each call produces a fresh, non-reproducible sequence.
    pub fn iterwindows(
        &self,
        count: Option<usize>,
        window_shape: (usize, usize),
    ) -> impl Iterator<Item = Result<Self>> + '_ {
        std::iter::repeat_with(move || self.randwindow(window_shape))
            .take(count.unwrap_or(usize::MAX))
    }

    /// Materialize the window (or a band subset of it, selected along axis
    /// 0) into a concrete array of shape `(bands, rows, cols)`.
    pub fn read(&self, bands: Option<&[usize]>) -> Result<Array3<f32>> {
        self.read_with(bands, &ReadOptions::default())
    }

    /// [`read`](Self::read) with explicit materialization settings.
    pub fn read_with(&self, bands: Option<&[usize]>, opts: &ReadOptions) -> Result<Array3<f32>> {
        let view = match bands {
            Some(sel) => self.select_bands(sel)?,
            None => self.clone(),
        };
        view.materialize(opts)
    }

    fn materialize(&self, opts: &ReadOptions) -> Result<Array3<f32>> {
        let (band_chunk, row_chunk, col_chunk) = self.chunk_dims();
        let mut keys: Vec<TileKey> = Vec::new();

        if self.rows.is_empty() || self.cols.is_empty() || self.bands.is_empty() {
            return Ok(Array3::zeros((
                self.bands.len(),
                self.rows.len(),
                self.cols.len(),
            )));
        }

        let mut band_chunks: Vec<usize> = self.bands.iter().map(|&b| b / band_chunk).collect();
        band_chunks.sort_unstable();
        band_chunks.dedup();

        let row_range = self.rows.start / row_chunk..=(self.rows.end - 1) / row_chunk;
        let col_range = self.cols.start / col_chunk..=(self.cols.end - 1) / col_chunk;
        for &bc in &band_chunks {
            for tr in row_range.clone() {
                for tc in col_range.clone() {
                    keys.push(TileKey::new(bc, tr, tc));
                }
            }
        }

        // Resolve every task before dispatching so a hole in the graph
        // fails fast rather than mid-computation.
        let tasks: Vec<(TileKey, crate::graph::TileFn)> = keys
            .iter()
            .map(|key| {
                self.meta
                    .graph
                    .get(key)
                    .map(|t| (*key, Arc::clone(t)))
                    .ok_or_else(|| RasterError::MissingTask {
                        name: self.meta.name.clone(),
                        band: key.band,
                        row: key.row,
                        col: key.col,
                    })
            })
            .collect::<Result<_>>()?;

        debug!(
            name = self.meta.name.as_str(),
            tiles = tasks.len(),
            workers = opts.num_workers,
            "materializing deferred array window"
        );

        let computed: Vec<(TileKey, Array3<f32>)> = if opts.num_workers <= 1 {
            tasks
                .iter()
                .map(|(key, task)| Ok((*key, task()?)))
                .collect::<Result<_>>()?
        } else {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(opts.num_workers)
                .build()
                .map_err(|e| RasterError::Task(format!("worker pool construction: {e}")))?;
            pool.install(|| {
                tasks
                    .par_iter()
                    .map(|(key, task)| Ok((*key, task()?)))
                    .collect::<Result<_>>()
            })?
        };

        let mut out = Array3::zeros((self.bands.len(), self.rows.len(), self.cols.len()));
        for (key, tile) in &computed {
            self.paste(&mut out, key, tile, (band_chunk, row_chunk, col_chunk));
        }
        Ok(out)
    }

    /// Copy the overlap between one computed tile and the output window.
    fn paste(
        &self,
        out: &mut Array3<f32>,
        key: &TileKey,
        tile: &Array3<f32>,
        chunk_dims: (usize, usize, usize),
    ) {
        let (band_chunk, row_chunk, col_chunk) = chunk_dims;
        let (tile_bands, tile_rows, tile_cols) = tile.dim();

        let band_start = key.band * band_chunk;
        let row_start = key.row * row_chunk;
        let col_start = key.col * col_chunk;

        // Tiles never bleed past their nominal chunk extent.
        let row_lo = row_start.max(self.rows.start);
        let row_hi = (row_start + tile_rows.min(row_chunk)).min(self.rows.end);
        let col_lo = col_start.max(self.cols.start);
        let col_hi = (col_start + tile_cols.min(col_chunk)).min(self.cols.end);
        if row_lo >= row_hi || col_lo >= col_hi {
            return;
        }

        for (i, &band) in self.bands.iter().enumerate() {
            if band < band_start || band >= band_start + tile_bands.min(band_chunk) {
                continue;
            }
            let local_band = band - band_start;
            trace!(band, tile_row = key.row, tile_col = key.col, "paste tile band");
            out.slice_mut(s![
                i,
                row_lo - self.rows.start..row_hi - self.rows.start,
                col_lo - self.cols.start..col_hi - self.cols.start
            ])
            .assign(&tile.slice(s![
                local_band,
                row_lo - row_start..row_hi - row_start,
                col_lo - col_start..col_hi - col_start
            ]));
        }
    }

    fn chunk_dims(&self) -> (usize, usize, usize) {
        match self.meta.chunks.as_slice() {
            [rows, cols] => (1, *rows, *cols),
            [bands, rows, cols] => (*bands, *rows, *cols),
            // validate() guarantees 2 or 3 axes.
            _ => unreachable!("chunk layout validated at creation"),
        }
    }
}

fn root_dims(meta: &MetaRecord) -> (usize, usize, usize) {
    match meta.shape.as_slice() {
        [rows, cols] => (1, *rows, *cols),
        [bands, rows, cols] => (*bands, *rows, *cols),
        _ => unreachable!("shape validated at creation"),
    }
}

impl std::fmt::Debug for DeferredArray {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeferredArray")
            .field("name", &self.meta.name)
            .field("shape", &self.shape())
            .field("dtype", &self.meta.dtype)
            .finish()
    }
}
