//! # lazyraster - Lazily Evaluated Geo-Referenced Raster Arrays
//!
//! A library for working with large geospatial imagery as deferred chunked
//! arrays: an image is a task graph over tiles plus a geo-context, and no
//! pixel is computed until a window is explicitly read.
//!
//! ## Features
//!
//! - **Deferred evaluation**: tile tasks registered up front, executed only
//!   on [`DeferredArray::read`], on a bounded worker pool
//! - **Window rewrapping**: slicing, band selection, and random windows
//!   compose offsets without touching pixel data
//! - **Geometry subsetting**: AOI by bbox, WKT, or GeoJSON with automatic
//!   reprojection into the image's CRS
//! - **Deferred warping**: resample whole images onto north-up grids through
//!   a fresh task graph; per-geometry warping through any pixel transform,
//!   including rational-polynomial camera models with elevation input
//! - **Coordinate transforms**: pure Rust proj4rs for CRS transformations
//! - **Visualization**: contrast-stretched RGB composites and NDVI
//! - **GeoTIFF export**: pure Rust writer with GeoKey georeferencing
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use lazyraster::{AoiParams, GeoImage, WarpParams};
//!
//! // Cut the image down to an area of interest (WGS84 bounds)
//! let aoi = image.aoi(&AoiParams::bbox([-122.5, 37.0, -122.0, 37.5]))?;
//!
//! // Nothing has been computed yet; materialize the window
//! let data = aoi.read(None)?;
//! println!("{} bands of {}x{} pixels", data.dim().0, data.dim().1, data.dim().2);
//!
//! // Orthorectify on demand
//! let warped = aoi.warp(&WarpParams::default())?;
//! warped.geotiff("aoi.tif")?;
//! ```
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`graph`]: tile task graphs keyed by `(band_chunk, row, col)`
//! - [`meta`]: the [`DeferredMeta`] contract and [`MetaRecord`]
//! - [`array`]: the [`DeferredArray`] window type and its reads
//! - [`image`]: [`GeoImage`] geo-referencing, AOI subsetting, and warping
//! - [`transform`]: affine and pluggable pixel transforms
//! - [`geometry`]: bounding boxes, (multi)polygons, WKT/GeoJSON, projections
//! - [`resample`]: bilinear sampling primitives
//! - [`viz`]: RGB/NDVI band math and plotting
//! - [`geotiff`]: GeoTIFF export

// ============================================================================
// Public modules
// ============================================================================

pub mod array;
pub mod error;
pub mod geometry;
pub mod geotiff;
pub mod graph;
pub mod image;
pub mod meta;
pub mod resample;
pub mod transform;
pub mod viz;

#[cfg(feature = "async")]
pub mod async_read;

// ============================================================================
// Core deferred-array types
// ============================================================================

pub use array::{DeferredArray, ReadOptions};
pub use graph::{TaskGraph, TileFn, TileKey};
pub use meta::{DeferredMeta, MetaRecord, PixelType};

// ============================================================================
// Geo-referencing
// ============================================================================

pub use geometry::{BoundingBox, Geometry, Polygon, Ring};
pub use image::{
    AoiParams, Dem, GeoContext, GeoImage, ProductMeta, ProductSource, WarpParams,
};
pub use transform::{AffineTransform, PixelTransform};

// ============================================================================
// Export and visualization
// ============================================================================

pub use geotiff::{to_geotiff, to_geotiff_bytes, GeoTiffOptions};
pub use viz::{ndvi, plot, rgb, PlotSpec, RgbParams};

// ============================================================================
// Errors
// ============================================================================

pub use error::{RasterError, Result};
