//! Crate-wide error taxonomy.
//!
//! Errors fall into four groups: contract violations on metadata, spatial
//! containment failures, projection/geometry problems, and failures
//! propagated out of deferred tile tasks. Nothing is swallowed or retried;
//! the only default-and-continue path in the crate is the documented
//! "no geometry given" case of [`crate::GeoImage::aoi`].

use crate::geometry::BoundingBox;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RasterError>;

#[derive(Debug, Error)]
pub enum RasterError {
    /// A metadata record violated the deferred-array contract
    /// (wrong dimensionality, mismatched chunk layout, bad window).
    #[error("invalid metadata: {0}")]
    InvalidMetadata(String),

    /// A geometry was not fully contained within the image footprint.
    #[error("image does not contain geometry: {geometry} not within {image}")]
    Containment {
        geometry: BoundingBox,
        image: BoundingBox,
    },

    /// A coordinate reference system was unknown or a transform failed.
    #[error("projection error: {0}")]
    Projection(String),

    /// A geometry could not be parsed or produced an empty sample grid.
    #[error("geometry error: {0}")]
    Geometry(String),

    /// The task graph has no entry for a tile the read needed.
    #[error("no task registered for tile (band {band}, row {row}, col {col}) of '{name}'")]
    MissingTask {
        name: String,
        band: usize,
        row: usize,
        col: usize,
    },

    /// A deferred tile task failed during materialization.
    #[error("tile task failed: {0}")]
    Task(String),

    /// A visualization operation failed or its backend is unavailable.
    #[error("visualization error: {0}")]
    Visualization(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("tiff encoding error: {0}")]
    TiffEncode(String),
}

impl From<tiff::TiffError> for RasterError {
    fn from(e: tiff::TiffError) -> Self {
        RasterError::TiffEncode(e.to_string())
    }
}
