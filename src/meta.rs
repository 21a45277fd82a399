//! Deferred-array metadata: the capability contract and its plain-record form.
//!
//! [`DeferredMeta`] names the five attributes needed to construct a deferred
//! chunked array — task graph, root-key namespace, chunk layout, element
//! type, shape. [`MetaRecord`] is the plain structured record implementing
//! that contract; anything else that can produce the five attributes (a
//! product catalog entry, a test fixture) can implement the trait directly.

use crate::error::{RasterError, Result};
use crate::graph::TaskGraph;

/// Element-type tag carried alongside deferred arrays.
///
/// Pixel data is materialized as `f32` in memory; the tag preserves the
/// product's declared storage type for export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelType {
    UInt8,
    UInt16,
    UInt32,
    Int16,
    Int32,
    Float32,
    Float64,
}

impl PixelType {
    #[must_use]
    pub fn bytes_per_sample(&self) -> usize {
        match self {
            PixelType::UInt8 => 1,
            PixelType::UInt16 | PixelType::Int16 => 2,
            PixelType::UInt32 | PixelType::Int32 | PixelType::Float32 => 4,
            PixelType::Float64 => 8,
        }
    }

    /// Map a product provider's data-type tag string to an element type.
    #[must_use]
    pub fn from_product_tag(tag: &str) -> Option<Self> {
        match tag {
            "BYTE" => Some(PixelType::UInt8),
            "SHORT" => Some(PixelType::Int16),
            "UNSIGNED_SHORT" => Some(PixelType::UInt16),
            "INTEGER" => Some(PixelType::Int32),
            "UNSIGNED_INTEGER" => Some(PixelType::UInt32),
            "FLOAT" => Some(PixelType::Float32),
            "DOUBLE" => Some(PixelType::Float64),
            _ => None,
        }
    }

    /// TIFF sample format tag value (1=uint, 2=int, 3=float).
    #[must_use]
    pub fn sample_format(&self) -> u16 {
        match self {
            PixelType::UInt8 | PixelType::UInt16 | PixelType::UInt32 => 1,
            PixelType::Int16 | PixelType::Int32 => 2,
            PixelType::Float32 | PixelType::Float64 => 3,
        }
    }
}

/// The capability contract for constructing a deferred chunked array.
pub trait DeferredMeta {
    /// The task graph mapping tile keys to deferred computations.
    fn graph(&self) -> &TaskGraph;
    /// Root-key namespace identifying the array.
    fn name(&self) -> &str;
    /// Per-axis chunk sizes; length matches `shape`.
    fn chunks(&self) -> &[usize];
    /// Declared element type.
    fn dtype(&self) -> PixelType;
    /// Per-axis extents; 2 axes (rows, cols) or 3 (bands, rows, cols).
    fn shape(&self) -> &[usize];
}

/// Plain structured record satisfying [`DeferredMeta`].
///
/// No validation happens here beyond field presence; consistency between
/// `chunks` and `shape` is checked when the record is promoted into a
/// [`crate::DeferredArray`].
#[derive(Clone)]
pub struct MetaRecord {
    pub graph: TaskGraph,
    pub name: String,
    pub chunks: Vec<usize>,
    pub dtype: PixelType,
    pub shape: Vec<usize>,
}

impl DeferredMeta for MetaRecord {
    fn graph(&self) -> &TaskGraph {
        &self.graph
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn chunks(&self) -> &[usize] {
        &self.chunks
    }

    fn dtype(&self) -> PixelType {
        self.dtype
    }

    fn shape(&self) -> &[usize] {
        &self.shape
    }
}

impl MetaRecord {
    /// Validate the shape/chunks invariant: 2 or 3 axes, matching lengths,
    /// no zero extents.
    pub fn validate(&self) -> Result<()> {
        let nd = self.shape.len();
        if !(2..=3).contains(&nd) {
            return Err(RasterError::InvalidMetadata(format!(
                "shape must have 2 or 3 axes, got {nd}"
            )));
        }
        if self.chunks.len() != nd {
            return Err(RasterError::InvalidMetadata(format!(
                "chunks has {} axes but shape has {nd}",
                self.chunks.len()
            )));
        }
        if self.shape.iter().any(|&s| s == 0) || self.chunks.iter().any(|&c| c == 0) {
            return Err(RasterError::InvalidMetadata(
                "shape and chunks must be non-zero on every axis".to_string(),
            ));
        }
        Ok(())
    }
}

impl std::fmt::Debug for MetaRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetaRecord")
            .field("name", &self.name)
            .field("shape", &self.shape)
            .field("chunks", &self.chunks)
            .field("dtype", &self.dtype)
            .field("tasks", &self.graph.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_product_tag_mapping() {
        assert_eq!(PixelType::from_product_tag("BYTE"), Some(PixelType::UInt8));
        assert_eq!(
            PixelType::from_product_tag("UNSIGNED_SHORT"),
            Some(PixelType::UInt16)
        );
        assert_eq!(
            PixelType::from_product_tag("FLOAT"),
            Some(PixelType::Float32)
        );
        assert_eq!(PixelType::from_product_tag("COMPLEX"), None);
    }

    #[test]
    fn test_bytes_per_sample() {
        assert_eq!(PixelType::UInt8.bytes_per_sample(), 1);
        assert_eq!(PixelType::Int16.bytes_per_sample(), 2);
        assert_eq!(PixelType::Float32.bytes_per_sample(), 4);
        assert_eq!(PixelType::Float64.bytes_per_sample(), 8);
    }

    #[test]
    fn test_validate_rejects_bad_shapes() {
        let rec = MetaRecord {
            graph: TaskGraph::new("t"),
            name: "t".to_string(),
            chunks: vec![1],
            dtype: PixelType::Float32,
            shape: vec![8],
        };
        assert!(rec.validate().is_err());

        let rec = MetaRecord {
            graph: TaskGraph::new("t"),
            name: "t".to_string(),
            chunks: vec![1, 8],
            dtype: PixelType::Float32,
            shape: vec![1, 8, 8],
        };
        assert!(rec.validate().is_err());

        let rec = MetaRecord {
            graph: TaskGraph::new("t"),
            name: "t".to_string(),
            chunks: vec![1, 8, 8],
            dtype: PixelType::Float32,
            shape: vec![1, 8, 8],
        };
        assert!(rec.validate().is_ok());
    }
}
