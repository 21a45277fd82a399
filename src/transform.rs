//! Pixel/geo coordinate transforms.
//!
//! [`AffineTransform`] is the six-parameter linear mapping between pixel and
//! geographic coordinates, stored in the GDAL convention. [`PixelTransform`]
//! is the seam where non-linear camera models (rational-polynomial
//! transforms built from RPC coefficients) plug in: anything that can map
//! pixels forward to geo coordinates and geo coordinates (with elevation)
//! back to fractional pixels satisfies it.

use ndarray::Array2;
use std::sync::Arc;

use crate::error::{RasterError, Result};

/// Six-parameter affine transform between pixel and geographic space.
///
/// Forward mapping: `x = a*col + b*row + c`, `y = d*col + e*row + f`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AffineTransform {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl AffineTransform {
    /// Build from GDAL geotransform order:
    /// `(origin_x, pixel_width, row_rotation, origin_y, col_rotation, pixel_height)`.
    #[must_use]
    pub fn from_gdal(
        origin_x: f64,
        pixel_width: f64,
        row_rotation: f64,
        origin_y: f64,
        col_rotation: f64,
        pixel_height: f64,
    ) -> Self {
        Self {
            a: pixel_width,
            b: row_rotation,
            c: origin_x,
            d: col_rotation,
            e: pixel_height,
            f: origin_y,
        }
    }

    /// North-up transform anchored at an upper-left geo corner with square
    /// pixels of size `gsd` (Y pixel size negated).
    #[must_use]
    pub fn north_up(origin_x: f64, origin_y: f64, gsd: f64) -> Self {
        Self::from_gdal(origin_x, gsd, 0.0, origin_y, 0.0, -gsd)
    }

    /// Map pixel `(col, row)` to geographic `(x, y)`.
    #[must_use]
    pub fn forward(&self, col: f64, row: f64) -> (f64, f64) {
        (
            self.a * col + self.b * row + self.c,
            self.d * col + self.e * row + self.f,
        )
    }

    /// Map geographic `(x, y)` to fractional pixel `(col, row)`.
    pub fn reverse(&self, x: f64, y: f64) -> Result<(f64, f64)> {
        let det = self.a * self.e - self.b * self.d;
        if det == 0.0 {
            return Err(RasterError::Projection(
                "affine transform is singular and cannot be inverted".to_string(),
            ));
        }
        let dx = x - self.c;
        let dy = y - self.f;
        Ok((
            (self.e * dx - self.b * dy) / det,
            (self.a * dy - self.d * dx) / det,
        ))
    }

    /// Compose with a pixel-space translation: the result maps window-local
    /// pixel coordinates of a window whose origin sits at
    /// `(col_off, row_off)` in this transform's pixel space.
    #[must_use]
    pub fn translated(&self, col_off: f64, row_off: f64) -> Self {
        Self {
            c: self.c + self.a * col_off + self.b * row_off,
            f: self.f + self.d * col_off + self.e * row_off,
            ..*self
        }
    }

    /// Ground-sample-distance along each axis.
    #[must_use]
    pub fn pixel_size(&self) -> (f64, f64) {
        (self.a.abs(), self.e.abs())
    }
}

/// A pixel↔geo mapping, possibly non-linear (e.g. a rational-polynomial
/// camera model). The reverse direction accepts elevation.
pub trait PixelTransform: Send + Sync {
    /// Map pixel `(col, row)` to geographic `(x, y)`.
    fn fwd(&self, col: f64, row: f64) -> (f64, f64);

    /// Map geographic `(x, y)` at elevation `z` to fractional pixel
    /// `(col, row)`.
    fn rev(&self, x: f64, y: f64, z: f64) -> Result<(f64, f64)>;

    /// Native ground-sample-distance, if the transform knows one.
    fn gsd(&self) -> Option<f64> {
        None
    }

    /// Affine decomposition, if the transform has one.
    fn affine(&self) -> Option<AffineTransform> {
        None
    }
}

impl PixelTransform for AffineTransform {
    fn fwd(&self, col: f64, row: f64) -> (f64, f64) {
        self.forward(col, row)
    }

    fn rev(&self, x: f64, y: f64, _z: f64) -> Result<(f64, f64)> {
        self.reverse(x, y)
    }

    fn gsd(&self) -> Option<f64> {
        Some(self.a.abs())
    }

    fn affine(&self) -> Option<AffineTransform> {
        Some(*self)
    }
}

/// A transform translated into a sub-window's pixel space. Nested shifts
/// compose additively through the inner transform.
struct ShiftedTransform {
    inner: Arc<dyn PixelTransform>,
    col_off: f64,
    row_off: f64,
}

impl PixelTransform for ShiftedTransform {
    fn fwd(&self, col: f64, row: f64) -> (f64, f64) {
        self.inner.fwd(col + self.col_off, row + self.row_off)
    }

    fn rev(&self, x: f64, y: f64, z: f64) -> Result<(f64, f64)> {
        let (col, row) = self.inner.rev(x, y, z)?;
        Ok((col - self.col_off, row - self.row_off))
    }

    fn gsd(&self) -> Option<f64> {
        self.inner.gsd()
    }

    fn affine(&self) -> Option<AffineTransform> {
        self.inner
            .affine()
            .map(|a| a.translated(self.col_off, self.row_off))
    }
}

/// Translate a transform by a pixel-window offset.
#[must_use]
pub fn shift(
    inner: Arc<dyn PixelTransform>,
    col_off: f64,
    row_off: f64,
) -> Arc<dyn PixelTransform> {
    Arc::new(ShiftedTransform {
        inner,
        col_off,
        row_off,
    })
}

/// Padding-safe lower bound: the floor of the smallest fractional coordinate
/// minus `pad`, clamped at zero.
#[must_use]
pub fn pad_safe_min(coords: &Array2<f64>, pad: usize) -> usize {
    let min = coords.iter().copied().fold(f64::INFINITY, f64::min);
    if !min.is_finite() {
        return 0;
    }
    (min.floor() as i64 - pad as i64).max(0) as usize
}

/// Padding-safe upper bound: the ceiling of the largest fractional
/// coordinate plus `pad`, clamped to the reference image's extent.
#[must_use]
pub fn pad_safe_max(coords: &Array2<f64>, pad: usize, extent: usize) -> usize {
    let max = coords.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !max.is_finite() {
        return 0;
    }
    (max.ceil() as i64 + pad as i64).clamp(0, extent as i64) as usize
}
