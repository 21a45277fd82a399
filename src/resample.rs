//! Pixel-space resampling primitives.
//!
//! Bilinear sampling at fractional coordinates (zero-filled outside the
//! source extent), grid resizing for elevation rasters, and the per-band
//! warp used when resampling a materialized window onto a coordinate grid.

use ndarray::{Array2, ArrayView2};

/// Bilinear sample of a band at fractional `(row, col)`; zero outside.
#[must_use]
pub fn sample_bilinear(band: &ArrayView2<f32>, row: f64, col: f64) -> f32 {
    let (nrows, ncols) = band.dim();
    if nrows == 0 || ncols == 0 {
        return 0.0;
    }
    if row < -0.5 || col < -0.5 || row > nrows as f64 - 0.5 || col > ncols as f64 - 0.5 {
        return 0.0;
    }

    let r = row.clamp(0.0, nrows as f64 - 1.0);
    let c = col.clamp(0.0, ncols as f64 - 1.0);
    let r0 = r.floor() as usize;
    let c0 = c.floor() as usize;
    let r1 = (r0 + 1).min(nrows - 1);
    let c1 = (c0 + 1).min(ncols - 1);
    let fr = (r - r0 as f64) as f32;
    let fc = (c - c0 as f64) as f32;

    let top = band[[r0, c0]] * (1.0 - fc) + band[[r0, c1]] * fc;
    let bot = band[[r1, c0]] * (1.0 - fc) + band[[r1, c1]] * fc;
    top * (1.0 - fr) + bot * fr
}

/// Resample one band onto a grid of fractional coordinates.
///
/// `rows` and `cols` must have the same shape; the output takes that shape.
#[must_use]
pub fn warp_band(band: &ArrayView2<f32>, rows: &Array2<f64>, cols: &Array2<f64>) -> Array2<f32> {
    let dim = rows.raw_dim();
    Array2::from_shape_fn(dim, |(j, i)| sample_bilinear(band, rows[[j, i]], cols[[j, i]]))
}

/// Range-preserving bilinear resize of an `f64` grid (used for elevation
/// models) to a target `(rows, cols)` shape.
#[must_use]
pub fn resize_bilinear(src: &ArrayView2<f64>, shape: (usize, usize)) -> Array2<f64> {
    let (out_rows, out_cols) = shape;
    let (in_rows, in_cols) = src.dim();
    if in_rows == 0 || in_cols == 0 || out_rows == 0 || out_cols == 0 {
        return Array2::zeros(shape);
    }

    let row_scale = if out_rows > 1 {
        (in_rows as f64 - 1.0) / (out_rows as f64 - 1.0)
    } else {
        0.0
    };
    let col_scale = if out_cols > 1 {
        (in_cols as f64 - 1.0) / (out_cols as f64 - 1.0)
    } else {
        0.0
    };

    Array2::from_shape_fn(shape, |(j, i)| {
        let r = j as f64 * row_scale;
        let c = i as f64 * col_scale;
        let r0 = r.floor() as usize;
        let c0 = c.floor() as usize;
        let r1 = (r0 + 1).min(in_rows - 1);
        let c1 = (c0 + 1).min(in_cols - 1);
        let fr = r - r0 as f64;
        let fc = c - c0 as f64;

        let top = src[[r0, c0]] * (1.0 - fc) + src[[r0, c1]] * fc;
        let bot = src[[r1, c0]] * (1.0 - fc) + src[[r1, c1]] * fc;
        top * (1.0 - fr) + bot * fr
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_bilinear_exact_and_midpoint() {
        let band = array![[0.0_f32, 2.0], [4.0, 6.0]];
        let v = band.view();
        assert_eq!(sample_bilinear(&v, 0.0, 0.0), 0.0);
        assert_eq!(sample_bilinear(&v, 1.0, 1.0), 6.0);
        assert_eq!(sample_bilinear(&v, 0.5, 0.5), 3.0);
        assert_eq!(sample_bilinear(&v, 0.0, 0.5), 1.0);
    }

    #[test]
    fn test_bilinear_outside_is_zero() {
        let band = array![[5.0_f32, 5.0], [5.0, 5.0]];
        let v = band.view();
        assert_eq!(sample_bilinear(&v, -2.0, 0.0), 0.0);
        assert_eq!(sample_bilinear(&v, 0.0, 7.0), 0.0);
    }

    #[test]
    fn test_warp_band_identity_grid() {
        let band = array![[1.0_f32, 2.0], [3.0, 4.0]];
        let rows = array![[0.0, 0.0], [1.0, 1.0]];
        let cols = array![[0.0, 1.0], [0.0, 1.0]];
        let out = warp_band(&band.view(), &rows, &cols);
        assert_eq!(out, band);
    }

    #[test]
    fn test_resize_preserves_constant() {
        let src = Array2::from_elem((3, 3), 42.0);
        let out = resize_bilinear(&src.view(), (7, 5));
        assert_eq!(out.dim(), (7, 5));
        assert!(out.iter().all(|&v| (v - 42.0).abs() < 1e-12));
    }

    #[test]
    fn test_resize_preserves_range_on_ramp() {
        let src = Array2::from_shape_fn((4, 4), |(j, _)| j as f64);
        let out = resize_bilinear(&src.view(), (9, 9));
        let min = out.iter().copied().fold(f64::INFINITY, f64::min);
        let max = out.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        assert!((min - 0.0).abs() < 1e-12);
        assert!((max - 3.0).abs() < 1e-12);
    }
}
