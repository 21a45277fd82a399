//! Band-math visualization helpers.
//!
//! Free functions over [`GeoImage`] rather than methods baked into the
//! image type: contrast-stretched RGB composites, NDVI, and (behind the
//! `plot` feature) PNG rendering via the `image` crate.

use ndarray::{Array2, Array3, Axis};
use tracing::debug;

use crate::error::{RasterError, Result};
use crate::image::GeoImage;

/// Band selection and stretch for [`rgb`].
#[derive(Debug, Clone)]
pub struct RgbParams {
    /// Band indices composited as red, green, blue.
    pub bands: [usize; 3],
    /// Percentile pair for the per-band contrast stretch.
    pub stretch: (f64, f64),
}

impl Default for RgbParams {
    fn default() -> Self {
        Self {
            bands: [4, 2, 1],
            stretch: (2.0, 98.0),
        }
    }
}

/// Materialize three bands and contrast-stretch each one independently to
/// `[0, 1]` between its stretch percentiles. Output shape is
/// `(rows, cols, 3)`.
pub fn rgb(image: &GeoImage, params: &RgbParams) -> Result<Array3<f32>> {
    let data = image.read(Some(&params.bands))?;
    let (_, nrows, ncols) = data.dim();
    debug!(bands = ?params.bands, stretch = ?params.stretch, "rgb composite");

    let mut out = Array3::zeros((nrows, ncols, 3));
    for (i, band) in data.axis_iter(Axis(0)).enumerate() {
        let mut values: Vec<f32> = band.iter().copied().collect();
        values.sort_by(|a, b| a.total_cmp(b));
        let lo = percentile(&values, params.stretch.0);
        let hi = percentile(&values, params.stretch.1);
        let range = hi - lo;

        for ((r, c), &v) in band.indexed_iter() {
            out[[r, c, i]] = if range == 0.0 {
                0.0
            } else {
                ((v - lo) / range).clamp(0.0, 1.0)
            };
        }
    }
    Ok(out)
}

/// Normalized difference vegetation index from a `(nir, red)` band pair.
pub fn ndvi(image: &GeoImage, bands: Option<(usize, usize)>) -> Result<Array2<f32>> {
    let (nir, red) = bands.unwrap_or((6, 4));
    let data = image.read(Some(&[nir, red]))?;
    let nir = data.index_axis(Axis(0), 0);
    let red = data.index_axis(Axis(0), 1);
    Ok(Array2::from_shape_fn(nir.raw_dim(), |idx| {
        (nir[idx] - red[idx]) / (nir[idx] + red[idx])
    }))
}

/// Linear-interpolated percentile over pre-sorted values, matching the
/// numpy default.
fn percentile(sorted: &[f32], p: f64) -> f32 {
    match sorted {
        [] => 0.0,
        [only] => *only,
        _ => {
            let rank = p / 100.0 * (sorted.len() - 1) as f64;
            let lo = rank.floor() as usize;
            let hi = rank.ceil() as usize;
            let frac = (rank - lo as f64) as f32;
            sorted[lo] * (1.0 - frac) + sorted[hi] * frac
        }
    }
}

/// What [`plot`] renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlotSpec {
    Rgb,
    Ndvi,
    /// First band, greyscale.
    SingleBand,
}

/// Render the image to a PNG on disk. Single-band images are rendered
/// greyscale regardless of the requested spec.
#[cfg(feature = "plot")]
pub fn plot(image: &GeoImage, spec: PlotSpec, path: &std::path::Path) -> Result<()> {
    let shape = image.shape();
    if shape.iter().any(|&s| s == 0) {
        return Err(RasterError::Visualization(format!(
            "no data to plot, dimensions are invalid {shape:?}"
        )));
    }

    let buffer = if image.array.num_bands() == 1 || spec == PlotSpec::SingleBand {
        let data = image.read(Some(&[0]))?;
        let band = data.index_axis(Axis(0), 0);
        greyscale(&band.to_owned())
    } else if spec == PlotSpec::Ndvi {
        greyscale(&ndvi(image, None)?)
    } else {
        let data = rgb(image, &RgbParams::default())?;
        let (nrows, ncols, _) = data.dim();
        let mut buf = image::RgbImage::new(ncols as u32, nrows as u32);
        for ((r, c, ch), &v) in data.indexed_iter() {
            buf.get_pixel_mut(c as u32, r as u32)[ch] = (v * 255.0) as u8;
        }
        image::DynamicImage::ImageRgb8(buf)
    };

    buffer
        .save_with_format(path, image::ImageFormat::Png)
        .map_err(|e| RasterError::Visualization(format!("png encoding failed: {e}")))?;
    debug!(path = %path.display(), "wrote plot");
    Ok(())
}

#[cfg(feature = "plot")]
fn greyscale(band: &Array2<f32>) -> image::DynamicImage {
    let (nrows, ncols) = band.dim();
    let min = band.iter().copied().fold(f32::INFINITY, f32::min);
    let max = band.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let range = if max > min { max - min } else { 1.0 };

    let mut buf = image::GrayImage::new(ncols as u32, nrows as u32);
    for ((r, c), &v) in band.indexed_iter() {
        buf.get_pixel_mut(c as u32, r as u32)[0] = (((v - min) / range) * 255.0) as u8;
    }
    image::DynamicImage::ImageLuma8(buf)
}

/// Without the `plot` feature there is no rendering backend.
#[cfg(not(feature = "plot"))]
pub fn plot(_image: &GeoImage, _spec: PlotSpec, _path: &std::path::Path) -> Result<()> {
    Err(RasterError::Visualization(
        "plotting requires the `plot` feature".to_string(),
    ))
}
