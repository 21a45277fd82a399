//! GeoTIFF export (pure Rust, via the `tiff` crate).
//!
//! Materializes an image window and writes it as a single-strip,
//! band-interleaved GeoTIFF with ModelPixelScale, ModelTiepoint, and a
//! GeoKey directory carrying the EPSG code. Any band count is supported
//! through the low-level directory encoder.

use std::fs::File;
use std::io::{BufWriter, Seek, Write};
use std::path::{Path, PathBuf};

use tiff::encoder::TiffEncoder;
use tiff::tags::Tag;
use tracing::debug;

use crate::error::{RasterError, Result};
use crate::geometry::projection;
use crate::image::GeoImage;
use crate::meta::PixelType;

// GeoTIFF tag IDs (not in the standard tiff crate).
const GEOTIFF_MODELPIXELSCALE: u16 = 33550;
const GEOTIFF_MODELTIEPOINT: u16 = 33922;
const GEOTIFF_GEOKEYDIRECTORY: u16 = 34735;
const GEOTIFF_GEOASCIIPARAMS: u16 = 34737;

// GeoKey IDs.
const GT_MODEL_TYPE_GEO_KEY: u16 = 1024;
const GT_RASTER_TYPE_GEO_KEY: u16 = 1025;
const GEOGRAPHIC_TYPE_GEO_KEY: u16 = 2048;
const PROJECTED_CS_TYPE_GEO_KEY: u16 = 3072;

// GeoKey values.
const MODEL_TYPE_PROJECTED: u16 = 1;
const MODEL_TYPE_GEOGRAPHIC: u16 = 2;
const RASTER_PIXEL_IS_AREA: u16 = 1;

/// Output settings for [`to_geotiff`].
#[derive(Debug, Clone)]
pub struct GeoTiffOptions {
    pub path: PathBuf,
    /// Band subset written to the file, in order; all bands when `None`.
    pub bands: Option<Vec<usize>>,
    /// Storage type for the samples; the image's declared type when `None`.
    pub dtype: Option<PixelType>,
    /// CRS written to the GeoKey directory; the image's own when `None`.
    pub proj: Option<String>,
}

impl GeoTiffOptions {
    #[must_use]
    pub fn path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            bands: None,
            dtype: None,
            proj: None,
        }
    }
}

/// Materialize the image and write it to a GeoTIFF on disk. Returns the
/// written path.
pub fn to_geotiff(image: &GeoImage, opts: &GeoTiffOptions) -> Result<PathBuf> {
    let file = File::create(&opts.path)?;
    write_to(image, opts, BufWriter::new(file))?;
    debug!(path = %opts.path.display(), "wrote geotiff");
    Ok(opts.path.clone())
}

/// Encode the image as in-memory GeoTIFF bytes.
pub fn to_geotiff_bytes(image: &GeoImage, opts: &GeoTiffOptions) -> Result<Vec<u8>> {
    let mut buffer = std::io::Cursor::new(Vec::new());
    write_to(image, opts, &mut buffer)?;
    Ok(buffer.into_inner())
}

fn write_to<W: Write + Seek>(image: &GeoImage, opts: &GeoTiffOptions, writer: W) -> Result<()> {
    let affine = image.affine().ok_or_else(|| {
        RasterError::TiffEncode(
            "image transform has no affine decomposition to georeference with".to_string(),
        )
    })?;

    let data = image.read(opts.bands.as_deref())?;
    let (bands, height, width) = data.dim();
    if bands == 0 || height == 0 || width == 0 {
        return Err(RasterError::TiffEncode(format!(
            "nothing to write, window is {bands}x{height}x{width}"
        )));
    }

    let dtype = opts.dtype.unwrap_or_else(|| image.dtype());
    let proj = opts.proj.as_deref().or_else(|| image.proj());

    let mut encoder = TiffEncoder::new(writer)?;
    let mut dir = encoder.new_directory()?;

    dir.write_tag(Tag::ImageWidth, width as u32)?;
    dir.write_tag(Tag::ImageLength, height as u32)?;

    let bits = (dtype.bytes_per_sample() * 8) as u16;
    let bits_per_sample: Vec<u16> = vec![bits; bands];
    dir.write_tag(Tag::BitsPerSample, bits_per_sample.as_slice())?;

    // Uncompressed, BlackIsZero, chunky interleave, one strip.
    dir.write_tag(Tag::Compression, 1u16)?;
    dir.write_tag(Tag::PhotometricInterpretation, 1u16)?;
    dir.write_tag(Tag::SamplesPerPixel, bands as u16)?;
    let sample_format: Vec<u16> = vec![dtype.sample_format(); bands];
    dir.write_tag(Tag::SampleFormat, sample_format.as_slice())?;
    dir.write_tag(Tag::PlanarConfiguration, 1u16)?;
    dir.write_tag(Tag::RowsPerStrip, height as u32)?;
    if bands > 1 {
        let extra_samples: Vec<u16> = vec![0; bands - 1];
        dir.write_tag(Tag::ExtraSamples, extra_samples.as_slice())?;
    }

    // ModelPixelScale [sx, sy, sz] and a tiepoint anchoring pixel (0, 0)
    // at the window's upper-left geo corner.
    let (sx, sy) = affine.pixel_size();
    dir.write_tag(
        Tag::Unknown(GEOTIFF_MODELPIXELSCALE),
        [sx, sy, 0.0].as_slice(),
    )?;
    dir.write_tag(
        Tag::Unknown(GEOTIFF_MODELTIEPOINT),
        [0.0, 0.0, 0.0, affine.c, affine.f, 0.0].as_slice(),
    )?;

    if let Some(proj) = proj {
        let code = projection::epsg_code(proj)?;
        dir.write_tag(
            Tag::Unknown(GEOTIFF_GEOKEYDIRECTORY),
            geokey_directory(code).as_slice(),
        )?;
        if let Ok(proj4) = projection::proj_string(code) {
            // GeoAsciiParams is pipe-delimited.
            let ascii = format!("{proj4}|");
            dir.write_tag(Tag::Unknown(GEOTIFF_GEOASCIIPARAMS), ascii.as_bytes())?;
        }
    }

    // Band-interleaved sample stream in the requested storage type.
    let mut pixel_bytes = Vec::with_capacity(bands * height * width * dtype.bytes_per_sample());
    for r in 0..height {
        for c in 0..width {
            for b in 0..bands {
                push_sample(&mut pixel_bytes, data[[b, r, c]], dtype);
            }
        }
    }

    let strip_offset = dir.write_data(pixel_bytes.as_slice())?;
    dir.write_tag(Tag::StripOffsets, strip_offset)?;
    dir.write_tag(Tag::StripByteCounts, pixel_bytes.len() as u32)?;
    dir.finish()?;
    Ok(())
}

fn push_sample(out: &mut Vec<u8>, v: f32, dtype: PixelType) {
    match dtype {
        PixelType::UInt8 => out.push(v.clamp(0.0, u8::MAX as f32) as u8),
        PixelType::UInt16 => {
            out.extend_from_slice(&(v.clamp(0.0, u16::MAX as f32) as u16).to_le_bytes());
        }
        PixelType::UInt32 => {
            out.extend_from_slice(&(v.clamp(0.0, u32::MAX as f32) as u32).to_le_bytes());
        }
        PixelType::Int16 => {
            out.extend_from_slice(
                &(v.clamp(i16::MIN as f32, i16::MAX as f32) as i16).to_le_bytes(),
            );
        }
        PixelType::Int32 => {
            out.extend_from_slice(
                &(v.clamp(i32::MIN as f32, i32::MAX as f32) as i32).to_le_bytes(),
            );
        }
        PixelType::Float32 => out.extend_from_slice(&v.to_le_bytes()),
        PixelType::Float64 => out.extend_from_slice(&f64::from(v).to_le_bytes()),
    }
}

/// GeoKey directory layout:
/// `[version, revision, minor, nkeys, (keyid, location, count, value)...]`.
fn geokey_directory(code: u16) -> Vec<u16> {
    let is_geographic = projection::is_geographic(code);
    let mut keys = vec![1, 1, 0, 3];
    keys.extend_from_slice(&[
        GT_MODEL_TYPE_GEO_KEY,
        0,
        1,
        if is_geographic {
            MODEL_TYPE_GEOGRAPHIC
        } else {
            MODEL_TYPE_PROJECTED
        },
    ]);
    keys.extend_from_slice(&[GT_RASTER_TYPE_GEO_KEY, 0, 1, RASTER_PIXEL_IS_AREA]);
    if is_geographic {
        keys.extend_from_slice(&[GEOGRAPHIC_TYPE_GEO_KEY, 0, 1, code]);
    } else {
        keys.extend_from_slice(&[PROJECTED_CS_TYPE_GEO_KEY, 0, 1, code]);
    }
    keys
}

impl GeoImage {
    /// Write this image to a GeoTIFF; see [`to_geotiff`]. The CRS defaults
    /// to the image's own projection.
    pub fn geotiff<P: AsRef<Path>>(&self, path: P) -> Result<PathBuf> {
        to_geotiff(self, &GeoTiffOptions::path(path.as_ref()))
    }
}
