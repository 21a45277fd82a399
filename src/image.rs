//! Geo-referenced deferred images.
//!
//! A [`GeoImage`] is a [`DeferredArray`] paired with a geo-context: a
//! footprint geometry, a pixel transform, and an optional projection
//! identifier. Geometry-driven subsetting ([`GeoImage::aoi`],
//! [`GeoImage::subset`]) rewraps the window and translates the transform so
//! the new image still maps pixel `(0, 0)` to the right spot on the ground.
//! Warping ([`GeoImage::warp`]) builds a brand-new deferred array whose
//! tiles each resample the source on demand.

use ndarray::{Array1, Array2, Array3};
use std::sync::Arc;
use tracing::debug;

use crate::array::DeferredArray;
use crate::error::{RasterError, Result};
use crate::geometry::projection::{self, WGS84};
use crate::geometry::{BoundingBox, Geometry};
use crate::graph::{TaskGraph, TileKey};
use crate::meta::{MetaRecord, PixelType};
use crate::resample;
use crate::transform::{self, AffineTransform, PixelTransform};

/// Catalog metadata for the product an image was cut from. Tile indices and
/// sizes describe the provider's native tiling of the full-extent product.
#[derive(Debug, Clone)]
pub struct ProductMeta {
    pub image_id: String,
    pub tile_x_size: usize,
    pub tile_y_size: usize,
    pub num_bands: usize,
    /// Provider data-type tag, e.g. `"UNSIGNED_SHORT"`.
    pub data_type: String,
    pub min_tile_x: i64,
    pub min_tile_y: i64,
    /// Native ground sample distance in the product's CRS units.
    pub gsd: f64,
}

/// Hook back to the product catalog: warping needs the product's tiling
/// metadata and a full-extent view of the image the current window was cut
/// from.
pub trait ProductSource: Send + Sync {
    fn metadata(&self) -> &ProductMeta;

    /// Open the full-extent product image.
    fn open_full(&self) -> Result<GeoImage>;
}

/// The geo-referencing attached to an image window.
#[derive(Clone)]
pub struct GeoContext {
    pub geometry: Geometry,
    pub transform: Arc<dyn PixelTransform>,
    pub proj: Option<String>,
}

/// Geometry arguments for [`GeoImage::aoi`]. When several are set the first
/// in `bbox`, `wkt`, `geojson` order wins.
#[derive(Debug, Clone, Default)]
pub struct AoiParams {
    pub bbox: Option<[f64; 4]>,
    pub wkt: Option<String>,
    pub geojson: Option<serde_json::Value>,
    /// CRS the given geometry is expressed in; defaults to EPSG:4326.
    pub from_proj: Option<String>,
}

impl AoiParams {
    #[must_use]
    pub fn bbox(bounds: [f64; 4]) -> Self {
        Self {
            bbox: Some(bounds),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn wkt(wkt: impl Into<String>) -> Self {
        Self {
            wkt: Some(wkt.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn geojson(value: serde_json::Value) -> Self {
        Self {
            geojson: Some(value),
            ..Self::default()
        }
    }
}

/// Elevation input for warping: a constant height or a grid that gets
/// resized onto the warp's sample grid.
#[derive(Clone)]
pub enum Dem {
    Constant(f64),
    Grid(Arc<Array2<f64>>),
}

impl Default for Dem {
    fn default() -> Self {
        Dem::Constant(0.0)
    }
}

/// Settings for [`GeoImage::warp`] and [`GeoImage::warp_geometry`].
#[derive(Clone, Default)]
pub struct WarpParams {
    pub dem: Dem,
    /// Camera model overriding the image's own transform during resampling.
    pub rpcs: Option<Arc<dyn PixelTransform>>,
    /// Target CRS; tile footprints are reprojected into it before sampling.
    pub proj: Option<String>,
    /// Output ground sample distance; defaults to the product's native GSD.
    pub gsd: Option<f64>,
}

impl std::fmt::Debug for WarpParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WarpParams")
            .field("proj", &self.proj)
            .field("gsd", &self.gsd)
            .field("has_rpcs", &self.rpcs.is_some())
            .finish()
    }
}

/// A deferred array with a geo-context and a product hook.
#[derive(Clone)]
pub struct GeoImage {
    pub array: DeferredArray,
    geo: GeoContext,
    product: Arc<dyn ProductSource>,
}

impl GeoImage {
    #[must_use]
    pub fn new(array: DeferredArray, geo: GeoContext, product: Arc<dyn ProductSource>) -> Self {
        Self {
            array,
            geo,
            product,
        }
    }

    /// Promote a metadata record into an image carrying the given
    /// geo-context.
    pub fn from_record(
        record: &MetaRecord,
        geo: GeoContext,
        product: Arc<dyn ProductSource>,
    ) -> Result<Self> {
        Ok(Self {
            array: DeferredArray::create(record)?,
            geo,
            product,
        })
    }

    /// Footprint geometry of the current window.
    #[must_use]
    pub fn geometry(&self) -> &Geometry {
        &self.geo.geometry
    }

    /// Spatial bounding box of the current window.
    #[must_use]
    pub fn bounds(&self) -> BoundingBox {
        self.geo.geometry.bounds()
    }

    /// Affine decomposition of the pixel transform, if it has one.
    #[must_use]
    pub fn affine(&self) -> Option<AffineTransform> {
        self.geo.transform.affine()
    }

    #[must_use]
    pub fn transform(&self) -> &Arc<dyn PixelTransform> {
        &self.geo.transform
    }

    /// Projection identifier, e.g. `"EPSG:4326"`.
    #[must_use]
    pub fn proj(&self) -> Option<&str> {
        self.geo.proj.as_deref()
    }

    #[must_use]
    pub fn product(&self) -> &Arc<dyn ProductSource> {
        &self.product
    }

    #[must_use]
    pub fn shape(&self) -> Vec<usize> {
        self.array.shape()
    }

    #[must_use]
    pub fn dtype(&self) -> PixelType {
        self.array.dtype()
    }

    /// Materialize the window; see [`DeferredArray::read`].
    pub fn read(&self, bands: Option<&[usize]>) -> Result<Array3<f32>> {
        self.array.read(bands)
    }

    /// Band-subset rewrap preserving the geo-context.
    pub fn select_bands(&self, bands: &[usize]) -> Result<Self> {
        Ok(Self {
            array: self.array.select_bands(bands)?,
            geo: self.geo.clone(),
            product: Arc::clone(&self.product),
        })
    }

    /// Subset by the geometry the parameters describe; with no geometry
    /// given, the image is returned unchanged.
    pub fn aoi(&self, params: &AoiParams) -> Result<Self> {
        match self.parse_geoms(params)? {
            None => Ok(self.clone()),
            Some(g) => self.subset(&g),
        }
    }

    /// Resolve the aoi parameters to a geometry in the image's CRS.
    fn parse_geoms(&self, params: &AoiParams) -> Result<Option<Geometry>> {
        let g = if let Some(b) = params.bbox {
            Geometry::bbox(&BoundingBox::new(b[0], b[1], b[2], b[3]))
        } else if let Some(wkt) = &params.wkt {
            Geometry::from_wkt(wkt)?
        } else if let Some(gj) = &params.geojson {
            Geometry::from_geojson(gj)?
        } else {
            return Ok(None);
        };

        // Without a projection on the image the geometry is taken as given.
        match &self.geo.proj {
            None => Ok(Some(g)),
            Some(proj) => {
                let from = params.from_proj.as_deref().unwrap_or(WGS84);
                Ok(Some(projection::reproject(&g, from, proj)?))
            }
        }
    }

    /// Whether the geometry falls entirely within the image's pixel extent.
    pub fn contains(&self, geometry: &Geometry) -> Result<bool> {
        let pixel = geometry.map_coords(|x, y| self.geo.transform.rev(x, y, 0.0))?;
        Ok(self.pixel_bounds().contains(&pixel.bounds()))
    }

    /// Cut the window down to a geometry (already in the image's CRS).
    ///
    /// The geometry is mapped to fractional pixel space, its bounds snapped
    /// outward to whole pixels, and the array and transform rewrapped to the
    /// resulting window. Fails when the geometry is not fully contained.
    pub fn subset(&self, geometry: &Geometry) -> Result<Self> {
        let pixel = geometry.map_coords(|x, y| self.geo.transform.rev(x, y, 0.0))?;
        let pb = pixel.bounds();
        if !self.pixel_bounds().contains(&pb) {
            return Err(RasterError::Containment {
                geometry: geometry.bounds(),
                image: self.bounds(),
            });
        }

        let col0 = pb.minx.floor() as usize;
        let row0 = pb.miny.floor() as usize;
        let col1 = (pb.maxx.ceil() as usize).min(self.array.num_cols());
        let row1 = (pb.maxy.ceil() as usize).min(self.array.num_rows());
        debug!(rows = ?(row0..row1), cols = ?(col0..col1), "geometry subset");

        Ok(Self {
            array: self.array.slice(row0..row1, col0..col1)?,
            geo: GeoContext {
                geometry: geometry.clone(),
                transform: transform::shift(
                    Arc::clone(&self.geo.transform),
                    col0 as f64,
                    row0 as f64,
                ),
                proj: self.geo.proj.clone(),
            },
            product: Arc::clone(&self.product),
        })
    }

    /// Deferred warp of the whole window onto a north-up grid.
    ///
    /// A fresh task graph is built over the product's native tile layout;
    /// each tile task resamples its footprint via [`Self::warp_geometry`]
    /// against the full-extent product, so nothing is computed until the
    /// result is read.
    pub fn warp(&self, params: &WarpParams) -> Result<Self> {
        let im_full = self.product.open_full()?;
        let md = self.product.metadata().clone();
        let (x_size, y_size) = (md.tile_x_size, md.tile_y_size);

        let gsd = params.gsd.unwrap_or(md.gsd);
        let full_bounds = im_full.bounds();
        let gtf = AffineTransform::north_up(full_bounds.minx, full_bounds.maxy, gsd);

        // Window corners in the output grid's pixel space.
        let bounds = self.bounds();
        let ll = gtf.reverse(bounds.minx, bounds.miny)?;
        let ur = gtf.reverse(bounds.maxx, bounds.maxy)?;
        let x_chunks = ((ur.0 - ll.0) / x_size as f64) as usize + 1;
        let y_chunks = ((ll.1 - ur.1) / y_size as f64) as usize + 1;

        let dtype = PixelType::from_product_tag(&md.data_type).ok_or_else(|| {
            RasterError::InvalidMetadata(format!("unknown product data type '{}'", md.data_type))
        })?;

        debug!(
            image_id = md.image_id.as_str(),
            x_chunks, y_chunks, gsd, "building deferred warp graph"
        );

        let name = format!("warp-{}", md.image_id);
        let mut graph = TaskGraph::new(name.clone());
        for y in 0..y_chunks {
            for x in 0..x_chunks {
                let xmin = ll.0 + (x * x_size) as f64;
                let ymin = ur.1 + (y * y_size) as f64;
                let (gx0, gy0) = gtf.forward(xmin, ymin + y_size as f64);
                let (gx1, gy1) = gtf.forward(xmin + x_size as f64, ymin);
                let footprint = Geometry::bbox(&BoundingBox::from_corners(gx0, gy0, gx1, gy1));

                let tile_image = im_full.clone();
                let tile_params = WarpParams {
                    dem: params.dem.clone(),
                    rpcs: params.rpcs.clone(),
                    proj: params.proj.clone(),
                    gsd: Some(gsd),
                };
                graph.insert_fn(TileKey::new(0, y, x), move || {
                    tile_image.warp_geometry(&footprint, &tile_params, None, (2, 2))
                });
            }
        }

        let record = MetaRecord {
            graph,
            name,
            chunks: vec![md.num_bands, y_size, x_size],
            dtype,
            shape: vec![md.num_bands, y_chunks * y_size, x_chunks * x_size],
        };
        Self::from_record(&record, self.geo.clone(), Arc::clone(&self.product))
    }

    /// Eagerly resample the image over one geometry.
    ///
    /// The geometry's bounds are sampled at `gsd` spacing, each sample is
    /// mapped back to fractional source pixels through the transform (and
    /// elevation), a padded source window is read once, and every band is
    /// bilinearly resampled onto the grid. Output shape is
    /// `(bands, ny, nx)`.
    pub fn warp_geometry(
        &self,
        geometry: &Geometry,
        params: &WarpParams,
        gtf: Option<Arc<dyn PixelTransform>>,
        padsize: (usize, usize),
    ) -> Result<Array3<f32>> {
        let bounds = match &params.proj {
            Some(to) => {
                let from = self.geo.proj.as_deref().unwrap_or(WGS84);
                projection::reproject(geometry, from, to)?.bounds()
            }
            None => geometry.bounds(),
        };

        let gtf = gtf
            .or_else(|| params.rpcs.clone())
            .unwrap_or_else(|| Arc::clone(&self.geo.transform));
        let gsd = params
            .gsd
            .or_else(|| gtf.gsd())
            .unwrap_or(self.product.metadata().gsd);

        let nx = (bounds.width() / gsd) as usize;
        let ny = (bounds.height() / gsd) as usize;
        if nx == 0 || ny == 0 {
            return Err(RasterError::Geometry(format!(
                "geometry {bounds} produces an empty sample grid at gsd {gsd}"
            )));
        }

        let xs = Array1::linspace(bounds.minx, bounds.maxx, nx);
        let ys = Array1::linspace(bounds.maxy, bounds.miny, ny);

        let dem = match &params.dem {
            Dem::Constant(z) => Array2::from_elem((ny, nx), *z),
            Dem::Grid(grid) => resample::resize_bilinear(&grid.view(), (ny, nx)),
        };

        // Fractional source pixels for every output sample.
        let mut rows = Array2::zeros((ny, nx));
        let mut cols = Array2::zeros((ny, nx));
        for j in 0..ny {
            for i in 0..nx {
                let (col, row) = gtf.rev(xs[i], ys[j], dem[[j, i]])?;
                rows[[j, i]] = row;
                cols[[j, i]] = col;
            }
        }

        let (xpad, ypad) = padsize;
        let row_min = transform::pad_safe_min(&rows, ypad);
        let row_max = transform::pad_safe_max(&rows, ypad, self.array.num_rows());
        let col_min = transform::pad_safe_min(&cols, xpad);
        let col_max = transform::pad_safe_max(&cols, xpad, self.array.num_cols());
        if row_min >= row_max || col_min >= col_max {
            return Err(RasterError::Geometry(format!(
                "geometry {bounds} maps outside the image's pixel extent"
            )));
        }

        rows -= row_min as f64;
        cols -= col_min as f64;

        let data = self
            .array
            .slice(row_min..row_max, col_min..col_max)?
            .read(None)?;

        let nbands = data.dim().0;
        let mut out = Array3::zeros((nbands, ny, nx));
        for b in 0..nbands {
            let band = data.index_axis(ndarray::Axis(0), b);
            out.index_axis_mut(ndarray::Axis(0), b)
                .assign(&resample::warp_band(&band, &rows, &cols));
        }
        Ok(out)
    }

    /// Pixel extent of the current window as a bounding box.
    fn pixel_bounds(&self) -> BoundingBox {
        BoundingBox::new(
            0.0,
            0.0,
            self.array.num_cols() as f64,
            self.array.num_rows() as f64,
        )
    }
}

impl std::fmt::Debug for GeoImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeoImage")
            .field("shape", &self.shape())
            .field("bounds", &self.bounds())
            .field("proj", &self.geo.proj)
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use ndarray::Array3;

    /// Synthetic single-product fixture: a 32x32, north-up image at 1.0 GSD
    /// anchored at geo origin (0, 32), pixel value = row*1000 + col
    /// (+ band*100000), served by one full-extent chunk.
    pub(crate) struct TestProduct {
        meta: ProductMeta,
        proj: Option<String>,
    }

    pub(crate) const SIDE: usize = 32;

    impl TestProduct {
        pub(crate) fn new(num_bands: usize, proj: Option<&str>) -> Arc<Self> {
            Arc::new(Self {
                meta: ProductMeta {
                    image_id: "TEST123".to_string(),
                    tile_x_size: 16,
                    tile_y_size: 16,
                    num_bands,
                    data_type: "FLOAT".to_string(),
                    min_tile_x: 0,
                    min_tile_y: 0,
                    gsd: 1.0,
                },
                proj: proj.map(String::from),
            })
        }

        fn build_image(self: Arc<Self>) -> GeoImage {
            let nbands = self.meta.num_bands;
            let mut graph = TaskGraph::new("test-image");
            graph.insert_fn(TileKey::new(0, 0, 0), move || {
                Ok(Array3::from_shape_fn((nbands, SIDE, SIDE), |(b, r, c)| {
                    (b * 100_000 + r * 1000 + c) as f32
                }))
            });
            let record = MetaRecord {
                graph,
                name: "test-image".to_string(),
                chunks: vec![nbands, SIDE, SIDE],
                dtype: PixelType::Float32,
                shape: vec![nbands, SIDE, SIDE],
            };
            let geo = GeoContext {
                geometry: Geometry::bbox(&BoundingBox::new(0.0, 0.0, SIDE as f64, SIDE as f64)),
                transform: Arc::new(AffineTransform::north_up(0.0, SIDE as f64, 1.0)),
                proj: self.proj.clone(),
            };
            GeoImage::from_record(&record, geo, self as Arc<dyn ProductSource>).unwrap()
        }
    }

    impl ProductSource for TestProduct {
        fn metadata(&self) -> &ProductMeta {
            &self.meta
        }

        fn open_full(&self) -> Result<GeoImage> {
            // Rebuild the fixture product to avoid a self-referential Arc.
            let product = TestProduct {
                meta: self.meta.clone(),
                proj: self.proj.clone(),
            };
            Ok(Arc::new(product).build_image())
        }
    }

    pub(crate) fn test_image(num_bands: usize) -> GeoImage {
        TestProduct::new(num_bands, None).build_image()
    }

    #[test]
    fn test_bounds_and_affine() {
        let img = test_image(2);
        assert_eq!(img.bounds(), BoundingBox::new(0.0, 0.0, 32.0, 32.0));
        let affine = img.affine().unwrap();
        assert_eq!(affine.c, 0.0);
        assert_eq!(affine.f, 32.0);
        assert_eq!(img.shape(), vec![2, 32, 32]);
    }

    #[test]
    fn test_aoi_without_geometry_is_unchanged() {
        let img = test_image(1);
        let same = img.aoi(&AoiParams::default()).unwrap();
        assert_eq!(same.shape(), img.shape());
        assert_eq!(same.bounds(), img.bounds());
    }

    #[test]
    fn test_aoi_bbox_window() {
        let img = test_image(1);
        // Geo (4, 22, 12, 30) is rows 2..10, cols 4..12 under the fixture
        // transform.
        let sub = img.aoi(&AoiParams::bbox([4.0, 22.0, 12.0, 30.0])).unwrap();
        assert_eq!(sub.shape(), vec![1, 8, 8]);
        let data = sub.read(None).unwrap();
        assert_eq!(data[[0, 0, 0]], 2004.0);
    }

    #[test]
    fn test_aoi_bbox_takes_precedence_over_wkt() {
        let img = test_image(1);
        let params = AoiParams {
            bbox: Some([4.0, 22.0, 12.0, 30.0]),
            wkt: Some("POLYGON ((0 0, 16 0, 16 16, 0 16, 0 0))".to_string()),
            ..AoiParams::default()
        };
        let sub = img.aoi(&params).unwrap();
        assert_eq!(sub.shape(), vec![1, 8, 8]);
    }

    #[test]
    fn test_aoi_wkt_and_geojson() {
        let img = test_image(1);
        let wkt = img
            .aoi(&AoiParams::wkt("POLYGON ((0 16, 16 16, 16 32, 0 32, 0 16))"))
            .unwrap();
        assert_eq!(wkt.shape(), vec![1, 16, 16]);

        let gj = img
            .aoi(&AoiParams::geojson(serde_json::json!({
                "type": "Polygon",
                "coordinates": [[[0.0, 16.0], [16.0, 16.0], [16.0, 32.0], [0.0, 32.0], [0.0, 16.0]]]
            })))
            .unwrap();
        assert_eq!(gj.shape(), vec![1, 16, 16]);
    }

    #[test]
    fn test_aoi_reprojects_when_image_has_proj() {
        // Same-CRS reprojection is an identity pass through the CRS layer.
        let img = TestProduct::new(1, Some("EPSG:4326")).build_image();
        let sub = img
            .aoi(&AoiParams {
                bbox: Some([4.0, 22.0, 12.0, 30.0]),
                from_proj: Some("EPSG:4326".to_string()),
                ..AoiParams::default()
            })
            .unwrap();
        assert_eq!(sub.shape(), vec![1, 8, 8]);
    }

    #[test]
    fn test_subset_translates_transform() {
        let img = test_image(1);
        let sub = img.aoi(&AoiParams::bbox([4.0, 22.0, 12.0, 30.0])).unwrap();
        let affine = sub.affine().unwrap();
        assert_eq!(affine.c, 4.0);
        assert_eq!(affine.f, 30.0);

        // Subsetting the subset composes offsets through to the root.
        let inner = sub.aoi(&AoiParams::bbox([6.0, 24.0, 10.0, 28.0])).unwrap();
        let affine = inner.affine().unwrap();
        assert_eq!(affine.c, 6.0);
        assert_eq!(affine.f, 28.0);
        assert_eq!(inner.shape(), vec![1, 4, 4]);
        let data = inner.read(None).unwrap();
        assert_eq!(data[[0, 0, 0]], 4006.0);
    }

    #[test]
    fn test_subset_rejects_uncontained_geometry() {
        let img = test_image(1);
        match img.aoi(&AoiParams::bbox([-4.0, 0.0, 12.0, 30.0])) {
            Err(RasterError::Containment { image, .. }) => {
                assert_eq!(image, BoundingBox::new(0.0, 0.0, 32.0, 32.0));
            }
            other => panic!("expected containment error, got {other:?}"),
        }
    }

    #[test]
    fn test_contains() {
        let img = test_image(1);
        let inside = Geometry::bbox(&BoundingBox::new(1.0, 1.0, 5.0, 5.0));
        let outside = Geometry::bbox(&BoundingBox::new(30.0, 30.0, 40.0, 40.0));
        assert!(img.contains(&inside).unwrap());
        assert!(!img.contains(&outside).unwrap());
    }

    #[test]
    fn test_warp_builds_deferred_tile_grid() {
        let img = test_image(2);
        let warped = img.warp(&WarpParams::default()).unwrap();
        // 32 units of extent over 16-pixel tiles: truncate-plus-one gives a
        // 3x3 grid.
        assert_eq!(warped.shape(), vec![2, 48, 48]);
        assert_eq!(warped.array.graph().len(), 9);
        assert_eq!(warped.array.name(), "warp-TEST123");
        assert!(warped
            .array
            .graph()
            .get(&TileKey::new(0, 2, 2))
            .is_some());
    }

    #[test]
    fn test_warp_tile_resamples_source() {
        let img = test_image(1);
        let warped = img.warp(&WarpParams::default()).unwrap();
        // Reading one tile executes exactly that tile's resample task.
        let tile = warped.array.slice(0..16, 0..16).unwrap().read(None).unwrap();
        assert_eq!(tile.dim(), (1, 16, 16));
        // Tile (0, 0) covers geo (0, 16, 16, 32): its first sample sits on
        // source pixel (0, 0) and its last on source pixel (16, 16).
        assert_eq!(tile[[0, 0, 0]], 0.0);
        assert!((tile[[0, 15, 15]] - 16_016.0).abs() < 1e-3);
    }

    #[test]
    fn test_warp_geometry_respects_gsd() {
        let img = test_image(2);
        let footprint = Geometry::bbox(&BoundingBox::new(0.0, 16.0, 16.0, 32.0));
        let params = WarpParams {
            gsd: Some(2.0),
            ..WarpParams::default()
        };
        let out = img.warp_geometry(&footprint, &params, None, (2, 2)).unwrap();
        assert_eq!(out.dim(), (2, 8, 8));
    }

    #[test]
    fn test_warp_geometry_flat_dem_grid_matches_constant() {
        let img = test_image(1);
        let footprint = Geometry::bbox(&BoundingBox::new(2.0, 2.0, 14.0, 14.0));
        let constant = img
            .warp_geometry(&footprint, &WarpParams::default(), None, (2, 2))
            .unwrap();
        let grid = img
            .warp_geometry(
                &footprint,
                &WarpParams {
                    dem: Dem::Grid(Arc::new(Array2::zeros((4, 4)))),
                    ..WarpParams::default()
                },
                None,
                (2, 2),
            )
            .unwrap();
        assert_eq!(constant, grid);
    }

    #[test]
    fn test_warp_geometry_proj_applies_without_image_projection() {
        let img = test_image(1);
        let footprint = Geometry::bbox(&BoundingBox::new(0.0, 24.0, 8.0, 32.0));

        let baseline = img
            .warp_geometry(&footprint, &WarpParams::default(), None, (2, 2))
            .unwrap();
        assert_eq!(baseline.dim(), (1, 8, 8));

        // Reprojecting into the default WGS84 source CRS is an identity.
        let same = img
            .warp_geometry(
                &footprint,
                &WarpParams {
                    proj: Some("EPSG:4326".to_string()),
                    ..WarpParams::default()
                },
                None,
                (2, 2),
            )
            .unwrap();
        assert_eq!(same, baseline);

        // A metric target CRS takes effect even though the image itself
        // carries no projection: the meter-scale footprint lands far outside
        // the pixel extent instead of being silently sampled in place.
        let result = img.warp_geometry(
            &footprint,
            &WarpParams {
                proj: Some("EPSG:3857".to_string()),
                gsd: Some(2000.0),
                ..WarpParams::default()
            },
            None,
            (2, 2),
        );
        assert!(matches!(result, Err(RasterError::Geometry(_))));
    }

    #[test]
    fn test_warp_geometry_transform_resolution_order() {
        let img = test_image(1);
        let footprint = Geometry::bbox(&BoundingBox::new(8.0, 8.0, 24.0, 24.0));

        let baseline = img
            .warp_geometry(&footprint, &WarpParams::default(), None, (2, 2))
            .unwrap();
        // First sample sits at geo (8, 24): pixel (8, 8) under the image's
        // own transform.
        assert_eq!(baseline[[0, 0, 0]], 8008.0);

        // A camera model shifted four pixels overrides the image's own
        // transform.
        let camera = transform::shift(Arc::clone(img.transform()), 4.0, 4.0);
        let params = WarpParams {
            rpcs: Some(Arc::clone(&camera)),
            ..WarpParams::default()
        };
        let with_camera = img
            .warp_geometry(&footprint, &params, None, (2, 2))
            .unwrap();
        assert_eq!(with_camera[[0, 0, 0]], 4004.0);

        // An explicitly supplied transform wins over the camera model.
        let explicit = img
            .warp_geometry(&footprint, &params, Some(Arc::clone(img.transform())), (2, 2))
            .unwrap();
        assert_eq!(explicit, baseline);
    }

    #[test]
    fn test_warp_geometry_rejects_empty_grid() {
        let img = test_image(1);
        let sliver = Geometry::bbox(&BoundingBox::new(1.0, 1.0, 1.4, 10.0));
        assert!(matches!(
            img.warp_geometry(&sliver, &WarpParams::default(), None, (2, 2)),
            Err(RasterError::Geometry(_))
        ));
    }
}
