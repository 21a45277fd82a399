//! Coordinate reference system handling (pure Rust, proj4rs + crs-definitions).
//!
//! Projections are identified by `"EPSG:nnnn"` strings throughout the crate;
//! this module resolves them against the crs-definitions database and drives
//! proj4rs transforms, including the radian/degree conventions for
//! geographic CRS.

use proj4rs::proj::Proj;
use proj4rs::transform::transform;

use super::Geometry;
use crate::error::{RasterError, Result};

/// Default source projection for caller-supplied geometries.
pub const WGS84: &str = "EPSG:4326";

/// Parse an `"EPSG:nnnn"` identifier (a bare numeric code is accepted too).
pub fn epsg_code(proj: &str) -> Result<u16> {
    let digits = proj
        .trim()
        .strip_prefix("EPSG:")
        .or_else(|| proj.trim().strip_prefix("epsg:"))
        .unwrap_or_else(|| proj.trim());
    digits.parse::<u16>().map_err(|_| {
        RasterError::Projection(format!("cannot parse projection identifier '{proj}'"))
    })
}

/// PROJ4 definition string for an EPSG code.
pub fn proj_string(code: u16) -> Result<&'static str> {
    crs_definitions::from_code(code)
        .map(|def| def.proj4)
        .ok_or_else(|| {
            RasterError::Projection(format!(
                "EPSG:{code} is not in the crs-definitions database"
            ))
        })
}

/// Whether an EPSG code is a geographic (lon/lat, degrees) CRS.
#[must_use]
pub fn is_geographic(code: u16) -> bool {
    match crs_definitions::from_code(code) {
        Some(def) => def.proj4.contains("+proj=longlat"),
        // 4000-4999 is the geographic range; a safe guess for unknown codes.
        None => code == 4326 || (4000..5000).contains(&code),
    }
}

/// A prepared transform between two projection identifiers.
pub struct Reprojection {
    source: Proj,
    target: Proj,
    source_is_geographic: bool,
    target_is_geographic: bool,
    identity: bool,
}

impl Reprojection {
    pub fn new(from_proj: &str, to_proj: &str) -> Result<Self> {
        let from_code = epsg_code(from_proj)?;
        let to_code = epsg_code(to_proj)?;

        let source = Proj::from_proj_string(proj_string(from_code)?).map_err(|e| {
            RasterError::Projection(format!("invalid source projection {from_proj}: {e:?}"))
        })?;
        let target = Proj::from_proj_string(proj_string(to_code)?).map_err(|e| {
            RasterError::Projection(format!("invalid target projection {to_proj}: {e:?}"))
        })?;

        Ok(Self {
            source,
            target,
            source_is_geographic: is_geographic(from_code),
            target_is_geographic: is_geographic(to_code),
            identity: from_code == to_code,
        })
    }

    /// Transform one coordinate pair.
    pub fn apply(&self, x: f64, y: f64) -> Result<(f64, f64)> {
        if self.identity {
            return Ok((x, y));
        }

        // proj4rs exchanges radians for geographic CRS.
        let (x_in, y_in) = if self.source_is_geographic {
            (x.to_radians(), y.to_radians())
        } else {
            (x, y)
        };

        let mut point = (x_in, y_in, 0.0);
        transform(&self.source, &self.target, &mut point)
            .map_err(|e| RasterError::Projection(format!("transform failed: {e:?}")))?;

        if self.target_is_geographic {
            Ok((point.0.to_degrees(), point.1.to_degrees()))
        } else {
            Ok((point.0, point.1))
        }
    }
}

/// Transform one point between projection identifiers.
pub fn project_point(from_proj: &str, to_proj: &str, x: f64, y: f64) -> Result<(f64, f64)> {
    Reprojection::new(from_proj, to_proj)?.apply(x, y)
}

/// Reproject every coordinate of a geometry.
pub fn reproject(geometry: &Geometry, from_proj: &str, to_proj: &str) -> Result<Geometry> {
    if epsg_code(from_proj)? == epsg_code(to_proj)? {
        return Ok(geometry.clone());
    }
    let tfm = Reprojection::new(from_proj, to_proj)?;
    geometry.map_coords(|x, y| tfm.apply(x, y))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::BoundingBox;

    const EPS: f64 = 1e-6;

    #[test]
    fn test_epsg_code_parsing() {
        assert_eq!(epsg_code("EPSG:4326").unwrap(), 4326);
        assert_eq!(epsg_code("epsg:3857").unwrap(), 3857);
        assert_eq!(epsg_code("32633").unwrap(), 32633);
        assert!(epsg_code("UTM33N").is_err());
    }

    #[test]
    fn test_same_crs_is_identity() {
        let (x, y) = project_point("EPSG:4326", "EPSG:4326", 10.0, 51.5).unwrap();
        assert!((x - 10.0).abs() < EPS);
        assert!((y - 51.5).abs() < EPS);
    }

    #[test]
    fn test_4326_to_3857_origin() {
        let (x, y) = project_point("EPSG:4326", "EPSG:3857", 0.0, 0.0).unwrap();
        assert!(x.abs() < EPS);
        assert!(y.abs() < EPS);
    }

    #[test]
    fn test_roundtrip_utm() {
        let (lon, lat) = (15.0, 52.0);
        let (x, y) = project_point("EPSG:4326", "EPSG:32633", lon, lat).unwrap();
        // UTM easting near zone center is ~500km; northing in millions of meters.
        assert!(x > 400_000.0 && x < 600_000.0, "easting {x}");
        assert!(y > 5_000_000.0 && y < 6_000_000.0, "northing {y}");

        let (lon2, lat2) = project_point("EPSG:32633", "EPSG:4326", x, y).unwrap();
        assert!((lon - lon2).abs() < 1e-5);
        assert!((lat - lat2).abs() < 1e-5);
    }

    #[test]
    fn test_is_geographic() {
        assert!(is_geographic(4326));
        assert!(!is_geographic(3857));
        assert!(!is_geographic(32633));
    }

    #[test]
    fn test_unknown_code_fails() {
        assert!(project_point("EPSG:4326", "EPSG:65000", 0.0, 0.0).is_err());
    }

    #[test]
    fn test_reproject_geometry_bounds() {
        let g = Geometry::bbox(&BoundingBox::new(14.9, 51.9, 15.1, 52.1));
        let utm = reproject(&g, "EPSG:4326", "EPSG:32633").unwrap();
        let b = utm.bounds();
        assert!(b.minx > 400_000.0 && b.maxx < 600_000.0);
        assert!(b.miny > 5_000_000.0 && b.maxy < 6_000_000.0);
    }
}
