//! Geometry types and parsing.
//!
//! A small, self-contained geometry layer: bounding boxes, points, and
//! (multi)polygons, with bbox/WKT/GeoJSON parsing and coordinate mapping.
//! Containment tests are bounds-based, which is exact against the
//! axis-aligned pixel boxes the crate uses for image footprints.

pub mod projection;

use crate::error::{RasterError, Result};
use serde_json::{json, Value};

/// Axis-aligned bounding box `(minx, miny, maxx, maxy)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub minx: f64,
    pub miny: f64,
    pub maxx: f64,
    pub maxy: f64,
}

impl BoundingBox {
    #[must_use]
    pub fn new(minx: f64, miny: f64, maxx: f64, maxy: f64) -> Self {
        Self {
            minx,
            miny,
            maxx,
            maxy,
        }
    }

    /// Box spanning two arbitrary corner points.
    #[must_use]
    pub fn from_corners(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self {
            minx: x0.min(x1),
            miny: y0.min(y1),
            maxx: x0.max(x1),
            maxy: y0.max(y1),
        }
    }

    /// Smallest box covering a set of coordinates.
    pub fn from_coords<I: IntoIterator<Item = (f64, f64)>>(coords: I) -> Result<Self> {
        let mut iter = coords.into_iter();
        let (x0, y0) = iter
            .next()
            .ok_or_else(|| RasterError::Geometry("empty coordinate sequence".to_string()))?;
        let mut b = Self::new(x0, y0, x0, y0);
        for (x, y) in iter {
            b.minx = b.minx.min(x);
            b.miny = b.miny.min(y);
            b.maxx = b.maxx.max(x);
            b.maxy = b.maxy.max(y);
        }
        Ok(b)
    }

    #[must_use]
    pub fn width(&self) -> f64 {
        self.maxx - self.minx
    }

    #[must_use]
    pub fn height(&self) -> f64 {
        self.maxy - self.miny
    }

    /// True when `other` lies entirely within this box.
    #[must_use]
    pub fn contains(&self, other: &BoundingBox) -> bool {
        other.minx >= self.minx
            && other.miny >= self.miny
            && other.maxx <= self.maxx
            && other.maxy <= self.maxy
    }
}

impl std::fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "({}, {}, {}, {})",
            self.minx, self.miny, self.maxx, self.maxy
        )
    }
}

/// A linear ring of `(x, y)` coordinates.
pub type Ring = Vec<(f64, f64)>;

/// A polygon: one exterior ring plus interior holes.
#[derive(Debug, Clone, PartialEq)]
pub struct Polygon {
    pub exterior: Ring,
    pub interiors: Vec<Ring>,
}

impl Polygon {
    fn coords(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.exterior
            .iter()
            .chain(self.interiors.iter().flatten())
            .copied()
    }
}

/// A geometry usable for subsetting and warping.
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    Point((f64, f64)),
    Polygon(Polygon),
    MultiPolygon(Vec<Polygon>),
}

impl Geometry {
    /// Rectangle polygon covering a bounding box (closed exterior ring,
    /// counter-clockwise).
    #[must_use]
    pub fn bbox(b: &BoundingBox) -> Self {
        Geometry::Polygon(Polygon {
            exterior: vec![
                (b.minx, b.miny),
                (b.maxx, b.miny),
                (b.maxx, b.maxy),
                (b.minx, b.maxy),
                (b.minx, b.miny),
            ],
            interiors: Vec::new(),
        })
    }

    /// Bounds of all coordinates in the geometry.
    #[must_use]
    pub fn bounds(&self) -> BoundingBox {
        match self {
            Geometry::Point((x, y)) => BoundingBox::new(*x, *y, *x, *y),
            Geometry::Polygon(p) => BoundingBox::from_coords(p.coords())
                .unwrap_or(BoundingBox::new(0.0, 0.0, 0.0, 0.0)),
            Geometry::MultiPolygon(parts) => {
                BoundingBox::from_coords(parts.iter().flat_map(Polygon::coords))
                    .unwrap_or(BoundingBox::new(0.0, 0.0, 0.0, 0.0))
            }
        }
    }

    /// Apply a fallible coordinate mapping to every vertex.
    pub fn map_coords<F>(&self, mut f: F) -> Result<Geometry>
    where
        F: FnMut(f64, f64) -> Result<(f64, f64)>,
    {
        fn map_ring<F>(ring: &Ring, f: &mut F) -> Result<Ring>
        where
            F: FnMut(f64, f64) -> Result<(f64, f64)>,
        {
            ring.iter().map(|&(x, y)| f(x, y)).collect()
        }

        fn map_polygon<F>(p: &Polygon, f: &mut F) -> Result<Polygon>
        where
            F: FnMut(f64, f64) -> Result<(f64, f64)>,
        {
            Ok(Polygon {
                exterior: map_ring(&p.exterior, f)?,
                interiors: p
                    .interiors
                    .iter()
                    .map(|r| map_ring(r, f))
                    .collect::<Result<_>>()?,
            })
        }

        match self {
            Geometry::Point((x, y)) => Ok(Geometry::Point(f(*x, *y)?)),
            Geometry::Polygon(p) => Ok(Geometry::Polygon(map_polygon(p, &mut f)?)),
            Geometry::MultiPolygon(parts) => Ok(Geometry::MultiPolygon(
                parts
                    .iter()
                    .map(|p| map_polygon(p, &mut f))
                    .collect::<Result<_>>()?,
            )),
        }
    }

    /// Parse a WKT string (`POINT`, `POLYGON`, `MULTIPOLYGON`).
    pub fn from_wkt(wkt: &str) -> Result<Geometry> {
        wkt::parse(wkt)
    }

    /// Parse a GeoJSON geometry (or a Feature wrapping one).
    pub fn from_geojson(value: &Value) -> Result<Geometry> {
        geojson::parse(value)
    }

    /// GeoJSON mapping of the geometry.
    #[must_use]
    pub fn to_geojson(&self) -> Value {
        fn ring_json(ring: &Ring) -> Value {
            Value::Array(ring.iter().map(|&(x, y)| json!([x, y])).collect())
        }
        fn polygon_json(p: &Polygon) -> Value {
            let mut rings = vec![ring_json(&p.exterior)];
            rings.extend(p.interiors.iter().map(ring_json));
            Value::Array(rings)
        }

        match self {
            Geometry::Point((x, y)) => json!({"type": "Point", "coordinates": [x, y]}),
            Geometry::Polygon(p) => json!({"type": "Polygon", "coordinates": polygon_json(p)}),
            Geometry::MultiPolygon(parts) => json!({
                "type": "MultiPolygon",
                "coordinates": Value::Array(parts.iter().map(polygon_json).collect()),
            }),
        }
    }
}

mod wkt {
    use super::{Geometry, Polygon, Ring};
    use crate::error::{RasterError, Result};

    fn err(msg: impl Into<String>) -> RasterError {
        RasterError::Geometry(format!("invalid WKT: {}", msg.into()))
    }

    pub fn parse(wkt: &str) -> Result<Geometry> {
        let s = wkt.trim();
        let upper = s.to_ascii_uppercase();
        if let Some(rest) = upper.strip_prefix("MULTIPOLYGON") {
            let body = body_of(s, s.len() - rest.len())?;
            Ok(Geometry::MultiPolygon(parse_polygons(body)?))
        } else if let Some(rest) = upper.strip_prefix("POLYGON") {
            let body = body_of(s, s.len() - rest.len())?;
            Ok(Geometry::Polygon(parse_polygon(body)?))
        } else if let Some(rest) = upper.strip_prefix("POINT") {
            let body = body_of(s, s.len() - rest.len())?;
            let coords = parse_coord_list(body)?;
            match coords.as_slice() {
                [xy] => Ok(Geometry::Point(*xy)),
                _ => Err(err("POINT must have exactly one coordinate")),
            }
        } else {
            Err(err(format!("unsupported geometry type in '{s}'")))
        }
    }

    /// Strip the outermost parentheses after the geometry tag.
    fn body_of(s: &str, tag_len: usize) -> Result<&str> {
        let rest = s[tag_len..].trim();
        let rest = rest
            .strip_prefix('(')
            .ok_or_else(|| err("expected '('"))?
            .strip_suffix(')')
            .ok_or_else(|| err("expected ')'"))?;
        Ok(rest.trim())
    }

    /// Split a parenthesized list at top level: `"(a), (b)"` -> `["a", "b"]`.
    fn split_groups(s: &str) -> Result<Vec<&str>> {
        let mut groups = Vec::new();
        let mut depth = 0usize;
        let mut start = None;
        for (i, ch) in s.char_indices() {
            match ch {
                '(' => {
                    if depth == 0 {
                        start = Some(i + 1);
                    }
                    depth += 1;
                }
                ')' => {
                    depth = depth.checked_sub(1).ok_or_else(|| err("unbalanced ')'"))?;
                    if depth == 0 {
                        let s0 = start.take().ok_or_else(|| err("unbalanced '('"))?;
                        groups.push(s[s0..i].trim());
                    }
                }
                _ => {}
            }
        }
        if depth != 0 {
            return Err(err("unbalanced parentheses"));
        }
        Ok(groups)
    }

    fn parse_coord_list(s: &str) -> Result<Ring> {
        s.split(',')
            .map(|pair| {
                let mut nums = pair.split_whitespace().map(|t| {
                    t.parse::<f64>()
                        .map_err(|_| err(format!("bad number '{t}'")))
                });
                let x = nums.next().ok_or_else(|| err("missing x"))??;
                let y = nums.next().ok_or_else(|| err("missing y"))??;
                Ok((x, y))
            })
            .collect()
    }

    fn parse_polygon(body: &str) -> Result<Polygon> {
        let rings: Vec<Ring> = split_groups(body)?
            .into_iter()
            .map(parse_coord_list)
            .collect::<Result<_>>()?;
        let mut iter = rings.into_iter();
        let exterior = iter
            .next()
            .ok_or_else(|| err("POLYGON needs an exterior ring"))?;
        Ok(Polygon {
            exterior,
            interiors: iter.collect(),
        })
    }

    fn parse_polygons(body: &str) -> Result<Vec<Polygon>> {
        split_groups(body)?.into_iter().map(parse_polygon).collect()
    }
}

mod geojson {
    use super::{Geometry, Polygon, Ring};
    use crate::error::{RasterError, Result};
    use serde_json::Value;

    fn err(msg: impl Into<String>) -> RasterError {
        RasterError::Geometry(format!("invalid GeoJSON: {}", msg.into()))
    }

    pub fn parse(value: &Value) -> Result<Geometry> {
        let obj = value.as_object().ok_or_else(|| err("not an object"))?;
        if obj.get("type").and_then(Value::as_str) == Some("Feature") {
            let geom = obj
                .get("geometry")
                .ok_or_else(|| err("Feature without geometry"))?;
            return parse(geom);
        }
        let ty = obj
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| err("missing 'type'"))?;
        let coords = obj
            .get("coordinates")
            .ok_or_else(|| err("missing 'coordinates'"))?;
        match ty {
            "Point" => Ok(Geometry::Point(position(coords)?)),
            "Polygon" => Ok(Geometry::Polygon(polygon(coords)?)),
            "MultiPolygon" => {
                let parts = coords
                    .as_array()
                    .ok_or_else(|| err("MultiPolygon coordinates must be an array"))?
                    .iter()
                    .map(polygon)
                    .collect::<Result<_>>()?;
                Ok(Geometry::MultiPolygon(parts))
            }
            other => Err(err(format!("unsupported geometry type '{other}'"))),
        }
    }

    fn position(v: &Value) -> Result<(f64, f64)> {
        let arr = v
            .as_array()
            .ok_or_else(|| err("position must be an array"))?;
        match arr.as_slice() {
            [x, y, ..] => Ok((
                x.as_f64().ok_or_else(|| err("non-numeric x"))?,
                y.as_f64().ok_or_else(|| err("non-numeric y"))?,
            )),
            _ => Err(err("position needs two numbers")),
        }
    }

    fn ring(v: &Value) -> Result<Ring> {
        v.as_array()
            .ok_or_else(|| err("ring must be an array"))?
            .iter()
            .map(position)
            .collect()
    }

    fn polygon(v: &Value) -> Result<Polygon> {
        let rings: Vec<Ring> = v
            .as_array()
            .ok_or_else(|| err("polygon coordinates must be an array"))?
            .iter()
            .map(ring)
            .collect::<Result<_>>()?;
        let mut iter = rings.into_iter();
        let exterior = iter
            .next()
            .ok_or_else(|| err("polygon needs an exterior ring"))?;
        Ok(Polygon {
            exterior,
            interiors: iter.collect(),
        })
    }
}
