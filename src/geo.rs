//! World geometry for the choropleth map.

use std::collections::BTreeSet;
use std::f64::consts::PI;
use std::fmt::Write as _;
use std::path::Path;

use geojson::{GeoJson, Value};

use crate::aggregate::Snapshot;

pub const MAP_WIDTH: f64 = 1000.0;
pub const MAP_HEIGHT: f64 = 700.0;

/// Latitude is clipped here before projecting; Mercator diverges at the
/// poles.
const MAX_LATITUDE: f64 = 85.0;

#[derive(Debug, thiserror::Error)]
pub enum GeometryError {
    #[error("could not read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{path} is not valid GeoJSON: {source}")]
    Parse {
        path: String,
        #[source]
        source: Box<geojson::Error>,
    },

    #[error("{0} is not a FeatureCollection")]
    NotACollection(String),
}

/// Mercator projection onto the map canvas.
#[derive(Debug, Clone, Copy)]
pub struct Mercator {
    pub scale: f64,
    pub center_lon: f64,
    pub center_lat: f64,
    pub translate: (f64, f64),
}

impl Default for Mercator {
    fn default() -> Self {
        Self {
            scale: 180.0,
            center_lon: 0.0,
            center_lat: 15.0,
            translate: (MAP_WIDTH / 2.0, MAP_HEIGHT / 2.0),
        }
    }
}

impl Mercator {
    fn mercator_y(lat: f64) -> f64 {
        let lat = lat.clamp(-MAX_LATITUDE, MAX_LATITUDE).to_radians();
        (PI / 4.0 + lat / 2.0).tan().ln()
    }

    /// Project (lon, lat) in degrees to canvas coordinates.
    pub fn project(&self, lon: f64, lat: f64) -> (f64, f64) {
        let x = (lon - self.center_lon).to_radians();
        let y = Self::mercator_y(lat) - Self::mercator_y(self.center_lat);
        (
            self.translate.0 + self.scale * x,
            self.translate.1 - self.scale * y,
        )
    }
}

/// One named country outline, already projected to an SVG path.
#[derive(Debug, Clone, PartialEq)]
pub struct MapFeature {
    pub name: String,
    pub path: String,
}

#[derive(Debug, Clone, Default)]
pub struct Geometry {
    pub features: Vec<MapFeature>,
}

impl Geometry {
    pub fn load(path: &Path) -> Result<Self, GeometryError> {
        let name = path.display().to_string();
        let content = std::fs::read_to_string(path).map_err(|source| GeometryError::Read {
            path: name.clone(),
            source,
        })?;
        Self::parse(&name, &content)
    }

    pub fn parse(name: &str, content: &str) -> Result<Self, GeometryError> {
        let geojson: GeoJson = content.parse().map_err(|source| GeometryError::Parse {
            path: name.to_string(),
            source: Box::new(source),
        })?;
        let GeoJson::FeatureCollection(fc) = geojson else {
            return Err(GeometryError::NotACollection(name.to_string()));
        };

        let projection = Mercator::default();
        let features = fc
            .features
            .into_iter()
            .filter_map(|feature| {
                let name = feature
                    .properties
                    .as_ref()
                    .and_then(|p| p.get("name"))
                    .and_then(|v| v.as_str())?
                    .to_string();
                let path = svg_path(&feature.geometry?.value, &projection)?;
                Some(MapFeature { name, path })
            })
            .collect();
        Ok(Self { features })
    }

    /// Countries present in `snapshot` that no feature is named after. They
    /// never show up on the map.
    pub fn unmatched(&self, snapshot: &Snapshot) -> Vec<String> {
        let names: BTreeSet<&str> = self.features.iter().map(|f| f.name.as_str()).collect();
        snapshot
            .keys()
            .filter(|name| !names.contains(name.as_str()))
            .cloned()
            .collect()
    }
}

fn svg_path(value: &Value, projection: &Mercator) -> Option<String> {
    let polygons: Vec<&Vec<Vec<Vec<f64>>>> = match value {
        Value::Polygon(rings) => vec![rings],
        Value::MultiPolygon(polygons) => polygons.iter().collect(),
        _ => return None,
    };

    let mut d = String::new();
    for ring in polygons.into_iter().flatten() {
        let mut points = ring.iter().filter(|c| c.len() >= 2);
        let Some(first) = points.next() else {
            continue;
        };
        let (x, y) = projection.project(first[0], first[1]);
        let _ = write!(d, "M{x:.1},{y:.1}");
        for c in points {
            let (x, y) = projection.project(c[0], c[1]);
            let _ = write!(d, "L{x:.1},{y:.1}");
        }
        d.push('Z');
    }
    (!d.is_empty()).then_some(d)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::latest_by_country;
    use crate::record::record;

    const WORLD: &str = r#"
    {
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "properties": {"name": "Squareland"},
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[0, 15], [10, 15], [10, 25], [0, 25], [0, 15]]]
                }
            },
            {
                "type": "Feature",
                "properties": {"name": "Islands"},
                "geometry": {
                    "type": "MultiPolygon",
                    "coordinates": [
                        [[[-20, 0], [-19, 0], [-19, 1], [-20, 0]]],
                        [[[-30, 0], [-29, 0], [-29, 1], [-30, 0]]]
                    ]
                }
            },
            {
                "type": "Feature",
                "properties": {"name": "Pin"},
                "geometry": {"type": "Point", "coordinates": [1, 1]}
            },
            {
                "type": "Feature",
                "properties": {},
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[0, 0], [1, 0], [1, 1], [0, 0]]]
                }
            }
        ]
    }
    "#;

    #[test]
    fn center_projects_to_canvas_middle() {
        let (x, y) = Mercator::default().project(0.0, 15.0);
        assert!((x - 500.0).abs() < 1e-9);
        assert!((y - 350.0).abs() < 1e-9);

        let (east, north) = Mercator::default().project(10.0, 25.0);
        assert!(east > 500.0);
        assert!(north < 350.0);
    }

    #[test]
    fn keeps_named_polygons_only() {
        let geometry = Geometry::parse("world", WORLD).unwrap();
        let names: Vec<&str> = geometry.features.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["Squareland", "Islands"]);

        let square = &geometry.features[0].path;
        assert!(square.starts_with("M500.0,350.0L"));
        assert!(square.ends_with('Z'));
        assert_eq!(geometry.features[1].path.matches('M').count(), 2);
    }

    #[test]
    fn reports_names_without_geometry() {
        let geometry = Geometry::parse("world", WORLD).unwrap();
        let snapshot = latest_by_country(&[
            record("Squareland", 1, "2024-01-01"),
            record("Squareland Republic", 1, "2024-01-01"),
        ]);
        assert_eq!(geometry.unmatched(&snapshot), vec!["Squareland Republic"]);
    }

    #[test]
    fn rejects_bare_geometry() {
        let err = Geometry::parse("point", r#"{"type": "Point", "coordinates": [0, 0]}"#);
        assert!(matches!(err, Err(GeometryError::NotACollection(_))));
    }
}
