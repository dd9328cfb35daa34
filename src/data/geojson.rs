use crate::core::geo::{LatLng, LatLngBounds};
use crate::prelude::HashMap;
use crate::{MapError, Result};
use serde::{Deserialize, Serialize};

/// GeoJSON geometry, discriminated by the `type` member
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Geometry {
    Point {
        coordinates: [f64; 2],
    },
    LineString {
        coordinates: Vec<[f64; 2]>,
    },
    Polygon {
        coordinates: Vec<Vec<[f64; 2]>>,
    },
    MultiPoint {
        coordinates: Vec<[f64; 2]>,
    },
    MultiLineString {
        coordinates: Vec<Vec<[f64; 2]>>,
    },
    MultiPolygon {
        coordinates: Vec<Vec<Vec<[f64; 2]>>>,
    },
}

impl Geometry {
    /// Bounding box of the geometry, `None` when it has no coordinates
    pub fn bounds(&self) -> Option<LatLngBounds> {
        match self {
            Geometry::Point { coordinates } => {
                let point = LatLng::new(coordinates[1], coordinates[0]);
                Some(LatLngBounds::new(point, point))
            }
            Geometry::LineString { coordinates } | Geometry::MultiPoint { coordinates } => {
                Self::coords_bounds(coordinates)
            }
            Geometry::Polygon { coordinates } => {
                coordinates.first().and_then(|ring| Self::coords_bounds(ring))
            }
            Geometry::MultiLineString { coordinates } => {
                Self::merge_bounds(coordinates.iter().filter_map(|line| Self::coords_bounds(line)))
            }
            Geometry::MultiPolygon { coordinates } => Self::merge_bounds(
                coordinates
                    .iter()
                    .filter_map(|poly| poly.first())
                    .filter_map(|ring| Self::coords_bounds(ring)),
            ),
        }
    }

    /// Bounding-box center, used for label placement. Fails with a
    /// [`MapError::Geometry`] for degenerate geometries.
    pub fn bbox_center(&self) -> Result<LatLng> {
        self.bounds()
            .map(|b| b.center())
            .ok_or_else(|| MapError::Geometry("geometry has no coordinates".to_string()))
    }

    /// Whether the geometry contains a geographic point (polygons only;
    /// other types always report `false`)
    pub fn contains_point(&self, point: &LatLng) -> bool {
        match self {
            Geometry::Polygon { coordinates } => coordinates
                .first()
                .map(|ring| Self::point_in_ring(point, ring))
                .unwrap_or(false),
            Geometry::MultiPolygon { coordinates } => coordinates.iter().any(|poly| {
                poly.first()
                    .map(|ring| Self::point_in_ring(point, ring))
                    .unwrap_or(false)
            }),
            _ => false,
        }
    }

    fn coords_bounds(coordinates: &[[f64; 2]]) -> Option<LatLngBounds> {
        let first = coordinates.first()?;
        let mut bounds = LatLngBounds::new(
            LatLng::new(first[1], first[0]),
            LatLng::new(first[1], first[0]),
        );
        for coord in &coordinates[1..] {
            bounds.extend(&LatLng::new(coord[1], coord[0]));
        }
        Some(bounds)
    }

    fn merge_bounds(parts: impl Iterator<Item = LatLngBounds>) -> Option<LatLngBounds> {
        parts.reduce(|acc, b| acc.union(&b))
    }

    // Ray casting; ring coordinates are [lng, lat]
    fn point_in_ring(point: &LatLng, ring: &[[f64; 2]]) -> bool {
        let mut inside = false;
        let mut j = ring.len().saturating_sub(1);

        for i in 0..ring.len() {
            let (xi, yi) = (ring[i][0], ring[i][1]);
            let (xj, yj) = (ring[j][0], ring[j][1]);

            if ((yi > point.lat) != (yj > point.lat))
                && (point.lng < (xj - xi) * (point.lat - yi) / (yj - yi) + xi)
            {
                inside = !inside;
            }
            j = i;
        }

        inside
    }
}

/// GeoJSON feature with geometry and attribute record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<serde_json::Value>,
    pub geometry: Option<Geometry>,
    #[serde(default)]
    pub properties: Option<HashMap<String, serde_json::Value>>,
}

impl Feature {
    /// String value of a property, if present and non-null
    pub fn property_str(&self, key: &str) -> Option<String> {
        let value = self.properties.as_ref()?.get(key)?;
        match value {
            serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// Integer value of a property; accepts numbers and numeric strings
    pub fn property_i64(&self, key: &str) -> Option<i64> {
        let value = self.properties.as_ref()?.get(key)?;
        match value {
            serde_json::Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
            serde_json::Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Renders up to `max` attribute key/value pairs as popup text, one
    /// `key: value` row per line, keys sorted for stable output
    pub fn attribute_table(&self, max: usize) -> String {
        let Some(properties) = &self.properties else {
            return String::new();
        };

        let mut keys: Vec<&String> = properties.keys().collect();
        keys.sort();

        keys.iter()
            .take(max)
            .map(|key| {
                let value = match &properties[*key] {
                    serde_json::Value::Null => "-".to_string(),
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                format!("{}: {}", key, value)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// A collection of features; the shape returned by `f=geojson` queries
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureCollection {
    #[serde(default)]
    pub features: Vec<Feature>,
}

impl FeatureCollection {
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    /// Union of all feature bounds, `None` when no feature has geometry
    pub fn bounds(&self) -> Option<LatLngBounds> {
        self.features
            .iter()
            .filter_map(|f| f.geometry.as_ref())
            .filter_map(|g| g.bounds())
            .reduce(|acc, b| acc.union(&b))
    }
}

/// Root GeoJSON document, discriminated by the `type` member
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum GeoJson {
    Feature(Feature),
    FeatureCollection(FeatureCollection),
}

impl GeoJson {
    /// Parses a GeoJSON document from a raw JSON string
    pub fn from_str(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(|e| MapError::Parse(format!("invalid GeoJSON: {}", e)))
    }

    /// Flattens the document into a feature collection
    pub fn into_collection(self) -> FeatureCollection {
        match self {
            GeoJson::Feature(feature) => FeatureCollection {
                features: vec![feature],
            },
            GeoJson::FeatureCollection(collection) => collection,
        }
    }
}
