use crate::{
    core::geo::{LatLng, LatLngBounds},
    data::geojson::{Feature, FeatureCollection, Geometry},
    layers::base::{LayerProperties, LayerTrait, LayerType},
};

use serde::{Deserialize, Serialize};

/// RGBA color
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }
}

/// Style for point features
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointStyle {
    pub fill_color: Color,
    pub stroke_color: Color,
    pub stroke_width: f32,
    pub radius: f32,
    pub opacity: f32,
}

impl Default for PointStyle {
    fn default() -> Self {
        Self {
            fill_color: Color::rgb(255, 0, 0),
            stroke_color: Color::rgb(255, 255, 255),
            stroke_width: 2.0,
            radius: 5.0,
            opacity: 1.0,
        }
    }
}

/// Style for line features
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineStyle {
    pub color: Color,
    pub width: f32,
    pub opacity: f32,
}

impl Default for LineStyle {
    fn default() -> Self {
        Self {
            color: Color::rgb(0, 0, 255),
            width: 2.0,
            opacity: 1.0,
        }
    }
}

/// Style for polygon features
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolygonStyle {
    pub fill_color: Color,
    pub stroke_color: Color,
    pub stroke_width: f32,
    pub fill_opacity: f32,
    pub stroke_opacity: f32,
}

impl Default for PolygonStyle {
    fn default() -> Self {
        Self {
            fill_color: Color::new(51, 136, 255, 100),
            stroke_color: Color::rgb(51, 136, 255),
            stroke_width: 2.0,
            fill_opacity: 0.2,
            stroke_opacity: 1.0,
        }
    }
}

impl PolygonStyle {
    /// Style for parcel polygons rendered by the viewport labeler
    pub fn parcel() -> Self {
        Self {
            fill_color: Color::new(255, 165, 0, 60),
            stroke_color: Color::rgb(230, 120, 0),
            stroke_width: 1.5,
            fill_opacity: 0.15,
            stroke_opacity: 0.9,
        }
    }

    /// Style for the search-highlight layer
    pub fn highlight() -> Self {
        Self {
            fill_color: Color::new(255, 0, 0, 80),
            stroke_color: Color::rgb(200, 0, 0),
            stroke_width: 3.0,
            fill_opacity: 0.3,
            stroke_opacity: 1.0,
        }
    }
}

/// A rendered feature: geometry, stable key, and optional popup text
#[derive(Debug, Clone)]
pub struct VectorFeature {
    pub key: String,
    pub geometry: Geometry,
    pub popup: Option<String>,
}

/// Vector layer for displaying styled geometric features
pub struct VectorLayer {
    properties: LayerProperties,
    style: PolygonStyle,
    features: Vec<VectorFeature>,
}

impl VectorLayer {
    pub fn new(id: String, name: String, style: PolygonStyle) -> Self {
        Self {
            properties: LayerProperties::new(id, name, LayerType::Vector),
            style,
            features: Vec::new(),
        }
    }

    /// Builds a layer from a feature collection. Features without geometry
    /// are skipped; each feature gets a popup of up to `popup_max`
    /// attribute rows and a generated positional key.
    pub fn from_collection(
        id: String,
        name: String,
        collection: &FeatureCollection,
        style: PolygonStyle,
        popup_max: usize,
    ) -> Self {
        let mut layer = Self::new(id, name, style);
        for (index, feature) in collection.features.iter().enumerate() {
            layer.push_feature(format!("{}-{}", layer.properties.id, index), feature, popup_max);
        }
        layer
    }

    /// Adds one GeoJSON feature under an explicit key
    pub fn push_feature(&mut self, key: String, feature: &Feature, popup_max: usize) {
        let Some(geometry) = feature.geometry.clone() else {
            return;
        };
        let table = feature.attribute_table(popup_max);
        self.features.push(VectorFeature {
            key,
            geometry,
            popup: (!table.is_empty()).then_some(table),
        });
    }

    pub fn features(&self) -> &[VectorFeature] {
        &self.features
    }

    pub fn feature_count(&self) -> usize {
        self.features.len()
    }

    pub fn style(&self) -> &PolygonStyle {
        &self.style
    }

    /// Features whose geometry contains the given point
    pub fn features_at(&self, point: &LatLng) -> Vec<&VectorFeature> {
        self.features
            .iter()
            .filter(|f| f.geometry.contains_point(point))
            .collect()
    }

    fn layer_bounds(&self) -> Option<LatLngBounds> {
        self.features
            .iter()
            .filter_map(|f| f.geometry.bounds())
            .reduce(|acc, b| acc.union(&b))
    }
}

impl LayerTrait for VectorLayer {
    crate::impl_layer_trait!(VectorLayer, properties);

    fn bounds(&self) -> Option<LatLngBounds> {
        self.layer_bounds()
    }

    fn options(&self) -> serde_json::Value {
        serde_json::json!({
            "feature_count": self.features.len(),
            "style": self.style,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::geojson::GeoJson;

    fn sample_collection() -> FeatureCollection {
        GeoJson::from_str(
            r#"
            {
                "type": "FeatureCollection",
                "features": [
                    {
                        "type": "Feature",
                        "properties": {"NroPadron": 1},
                        "geometry": {
                            "type": "Polygon",
                            "coordinates": [[[-56.2, -34.9], [-56.1, -34.9], [-56.1, -34.8], [-56.2, -34.9]]]
                        }
                    },
                    {
                        "type": "Feature",
                        "properties": {"NroPadron": 2},
                        "geometry": null
                    }
                ]
            }
            "#,
        )
        .unwrap()
        .into_collection()
    }

    #[test]
    fn test_from_collection_skips_missing_geometry() {
        let layer = VectorLayer::from_collection(
            "parcels".to_string(),
            "Padrones".to_string(),
            &sample_collection(),
            PolygonStyle::parcel(),
            20,
        );

        assert_eq!(layer.feature_count(), 1);
        assert_eq!(layer.features()[0].key, "parcels-0");
        assert!(layer.features()[0]
            .popup
            .as_deref()
            .unwrap()
            .contains("NroPadron: 1"));
    }

    #[test]
    fn test_bounds() {
        let layer = VectorLayer::from_collection(
            "parcels".to_string(),
            "Padrones".to_string(),
            &sample_collection(),
            PolygonStyle::default(),
            20,
        );

        let bounds = layer.bounds().unwrap();
        assert_eq!(bounds.south_west.lng, -56.2);
        assert_eq!(bounds.north_east.lat, -34.8);
    }

    #[test]
    fn test_features_at() {
        let layer = VectorLayer::from_collection(
            "parcels".to_string(),
            "Padrones".to_string(),
            &sample_collection(),
            PolygonStyle::default(),
            20,
        );

        assert_eq!(layer.features_at(&LatLng::new(-34.88, -56.15)).len(), 1);
        assert!(layer.features_at(&LatLng::new(-30.0, -56.15)).is_empty());
    }
}
