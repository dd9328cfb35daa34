use crate::{
    core::geo::{LatLng, LatLngBounds},
    layers::base::{LayerProperties, LayerTrait, LayerType},
};

/// Text anchored at a map position
#[derive(Debug, Clone, PartialEq)]
pub struct TextLabel {
    pub key: String,
    pub position: LatLng,
    pub text: String,
}

/// Layer of text labels, one per parcel centroid. Labels sit above the
/// parcel polygons and never intercept clicks.
pub struct LabelLayer {
    properties: LayerProperties,
    labels: Vec<TextLabel>,
}

impl LabelLayer {
    pub const Z_INDEX: i32 = 650;

    pub fn new(id: String, name: String) -> Self {
        let mut properties = LayerProperties::new(id, name, LayerType::Label);
        properties.z_index = Self::Z_INDEX;
        properties.interactive = false;
        Self {
            properties,
            labels: Vec::new(),
        }
    }

    pub fn push(&mut self, key: String, position: LatLng, text: String) {
        self.labels.push(TextLabel {
            key,
            position,
            text,
        });
    }

    pub fn labels(&self) -> &[TextLabel] {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

impl LayerTrait for LabelLayer {
    crate::impl_layer_trait!(LabelLayer, properties);

    fn bounds(&self) -> Option<LatLngBounds> {
        LatLngBounds::from_points(
            &self
                .labels
                .iter()
                .map(|l| l.position)
                .collect::<Vec<_>>(),
        )
    }

    fn options(&self) -> serde_json::Value {
        serde_json::json!({ "label_count": self.labels.len() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_layer_is_non_interactive_and_above_vectors() {
        let layer = LabelLayer::new("parcel-labels".to_string(), "Padrones".to_string());
        assert!(!layer.is_interactive());
        assert_eq!(layer.z_index(), 650);
    }

    #[test]
    fn test_push_and_bounds() {
        let mut layer = LabelLayer::new("parcel-labels".to_string(), "Padrones".to_string());
        assert!(layer.bounds().is_none());

        layer.push("a".to_string(), LatLng::new(-34.9, -56.2), "12345".to_string());
        layer.push("b".to_string(), LatLng::new(-34.8, -56.0), "67890".to_string());

        assert_eq!(layer.len(), 2);
        let bounds = layer.bounds().unwrap();
        assert_eq!(bounds.south_west.lat, -34.9);
        assert_eq!(bounds.north_east.lng, -56.0);
    }
}
