use crate::{
    core::geo::{LatLng, LatLngBounds},
    layers::base::{LayerProperties, LayerTrait, LayerType},
};

/// Point-of-interest layer: a single pin with optional popup text.
/// Used for geocode results dropped on the map.
pub struct Marker {
    properties: LayerProperties,
    position: LatLng,
    popup: Option<String>,
}

impl Marker {
    pub fn new(id: String, position: LatLng) -> Self {
        Self {
            properties: LayerProperties::new(id, "Marker".to_string(), LayerType::Marker),
            position,
            popup: None,
        }
    }

    pub fn with_popup(mut self, content: impl Into<String>) -> Self {
        self.popup = Some(content.into());
        self
    }

    pub fn position(&self) -> LatLng {
        self.position
    }

    pub fn set_position(&mut self, position: LatLng) {
        self.position = position;
    }

    pub fn popup(&self) -> Option<&str> {
        self.popup.as_deref()
    }
}

impl LayerTrait for Marker {
    crate::impl_layer_trait!(Marker, properties);

    fn bounds(&self) -> Option<LatLngBounds> {
        Some(LatLngBounds::new(self.position, self.position))
    }

    fn options(&self) -> serde_json::Value {
        serde_json::json!({
            "position": { "lat": self.position.lat, "lng": self.position.lng },
            "has_popup": self.popup.is_some(),
        })
    }
}
