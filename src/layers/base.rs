use crate::core::geo::LatLngBounds;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayerType {
    Vector,
    Marker,
    Label,
    Dynamic,
    Custom,
}

impl std::fmt::Display for LayerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LayerType::Vector => write!(f, "vector"),
            LayerType::Marker => write!(f, "marker"),
            LayerType::Label => write!(f, "label"),
            LayerType::Dynamic => write!(f, "dynamic"),
            LayerType::Custom => write!(f, "custom"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LayerProperties {
    pub id: String,
    pub name: String,
    pub layer_type: LayerType,
    pub z_index: i32,
    pub opacity: f32,
    pub visible: bool,
    pub interactive: bool,
}

impl LayerProperties {
    pub fn new(id: String, name: String, layer_type: LayerType) -> Self {
        Self {
            id,
            name,
            layer_type,
            z_index: 0,
            opacity: 1.0,
            visible: true,
            interactive: true,
        }
    }
}

impl Default for LayerProperties {
    fn default() -> Self {
        Self::new(
            "default".to_string(),
            "Default Layer".to_string(),
            LayerType::Custom,
        )
    }
}

/// Common interface for everything attachable to the map
pub trait LayerTrait: Send + Sync {
    fn id(&self) -> &str;

    fn name(&self) -> &str;

    fn layer_type(&self) -> LayerType;

    fn z_index(&self) -> i32;

    fn set_z_index(&mut self, z_index: i32);

    fn opacity(&self) -> f32;

    fn set_opacity(&mut self, opacity: f32);

    fn is_visible(&self) -> bool;

    fn set_visible(&mut self, visible: bool);

    /// Whether the layer participates in hit-testing / receives clicks
    fn is_interactive(&self) -> bool {
        true
    }

    /// Geographic extent of the layer's content, if computable
    fn bounds(&self) -> Option<LatLngBounds> {
        None
    }

    fn options(&self) -> serde_json::Value {
        serde_json::Value::Null
    }

    fn as_any(&self) -> &dyn std::any::Any;

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layer_properties() {
        let props = LayerProperties::new(
            "parcels".to_string(),
            "Padrones".to_string(),
            LayerType::Vector,
        );

        assert_eq!(props.id, "parcels");
        assert_eq!(props.layer_type, LayerType::Vector);
        assert_eq!(props.z_index, 0);
        assert_eq!(props.opacity, 1.0);
        assert!(props.visible);
        assert!(props.interactive);
    }

    #[test]
    fn test_layer_type_display() {
        assert_eq!(LayerType::Vector.to_string(), "vector");
        assert_eq!(LayerType::Label.to_string(), "label");
        assert_eq!(LayerType::Dynamic.to_string(), "dynamic");
    }
}
