use crate::layers::base::LayerTrait;
use crate::prelude::HashMap;
use crate::{MapError, Result};

/// Manages layers for the map, handling ordering by z-index
pub struct LayerManager {
    /// All layers indexed by ID
    layers: HashMap<String, Box<dyn LayerTrait>>,
    /// Ordered list of layer IDs (sorted by z-index, lowest first)
    render_order: Vec<String>,
}

impl LayerManager {
    pub fn new() -> Self {
        Self {
            layers: HashMap::default(),
            render_order: Vec::new(),
        }
    }

    /// Adds a layer to the manager. Layer IDs are unique; adding a
    /// duplicate is a [`MapError::Layer`] — slots must remove their old
    /// layer first.
    pub fn add_layer(&mut self, layer: Box<dyn LayerTrait>) -> Result<()> {
        let layer_id = layer.id().to_string();
        if self.layers.contains_key(&layer_id) {
            return Err(MapError::Layer(format!(
                "layer '{}' already attached",
                layer_id
            )));
        }
        let z_index = layer.z_index();

        self.layers.insert(layer_id.clone(), layer);

        let insert_pos = self
            .render_order
            .iter()
            .position(|id| {
                self.layers
                    .get(id)
                    .map(|l| l.z_index() > z_index)
                    .unwrap_or(false)
            })
            .unwrap_or(self.render_order.len());

        self.render_order.insert(insert_pos, layer_id);
        Ok(())
    }

    /// Removes a layer from the manager
    pub fn remove_layer(&mut self, layer_id: &str) -> Option<Box<dyn LayerTrait>> {
        self.render_order.retain(|id| id != layer_id);
        self.layers.remove(layer_id)
    }

    /// Gets a reference to a layer by ID
    pub fn get_layer(&self, layer_id: &str) -> Option<&dyn LayerTrait> {
        self.layers.get(layer_id).map(|l| l.as_ref())
    }

    /// Applies a function to a specific layer mutably
    pub fn with_layer_mut<F, R>(&mut self, layer_id: &str, f: F) -> Option<R>
    where
        F: FnOnce(&mut dyn LayerTrait) -> R,
    {
        self.layers.get_mut(layer_id).map(|layer| f(layer.as_mut()))
    }

    /// Lists all layer IDs in render order
    pub fn list_layers(&self) -> Vec<String> {
        self.render_order.clone()
    }

    /// Gets the number of layers
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// Checks if the manager is empty
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

impl Default for LayerManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geo::LatLng;
    use crate::layers::marker::Marker;

    #[test]
    fn test_duplicate_id_rejected() {
        let mut manager = LayerManager::new();
        manager
            .add_layer(Box::new(Marker::new("m".to_string(), LatLng::default())))
            .unwrap();
        let err = manager
            .add_layer(Box::new(Marker::new("m".to_string(), LatLng::default())))
            .unwrap_err();
        assert!(matches!(err, MapError::Layer(_)));
    }

    #[test]
    fn test_z_order() {
        let mut manager = LayerManager::new();

        let mut low = Marker::new("low".to_string(), LatLng::default());
        let mut high = Marker::new("high".to_string(), LatLng::default());
        use crate::layers::base::LayerTrait;
        low.set_z_index(10);
        high.set_z_index(650);

        manager.add_layer(Box::new(high)).unwrap();
        manager.add_layer(Box::new(low)).unwrap();

        assert_eq!(manager.list_layers(), vec!["low", "high"]);
    }

    #[test]
    fn test_remove() {
        let mut manager = LayerManager::new();
        manager
            .add_layer(Box::new(Marker::new("m".to_string(), LatLng::default())))
            .unwrap();

        assert!(manager.remove_layer("m").is_some());
        assert!(manager.remove_layer("m").is_none());
        assert!(manager.is_empty());
    }
}
