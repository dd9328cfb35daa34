use crate::{
    core::{
        events::{EventManager, MapEvent},
        geo::{LatLng, LatLngBounds, Point},
        viewport::Viewport,
    },
    layers::{base::LayerTrait, manager::LayerManager},
    Result,
};

/// The map: a viewport plus the set of attached layers.
///
/// Movement methods emit [`MapEvent`]s into an internal queue; the owning
/// session drains the queue and routes events to the viewer components.
pub struct Map {
    viewport: Viewport,
    layer_manager: LayerManager,
    event_manager: EventManager,
}

impl Map {
    pub fn new(center: LatLng, zoom: f64, size: Point) -> Self {
        Self {
            viewport: Viewport::new(center, zoom, size),
            layer_manager: LayerManager::new(),
            event_manager: EventManager::new(),
        }
    }

    /// Moves the view to the given center and zoom, emitting move/zoom end
    /// events when either actually changed.
    pub fn set_view(&mut self, center: LatLng, zoom: f64) {
        let old_center = self.viewport.center;
        let old_zoom = self.viewport.zoom;

        self.viewport.set_center(center);
        self.viewport.set_zoom(zoom);

        if self.viewport.zoom != old_zoom {
            self.event_manager.emit(MapEvent::ZoomEnd {
                zoom: self.viewport.zoom,
            });
        }
        if self.viewport.center != old_center || self.viewport.zoom != old_zoom {
            self.event_manager.emit(MapEvent::ViewChanged {
                center: self.viewport.center,
                zoom: self.viewport.zoom,
            });
            self.event_manager.emit(MapEvent::MoveEnd {
                center: self.viewport.center,
            });
        }
    }

    /// Fits the view to the given bounds and emits a move-end event
    pub fn fit_bounds(&mut self, bounds: &LatLngBounds, padding: Option<f64>) {
        self.viewport.fit_bounds(bounds, padding);
        self.event_manager.emit(MapEvent::MoveEnd {
            center: self.viewport.center,
        });
    }

    /// Registers a click at a geographic position
    pub fn click(&mut self, lat_lng: LatLng) {
        self.event_manager.emit(MapEvent::Click { lat_lng });
    }

    pub fn add_layer(&mut self, layer: Box<dyn LayerTrait>) -> Result<()> {
        let layer_id = layer.id().to_string();
        self.layer_manager.add_layer(layer)?;
        self.event_manager.emit(MapEvent::LayerAdd { layer_id });
        Ok(())
    }

    pub fn remove_layer(&mut self, layer_id: &str) -> Option<Box<dyn LayerTrait>> {
        let removed = self.layer_manager.remove_layer(layer_id);
        if removed.is_some() {
            self.event_manager.emit(MapEvent::LayerRemove {
                layer_id: layer_id.to_string(),
            });
        }
        removed
    }

    pub fn get_layer(&self, layer_id: &str) -> Option<&dyn LayerTrait> {
        self.layer_manager.get_layer(layer_id)
    }

    pub fn has_layer(&self, layer_id: &str) -> bool {
        self.layer_manager.get_layer(layer_id).is_some()
    }

    pub fn with_layer_mut<F, R>(&mut self, layer_id: &str, f: F) -> Option<R>
    where
        F: FnOnce(&mut dyn LayerTrait) -> R,
    {
        self.layer_manager.with_layer_mut(layer_id, f)
    }

    pub fn list_layers(&self) -> Vec<String> {
        self.layer_manager.list_layers()
    }

    pub fn layer_count(&self) -> usize {
        self.layer_manager.len()
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    /// Registers an event listener (see [`EventManager::on`])
    pub fn on<F>(&mut self, event_type: &str, callback: F)
    where
        F: Fn(&MapEvent) + Send + Sync + 'static,
    {
        self.event_manager.on(event_type, callback);
    }

    /// Drains and dispatches all queued events
    pub fn process_events(&mut self) -> Vec<MapEvent> {
        self.event_manager.process_events()
    }
}
