use crate::core::geo::LatLng;
use std::collections::VecDeque;

use crate::prelude::HashMap;

/// Map event types that can be emitted by the map
#[derive(Debug, Clone, PartialEq)]
pub enum MapEvent {
    /// Map view has changed (center, zoom, or size)
    ViewChanged { center: LatLng, zoom: f64 },
    /// Mouse/touch click on the map
    Click { lat_lng: LatLng },
    /// Zoom ended
    ZoomEnd { zoom: f64 },
    /// Pan ended
    MoveEnd { center: LatLng },
    /// Layer was added to the map
    LayerAdd { layer_id: String },
    /// Layer was removed from the map
    LayerRemove { layer_id: String },
}

impl MapEvent {
    /// Event type key used for listener registration
    pub fn type_key(&self) -> &'static str {
        match self {
            MapEvent::ViewChanged { .. } => "viewchanged",
            MapEvent::Click { .. } => "click",
            MapEvent::ZoomEnd { .. } => "zoomend",
            MapEvent::MoveEnd { .. } => "moveend",
            MapEvent::LayerAdd { .. } => "layeradd",
            MapEvent::LayerRemove { .. } => "layerremove",
        }
    }
}

/// Event listener callback type
pub type EventCallback = Box<dyn Fn(&MapEvent) + Send + Sync>;

/// Event management system for the map.
///
/// Events are queued when emitted and dispatched when the owner drains the
/// queue; everything runs on the caller's thread.
#[derive(Default)]
pub struct EventManager {
    /// Event listeners by event type
    listeners: HashMap<String, Vec<EventCallback>>,
    /// Event queue for processing
    event_queue: VecDeque<MapEvent>,
}

impl EventManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an event listener
    pub fn on<F>(&mut self, event_type: &str, callback: F)
    where
        F: Fn(&MapEvent) + Send + Sync + 'static,
    {
        self.listeners
            .entry(event_type.to_string())
            .or_default()
            .push(Box::new(callback));
    }

    /// Emit an event to the queue
    pub fn emit(&mut self, event: MapEvent) {
        self.event_queue.push_back(event);
    }

    /// Process all queued events, invoking listeners, and return them
    pub fn process_events(&mut self) -> Vec<MapEvent> {
        let events: Vec<_> = self.event_queue.drain(..).collect();

        for event in &events {
            if let Some(callbacks) = self.listeners.get(event.type_key()) {
                for callback in callbacks {
                    callback(event);
                }
            }
        }

        events
    }

    /// Number of queued, unprocessed events
    pub fn pending(&self) -> usize {
        self.event_queue.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_emit_and_process() {
        let mut manager = EventManager::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let hits_clone = hits.clone();

        manager.on("moveend", move |_| {
            hits_clone.fetch_add(1, Ordering::SeqCst);
        });

        manager.emit(MapEvent::MoveEnd {
            center: LatLng::new(-34.9, -56.2),
        });
        manager.emit(MapEvent::ZoomEnd { zoom: 13.0 });

        let events = manager.process_events();
        assert_eq!(events.len(), 2);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(manager.pending(), 0);
    }
}
