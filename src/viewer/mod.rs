//! The viewer session: wires the map to the cadastral services.
//!
//! A [`ViewerSession`] owns the [`Map`], the shared status line, and the
//! three interactive components (remote overlay, viewport labeler, parcel
//! search). Components communicate through map events and named layer
//! slots rather than calling each other directly.

pub mod labeler;
pub mod loader;
pub mod overlay;
pub mod search;

use crate::core::config::ViewerConfig;
use crate::core::events::MapEvent;
use crate::core::geo::{LatLng, Point};
use crate::core::map::Map;
use crate::layers::base::LayerTrait;
use crate::layers::dynamic::DynamicMapProvider;
use crate::layers::vector::PolygonStyle;
use crate::services::{GeocodeService, ParcelService};
use crate::Result;

use std::sync::{Arc, Mutex};

pub use labeler::ParcelLabeler;
pub use overlay::OverlayController;
pub use search::SearchController;

/// Named layer slots. Each slot holds at most one layer; installing a new
/// layer into an occupied slot removes the old one first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotKind {
    DepartmentOutline,
    Cadastral,
    RemoteOverlay,
    ParcelPolygons,
    ParcelLabels,
    SearchHighlight,
    GeocodeMarker,
}

impl SlotKind {
    pub const ALL: [SlotKind; 7] = [
        SlotKind::DepartmentOutline,
        SlotKind::Cadastral,
        SlotKind::RemoteOverlay,
        SlotKind::ParcelPolygons,
        SlotKind::ParcelLabels,
        SlotKind::SearchHighlight,
        SlotKind::GeocodeMarker,
    ];

    pub fn layer_id(self) -> &'static str {
        match self {
            SlotKind::DepartmentOutline => "slot:departments",
            SlotKind::Cadastral => "slot:cadastral",
            SlotKind::RemoteOverlay => "slot:remote-overlay",
            SlotKind::ParcelPolygons => "slot:parcel-polygons",
            SlotKind::ParcelLabels => "slot:parcel-labels",
            SlotKind::SearchHighlight => "slot:search-highlight",
            SlotKind::GeocodeMarker => "slot:geocode-marker",
        }
    }
}

/// Installs a layer into a slot, evicting any previous occupant
pub(crate) fn replace_slot(map: &mut Map, kind: SlotKind, layer: Box<dyn LayerTrait>) -> Result<()> {
    map.remove_layer(kind.layer_id());
    map.add_layer(layer)
}

/// Empties a slot; returns whether a layer was removed
pub(crate) fn clear_slot(map: &mut Map, kind: SlotKind) -> bool {
    map.remove_layer(kind.layer_id()).is_some()
}

/// Single-message status display. A new message always replaces the
/// previous one.
#[derive(Clone, Default)]
pub struct StatusLine {
    message: Arc<Mutex<Option<String>>>,
}

impl StatusLine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, message: impl Into<String>) {
        let message = message.into();
        log::info!("status: {message}");
        *self.message.lock().unwrap() = Some(message);
    }

    pub fn clear(&self) {
        *self.message.lock().unwrap() = None;
    }

    pub fn message(&self) -> Option<String> {
        self.message.lock().unwrap().clone()
    }
}

/// A popup anchored at a map position
#[derive(Debug, Clone, PartialEq)]
pub struct Popup {
    pub position: LatLng,
    pub content: String,
}

/// Shared slot for the currently open popup
pub type PopupSlot = Arc<Mutex<Option<Popup>>>;

/// One running viewer: map state plus the interactive components
pub struct ViewerSession {
    map: Arc<Mutex<Map>>,
    config: ViewerConfig,
    status: StatusLine,
    popup: PopupSlot,
    labeler: ParcelLabeler,
    search: SearchController,
    overlay: OverlayController,
}

impl ViewerSession {
    pub fn new(
        config: ViewerConfig,
        parcels: Arc<dyn ParcelService>,
        geocoder: Arc<dyn GeocodeService>,
        center: LatLng,
        zoom: f64,
        size: Point,
    ) -> Self {
        let map = Arc::new(Mutex::new(Map::new(center, zoom, size)));
        let status = StatusLine::new();
        let popup: PopupSlot = Arc::new(Mutex::new(None));

        let labeler = ParcelLabeler::new(
            map.clone(),
            parcels.clone(),
            status.clone(),
            config.labeler.clone(),
        );
        let search = SearchController::new(
            map.clone(),
            parcels.clone(),
            geocoder,
            status.clone(),
            config.search.clone(),
            config.labeler.query_layer,
        );
        let overlay = OverlayController::new(
            map.clone(),
            parcels,
            status.clone(),
            popup.clone(),
            config.identify.max_attributes,
        );

        Self {
            map,
            config,
            status,
            popup,
            labeler,
            search,
            overlay,
        }
    }

    pub fn map(&self) -> &Arc<Mutex<Map>> {
        &self.map
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    pub fn status(&self) -> &StatusLine {
        &self.status
    }

    pub fn popup(&self) -> Option<Popup> {
        self.popup.lock().unwrap().clone()
    }

    pub fn close_popup(&self) {
        *self.popup.lock().unwrap() = None;
    }

    pub fn labeler(&self) -> &ParcelLabeler {
        &self.labeler
    }

    pub fn search(&self) -> &SearchController {
        &self.search
    }

    pub fn overlay(&self) -> &OverlayController {
        &self.overlay
    }

    /// Registers the provider backing the remote overlay. Without one,
    /// enabling the overlay fails with a dependency error.
    pub fn set_overlay_provider(&self, provider: Arc<dyn DynamicMapProvider>) {
        self.overlay.set_provider(provider);
    }

    /// Loads a GeoJSON document from a URL into the given slot
    pub async fn load_geojson_layer(
        &self,
        slot: SlotKind,
        name: &str,
        url: &str,
        style: PolygonStyle,
    ) -> Result<usize> {
        loader::install_geojson(
            &self.map,
            &self.status,
            slot,
            name,
            url,
            style,
            self.config.popup_max_attributes,
        )
        .await
    }

    /// Drains queued map events and routes them to the components.
    /// Call after every batch of map mutations.
    pub async fn pump(&self) {
        let events = self.map.lock().unwrap().process_events();
        for event in events {
            match event {
                MapEvent::MoveEnd { .. } | MapEvent::ZoomEnd { .. } => {
                    self.overlay.handle_view_changed();
                    self.labeler.schedule_fetch();
                }
                MapEvent::Click { lat_lng } => {
                    if let Err(err) = self.overlay.identify_at(lat_lng).await {
                        if !err.is_cancelled() {
                            log::warn!("identify failed: {err}");
                        }
                    }
                }
                _ => {}
            }
        }
    }
}
