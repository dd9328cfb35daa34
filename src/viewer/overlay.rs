//! Remote cadastral overlay with identify-on-click.
//!
//! The overlay renders service-side imagery through a pluggable
//! [`DynamicMapProvider`]. Identify mode turns map clicks into attribute
//! queries against the same service and surfaces the result as a popup.

use crate::core::geo::LatLng;
use crate::core::map::Map;
use crate::layers::dynamic::{DynamicMapProvider, DynamicOverlayLayer};
use crate::services::ParcelService;
use crate::viewer::{clear_slot, replace_slot, Popup, PopupSlot, SlotKind, StatusLine};
use crate::{MapError, Result};

use std::sync::{Arc, Mutex};

struct OverlayState {
    provider: Option<Arc<dyn DynamicMapProvider>>,
    enabled: bool,
    identify_mode: bool,
}

pub struct OverlayController {
    map: Arc<Mutex<Map>>,
    service: Arc<dyn ParcelService>,
    status: StatusLine,
    popup: PopupSlot,
    max_attributes: usize,
    state: Mutex<OverlayState>,
}

impl OverlayController {
    pub fn new(
        map: Arc<Mutex<Map>>,
        service: Arc<dyn ParcelService>,
        status: StatusLine,
        popup: PopupSlot,
        max_attributes: usize,
    ) -> Self {
        Self {
            map,
            service,
            status,
            popup,
            max_attributes,
            state: Mutex::new(OverlayState {
                provider: None,
                enabled: false,
                identify_mode: false,
            }),
        }
    }

    pub fn set_provider(&self, provider: Arc<dyn DynamicMapProvider>) {
        self.state.lock().unwrap().provider = Some(provider);
    }

    pub fn is_enabled(&self) -> bool {
        self.state.lock().unwrap().enabled
    }

    /// Turns the overlay on. Fails when no provider has been registered.
    pub fn enable(&self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.enabled {
            return Ok(());
        }
        let Some(provider) = state.provider.clone() else {
            drop(state);
            self.status
                .set("Capa dinámica no disponible: falta el proveedor");
            return Err(MapError::DependencyMissing(
                "dynamic map provider".to_string(),
            ));
        };
        state.enabled = true;
        drop(state);

        let mut map = self.map.lock().unwrap();
        let viewport = map.viewport().clone();
        let mut layer = DynamicOverlayLayer::new(
            SlotKind::RemoteOverlay.layer_id().to_string(),
            "Catastro SNIG".to_string(),
            provider,
        );
        layer.refresh(&viewport);
        replace_slot(&mut map, SlotKind::RemoteOverlay, Box::new(layer))
    }

    /// Turns the overlay off. Safe to call when already off.
    pub fn disable(&self) {
        let mut state = self.state.lock().unwrap();
        if !state.enabled {
            return;
        }
        state.enabled = false;
        drop(state);

        let mut map = self.map.lock().unwrap();
        clear_slot(&mut map, SlotKind::RemoteOverlay);
        *self.popup.lock().unwrap() = None;
    }

    pub fn identify_mode(&self) -> bool {
        self.state.lock().unwrap().identify_mode
    }

    pub fn set_identify_mode(&self, on: bool) {
        self.state.lock().unwrap().identify_mode = on;
        if !on {
            *self.popup.lock().unwrap() = None;
        }
    }

    /// Re-exports overlay imagery after the view moved
    pub fn handle_view_changed(&self) {
        if !self.is_enabled() {
            return;
        }
        let mut map = self.map.lock().unwrap();
        let viewport = map.viewport().clone();
        map.with_layer_mut(SlotKind::RemoteOverlay.layer_id(), |layer| {
            if let Some(overlay) = layer.as_any_mut().downcast_mut::<DynamicOverlayLayer>() {
                if let Some(url) = overlay.refresh(&viewport) {
                    log::trace!("overlay export {url}");
                }
            }
        });
    }

    /// Resolves a click into feature attributes and opens a popup
    pub async fn identify_at(&self, position: LatLng) -> Result<()> {
        {
            let state = self.state.lock().unwrap();
            if !state.enabled || !state.identify_mode {
                return Ok(());
            }
        }

        let (view, view_size) = {
            let map = self.map.lock().unwrap();
            let viewport = map.viewport();
            (
                viewport.bounds(),
                (viewport.size.x as u32, viewport.size.y as u32),
            )
        };

        self.status.set("Consultando el punto…");
        let collection = match self.service.identify(position, &view, view_size).await {
            Ok(collection) => collection,
            Err(err) => {
                self.status.set("Error al consultar el servicio");
                return Err(err);
            }
        };

        if collection.is_empty() {
            self.status.set("Sin resultados");
            *self.popup.lock().unwrap() = None;
            return Ok(());
        }

        let content = collection.features[0].attribute_table(self.max_attributes);
        self.status
            .set(format!("{} resultado(s)", collection.len()));
        *self.popup.lock().unwrap() = Some(Popup { position, content });
        Ok(())
    }
}
