use crate::{
    core::geo::LatLngBounds,
    core::viewport::Viewport,
    layers::base::{LayerProperties, LayerTrait, LayerType},
};

use std::sync::Arc;

/// Renders map imagery for an arbitrary viewport. Implementations turn a
/// geographic envelope plus pixel size into a fetchable image URL; the
/// engine treats that as an opaque overlay.
pub trait DynamicMapProvider: Send + Sync {
    /// Base URL of the backing map service
    fn service_url(&self) -> &str;

    /// Export-image URL covering `bounds` at `width`x`height` pixels
    fn export_url(&self, bounds: &LatLngBounds, width: u32, height: u32) -> String;
}

/// Provider backed by an Esri MapServer `export` endpoint
pub struct EsriDynamicProvider {
    url: String,
    layer_ids: Vec<u32>,
    transparent: bool,
}

impl EsriDynamicProvider {
    pub fn new(url: impl Into<String>, layer_ids: Vec<u32>) -> Self {
        Self {
            url: url.into(),
            layer_ids,
            transparent: true,
        }
    }

    pub fn layer_ids(&self) -> &[u32] {
        &self.layer_ids
    }
}

impl DynamicMapProvider for EsriDynamicProvider {
    fn service_url(&self) -> &str {
        &self.url
    }

    fn export_url(&self, bounds: &LatLngBounds, width: u32, height: u32) -> String {
        let layers = self
            .layer_ids
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(",");
        format!(
            "{}/export?bbox={}&bboxSR=4326&imageSR=4326&size={},{}&layers=show:{}&transparent={}&format=png32&f=image",
            self.url,
            bounds.to_envelope_param(),
            width,
            height,
            layers,
            self.transparent,
        )
    }
}

/// Overlay layer that re-exports imagery whenever the view changes
pub struct DynamicOverlayLayer {
    properties: LayerProperties,
    provider: Arc<dyn DynamicMapProvider>,
    current_url: Option<String>,
}

impl DynamicOverlayLayer {
    pub fn new(id: String, name: String, provider: Arc<dyn DynamicMapProvider>) -> Self {
        Self {
            properties: LayerProperties::new(id, name, LayerType::Dynamic),
            provider,
            current_url: None,
        }
    }

    pub fn provider(&self) -> &Arc<dyn DynamicMapProvider> {
        &self.provider
    }

    /// Recomputes the export URL for the given viewport. Returns the URL
    /// only when it changed since the last refresh.
    pub fn refresh(&mut self, viewport: &Viewport) -> Option<String> {
        let url = self.provider.export_url(
            &viewport.bounds(),
            viewport.size.x as u32,
            viewport.size.y as u32,
        );
        if self.current_url.as_deref() == Some(url.as_str()) {
            return None;
        }
        self.current_url = Some(url.clone());
        Some(url)
    }

    pub fn current_url(&self) -> Option<&str> {
        self.current_url.as_deref()
    }
}

impl LayerTrait for DynamicOverlayLayer {
    crate::impl_layer_trait!(DynamicOverlayLayer, properties);

    fn options(&self) -> serde_json::Value {
        serde_json::json!({
            "service_url": self.provider.service_url(),
            "current_url": self.current_url,
        })
    }
}
