//! Parcel search and address autocomplete.
//!
//! Two entry points: an exact padrón-number search against the cadastral
//! service, and a debounced free-text geocode feeding a keyboard-driven
//! suggestion list.

use crate::core::config::SearchConfig;
use crate::core::map::Map;
use crate::layers::base::LayerTrait;
use crate::layers::marker::Marker;
use crate::layers::vector::{PolygonStyle, VectorLayer};
use crate::services::{GeocodeCandidate, GeocodeService, ParcelService, QueryFilter};
use crate::viewer::{clear_slot, replace_slot, SlotKind, StatusLine};
use crate::{MapError, Result};

use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;

/// Runs at most one pending action: a new call cancels the previous one
/// and starts the quiet-period timer over.
pub struct Debouncer {
    delay: Duration,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: Mutex::new(None),
        }
    }

    pub fn call<F>(&self, action: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let delay = self.delay;
        let mut pending = self.pending.lock().unwrap();
        if let Some(handle) = pending.take() {
            handle.abort();
        }
        *pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            action.await;
        }));
    }

    pub fn cancel(&self) {
        if let Some(handle) = self.pending.lock().unwrap().take() {
            handle.abort();
        }
    }

    /// Waits for the pending action, if any, to finish or be aborted
    pub async fn settle(&self) {
        let handle = self.pending.lock().unwrap().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }
}

/// Geocode suggestion list with keyboard navigation. Arrow keys clamp at
/// the ends; there is no wrap-around.
#[derive(Debug, Default)]
pub struct SuggestionList {
    items: Vec<GeocodeCandidate>,
    highlighted: Option<usize>,
    open: bool,
}

impl SuggestionList {
    pub fn set_items(&mut self, items: Vec<GeocodeCandidate>) {
        self.open = !items.is_empty();
        self.items = items;
        self.highlighted = None;
    }

    pub fn close(&mut self) {
        self.open = false;
        self.items.clear();
        self.highlighted = None;
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn items(&self) -> &[GeocodeCandidate] {
        &self.items
    }

    pub fn highlighted(&self) -> Option<usize> {
        self.highlighted
    }

    pub fn key_down(&mut self) {
        if !self.open || self.items.is_empty() {
            return;
        }
        self.highlighted = Some(match self.highlighted {
            None => 0,
            Some(i) => (i + 1).min(self.items.len() - 1),
        });
    }

    pub fn key_up(&mut self) {
        if !self.open || self.items.is_empty() {
            return;
        }
        self.highlighted = Some(match self.highlighted {
            None | Some(0) => 0,
            Some(i) => i - 1,
        });
    }

    /// The candidate Enter would pick: the highlighted one, or the first
    pub fn selection(&self) -> Option<&GeocodeCandidate> {
        if !self.open {
            return None;
        }
        let index = self.highlighted.unwrap_or(0);
        self.items.get(index)
    }
}

/// WHERE clause for an exact padrón lookup
pub fn build_where(nro_padron: i64, department: Option<i64>) -> String {
    match department {
        Some(depto) => format!("NroPadron = {nro_padron} AND CodDepartamento = {depto}"),
        None => format!("NroPadron = {nro_padron}"),
    }
}

pub struct SearchController {
    map: Arc<Mutex<Map>>,
    parcels: Arc<dyn ParcelService>,
    geocoder: Arc<dyn GeocodeService>,
    status: StatusLine,
    config: SearchConfig,
    query_layer: u32,
    debouncer: Debouncer,
    suggestions: Arc<Mutex<SuggestionList>>,
}

impl SearchController {
    pub fn new(
        map: Arc<Mutex<Map>>,
        parcels: Arc<dyn ParcelService>,
        geocoder: Arc<dyn GeocodeService>,
        status: StatusLine,
        config: SearchConfig,
        query_layer: u32,
    ) -> Self {
        let debouncer = Debouncer::new(config.debounce);
        Self {
            map,
            parcels,
            geocoder,
            status,
            config,
            query_layer,
            debouncer,
            suggestions: Arc::new(Mutex::new(SuggestionList::default())),
        }
    }

    /// Exact lookup by padrón number, optionally narrowed to a department
    pub async fn search_parcel(&self, nro_padron: i64, department: Option<i64>) -> Result<()> {
        if nro_padron <= 0 {
            self.status.set("Número de padrón inválido");
            return Err(MapError::Validation(format!(
                "invalid padrón number {nro_padron}"
            )));
        }

        self.status.set(format!("Buscando padrón {nro_padron}…"));
        let filter = QueryFilter::by_where(build_where(nro_padron, department));
        let collection = match self.parcels.query(self.query_layer, filter).await {
            Ok(collection) => collection,
            Err(err) => {
                self.status.set("Error al consultar el servicio");
                return Err(err);
            }
        };

        if collection.is_empty() {
            let mut map = self.map.lock().unwrap();
            clear_slot(&mut map, SlotKind::SearchHighlight);
            drop(map);
            self.status
                .set(format!("No se encontró el padrón {nro_padron}"));
            return Ok(());
        }

        let layer = VectorLayer::from_collection(
            SlotKind::SearchHighlight.layer_id().to_string(),
            format!("Padrón {nro_padron}"),
            &collection,
            PolygonStyle::highlight(),
            0,
        );
        let bounds = layer.bounds();
        {
            let mut map = self.map.lock().unwrap();
            replace_slot(&mut map, SlotKind::SearchHighlight, Box::new(layer))?;
            if let Some(bounds) = bounds {
                map.fit_bounds(&bounds, Some(40.0));
            }
        }
        self.status
            .set(format!("{} padrón(es) encontrado(s)", collection.len()));
        Ok(())
    }

    /// Feeds one keystroke's worth of input to the autocomplete. Short
    /// inputs close the list without a request; anything else schedules a
    /// geocode after the debounce delay, superseding pending input.
    pub fn on_input(&self, text: &str) {
        let query = text.trim().to_string();
        if query.chars().count() < self.config.min_query_len {
            self.debouncer.cancel();
            self.suggestions.lock().unwrap().close();
            return;
        }

        let geocoder = self.geocoder.clone();
        let suggestions = self.suggestions.clone();
        let limit = self.config.suggestion_limit as usize;
        self.debouncer.call(async move {
            match geocoder.search(&query, limit).await {
                Ok(candidates) => suggestions.lock().unwrap().set_items(candidates),
                Err(err) => {
                    log::warn!("geocode failed for {query:?}: {err}");
                    suggestions.lock().unwrap().close();
                }
            }
        });
    }

    pub fn key_down(&self) {
        self.suggestions.lock().unwrap().key_down();
    }

    pub fn key_up(&self) {
        self.suggestions.lock().unwrap().key_up();
    }

    pub fn escape(&self) {
        self.debouncer.cancel();
        self.suggestions.lock().unwrap().close();
    }

    pub fn suggestions(&self) -> Vec<GeocodeCandidate> {
        self.suggestions.lock().unwrap().items().to_vec()
    }

    pub fn highlighted(&self) -> Option<usize> {
        self.suggestions.lock().unwrap().highlighted()
    }

    pub fn is_open(&self) -> bool {
        self.suggestions.lock().unwrap().is_open()
    }

    /// Confirms the current selection (Enter)
    pub async fn submit(&self) {
        let candidate = self.suggestions.lock().unwrap().selection().cloned();
        if let Some(candidate) = candidate {
            self.select_candidate(&candidate).await;
        }
    }

    /// Jumps to a geocode candidate: drops a marker, zooms in, and
    /// best-effort highlights the parcel under the point.
    pub async fn select_candidate(&self, candidate: &GeocodeCandidate) {
        self.suggestions.lock().unwrap().close();

        let marker = Marker::new(
            SlotKind::GeocodeMarker.layer_id().to_string(),
            candidate.position,
        )
        .with_popup(candidate.display_name.clone());
        {
            let mut map = self.map.lock().unwrap();
            if let Err(err) = replace_slot(&mut map, SlotKind::GeocodeMarker, Box::new(marker)) {
                log::warn!("placing geocode marker failed: {err}");
            }
            map.set_view(candidate.position, self.config.result_zoom);
        }
        self.status.set(candidate.display_name.clone());

        // The parcel under the point is a nicety, not part of the jump
        let filter = QueryFilter::by_point(candidate.position);
        match self.parcels.query(self.query_layer, filter).await {
            Ok(collection) if !collection.is_empty() => {
                let layer = VectorLayer::from_collection(
                    SlotKind::SearchHighlight.layer_id().to_string(),
                    candidate.display_name.clone(),
                    &collection,
                    PolygonStyle::highlight(),
                    0,
                );
                let mut map = self.map.lock().unwrap();
                if let Err(err) =
                    replace_slot(&mut map, SlotKind::SearchHighlight, Box::new(layer))
                {
                    log::warn!("highlighting parcel failed: {err}");
                }
            }
            Ok(_) => {
                let mut map = self.map.lock().unwrap();
                clear_slot(&mut map, SlotKind::SearchHighlight);
            }
            Err(err) => log::warn!("point lookup failed: {err}"),
        }
    }

    /// Waits for a pending geocode, if any (test support)
    pub async fn settle(&self) {
        self.debouncer.settle().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geo::{LatLng, LatLngBounds, Point};
    use crate::data::geojson::{Feature, FeatureCollection};
    use crate::prelude::HashMap;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubParcels {
        features: Vec<Feature>,
        last_where: Mutex<Option<String>>,
    }

    #[async_trait]
    impl ParcelService for StubParcels {
        async fn query(&self, _layer_id: u32, filter: QueryFilter) -> Result<FeatureCollection> {
            *self.last_where.lock().unwrap() = filter.where_clause;
            Ok(FeatureCollection {
                features: self.features.clone(),
            })
        }

        async fn identify(
            &self,
            _position: LatLng,
            _view: &LatLngBounds,
            _view_size: (u32, u32),
        ) -> Result<FeatureCollection> {
            Ok(FeatureCollection { features: vec![] })
        }
    }

    struct StubGeocoder {
        candidates: Vec<GeocodeCandidate>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl GeocodeService for StubGeocoder {
        async fn search(&self, _query: &str, _limit: usize) -> Result<Vec<GeocodeCandidate>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.candidates.clone())
        }
    }

    fn montevideo() -> GeocodeCandidate {
        GeocodeCandidate {
            display_name: "Montevideo, Uruguay".to_string(),
            position: LatLng::new(-34.9058, -56.1913),
            place_rank: Some(16),
            kind: Some("city".to_string()),
        }
    }

    fn parcel(nro: i64) -> Feature {
        let mut properties: HashMap<String, serde_json::Value> = HashMap::default();
        properties.insert("NroPadron".to_string(), serde_json::json!(nro));
        Feature {
            id: None,
            geometry: Some(
                serde_json::from_value(serde_json::json!({
                    "type": "Polygon",
                    "coordinates": [[[-56.2, -34.91], [-56.19, -34.91], [-56.19, -34.9], [-56.2, -34.91]]]
                }))
                .unwrap(),
            ),
            properties: Some(properties),
        }
    }

    fn controller(
        features: Vec<Feature>,
        candidates: Vec<GeocodeCandidate>,
    ) -> (SearchController, Arc<Mutex<Map>>, Arc<StubParcels>, Arc<StubGeocoder>) {
        let map = Arc::new(Mutex::new(Map::new(
            LatLng::new(-32.5, -55.8),
            7.0,
            Point::new(800.0, 600.0),
        )));
        let parcels = Arc::new(StubParcels {
            features,
            last_where: Mutex::new(None),
        });
        let geocoder = Arc::new(StubGeocoder {
            candidates,
            calls: AtomicUsize::new(0),
        });
        let controller = SearchController::new(
            map.clone(),
            parcels.clone(),
            geocoder.clone(),
            StatusLine::new(),
            SearchConfig {
                debounce: Duration::from_millis(30),
                ..SearchConfig::default()
            },
            1,
        );
        (controller, map, parcels, geocoder)
    }

    #[test]
    fn test_build_where() {
        assert_eq!(build_where(12345, None), "NroPadron = 12345");
        assert_eq!(
            build_where(12345, Some(1)),
            "NroPadron = 12345 AND CodDepartamento = 1"
        );
    }

    #[test]
    fn test_suggestion_navigation_clamps() {
        let mut list = SuggestionList::default();
        list.set_items(vec![montevideo(), montevideo(), montevideo()]);

        assert_eq!(list.highlighted(), None);
        list.key_up();
        assert_eq!(list.highlighted(), Some(0));
        list.key_down();
        list.key_down();
        list.key_down();
        assert_eq!(list.highlighted(), Some(2));
        list.key_up();
        assert_eq!(list.highlighted(), Some(1));
    }

    #[test]
    fn test_selection_defaults_to_first() {
        let mut list = SuggestionList::default();
        assert!(list.selection().is_none());

        list.set_items(vec![montevideo()]);
        assert_eq!(
            list.selection().unwrap().display_name,
            "Montevideo, Uruguay"
        );

        list.close();
        assert!(list.selection().is_none());
    }

    #[tokio::test]
    async fn test_search_parcel_found_highlights_and_zooms() {
        let (controller, map, parcels, _) = controller(vec![parcel(12345)], vec![]);

        controller.search_parcel(12345, Some(1)).await.unwrap();

        assert_eq!(
            parcels.last_where.lock().unwrap().as_deref(),
            Some("NroPadron = 12345 AND CodDepartamento = 1")
        );
        let map = map.lock().unwrap();
        assert!(map.has_layer(SlotKind::SearchHighlight.layer_id()));
        assert!(map.viewport().zoom > 7.0);
        assert_eq!(
            controller.status.message().as_deref(),
            Some("1 padrón(es) encontrado(s)")
        );
    }

    #[tokio::test]
    async fn test_search_parcel_not_found() {
        let (controller, map, _, _) = controller(vec![], vec![]);

        controller.search_parcel(99999, None).await.unwrap();

        assert!(!map
            .lock()
            .unwrap()
            .has_layer(SlotKind::SearchHighlight.layer_id()));
        assert_eq!(
            controller.status.message().as_deref(),
            Some("No se encontró el padrón 99999")
        );
    }

    #[tokio::test]
    async fn test_search_parcel_rejects_nonpositive() {
        let (controller, _, _, _) = controller(vec![], vec![]);
        assert!(matches!(
            controller.search_parcel(0, None).await,
            Err(MapError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_debounce_collapses_keystrokes() {
        let (controller, _, _, geocoder) = controller(vec![], vec![montevideo()]);

        controller.on_input("mon");
        controller.on_input("mont");
        controller.on_input("monte");
        controller.settle().await;

        assert_eq!(geocoder.calls.load(Ordering::SeqCst), 1);
        assert!(controller.is_open());
        assert_eq!(controller.suggestions().len(), 1);
    }

    #[tokio::test]
    async fn test_short_input_closes_without_request() {
        let (controller, _, _, geocoder) = controller(vec![], vec![montevideo()]);

        controller.on_input("monte");
        controller.settle().await;
        assert!(controller.is_open());

        controller.on_input("mo");
        controller.settle().await;
        assert!(!controller.is_open());
        assert_eq!(geocoder.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_select_candidate_jumps_and_marks() {
        let (controller, map, _, _) = controller(vec![parcel(7)], vec![montevideo()]);

        controller.on_input("montevideo");
        controller.settle().await;
        controller.key_down();
        controller.submit().await;

        let map = map.lock().unwrap();
        assert!(map.has_layer(SlotKind::GeocodeMarker.layer_id()));
        assert!(map.has_layer(SlotKind::SearchHighlight.layer_id()));
        assert_eq!(map.viewport().zoom, 16.0);
        assert!(!controller.is_open());
    }
}
