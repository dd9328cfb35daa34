//! Viewport-driven parcel labeler.
//!
//! Every time the view settles, the labeler queries the cadastral service
//! for the parcels intersecting the viewport and renders them as polygons
//! plus centroid labels. Only the most recent request may touch the map:
//! each new view bumps a generation counter and aborts the in-flight
//! fetch, and a fetch that completes late finds its generation stale and
//! discards its result.

use crate::core::config::LabelerConfig;
use crate::core::geo::LatLngBounds;
use crate::core::map::Map;
use crate::data::geojson::{Feature, FeatureCollection};
use crate::layers::label::LabelLayer;
use crate::layers::vector::{PolygonStyle, VectorLayer};
use crate::services::{arcgis::ParcelAttributes, ParcelService, QueryFilter};
use crate::viewer::{clear_slot, replace_slot, SlotKind, StatusLine};

use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;

const MSG_ZOOM_IN: &str = "Acercá el mapa para ver los padrones";
const MSG_LOADING: &str = "Cargando padrones…";
const MSG_EMPTY: &str = "No hay padrones en esta vista";
const MSG_ERROR: &str = "Error al cargar padrones";

struct LabelerState {
    enabled: bool,
    generation: u64,
    in_flight: Option<JoinHandle<()>>,
}

pub struct ParcelLabeler {
    map: Arc<Mutex<Map>>,
    service: Arc<dyn ParcelService>,
    status: StatusLine,
    config: LabelerConfig,
    state: Arc<Mutex<LabelerState>>,
}

/// Label text for one parcel feature. Prefers the combined
/// department/padrón code, then the bare padrón number, then the
/// department name.
pub fn label_for(feature: &Feature) -> String {
    let attrs = ParcelAttributes::of(feature);
    if let Some(code) = attrs.depto_padron {
        return code;
    }
    if let Some(nro) = attrs.nro_padron {
        return format!("Padrón {nro}");
    }
    attrs.nom_departamento.unwrap_or_default()
}

impl ParcelLabeler {
    pub fn new(
        map: Arc<Mutex<Map>>,
        service: Arc<dyn ParcelService>,
        status: StatusLine,
        config: LabelerConfig,
    ) -> Self {
        Self {
            map,
            service,
            status,
            config,
            state: Arc::new(Mutex::new(LabelerState {
                enabled: false,
                generation: 0,
                in_flight: None,
            })),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.state.lock().unwrap().enabled
    }

    /// Turns the labeler on and fetches for the current view. Idempotent.
    pub fn enable(&self) {
        {
            let mut state = self.state.lock().unwrap();
            if state.enabled {
                return;
            }
            state.enabled = true;
        }
        self.schedule_fetch();
    }

    /// Turns the labeler off, cancels any in-flight fetch, and removes
    /// the parcel layers. Idempotent.
    pub fn disable(&self) {
        {
            let mut state = self.state.lock().unwrap();
            if !state.enabled {
                return;
            }
            state.enabled = false;
            state.generation += 1;
            if let Some(handle) = state.in_flight.take() {
                handle.abort();
            }
        }
        let mut map = self.map.lock().unwrap();
        clear_slot(&mut map, SlotKind::ParcelPolygons);
        clear_slot(&mut map, SlotKind::ParcelLabels);
    }

    /// Starts a fetch for the current viewport, superseding any fetch
    /// still in flight.
    pub fn schedule_fetch(&self) {
        let (zoom, view) = {
            let map = self.map.lock().unwrap();
            (map.viewport().zoom, map.viewport().bounds())
        };

        let mut state = self.state.lock().unwrap();
        if !state.enabled {
            return;
        }

        // Too far out: no request, and whatever is rendered stays
        if zoom < self.config.min_zoom {
            drop(state);
            self.status.set(MSG_ZOOM_IN);
            return;
        }

        state.generation += 1;
        let generation = state.generation;
        if let Some(handle) = state.in_flight.take() {
            handle.abort();
        }

        self.status.set(MSG_LOADING);
        let handle = tokio::spawn(Self::run_fetch(
            self.map.clone(),
            self.service.clone(),
            self.status.clone(),
            self.state.clone(),
            self.config.clone(),
            generation,
            view,
        ));
        state.in_flight = Some(handle);
    }

    async fn run_fetch(
        map: Arc<Mutex<Map>>,
        service: Arc<dyn ParcelService>,
        status: StatusLine,
        state: Arc<Mutex<LabelerState>>,
        config: LabelerConfig,
        generation: u64,
        view: LatLngBounds,
    ) {
        let filter =
            QueryFilter::by_envelope(view).with_max_records(config.record_cap as usize);
        let result = service.query(config.query_layer, filter).await;

        // Only the newest request may apply its outcome. The stale check
        // and the map update share one critical section: a disable() or a
        // newer fetch that wins the lock first leaves this one nothing to
        // render into.
        let mut current = state.lock().unwrap();
        if !current.enabled || current.generation != generation {
            log::debug!("discarding stale parcel fetch (generation {generation})");
            return;
        }
        current.in_flight = None;

        match result {
            Ok(collection) => Self::render(&map, &status, &config, &collection),
            Err(err) => {
                log::warn!("parcel fetch failed: {err}");
                status.set(MSG_ERROR);
            }
        }
    }

    fn render(
        map: &Arc<Mutex<Map>>,
        status: &StatusLine,
        config: &LabelerConfig,
        collection: &FeatureCollection,
    ) {
        let polygons_id = SlotKind::ParcelPolygons.layer_id();
        let mut polygons = VectorLayer::new(
            polygons_id.to_string(),
            "Padrones".to_string(),
            PolygonStyle::parcel(),
        );
        let mut labels = LabelLayer::new(
            SlotKind::ParcelLabels.layer_id().to_string(),
            "Etiquetas de padrones".to_string(),
        );

        for (index, feature) in collection.features.iter().enumerate() {
            let key = feature
                .property_i64("NroPadron")
                .map(|nro| nro.to_string())
                .unwrap_or_else(|| format!("{polygons_id}-{index}"));
            polygons.push_feature(key.clone(), feature, usize::MAX);

            let Some(geometry) = &feature.geometry else {
                continue;
            };
            let Ok(center) = geometry.bbox_center() else {
                continue;
            };
            let text = label_for(feature);
            if !text.is_empty() {
                labels.push(key, center, text);
            }
        }

        let count = collection.len();
        {
            let mut map = map.lock().unwrap();
            clear_slot(&mut map, SlotKind::ParcelPolygons);
            clear_slot(&mut map, SlotKind::ParcelLabels);
            if count > 0 {
                let _ = replace_slot(&mut map, SlotKind::ParcelPolygons, Box::new(polygons));
                let _ = replace_slot(&mut map, SlotKind::ParcelLabels, Box::new(labels));
            }
        }

        if count == 0 {
            status.set(MSG_EMPTY);
        } else if count >= config.record_cap as usize {
            status.set(format!("Se muestran los primeros {count} padrones"));
        } else {
            status.set(format!("{count} padrones visibles"));
        }
    }

    /// Waits for the in-flight fetch, if any, to finish or be aborted
    pub async fn settle(&self) {
        let handle = self.state.lock().unwrap().in_flight.take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geo::{LatLng, Point};
    use crate::prelude::HashMap;
    use crate::Result;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct StubService {
        features: Vec<Feature>,
        delay: Duration,
        gate: Option<Arc<tokio::sync::Semaphore>>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ParcelService for StubService {
        async fn query(&self, _layer_id: u32, _filter: QueryFilter) -> Result<FeatureCollection> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                let _ = gate.acquire().await;
            }
            tokio::time::sleep(self.delay).await;
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

    fn parcel_feature(nro: i64, depto_padron: Option<&str>) -> Feature {
        let mut properties: HashMap<String, serde_json::Value> = HashMap::default();
        properties.insert("NroPadron".to_string(), serde_json::json!(nro));
        if let Some(code) = depto_padron {
            properties.insert("DeptoPadron".to_string(), serde_json::json!(code));
        }
        Feature {
            id: None,
            geometry: Some(
                serde_json::from_value(serde_json::json!({
                    "type": "Polygon",
                    "coordinates": [[[-56.21, -34.91], [-56.19, -34.91], [-56.19, -34.89], [-56.21, -34.91]]]
                }))
                .unwrap(),
            ),
            properties: Some(properties),
        }
    }

    fn labeler_with(
        features: Vec<Feature>,
        delay: Duration,
    ) -> (ParcelLabeler, Arc<Mutex<Map>>, Arc<StubService>) {
        let map = Arc::new(Mutex::new(Map::new(
            LatLng::new(-34.9, -56.2),
            13.0,
            Point::new(800.0, 600.0),
        )));
        let service = Arc::new(StubService {
            features,
            delay,
            gate: None,
            calls: AtomicUsize::new(0),
        });
        let labeler = ParcelLabeler::new(
            map.clone(),
            service.clone(),
            StatusLine::new(),
            LabelerConfig::default(),
        );
        (labeler, map, service)
    }

    #[test]
    fn test_label_precedence() {
        assert_eq!(label_for(&parcel_feature(42, Some("MVD-42"))), "MVD-42");
        assert_eq!(label_for(&parcel_feature(42, None)), "Padrón 42");

        let mut properties: HashMap<String, serde_json::Value> = HashMap::default();
        properties.insert(
            "NomDepartamento".to_string(),
            serde_json::json!("Canelones"),
        );
        let feature = Feature {
            id: None,
            geometry: None,
            properties: Some(properties),
        };
        assert_eq!(label_for(&feature), "Canelones");

        let bare = Feature {
            id: None,
            geometry: None,
            properties: None,
        };
        assert_eq!(label_for(&bare), "");
    }

    #[tokio::test]
    async fn test_fetch_renders_polygons_and_labels() {
        let (labeler, map, _service) =
            labeler_with(vec![parcel_feature(12345, None)], Duration::ZERO);
        labeler.enable();
        labeler.settle().await;

        let map = map.lock().unwrap();
        assert!(map.has_layer(SlotKind::ParcelPolygons.layer_id()));
        assert!(map.has_layer(SlotKind::ParcelLabels.layer_id()));
        assert_eq!(
            labeler.status.message().as_deref(),
            Some("1 padrones visibles")
        );
    }

    #[tokio::test]
    async fn test_below_min_zoom_skips_request_and_keeps_parcels() {
        let (labeler, map, service) =
            labeler_with(vec![parcel_feature(1, None)], Duration::ZERO);
        labeler.enable();
        labeler.settle().await;
        assert!(map.lock().unwrap().has_layer(SlotKind::ParcelPolygons.layer_id()));

        map.lock().unwrap().set_view(LatLng::new(-34.9, -56.2), 9.0);
        labeler.schedule_fetch();
        labeler.settle().await;

        assert_eq!(service.calls.load(Ordering::SeqCst), 1);
        assert!(map.lock().unwrap().has_layer(SlotKind::ParcelPolygons.layer_id()));
        assert_eq!(labeler.status.message().as_deref(), Some(MSG_ZOOM_IN));
    }

    #[tokio::test]
    async fn test_superseded_fetch_never_lands() {
        let (labeler, map, _service) = labeler_with(
            vec![parcel_feature(1, None)],
            Duration::from_millis(50),
        );
        labeler.enable();
        // Supersede immediately, then let the replacement finish
        labeler.schedule_fetch();
        labeler.settle().await;
        tokio::time::sleep(Duration::from_millis(120)).await;

        // The aborted first fetch must not have rendered a second time
        let map = map.lock().unwrap();
        assert!(map.has_layer(SlotKind::ParcelPolygons.layer_id()));
        assert_eq!(map.layer_count(), 2);
    }

    #[tokio::test]
    async fn test_enable_is_idempotent() {
        let (labeler, _map, service) =
            labeler_with(vec![parcel_feature(1, None)], Duration::ZERO);
        labeler.enable();
        labeler.enable();
        labeler.settle().await;

        assert_eq!(service.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_disable_cancels_and_clears() {
        let (labeler, map, _service) = labeler_with(
            vec![parcel_feature(1, None)],
            Duration::from_millis(50),
        );
        labeler.enable();
        labeler.disable();
        labeler.disable();
        tokio::time::sleep(Duration::from_millis(120)).await;

        assert!(!labeler.is_enabled());
        let map = map.lock().unwrap();
        assert!(!map.has_layer(SlotKind::ParcelPolygons.layer_id()));
        assert!(!map.has_layer(SlotKind::ParcelLabels.layer_id()));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_disable_cannot_interleave_with_a_landing_fetch() {
        // A fetch past its last await can no longer be aborted; disable()
        // must then run strictly after its render, never between the
        // staleness check and the map update.
        let gate = Arc::new(tokio::sync::Semaphore::new(0));
        let map = Arc::new(Mutex::new(Map::new(
            LatLng::new(-34.9, -56.2),
            13.0,
            Point::new(800.0, 600.0),
        )));
        let service = Arc::new(StubService {
            features: vec![parcel_feature(1, None)],
            delay: Duration::ZERO,
            gate: Some(gate.clone()),
            calls: AtomicUsize::new(0),
        });
        let labeler = Arc::new(ParcelLabeler::new(
            map.clone(),
            service.clone(),
            StatusLine::new(),
            LabelerConfig::default(),
        ));

        labeler.enable();
        while service.calls.load(Ordering::SeqCst) == 0 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }

        // Park the fetch on the map mutex inside its render. While `held`
        // is alive a worker is blocked on this mutex, so these waits must
        // not rely on the runtime timer (F8): use thread sleeps instead.
        let held = map.lock().unwrap();
        gate.add_permits(1);
        std::thread::sleep(Duration::from_millis(20));

        let off = {
            let labeler = labeler.clone();
            std::thread::spawn(move || labeler.disable())
        };
        std::thread::sleep(Duration::from_millis(20));
        drop(held);
        off.join().unwrap();

        // The render landed first, then disable cleared it
        assert!(!labeler.is_enabled());
        let map = map.lock().unwrap();
        assert!(!map.has_layer(SlotKind::ParcelPolygons.layer_id()));
        assert!(!map.has_layer(SlotKind::ParcelLabels.layer_id()));
    }

    #[tokio::test]
    async fn test_zero_parcels_distinct_status() {
        let (labeler, map, _service) = labeler_with(vec![], Duration::ZERO);
        labeler.enable();
        labeler.settle().await;

        assert_eq!(labeler.status.message().as_deref(), Some(MSG_EMPTY));
        assert!(!map.lock().unwrap().has_layer(SlotKind::ParcelPolygons.layer_id()));
    }
}
