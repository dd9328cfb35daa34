//! Esri MapServer client for the SNIG cadastral service.

use crate::core::config::IdentifyConfig;
use crate::core::geo::{LatLng, LatLngBounds};
use crate::data::geojson::{Feature, FeatureCollection, GeoJson};
use crate::prelude::HashMap;
use crate::services::{ParcelService, QueryFilter, HTTP_CLIENT};
use crate::{MapError, Result};

use async_trait::async_trait;
use serde_json::Value;

/// The cadastral attributes this engine cares about, pulled out of a
/// feature's untyped property bag. Every field is optional; the service
/// omits or nulls them freely.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParcelAttributes {
    pub nro_padron: Option<i64>,
    pub cod_departamento: Option<i64>,
    pub depto_padron: Option<String>,
    pub nom_departamento: Option<String>,
}

impl ParcelAttributes {
    pub fn of(feature: &Feature) -> Self {
        Self {
            nro_padron: feature.property_i64("NroPadron"),
            cod_departamento: feature.property_i64("CodDepartamento"),
            depto_padron: feature.property_str("DeptoPadron"),
            nom_departamento: feature.property_str("NomDepartamento"),
        }
    }
}

/// Client for one MapServer endpoint (typically a local reverse proxy)
pub struct ArcGisClient {
    base_url: String,
    identify: IdentifyConfig,
}

impl ArcGisClient {
    pub fn new(base_url: impl Into<String>, identify: IdentifyConfig) -> Self {
        Self {
            base_url: base_url.into(),
            identify,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Query-string pairs for a layer query. Kept separate from the
    /// request so the exact wire shape is testable offline.
    pub fn query_params(filter: &QueryFilter) -> Vec<(&'static str, String)> {
        let mut params: Vec<(&'static str, String)> = Vec::new();
        params.push((
            "where",
            filter.where_clause.clone().unwrap_or_else(|| "1=1".to_string()),
        ));
        if let Some(envelope) = &filter.envelope {
            params.push(("geometry", envelope.to_envelope_param()));
            params.push(("geometryType", "esriGeometryEnvelope".to_string()));
            params.push(("spatialRel", "esriSpatialRelIntersects".to_string()));
            params.push(("inSR", "4326".to_string()));
        } else if let Some(point) = &filter.point {
            params.push(("geometry", point.to_point_param()));
            params.push(("geometryType", "esriGeometryPoint".to_string()));
            params.push(("spatialRel", "esriSpatialRelIntersects".to_string()));
            params.push(("inSR", "4326".to_string()));
        }
        params.push(("outFields", "*".to_string()));
        params.push(("returnGeometry", filter.return_geometry.to_string()));
        if let Some(max) = filter.max_records {
            params.push(("resultRecordCount", max.to_string()));
        }
        params.push(("outSR", "4326".to_string()));
        params.push(("f", "geojson".to_string()));
        params
    }

    /// Query-string pairs for an identify request
    pub fn identify_params(
        position: LatLng,
        view: &LatLngBounds,
        view_size: (u32, u32),
        config: &IdentifyConfig,
    ) -> Vec<(&'static str, String)> {
        let layers = config
            .layers
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(",");
        vec![
            ("geometry", position.to_point_param()),
            ("geometryType", "esriGeometryPoint".to_string()),
            ("sr", "4326".to_string()),
            ("layers", format!("all:{layers}")),
            ("tolerance", config.tolerance.to_string()),
            ("mapExtent", view.to_envelope_param()),
            (
                "imageDisplay",
                format!("{},{},96", view_size.0, view_size.1),
            ),
            ("returnGeometry", "false".to_string()),
            ("f", "json".to_string()),
        ]
    }

    /// MapServer reports failures in a 200 body; surface them as errors
    fn ensure_service_ok(value: &Value) -> Result<()> {
        if let Some(error) = value.get("error") {
            let code = error.get("code").and_then(Value::as_i64).unwrap_or(-1);
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown MapServer error");
            return Err(MapError::Transport(format!(
                "MapServer error {code}: {message}"
            )));
        }
        Ok(())
    }

    fn identify_results_to_collection(value: Value) -> Result<FeatureCollection> {
        let results = value
            .get("results")
            .and_then(Value::as_array)
            .ok_or_else(|| {
                MapError::Transport("identify response missing results array".to_string())
            })?;

        let mut features = Vec::with_capacity(results.len());
        for result in results {
            let mut properties: HashMap<String, Value> = HashMap::default();
            if let Some(attributes) = result.get("attributes").and_then(Value::as_object) {
                for (key, val) in attributes {
                    properties.insert(key.clone(), val.clone());
                }
            }
            if let Some(layer_name) = result.get("layerName").and_then(Value::as_str) {
                properties.insert(
                    "layerName".to_string(),
                    Value::String(layer_name.to_string()),
                );
            }
            features.push(Feature {
                id: result.get("layerId").cloned(),
                geometry: None,
                properties: Some(properties),
            });
        }
        Ok(FeatureCollection { features })
    }
}

#[async_trait]
impl ParcelService for ArcGisClient {
    async fn query(&self, layer_id: u32, filter: QueryFilter) -> Result<FeatureCollection> {
        let url = format!("{}/{}/query", self.base_url, layer_id);
        let params = Self::query_params(&filter);
        log::debug!("MapServer query layer {layer_id}: {params:?}");

        let body = HTTP_CLIENT
            .get(&url)
            .query(&params)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let value: Value = serde_json::from_str(&body)?;
        Self::ensure_service_ok(&value)?;
        Ok(GeoJson::from_str(&body)?.into_collection())
    }

    async fn identify(
        &self,
        position: LatLng,
        view: &LatLngBounds,
        view_size: (u32, u32),
    ) -> Result<FeatureCollection> {
        let url = format!("{}/identify", self.base_url);
        let params = Self::identify_params(position, view, view_size, &self.identify);
        log::debug!("MapServer identify at {position:?}");

        let value: Value = HTTP_CLIENT
            .get(&url)
            .query(&params)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Self::ensure_service_ok(&value)?;
        Self::identify_results_to_collection(value)
    }
}
