//! GeoJSON document loading.

use crate::core::map::Map;
use crate::data::geojson::{FeatureCollection, GeoJson};
use crate::layers::vector::{PolygonStyle, VectorLayer};
use crate::services::HTTP_CLIENT;
use crate::viewer::{replace_slot, SlotKind, StatusLine};
use crate::Result;

use std::future::Future;
use std::sync::{Arc, Mutex};

/// Fetches and parses one GeoJSON document
pub async fn fetch_geojson(url: &str) -> Result<FeatureCollection> {
    log::debug!("fetching GeoJSON from {url}");
    let body = HTTP_CLIENT
        .get(url)
        .send()
        .await?
        .error_for_status()?
        .text()
        .await?;
    Ok(GeoJson::from_str(&body)?.into_collection())
}

/// Fetches a document, installs it into a slot, and fits the view to it.
/// Returns the number of features loaded.
pub async fn install_geojson(
    map: &Arc<Mutex<Map>>,
    status: &StatusLine,
    slot: SlotKind,
    name: &str,
    url: &str,
    style: PolygonStyle,
    popup_max: usize,
) -> Result<usize> {
    install_geojson_with(map, status, slot, name, fetch_geojson(url), style, popup_max).await
}

/// [`install_geojson`] with the document fetch supplied by the caller.
pub async fn install_geojson_with<F>(
    map: &Arc<Mutex<Map>>,
    status: &StatusLine,
    slot: SlotKind,
    name: &str,
    fetch: F,
    style: PolygonStyle,
    popup_max: usize,
) -> Result<usize>
where
    F: Future<Output = Result<FeatureCollection>>,
{
    status.set("Cargando capa…");

    let collection = match fetch.await {
        Ok(collection) => collection,
        Err(err) => {
            status.set(format!("Error al cargar la capa: {err}"));
            return Err(err);
        }
    };

    let count = collection.len();
    let layer = VectorLayer::from_collection(
        slot.layer_id().to_string(),
        name.to_string(),
        &collection,
        style,
        popup_max,
    );
    let bounds = collection.bounds();

    {
        let mut map = map.lock().unwrap();
        replace_slot(&mut map, slot, Box::new(layer))?;
        // Empty or point-degenerate documents load fine, they just don't move the view
        if let Some(bounds) = bounds {
            map.fit_bounds(&bounds, Some(20.0));
        }
    }

    status.set(format!("Capa cargada: {count} elementos"));
    Ok(count)
}
