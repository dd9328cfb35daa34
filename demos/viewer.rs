//! Headless viewer session against the live (proxied) SNIG services.
//!
//! Run with a local proxy forwarding /proxy/mapserver and /proxy/nominatim:
//! ```sh
//! cargo run --example headless_viewer --features debug
//! ```

use padronmap::core::config::ViewerConfig;
use padronmap::core::geo::{LatLng, Point};
use padronmap::layers::dynamic::EsriDynamicProvider;
use padronmap::layers::vector::PolygonStyle;
use padronmap::viewer::SlotKind;
use padronmap::services::arcgis::ArcGisClient;
use padronmap::services::nominatim::NominatimClient;
use padronmap::viewer::ViewerSession;

use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // Absolute URLs: the defaults are browser-relative proxy paths
    let mut config = ViewerConfig::default();
    config.mapserver_url = "http://localhost:5000/proxy/mapserver".to_string();
    config.nominatim_url = "http://localhost:5000/proxy/nominatim".to_string();
    let parcels = Arc::new(ArcGisClient::new(
        config.mapserver_url.clone(),
        config.identify.clone(),
    ));
    let geocoder = Arc::new(NominatimClient::new(config.nominatim_url.clone()));

    // Start over Montevideo at parcel-label zoom
    let session = ViewerSession::new(
        config.clone(),
        parcels,
        geocoder,
        LatLng::new(-34.9058, -56.1913),
        13.0,
        Point::new(1280.0, 800.0),
    );
    session.set_overlay_provider(Arc::new(EsriDynamicProvider::new(
        config.mapserver_url.clone(),
        config.identify.layers.clone(),
    )));

    if let Err(err) = session
        .load_geojson_layer(
            SlotKind::DepartmentOutline,
            "Departamentos",
            "http://localhost:5000/data/departamentos.geojson",
            PolygonStyle::default(),
        )
        .await
    {
        eprintln!("department outline unavailable: {err}");
    }

    session.overlay().enable()?;
    session.overlay().set_identify_mode(true);
    session.labeler().enable();
    session.labeler().settle().await;
    println!("status: {:?}", session.status().message());

    // Exact parcel lookup
    session.search().search_parcel(88022, Some(1)).await?;
    session.pump().await;
    session.labeler().settle().await;
    println!("status: {:?}", session.status().message());

    // Autocomplete: type, wait out the debounce, pick the first hit
    session.search().on_input("18 de Julio Montevideo");
    session.search().settle().await;
    for candidate in session.search().suggestions() {
        println!("suggestion: {}", candidate.display_name);
    }
    session.search().submit().await;
    session.pump().await;
    session.labeler().settle().await;

    // Identify whatever is under the new center
    let center = session.map().lock().unwrap().viewport().center;
    session.map().lock().unwrap().click(center);
    session.pump().await;
    if let Some(popup) = session.popup() {
        println!("identify at {:?}:\n{}", popup.position, popup.content);
    }

    println!("layers: {:?}", session.map().lock().unwrap().list_layers());
    Ok(())
}
