//! Viewer configuration
//!
//! Endpoint URLs and behavioral tuning for the viewer components. Defaults
//! match the SNIG catastro services as exposed through the local proxy.

use std::time::Duration;

/// Top-level configuration for a viewer session
#[derive(Debug, Clone, PartialEq)]
pub struct ViewerConfig {
    /// Base URL of the (proxied) ArcGIS MapServer
    pub mapserver_url: String,
    /// Base URL of the (proxied) Nominatim geocoder
    pub nominatim_url: String,
    /// Maximum attribute rows rendered in a loaded-layer popup
    pub popup_max_attributes: usize,
    pub labeler: LabelerConfig,
    pub search: SearchConfig,
    pub identify: IdentifyConfig,
}

/// Tuning for the viewport parcel labeler
#[derive(Debug, Clone, PartialEq)]
pub struct LabelerConfig {
    /// Minimum zoom at which viewport queries are issued
    pub min_zoom: f64,
    /// Cap on records requested per viewport query. Matches the service's
    /// MaxRecordCount of 1000.
    pub record_cap: u32,
    /// MapServer sub-layer queried for parcels (1 = catastro rural y urbano)
    pub query_layer: u32,
}

/// Tuning for parcel search and address autocomplete
#[derive(Debug, Clone, PartialEq)]
pub struct SearchConfig {
    /// Quiet period after the last keystroke before a geocode lookup fires
    pub debounce: Duration,
    /// Inputs shorter than this close the suggestion list without a request
    pub min_query_len: usize,
    /// Maximum geocode candidates requested
    pub suggestion_limit: u32,
    /// Zoom applied when jumping to a selected candidate
    pub result_zoom: f64,
}

/// Tuning for identify-on-click against the remote overlay
#[derive(Debug, Clone, PartialEq)]
pub struct IdentifyConfig {
    /// Pixel tolerance around the click point
    pub tolerance: u32,
    /// Sub-layers included in the identify query
    pub layers: Vec<u32>,
    /// Maximum attribute rows rendered in the identify popup
    pub max_attributes: usize,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            mapserver_url: "/proxy/mapserver".to_string(),
            nominatim_url: "/proxy/nominatim".to_string(),
            popup_max_attributes: 20,
            labeler: LabelerConfig::default(),
            search: SearchConfig::default(),
            identify: IdentifyConfig::default(),
        }
    }
}

impl Default for LabelerConfig {
    fn default() -> Self {
        Self {
            min_zoom: 12.0,
            record_cap: 1000,
            query_layer: 1,
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(300),
            min_query_len: 3,
            suggestion_limit: 8,
            result_zoom: 16.0,
        }
    }
}

impl Default for IdentifyConfig {
    fn default() -> Self {
        Self {
            tolerance: 5,
            layers: vec![0, 1, 2],
            max_attributes: 25,
        }
    }
}
