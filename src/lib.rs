//! # padronmap
//!
//! A Rust-native viewer engine for Uruguayan cadastral (padrón) data.
//!
//! The crate loads GeoJSON overlays, bridges a remote ArcGIS MapServer,
//! labels parcels visible in the current viewport, and resolves free-text
//! addresses through a proxied Nominatim geocoder. All remote access goes
//! through service traits so the viewer logic can be exercised without a
//! network.

pub mod core;
pub mod data;
pub mod layers;
pub mod services;
pub mod viewer;

pub mod prelude;

// Re-export public API
pub use crate::core::{
    config::ViewerConfig,
    geo::{LatLng, LatLngBounds, Point},
    map::Map,
    viewport::Viewport,
};

pub use crate::layers::{
    base::LayerTrait, dynamic::DynamicOverlayLayer, label::LabelLayer, marker::Marker,
    vector::VectorLayer,
};

pub use crate::data::geojson::{Feature, FeatureCollection, GeoJson, Geometry};

pub use crate::services::{GeocodeCandidate, GeocodeService, ParcelService};

pub use crate::viewer::{StatusLine, ViewerSession};

/// Result type used throughout the library
pub type Result<T> = std::result::Result<T, MapError>;

/// Common error types
#[derive(Debug, thiserror::Error)]
pub enum MapError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The request was superseded by a newer one. Never surfaced to the user.
    #[error("request cancelled")]
    Cancelled,

    #[error("invalid geometry: {0}")]
    Geometry(String),

    #[error("invalid input: {0}")]
    Validation(String),

    #[error("missing dependency: {0}")]
    DependencyMissing(String),

    #[error("layer error: {0}")]
    Layer(String),

    #[error("parse error: {0}")]
    Parse(String),
}

impl MapError {
    /// Whether this error represents an explicitly superseded request.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, MapError::Cancelled)
    }
}

/// Error type alias for convenience
pub type Error = MapError;
