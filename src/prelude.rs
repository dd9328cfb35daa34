//! Common imports for working with the viewer

pub use crate::core::{
    config::{IdentifyConfig, LabelerConfig, SearchConfig, ViewerConfig},
    events::{MapEvent, EventManager},
    geo::{LatLng, LatLngBounds, Point},
    map::Map,
    viewport::Viewport,
};

pub use crate::data::geojson::{Feature, FeatureCollection, GeoJson, Geometry};

pub use crate::layers::{
    base::{LayerProperties, LayerTrait, LayerType},
    dynamic::{DynamicMapProvider, DynamicOverlayLayer, EsriDynamicProvider},
    label::LabelLayer,
    manager::LayerManager,
    marker::Marker,
    vector::{PolygonStyle, VectorLayer},
};

pub use crate::services::{
    arcgis::ArcGisClient, nominatim::NominatimClient, GeocodeCandidate, GeocodeService,
    ParcelService, QueryFilter,
};

pub use crate::viewer::{
    labeler::ParcelLabeler, search::SearchController, SlotKind, StatusLine, ViewerSession,
};

pub use crate::{MapError, Result};

// Fast hashing for string-keyed maps
pub use fxhash::{FxHashMap as HashMap, FxHashSet as HashSet};

pub use std::sync::Arc;
pub use std::time::Duration;
