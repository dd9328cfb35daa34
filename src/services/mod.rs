//! Remote data access: cadastral queries and geocoding.
//!
//! The viewer talks to the outside world exclusively through the
//! [`ParcelService`] and [`GeocodeService`] traits so controllers can be
//! exercised against in-memory stubs.

pub mod arcgis;
pub mod nominatim;

use crate::core::geo::{LatLng, LatLngBounds};
use crate::data::geojson::FeatureCollection;
use crate::Result;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// Shared HTTP client for all service implementations
pub(crate) static HTTP_CLIENT: Lazy<reqwest::Client> = Lazy::new(|| {
    reqwest::Client::builder()
        .user_agent(concat!("padronmap/", env!("CARGO_PKG_VERSION")))
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
});

/// Selection criteria for a cadastral query. Attribute and spatial
/// constraints may be combined; the service ANDs whatever is present.
#[derive(Debug, Clone, Default)]
pub struct QueryFilter {
    pub where_clause: Option<String>,
    pub envelope: Option<LatLngBounds>,
    pub point: Option<LatLng>,
    pub max_records: Option<usize>,
    pub return_geometry: bool,
}

impl QueryFilter {
    pub fn by_where(clause: impl Into<String>) -> Self {
        Self {
            where_clause: Some(clause.into()),
            return_geometry: true,
            ..Default::default()
        }
    }

    pub fn by_envelope(envelope: LatLngBounds) -> Self {
        Self {
            envelope: Some(envelope),
            return_geometry: true,
            ..Default::default()
        }
    }

    pub fn by_point(point: LatLng) -> Self {
        Self {
            point: Some(point),
            return_geometry: true,
            ..Default::default()
        }
    }

    pub fn with_max_records(mut self, max: usize) -> Self {
        self.max_records = Some(max);
        self
    }

    pub fn without_geometry(mut self) -> Self {
        self.return_geometry = false;
        self
    }
}

/// One geocoder hit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeocodeCandidate {
    pub display_name: String,
    pub position: LatLng,
    pub place_rank: Option<i64>,
    pub kind: Option<String>,
}

/// Access to the cadastral map service
#[async_trait]
pub trait ParcelService: Send + Sync {
    /// Queries one service layer for features matching the filter
    async fn query(&self, layer_id: u32, filter: QueryFilter) -> Result<FeatureCollection>;

    /// Identifies features near a clicked position across several layers
    async fn identify(
        &self,
        position: LatLng,
        view: &LatLngBounds,
        view_size: (u32, u32),
    ) -> Result<FeatureCollection>;
}

/// Forward geocoding
#[async_trait]
pub trait GeocodeService: Send + Sync {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<GeocodeCandidate>>;
}
