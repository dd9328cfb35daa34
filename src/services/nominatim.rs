//! Nominatim forward geocoder, reached through the local proxy.

use crate::core::geo::LatLng;
use crate::services::{GeocodeCandidate, GeocodeService, HTTP_CLIENT};
use crate::{MapError, Result};

use async_trait::async_trait;
use serde::Deserialize;

/// Raw Nominatim hit; coordinates arrive as strings
#[derive(Debug, Deserialize)]
struct NominatimPlace {
    display_name: String,
    lat: String,
    lon: String,
    #[serde(default)]
    place_rank: Option<i64>,
    #[serde(rename = "type", default)]
    kind: Option<String>,
}

impl NominatimPlace {
    fn into_candidate(self) -> Result<GeocodeCandidate> {
        let lat: f64 = self
            .lat
            .parse()
            .map_err(|_| MapError::Parse(format!("bad latitude {:?}", self.lat)))?;
        let lon: f64 = self
            .lon
            .parse()
            .map_err(|_| MapError::Parse(format!("bad longitude {:?}", self.lon)))?;

        let position = LatLng::new(lat, lon);
        if !position.is_valid() {
            return Err(MapError::Geometry(format!(
                "out-of-range geocode position {lat},{lon}"
            )));
        }
        Ok(GeocodeCandidate {
            display_name: self.display_name,
            position,
            place_rank: self.place_rank,
            kind: self.kind,
        })
    }
}

/// Client for one Nominatim endpoint
pub struct NominatimClient {
    base_url: String,
}

impl NominatimClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }

    fn parse_places(places: Vec<NominatimPlace>) -> Vec<GeocodeCandidate> {
        // Hits with unparseable coordinates are dropped, not fatal
        places
            .into_iter()
            .filter_map(|place| match place.into_candidate() {
                Ok(candidate) => Some(candidate),
                Err(err) => {
                    log::warn!("skipping geocode hit: {err}");
                    None
                }
            })
            .collect()
    }
}

#[async_trait]
impl GeocodeService for NominatimClient {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<GeocodeCandidate>> {
        let url = format!("{}/search", self.base_url);
        log::debug!("geocoding {query:?} (limit {limit})");

        let places: Vec<NominatimPlace> = HTTP_CLIENT
            .get(&url)
            .query(&[("q", query), ("limit", &limit.to_string())])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(Self::parse_places(places))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_places() {
        let places: Vec<NominatimPlace> = serde_json::from_str(
            r#"[
                {
                    "display_name": "Montevideo, Uruguay",
                    "lat": "-34.9058",
                    "lon": "-56.1913",
                    "place_rank": 16,
                    "type": "city",
                    "class": "place"
                },
                {
                    "display_name": "broken",
                    "lat": "not-a-number",
                    "lon": "-56.0"
                }
            ]"#,
        )
        .unwrap();

        let candidates = NominatimClient::parse_places(places);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].display_name, "Montevideo, Uruguay");
        assert_eq!(candidates[0].place_rank, Some(16));
        assert_eq!(candidates[0].kind.as_deref(), Some("city"));
        assert!((candidates[0].position.lat + 34.9058).abs() < 1e-9);
    }
}
