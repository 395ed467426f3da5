//! External geocoders. Both clients are thin: they fetch candidates and
//! report them verbatim; every acceptance rule lives in the cascade.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::common::error::Result;
use crate::domain::{GeocoderCandidate, PrecisionTag};

/// A geocoding backend. `rural` is forwarded so backends can tune their
/// query when the address is not an urban street; candidates come back in
/// the backend's own ranking order.
#[async_trait]
pub trait Geocoder: Send + Sync {
    fn name(&self) -> &'static str;

    async fn geocode(&self, address: &str, rural: bool) -> Result<Vec<GeocoderCandidate>>;
}

#[derive(Debug, Deserialize)]
struct NominatimResult {
    display_name: String,
    lat: String,
    lon: String,
}

/// OpenStreetMap Nominatim client (primary geocoder).
pub struct NominatimClient {
    client: Client,
    base_url: String,
    user_agent: String,
}

impl NominatimClient {
    pub fn new(base_url: String, user_agent: String, timeout: std::time::Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { client, base_url, user_agent }
    }
}

#[async_trait]
impl Geocoder for NominatimClient {
    fn name(&self) -> &'static str {
        "Nominatim"
    }

    async fn geocode(&self, address: &str, _rural: bool) -> Result<Vec<GeocoderCandidate>> {
        let query = format!("{}, Chile", address);
        let response = self
            .client
            .get(&self.base_url)
            .header("User-Agent", self.user_agent.as_str())
            .query(&[("q", query.as_str()), ("format", "json"), ("limit", "1")])
            .send()
            .await?
            .error_for_status()?;

        let results: Vec<NominatimResult> = response.json().await?;
        debug!(count = results.len(), "nominatim candidates");
        Ok(results
            .into_iter()
            .map(|r| GeocoderCandidate {
                display_name: r.display_name,
                lat: r.lat,
                lon: r.lon,
                precision: None,
            })
            .collect())
    }
}

#[derive(Debug, Deserialize)]
struct GoogleLocation {
    lat: f64,
    lng: f64,
}

#[derive(Debug, Deserialize)]
struct GoogleGeometry {
    location: GoogleLocation,
    location_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GoogleResult {
    formatted_address: String,
    geometry: GoogleGeometry,
}

#[derive(Debug, Deserialize)]
struct GoogleResponse {
    status: String,
    #[serde(default)]
    results: Vec<GoogleResult>,
}

/// Google Maps geocoding client (secondary geocoder). The only backend that
/// reports a location-precision tag per candidate.
pub struct GoogleMapsClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl GoogleMapsClient {
    pub fn new(base_url: String, api_key: String, timeout: std::time::Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { client, base_url, api_key }
    }

    fn parse_precision(tag: Option<&str>) -> Option<PrecisionTag> {
        match tag {
            Some("ROOFTOP") => Some(PrecisionTag::Rooftop),
            Some("RANGE_INTERPOLATED") => Some(PrecisionTag::RangeInterpolated),
            Some("GEOMETRIC_CENTER") => Some(PrecisionTag::GeometricCenter),
            Some("APPROXIMATE") => Some(PrecisionTag::Approximate),
            _ => None,
        }
    }
}

#[async_trait]
impl Geocoder for GoogleMapsClient {
    fn name(&self) -> &'static str {
        "Google Maps"
    }

    async fn geocode(&self, address: &str, _rural: bool) -> Result<Vec<GeocoderCandidate>> {
        let response = self
            .client
            .get(&self.base_url)
            .query(&[("address", address), ("key", self.api_key.as_str())])
            .send()
            .await?
            .error_for_status()?;

        let payload: GoogleResponse = response.json().await?;
        if payload.status != "OK" {
            warn!(status = %payload.status, "google geocoder returned non-OK status");
            return Ok(Vec::new());
        }

        Ok(payload
            .results
            .into_iter()
            .map(|r| GeocoderCandidate {
                display_name: r.formatted_address,
                lat: r.geometry.location.lat.to_string(),
                lon: r.geometry.location.lng.to_string(),
                precision: Self::parse_precision(r.geometry.location_type.as_deref()),
            })
            .collect())
    }
}
