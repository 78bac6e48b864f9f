/*
 * src/geocoder.rs
 *
 * File for the Geocoder Adapter
 *
 * Purpose:
 *   Translate a free-form address into (lat, lon) via an external geocoding
 *   service. Used only when a query sets `StringSearchIsAnAddress=1`.
 */

use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

#[derive(Debug)]
pub enum GeocodeError {
    Http,
    Status(String),
    NoResults,
}

impl std::fmt::Display for GeocodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GeocodeError::Http => write!(f, "geocoder request failed"),
            GeocodeError::Status(s) => write!(f, "geocoder returned status {s}"),
            GeocodeError::NoResults => write!(f, "geocoder returned no results"),
        }
    }
}

impl std::error::Error for GeocodeError {}

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    status: String,
    results: Vec<GeocodeResult>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResult {
    geometry: GeocodeGeometry,
}

#[derive(Debug, Deserialize)]
struct GeocodeGeometry {
    location: GeocodeLocation,
}

#[derive(Debug, Deserialize)]
struct GeocodeLocation {
    lat: f64,
    lng: f64,
}

#[derive(Clone)]
pub struct Geocoder {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl Geocoder {
    pub fn new(base_url: String, api_key: Option<String>, timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("failed to build geocoder HTTP client");
        Geocoder { http, base_url, api_key }
    }

    /// Status != 200 or body status != "OK" both surface as
    /// [`GeocodeError`]. The caller substitutes an impossible predicate on
    /// failure rather than erroring the whole request.
    pub async fn geocode(&self, address: &str) -> Result<(f64, f64), GeocodeError> {
        let mut request = self.http.get(&self.base_url).query(&[("address", address)]);
        if let Some(key) = &self.api_key {
            request = request.query(&[("key", key.as_str())]);
        }

        let response = request.send().await.map_err(|e| {
            warn!("ERROR ->> geocoder request failed: {e}");
            GeocodeError::Http
        })?;

        if !response.status().is_success() {
            return Err(GeocodeError::Status(response.status().to_string()));
        }

        let body: GeocodeResponse = response.json().await.map_err(|_| GeocodeError::Http)?;
        if body.status != "OK" {
            return Err(GeocodeError::Status(body.status));
        }

        match body.results.into_iter().next() {
            Some(result) => Ok((result.geometry.location.lat, result.geometry.location.lng)),
            None => Err(GeocodeError::NoResults),
        }
    }
}
