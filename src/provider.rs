//! Elevation provider client.
//!
//! The Google Elevation API takes a pipe-delimited, URL-encoded list of
//! `lat,lon` locations in a single GET and returns a JSON result per
//! location, in request order.

use std::time::Duration;

use serde::Deserialize;

use crate::coords::SamplePoint;
use crate::error::{Result, TerrainError};

/// Configuration for the elevation endpoint.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Elevation endpoint base URL.
    pub base_url: String,
    /// Provider-imposed maximum locations per request.
    pub location_limit: usize,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://maps.googleapis.com/maps/api/elevation/json".to_string(),
            location_limit: 250,
            timeout_secs: 60,
        }
    }
}

/// One elevation result as returned by the provider.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProviderPoint {
    pub lat: f64,
    pub lng: f64,
    pub elevation: f64,
    pub resolution: f64,
}

/// A source of elevation data for batches of sample points.
///
/// Implementations must return one result per requested point, in request
/// order; the acquirer zips results back onto the originating points to carry
/// their grid offsets through.
pub trait ElevationProvider {
    fn fetch(&self, batch: &[SamplePoint]) -> Result<Vec<ProviderPoint>>;

    fn location_limit(&self) -> usize;
}

#[derive(Debug, Deserialize)]
struct ElevationResponse {
    #[serde(default)]
    results: Vec<ElevationResult>,
    status: String,
}

#[derive(Debug, Deserialize)]
struct ElevationResult {
    location: Location,
    elevation: f64,
    resolution: f64,
}

#[derive(Debug, Deserialize)]
struct Location {
    lat: f64,
    lng: f64,
}

/// Blocking client for the Google Elevation API.
pub struct GoogleElevationProvider {
    config: ProviderConfig,
    api_key: String,
    client: reqwest::blocking::Client,
}

impl GoogleElevationProvider {
    pub fn new(config: ProviderConfig, api_key: impl Into<String>) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            config,
            api_key: api_key.into(),
            client,
        })
    }

    /// Request URL for one batch, with `,` and `|` pre-encoded as `%2C`/`%7C`.
    fn build_url(&self, batch: &[SamplePoint]) -> String {
        let locations: Vec<String> = batch
            .iter()
            .map(|p| format!("{}%2C{}", p.lat, p.lon))
            .collect();
        format!(
            "{}?locations={}&key={}",
            self.config.base_url,
            locations.join("%7C"),
            self.api_key
        )
    }
}

impl ElevationProvider for GoogleElevationProvider {
    fn fetch(&self, batch: &[SamplePoint]) -> Result<Vec<ProviderPoint>> {
        let url = self.build_url(batch);
        let response: ElevationResponse = self
            .client
            .get(&url)
            .send()?
            .error_for_status()?
            .json()
            .map_err(|e| TerrainError::InvalidProviderResponse(e.to_string()))?;

        if response.status != "OK" {
            return Err(TerrainError::InvalidProviderResponse(format!(
                "provider status {}",
                response.status
            )));
        }
        if response.results.len() != batch.len() {
            return Err(TerrainError::InvalidProviderResponse(format!(
                "{} results for {} requested locations",
                response.results.len(),
                batch.len()
            )));
        }

        Ok(response
            .results
            .into_iter()
            .map(|r| ProviderPoint {
                lat: r.location.lat,
                lng: r.location.lng,
                elevation: r.elevation,
                resolution: r.resolution,
            })
            .collect())
    }

    fn location_limit(&self) -> usize {
        self.config.location_limit
    }
}
