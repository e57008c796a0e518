//! Mapbox API client (Geocoding v5 + Directions v5)

use anyhow::{Context, Result};
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::types::Coordinates;

use super::routing::{RouteGeometry, RouteSummary};

const METERS_TO_MILES: f64 = 0.000621371;
const SECONDS_TO_HOURS: f64 = 1.0 / 3600.0;

/// Mapbox client configuration
#[derive(Debug, Clone)]
pub struct MapboxConfig {
    pub base_url: String,
    pub access_token: String,
    /// Request timeout in seconds
    pub timeout_seconds: u64,
}

impl MapboxConfig {
    pub fn new(base_url: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            access_token: access_token.into(),
            timeout_seconds: 30,
        }
    }
}

/// A geocoded place: coordinates plus the label Mapbox resolved for it
#[derive(Debug, Clone)]
pub struct GeocodedPlace {
    pub coordinates: Coordinates,
    pub place_name: String,
}

// --- Geocoding v5 response ---

#[derive(Debug, Deserialize)]
struct GeocodingResponse {
    features: Vec<GeocodingFeature>,
}

#[derive(Debug, Deserialize)]
struct GeocodingFeature {
    place_name: String,
    geometry: FeatureGeometry,
}

#[derive(Debug, Deserialize)]
struct FeatureGeometry {
    /// `[longitude, latitude]`
    coordinates: [f64; 2],
}

// --- Directions v5 response ---

#[derive(Debug, Deserialize)]
struct DirectionsResponse {
    routes: Vec<DirectionsRoute>,
}

#[derive(Debug, Deserialize)]
struct DirectionsRoute {
    /// Meters
    distance: f64,
    /// Seconds
    duration: f64,
    geometry: RouteGeometry,
}

/// Mapbox HTTP client
pub struct MapboxClient {
    client: Client,
    config: MapboxConfig,
}

impl MapboxClient {
    pub fn new(config: MapboxConfig) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_seconds))
            .build()
            .expect("Failed to create HTTP client");

        Self { client, config }
    }

    /// Geocode a place name to coordinates. Returns `None` when Mapbox
    /// has no match for the query.
    pub async fn geocode(&self, place: &str) -> Result<Option<GeocodedPlace>> {
        let url = format!(
            "{}/geocoding/v5/mapbox.places/{}.json?access_token={}&limit=1",
            self.config.base_url,
            urlencoding::encode(place),
            self.config.access_token,
        );

        debug!("Geocoding '{}' via Mapbox", place);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .context("Failed to send geocoding request to Mapbox")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Mapbox geocoding returned error {}: {}", status, body);
        }

        let data: GeocodingResponse = response
            .json()
            .await
            .context("Failed to parse Mapbox geocoding response")?;

        Ok(data.features.into_iter().next().map(|feature| {
            let [lng, lat] = feature.geometry.coordinates;
            GeocodedPlace {
                coordinates: Coordinates { lat, lng },
                place_name: feature.place_name,
            }
        }))
    }

    /// Fetch the driving route through the given waypoints. Distance is
    /// converted to miles, duration to hours; geometry stays GeoJSON.
    pub async fn directions(&self, waypoints: &[Coordinates]) -> Result<RouteSummary> {
        let coordinates = waypoints
            .iter()
            .map(|c| format!("{},{}", c.lng, c.lat))
            .collect::<Vec<_>>()
            .join(";");

        let url = format!(
            "{}/directions/v5/mapbox/driving/{}?access_token={}&geometries=geojson&overview=full",
            self.config.base_url, coordinates, self.config.access_token,
        );

        debug!("Requesting directions for {} waypoints", waypoints.len());

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .context("Failed to send directions request to Mapbox")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Mapbox directions returned error {}: {}", status, body);
        }

        let data: DirectionsResponse = response
            .json()
            .await
            .context("Failed to parse Mapbox directions response")?;

        let route = data
            .routes
            .into_iter()
            .next()
            .context("No route found between locations")?;

        Ok(RouteSummary {
            distance_miles: route.distance * METERS_TO_MILES,
            duration_hours: route.duration * SECONDS_TO_HOURS,
            geometry: route.geometry,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Live tests hit the real Mapbox API and need MAPBOX_ACCESS_TOKEN.

    fn live_client() -> Option<MapboxClient> {
        let token = std::env::var("MAPBOX_ACCESS_TOKEN").ok()?;
        Some(MapboxClient::new(MapboxConfig::new(
            "https://api.mapbox.com",
            token,
        )))
    }

    #[test]
    fn unit_conversions_match_mapbox_scales() {
        // 160 934 m ≈ 100 miles, 7200 s = 2 h.
        assert!((160_934.0 * METERS_TO_MILES - 100.0).abs() < 0.01);
        assert!((7200.0 * SECONDS_TO_HOURS - 2.0).abs() < 1e-9);
    }

    #[test]
    fn geocoding_response_parses_feature_coordinates() {
        let json = r#"{
            "features": [{
                "place_name": "Los Angeles, California, United States",
                "geometry": { "coordinates": [-118.2437, 34.0522] }
            }]
        }"#;
        let data: GeocodingResponse = serde_json::from_str(json).unwrap();
        let feature = &data.features[0];
        assert_eq!(feature.geometry.coordinates[0], -118.2437);
        assert_eq!(feature.geometry.coordinates[1], 34.0522);
    }

    #[test]
    fn directions_response_parses_route_scalars() {
        let json = r#"{
            "routes": [{
                "distance": 160934.0,
                "duration": 7200.0,
                "geometry": { "coordinates": [[-118.2, 34.0], [-112.0, 33.4]] }
            }]
        }"#;
        let data: DirectionsResponse = serde_json::from_str(json).unwrap();
        let route = &data.routes[0];
        assert!((route.distance * METERS_TO_MILES - 100.0).abs() < 0.01);
        assert_eq!(route.geometry.coordinates.len(), 2);
    }

    #[tokio::test]
    #[ignore = "requires live Mapbox API and MAPBOX_ACCESS_TOKEN"]
    async fn geocode_los_angeles() {
        let client = live_client().expect("MAPBOX_ACCESS_TOKEN not set");
        let place = client
            .geocode("Los Angeles, CA")
            .await
            .unwrap()
            .expect("Los Angeles should geocode");

        assert!((place.coordinates.lat - 34.05).abs() < 0.5);
        assert!((place.coordinates.lng + 118.24).abs() < 0.5);
    }
}
