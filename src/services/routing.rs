//! Routing abstraction: road distance, duration and geometry for a trip
//!
//! Uses Mapbox Directions in production, a haversine-based mock for tests
//! and token-less setups. The HOS core only ever consumes the two scalars
//! (`distance_miles`, `duration_hours`); geometry is stored with the trip
//! for map display.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::Config;
use crate::services::geo;
use crate::types::Coordinates;

use super::mapbox::{MapboxClient, MapboxConfig};

/// Route geometry as GeoJSON coordinates.
/// Coordinates are in [longitude, latitude] order (GeoJSON standard).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteGeometry {
    /// Array of [lng, lat] coordinates forming the route polyline
    pub coordinates: Vec<[f64; 2]>,
}

impl RouteGeometry {
    pub fn empty() -> Self {
        Self {
            coordinates: vec![],
        }
    }

    /// Straight lines through the given waypoints
    pub fn from_waypoints(waypoints: &[Coordinates]) -> Self {
        Self {
            coordinates: waypoints.iter().map(|c| [c.lng, c.lat]).collect(),
        }
    }
}

/// What the worker consumes from a routed trip
#[derive(Debug, Clone)]
pub struct RouteSummary {
    pub distance_miles: f64,
    pub duration_hours: f64,
    pub geometry: RouteGeometry,
}

/// Routing provider trait (Mapbox, mock, ...)
#[async_trait]
pub trait RoutingProvider: Send + Sync {
    /// Route through the waypoints in order
    async fn route(&self, waypoints: &[Coordinates]) -> Result<RouteSummary>;

    /// Provider name for logging
    fn name(&self) -> &'static str;
}

// ==========================================================================
// MockRouting
// ==========================================================================

/// Mock routing provider: haversine distance × road coefficient at a
/// fixed average speed, straight-line geometry
pub struct MockRouting {
    /// Straight-line to road-distance coefficient
    road_coefficient: f64,
    /// Average speed in mph for duration estimation
    average_speed_mph: f64,
}

impl Default for MockRouting {
    fn default() -> Self {
        Self {
            road_coefficient: 1.2,
            average_speed_mph: 55.0,
        }
    }
}

impl MockRouting {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_params(road_coefficient: f64, average_speed_mph: f64) -> Self {
        Self {
            road_coefficient,
            average_speed_mph,
        }
    }
}

#[async_trait]
impl RoutingProvider for MockRouting {
    async fn route(&self, waypoints: &[Coordinates]) -> Result<RouteSummary> {
        if waypoints.len() < 2 {
            anyhow::bail!("At least two waypoints are required for routing");
        }

        let distance_miles = geo::polyline_miles(waypoints) * self.road_coefficient;
        let duration_hours = distance_miles / self.average_speed_mph;

        Ok(RouteSummary {
            distance_miles,
            duration_hours,
            geometry: RouteGeometry::from_waypoints(waypoints),
        })
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

// ==========================================================================
// MapboxDirections
// ==========================================================================

/// Mapbox Directions v5 provider
pub struct MapboxDirections {
    client: MapboxClient,
}

impl MapboxDirections {
    pub fn new(config: MapboxConfig) -> Self {
        Self {
            client: MapboxClient::new(config),
        }
    }
}

#[async_trait]
impl RoutingProvider for MapboxDirections {
    async fn route(&self, waypoints: &[Coordinates]) -> Result<RouteSummary> {
        if waypoints.len() < 2 {
            anyhow::bail!("At least two waypoints are required for routing");
        }
        self.client.directions(waypoints).await
    }

    fn name(&self) -> &'static str {
        "mapbox"
    }
}

// ==========================================================================
// Factory
// ==========================================================================

/// Create the routing provider selected by configuration, falling back to
/// the mock when no Mapbox token is configured.
pub fn create_routing_provider(config: &Config) -> Box<dyn RoutingProvider> {
    match config.mapbox_access_token.clone() {
        Some(token) => {
            info!("Using Mapbox Directions at {}", config.mapbox_base_url);
            Box::new(MapboxDirections::new(MapboxConfig::new(
                config.mapbox_base_url.clone(),
                token,
            )))
        }
        None => {
            warn!("MAPBOX_ACCESS_TOKEN not set, using mock routing");
            Box::new(MockRouting::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn los_angeles() -> Coordinates {
        Coordinates {
            lat: 34.0522,
            lng: -118.2437,
        }
    }

    fn phoenix() -> Coordinates {
        Coordinates {
            lat: 33.4484,
            lng: -112.0740,
        }
    }

    fn dallas() -> Coordinates {
        Coordinates {
            lat: 32.7767,
            lng: -96.7970,
        }
    }

    #[tokio::test]
    async fn mock_routing_rejects_single_waypoint() {
        let provider = MockRouting::new();
        assert!(provider.route(&[los_angeles()]).await.is_err());
        assert!(provider.route(&[]).await.is_err());
    }

    #[tokio::test]
    async fn mock_routing_la_to_phoenix_is_plausible() {
        let provider = MockRouting::new();
        let route = provider.route(&[los_angeles(), phoenix()]).await.unwrap();

        // ~357 mi straight line × 1.2 ≈ 430 road miles (I-10 is ~370).
        assert!(
            route.distance_miles > 380.0 && route.distance_miles < 480.0,
            "got {} miles",
            route.distance_miles
        );

        // Distance over duration must equal the configured speed.
        let speed = route.distance_miles / route.duration_hours;
        assert!((speed - 55.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn mock_routing_chains_waypoints_in_order() {
        let provider = MockRouting::new();
        let one_leg = provider.route(&[los_angeles(), dallas()]).await.unwrap();
        let two_legs = provider
            .route(&[los_angeles(), phoenix(), dallas()])
            .await
            .unwrap();

        // Routing through a detour cannot be shorter than the direct leg.
        assert!(two_legs.distance_miles >= one_leg.distance_miles);
        assert_eq!(two_legs.geometry.coordinates.len(), 3);
        assert_eq!(two_legs.geometry.coordinates[0], [-118.2437, 34.0522]);
    }

    #[tokio::test]
    async fn mock_routing_custom_params() {
        let provider = MockRouting::with_params(1.5, 70.0);
        let route = provider.route(&[los_angeles(), phoenix()]).await.unwrap();
        let speed = route.distance_miles / route.duration_hours;
        assert!((speed - 70.0).abs() < 1e-9);
    }

    #[test]
    fn geometry_deserializes_ignoring_geojson_type_tag() {
        let json = r#"{ "type": "LineString", "coordinates": [[-118.2, 34.0]] }"#;
        let geometry: RouteGeometry = serde_json::from_str(json).unwrap();
        assert_eq!(geometry.coordinates, vec![[-118.2, 34.0]]);
    }

    #[test]
    fn factory_falls_back_to_mock_without_token() {
        let config = Config {
            nats_url: "nats://localhost:4222".to_string(),
            database_url: "postgres://test".to_string(),
            mapbox_access_token: None,
            mapbox_base_url: "https://api.mapbox.com".to_string(),
            geocoder_backend: "mapbox".to_string(),
        };
        let provider = create_routing_provider(&config);
        assert_eq!(provider.name(), "mock");
    }

    #[test]
    fn factory_uses_mapbox_when_token_present() {
        let config = Config {
            nats_url: "nats://localhost:4222".to_string(),
            database_url: "postgres://test".to_string(),
            mapbox_access_token: Some("pk.token".to_string()),
            mapbox_base_url: "https://api.mapbox.com".to_string(),
            geocoder_backend: "mapbox".to_string(),
        };
        let provider = create_routing_provider(&config);
        assert_eq!(provider.name(), "mapbox");
    }
}
