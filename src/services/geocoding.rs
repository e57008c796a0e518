//! Geocoding abstraction layer
//!
//! Keeps the worker from ever hammering Mapbox:
//! - MockGeocoder for tests and token-less setups (deterministic, no network)
//! - MapboxGeocoder for production, behind a minimum-interval rate limiter
//!   and an in-memory result cache
//!
//! Backend selection via configuration: "mock" or "mapbox" (mapbox falls
//! back to mock when no access token is configured).

use std::collections::HashMap;
use std::time::{Duration, Instant};

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::config::Config;
use crate::types::Coordinates;

use super::mapbox::{GeocodedPlace, MapboxClient, MapboxConfig};

/// Geocoder trait - abstraction for all geocoding implementations
#[async_trait]
pub trait Geocoder: Send + Sync {
    /// Geocode a place name ("Los Angeles, CA") to coordinates.
    /// Returns None if the place cannot be resolved.
    async fn geocode(&self, place: &str) -> Result<Option<GeocodedPlace>>;

    /// Name of this geocoder implementation
    fn name(&self) -> &'static str;
}

// ==========================================================================
// MockGeocoder
// ==========================================================================

/// Mock geocoder for tests - returns deterministic fake coordinates
pub struct MockGeocoder;

impl MockGeocoder {
    pub fn new() -> Self {
        Self
    }

    /// Hash the query into coordinates inside the continental US, with a
    /// margin away from the coasts so mock routes stay on plausible land.
    fn hash_to_coordinates(place: &str) -> Coordinates {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut hasher = DefaultHasher::new();
        place.hash(&mut hasher);
        let hash = hasher.finish();

        const LAT_MIN: f64 = 31.0;
        const LAT_MAX: f64 = 45.0;
        const LNG_MIN: f64 = -115.0;
        const LNG_MAX: f64 = -80.0;

        let lat_normalized = ((hash >> 32) as f64) / (u32::MAX as f64);
        let lng_normalized = ((hash & 0xFFFF_FFFF) as f64) / (u32::MAX as f64);

        Coordinates {
            lat: LAT_MIN + lat_normalized * (LAT_MAX - LAT_MIN),
            lng: LNG_MIN + lng_normalized * (LNG_MAX - LNG_MIN),
        }
    }
}

impl Default for MockGeocoder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Geocoder for MockGeocoder {
    async fn geocode(&self, place: &str) -> Result<Option<GeocodedPlace>> {
        Ok(Some(GeocodedPlace {
            coordinates: Self::hash_to_coordinates(place),
            place_name: format!("{}, United States", place),
        }))
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

// ==========================================================================
// RateLimiter
// ==========================================================================

/// Rate limiter that enforces a minimum interval between calls
pub struct RateLimiter {
    last_call: Mutex<Option<Instant>>,
    min_interval: Duration,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            last_call: Mutex::new(None),
            min_interval,
        }
    }

    /// Wait until it's safe to make another call
    pub async fn wait(&self) {
        let mut last = self.last_call.lock().await;

        if let Some(last_time) = *last {
            let elapsed = last_time.elapsed();
            if elapsed < self.min_interval {
                let wait_time = self.min_interval - elapsed;
                drop(last);
                tokio::time::sleep(wait_time).await;
                last = self.last_call.lock().await;
            }
        }

        *last = Some(Instant::now());
    }
}

// ==========================================================================
// MapboxGeocoder
// ==========================================================================

/// Minimum interval between Mapbox geocoding requests (the free tier
/// allows 600 req/min; 100ms keeps well under it)
const DEFAULT_RATE_LIMIT_MS: u64 = 100;

/// Rate-limited, caching Mapbox geocoder.
///
/// Place names repeat constantly across trips, so resolved results are
/// kept in an in-memory map for the lifetime of the process. Entries are
/// never evicted; the working set is a few hundred city names.
pub struct MapboxGeocoder {
    client: MapboxClient,
    rate_limiter: RateLimiter,
    cache: RwLock<HashMap<String, GeocodedPlace>>,
}

impl MapboxGeocoder {
    pub fn new(config: MapboxConfig) -> Self {
        Self {
            client: MapboxClient::new(config),
            rate_limiter: RateLimiter::new(Duration::from_millis(DEFAULT_RATE_LIMIT_MS)),
            cache: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl Geocoder for MapboxGeocoder {
    async fn geocode(&self, place: &str) -> Result<Option<GeocodedPlace>> {
        let key = place.trim().to_lowercase();

        if let Some(cached) = self.cache.read().get(&key) {
            return Ok(Some(cached.clone()));
        }

        self.rate_limiter.wait().await;

        let result = self.client.geocode(place).await?;
        if let Some(ref resolved) = result {
            self.cache.write().insert(key, resolved.clone());
        }
        Ok(result)
    }

    fn name(&self) -> &'static str {
        "mapbox"
    }
}

// ==========================================================================
// Factory
// ==========================================================================

/// Create the geocoder selected by configuration.
///
/// `GEOCODER_BACKEND=mapbox` requires `MAPBOX_ACCESS_TOKEN`; without a
/// token the worker falls back to the mock so it stays usable offline.
pub fn create_geocoder(config: &Config) -> Box<dyn Geocoder> {
    match config.geocoder_backend.as_str() {
        "mapbox" => match config.mapbox_access_token.clone() {
            Some(token) => {
                info!("Using MapboxGeocoder");
                Box::new(MapboxGeocoder::new(MapboxConfig::new(
                    config.mapbox_base_url.clone(),
                    token,
                )))
            }
            None => {
                warn!("MAPBOX_ACCESS_TOKEN not set, falling back to MockGeocoder");
                Box::new(MockGeocoder::new())
            }
        },
        "mock" => {
            info!("Using MockGeocoder");
            Box::new(MockGeocoder::new())
        }
        other => {
            warn!("Unknown GEOCODER_BACKEND '{}', using mock", other);
            Box::new(MockGeocoder::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==========================================================================
    // MockGeocoder
    // ==========================================================================

    #[tokio::test]
    async fn mock_geocoder_resolves_any_place() {
        let geocoder = MockGeocoder::new();
        let result = geocoder.geocode("Los Angeles, CA").await.unwrap();
        assert!(result.is_some(), "MockGeocoder should always resolve");
    }

    #[tokio::test]
    async fn mock_geocoder_is_deterministic() {
        let geocoder = MockGeocoder::new();
        let a = geocoder.geocode("Phoenix, AZ").await.unwrap().unwrap();
        let b = geocoder.geocode("Phoenix, AZ").await.unwrap().unwrap();
        assert_eq!(a.coordinates.lat, b.coordinates.lat);
        assert_eq!(a.coordinates.lng, b.coordinates.lng);
    }

    #[tokio::test]
    async fn mock_geocoder_separates_distinct_places() {
        let geocoder = MockGeocoder::new();
        let la = geocoder.geocode("Los Angeles, CA").await.unwrap().unwrap();
        let dallas = geocoder.geocode("Dallas, TX").await.unwrap().unwrap();
        assert_ne!(la.coordinates.lat, dallas.coordinates.lat);
        assert_ne!(la.coordinates.lng, dallas.coordinates.lng);
    }

    #[tokio::test]
    async fn mock_geocoder_stays_inside_the_continental_us() {
        let geocoder = MockGeocoder::new();
        for place in ["Los Angeles, CA", "Phoenix, AZ", "Dallas, TX", "Denver, CO"] {
            let result = geocoder.geocode(place).await.unwrap().unwrap();
            assert!(
                result.coordinates.lat >= 31.0 && result.coordinates.lat <= 45.0,
                "latitude {} out of bounds for {}",
                result.coordinates.lat,
                place
            );
            assert!(
                result.coordinates.lng >= -115.0 && result.coordinates.lng <= -80.0,
                "longitude {} out of bounds for {}",
                result.coordinates.lng,
                place
            );
        }
    }

    #[tokio::test]
    async fn mock_geocoder_name_is_mock() {
        assert_eq!(MockGeocoder::new().name(), "mock");
    }

    // ==========================================================================
    // RateLimiter
    // ==========================================================================

    #[tokio::test]
    async fn rate_limiter_enforces_minimum_interval() {
        let limiter = RateLimiter::new(Duration::from_millis(100));

        let start = Instant::now();
        limiter.wait().await;
        assert!(
            start.elapsed() < Duration::from_millis(50),
            "first call should be immediate"
        );

        limiter.wait().await;
        assert!(
            start.elapsed() >= Duration::from_millis(100),
            "second call should wait, took {:?}",
            start.elapsed()
        );
    }

    #[tokio::test]
    async fn rate_limiter_allows_call_after_interval() {
        let limiter = RateLimiter::new(Duration::from_millis(50));

        limiter.wait().await;
        tokio::time::sleep(Duration::from_millis(60)).await;

        let start = Instant::now();
        limiter.wait().await;
        assert!(
            start.elapsed() < Duration::from_millis(20),
            "call after interval should be immediate, took {:?}",
            start.elapsed()
        );
    }

    // ==========================================================================
    // Factory
    // ==========================================================================

    fn test_config(backend: &str, token: Option<&str>) -> Config {
        Config {
            nats_url: "nats://localhost:4222".to_string(),
            database_url: "postgres://test".to_string(),
            mapbox_access_token: token.map(str::to_string),
            mapbox_base_url: "https://api.mapbox.com".to_string(),
            geocoder_backend: backend.to_string(),
        }
    }

    #[test]
    fn factory_honors_mock_backend() {
        let geocoder = create_geocoder(&test_config("mock", Some("pk.token")));
        assert_eq!(geocoder.name(), "mock");
    }

    #[test]
    fn factory_uses_mapbox_when_token_present() {
        let geocoder = create_geocoder(&test_config("mapbox", Some("pk.token")));
        assert_eq!(geocoder.name(), "mapbox");
    }

    #[test]
    fn factory_falls_back_to_mock_without_token() {
        let geocoder = create_geocoder(&test_config("mapbox", None));
        assert_eq!(geocoder.name(), "mock");
    }

    #[test]
    fn factory_falls_back_to_mock_on_unknown_backend() {
        let geocoder = create_geocoder(&test_config("google", Some("pk.token")));
        assert_eq!(geocoder.name(), "mock");
    }
}
