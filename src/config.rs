//! Configuration management

use anyhow::{Context, Result};

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// NATS server URL
    pub nats_url: String,

    /// PostgreSQL connection string
    pub database_url: String,

    /// Mapbox access token (optional, falls back to mock providers)
    pub mapbox_access_token: Option<String>,

    /// Mapbox API base URL
    pub mapbox_base_url: String,

    /// Geocoder backend: "mapbox" or "mock"
    pub geocoder_backend: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();

        let nats_url =
            std::env::var("NATS_URL").unwrap_or_else(|_| "nats://localhost:4222".to_string());

        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;

        let mapbox_access_token = std::env::var("MAPBOX_ACCESS_TOKEN")
            .ok()
            .filter(|token| !token.is_empty());

        let mapbox_base_url = std::env::var("MAPBOX_BASE_URL")
            .unwrap_or_else(|_| "https://api.mapbox.com".to_string());

        let geocoder_backend =
            std::env::var("GEOCODER_BACKEND").unwrap_or_else(|_| "mapbox".to_string());

        Ok(Self {
            nats_url,
            database_url,
            mapbox_access_token,
            mapbox_base_url,
            geocoder_backend,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[ignore] // requires --test-threads=1 due to env var race
    fn test_config_token_none_when_not_set() {
        std::env::remove_var("MAPBOX_ACCESS_TOKEN");
        std::env::set_var("DATABASE_URL", "postgres://test");

        let config = Config::from_env().unwrap();
        assert!(config.mapbox_access_token.is_none());
    }

    #[test]
    #[ignore] // requires --test-threads=1 due to env var race
    fn test_config_empty_token_treated_as_unset() {
        std::env::set_var("MAPBOX_ACCESS_TOKEN", "");
        std::env::set_var("DATABASE_URL", "postgres://test");

        let config = Config::from_env().unwrap();
        assert!(config.mapbox_access_token.is_none());

        std::env::remove_var("MAPBOX_ACCESS_TOKEN");
    }

    #[test]
    fn test_config_base_url_uses_local_when_set() {
        std::env::set_var("MAPBOX_BASE_URL", "http://localhost:8080");
        std::env::set_var("DATABASE_URL", "postgres://test");

        let config = Config::from_env().unwrap();
        assert_eq!(config.mapbox_base_url, "http://localhost:8080");

        // Cleanup
        std::env::remove_var("MAPBOX_BASE_URL");
    }

    #[test]
    #[ignore] // requires --test-threads=1 due to env var race
    fn test_config_geocoder_backend_defaults_to_mapbox() {
        std::env::remove_var("GEOCODER_BACKEND");
        std::env::set_var("DATABASE_URL", "postgres://test");

        let config = Config::from_env().unwrap();
        assert_eq!(config.geocoder_backend, "mapbox");
    }
}
