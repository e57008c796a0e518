//! NATS message handlers

pub mod ping;
pub mod trip;

use std::sync::Arc;

use anyhow::Result;
use async_nats::Client;
use sqlx::PgPool;
use tokio::select;
use tracing::{error, info};

use crate::config::Config;
use crate::services::geocoding::{create_geocoder, Geocoder};
use crate::services::routing::{create_routing_provider, RoutingProvider};

/// Start all message handlers
pub async fn start_handlers(client: Client, pool: PgPool, config: &Config) -> Result<()> {
    info!("Starting message handlers...");

    let geocoder: Arc<dyn Geocoder> = Arc::from(create_geocoder(config));
    info!("Geocoder initialized: {}", geocoder.name());

    let routing: Arc<dyn RoutingProvider> = Arc::from(create_routing_provider(config));
    info!("Routing provider initialized: {}", routing.name());

    let mapbox_configured = config.mapbox_access_token.is_some();

    // Subscribe to all subjects
    let ping_sub = client.subscribe("roadlog.ping").await?;
    let trip_calculate_sub = client.subscribe("roadlog.trip.calculate").await?;
    let trip_get_sub = client.subscribe("roadlog.trip.get").await?;
    let trip_list_sub = client.subscribe("roadlog.trip.list").await?;

    // Clone shared handles per task
    let client_ping = client.clone();
    let client_calculate = client.clone();
    let client_get = client.clone();
    let client_list = client.clone();

    let pool_calculate = pool.clone();
    let pool_get = pool.clone();
    let pool_list = pool.clone();

    // Spawn handlers
    let ping_handle = tokio::spawn(async move {
        ping::handle_ping(client_ping, ping_sub, mapbox_configured).await
    });

    let trip_calculate_handle = tokio::spawn(async move {
        trip::handle_calculate(
            client_calculate,
            trip_calculate_sub,
            pool_calculate,
            geocoder,
            routing,
        )
        .await
    });

    let trip_get_handle = tokio::spawn(async move {
        trip::handle_get(client_get, trip_get_sub, pool_get).await
    });

    let trip_list_handle = tokio::spawn(async move {
        trip::handle_list(client_list, trip_list_sub, pool_list).await
    });

    info!("All handlers started");

    // A handler loop finishing means its subscription died; surface it.
    select! {
        result = ping_handle => {
            error!("Ping handler finished: {:?}", result);
        }
        result = trip_calculate_handle => {
            error!("Trip calculate handler finished: {:?}", result);
        }
        result = trip_get_handle => {
            error!("Trip get handler finished: {:?}", result);
        }
        result = trip_list_handle => {
            error!("Trip list handler finished: {:?}", result);
        }
    }

    Ok(())
}
