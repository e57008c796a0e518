//! Trip message handlers

use std::sync::Arc;

use anyhow::Result;
use async_nats::{Client, Subscriber};
use futures::StreamExt;
use sqlx::PgPool;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::db::queries;
use crate::services::eld::{self, TripFacts};
use crate::services::geocoding::Geocoder;
use crate::services::hos;
use crate::services::routing::RoutingProvider;
use crate::types::{
    CalculateTripRequest, CalculateTripResponse, ErrorResponse, GetTripResponse, ListRequest,
    ListResponse, Request, SuccessResponse, Trip, TripIdRequest,
};

/// Handle trip.calculate messages: geocode, route, plan HOS stops,
/// derive daily logs, persist, reply.
pub async fn handle_calculate(
    client: Client,
    mut subscriber: Subscriber,
    pool: PgPool,
    geocoder: Arc<dyn Geocoder>,
    routing: Arc<dyn RoutingProvider>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received trip.calculate message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<CalculateTripRequest> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse request: {}", e);
                let error = ErrorResponse::new(Uuid::nil(), "INVALID_REQUEST", e.to_string());
                let _ = client
                    .publish(reply, serde_json::to_vec(&error)?.into())
                    .await;
                continue;
            }
        };

        let payload = request.payload;
        if let Err(message) = payload.validate() {
            let error = ErrorResponse::new(request.id, "INVALID_REQUEST", message);
            let _ = client
                .publish(reply, serde_json::to_vec(&error)?.into())
                .await;
            continue;
        }

        info!(
            "Calculating trip {} -> {} -> {}",
            payload.current_location, payload.pickup_location, payload.drop_off_location
        );

        // Geocode the three named places into route waypoints.
        let places = [
            &payload.current_location,
            &payload.pickup_location,
            &payload.drop_off_location,
        ];
        let mut waypoints = Vec::with_capacity(places.len());
        let mut geocode_error = None;
        for place in places {
            match geocoder.geocode(place).await {
                Ok(Some(resolved)) => waypoints.push(resolved.coordinates),
                Ok(None) => {
                    geocode_error = Some(format!("Location not found: {}", place));
                    break;
                }
                Err(e) => {
                    error!("Geocoding failed for '{}': {}", place, e);
                    geocode_error = Some(format!("Geocoding failed for '{}': {}", place, e));
                    break;
                }
            }
        }
        if let Some(message) = geocode_error {
            let error = ErrorResponse::new(request.id, "GEOCODING_ERROR", message);
            let _ = client
                .publish(reply, serde_json::to_vec(&error)?.into())
                .await;
            continue;
        }

        // Road route over current -> pickup -> drop-off.
        let route = match routing.route(&waypoints).await {
            Ok(route) => route,
            Err(e) => {
                error!("Routing failed: {}", e);
                let error = ErrorResponse::new(request.id, "ROUTING_ERROR", e.to_string());
                let _ = client
                    .publish(reply, serde_json::to_vec(&error)?.into())
                    .await;
                continue;
            }
        };

        let available_hours = hos::compute_available_hours(payload.current_cycle_used);

        let stops = match hos::plan_rest_stops(
            route.distance_miles,
            route.duration_hours,
            payload.current_cycle_used,
        ) {
            Ok(stops) => stops,
            Err(e) => {
                // The trip as described cannot contain pickup, drop-off
                // and any driving; a client-input problem, not ours.
                let error = ErrorResponse::new(request.id, "INVALID_TRIP", e.to_string());
                let _ = client
                    .publish(reply, serde_json::to_vec(&error)?.into())
                    .await;
                continue;
            }
        };

        let daily_logs = eld::generate_daily_logs(
            &TripFacts {
                current_location: &payload.current_location,
                pickup_location: &payload.pickup_location,
                drop_off_location: &payload.drop_off_location,
                total_distance: route.distance_miles,
                total_duration: route.duration_hours,
            },
            &stops,
        );

        let available_payload: crate::types::AvailableHoursPayload = available_hours.into();
        let route_data = serde_json::json!({
            "geometry": route.geometry,
            "waypoints": waypoints,
            "availableHours": available_payload,
        });

        match queries::trip::create_trip(
            &pool,
            &payload,
            route.distance_miles,
            route.duration_hours,
            route_data,
            &stops,
        )
        .await
        {
            Ok((trip, rest_stops)) => {
                info!(
                    "Stored trip {} ({:.1} mi, {} stops)",
                    trip.id,
                    trip.total_distance,
                    rest_stops.len()
                );
                let response = SuccessResponse::new(
                    request.id,
                    CalculateTripResponse {
                        trip,
                        rest_stops,
                        available_hours: available_payload,
                        daily_logs,
                    },
                );
                let _ = client
                    .publish(reply, serde_json::to_vec(&response)?.into())
                    .await;
            }
            Err(e) => {
                error!("Failed to store trip: {}", e);
                let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                let _ = client
                    .publish(reply, serde_json::to_vec(&error)?.into())
                    .await;
            }
        }
    }

    Ok(())
}

/// Handle trip.get messages
pub async fn handle_get(client: Client, mut subscriber: Subscriber, pool: PgPool) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received trip.get message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<TripIdRequest> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse request: {}", e);
                let error = ErrorResponse::new(Uuid::nil(), "INVALID_REQUEST", e.to_string());
                let _ = client
                    .publish(reply, serde_json::to_vec(&error)?.into())
                    .await;
                continue;
            }
        };

        match queries::trip::get_trip(&pool, request.payload.id).await {
            Ok(Some((trip, rest_stops))) => {
                let daily_logs = daily_logs_for(&trip, &rest_stops);
                let response = SuccessResponse::new(
                    request.id,
                    GetTripResponse {
                        trip,
                        rest_stops,
                        daily_logs,
                    },
                );
                let _ = client
                    .publish(reply, serde_json::to_vec(&response)?.into())
                    .await;
                debug!("Returned trip {}", request.payload.id);
            }
            Ok(None) => {
                let error = ErrorResponse::new(request.id, "NOT_FOUND", "Trip not found");
                let _ = client
                    .publish(reply, serde_json::to_vec(&error)?.into())
                    .await;
            }
            Err(e) => {
                error!("Failed to get trip: {}", e);
                let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                let _ = client
                    .publish(reply, serde_json::to_vec(&error)?.into())
                    .await;
            }
        }
    }

    Ok(())
}

/// Handle trip.list messages
pub async fn handle_list(client: Client, mut subscriber: Subscriber, pool: PgPool) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received trip.list message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<ListRequest> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse request: {}", e);
                let error = ErrorResponse::new(Uuid::nil(), "INVALID_REQUEST", e.to_string());
                let _ = client
                    .publish(reply, serde_json::to_vec(&error)?.into())
                    .await;
                continue;
            }
        };

        let limit = request.payload.limit.clamp(1, 200);
        let offset = request.payload.offset.max(0);

        match queries::trip::list_trips(&pool, limit, offset).await {
            Ok((trips, total)) => {
                let response = SuccessResponse::new(
                    request.id,
                    ListResponse {
                        items: trips,
                        total,
                        limit,
                        offset,
                    },
                );
                let _ = client
                    .publish(reply, serde_json::to_vec(&response)?.into())
                    .await;
                debug!("Listed {} trips", total);
            }
            Err(e) => {
                error!("Failed to list trips: {}", e);
                let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                let _ = client
                    .publish(reply, serde_json::to_vec(&error)?.into())
                    .await;
            }
        }
    }

    Ok(())
}

/// Re-derive the daily logs for a stored trip. Logs are not persisted;
/// they follow deterministically from the stored stops.
fn daily_logs_for(
    trip: &Trip,
    rest_stops: &[crate::types::StoredRestStop],
) -> Vec<eld::DailyLogSheet> {
    let stops: Vec<hos::RestStop> = rest_stops.iter().map(stored_to_plan_stop).collect();
    eld::generate_daily_logs(
        &TripFacts {
            current_location: &trip.current_location,
            pickup_location: &trip.pickup_location,
            drop_off_location: &trip.drop_off_location,
            total_distance: trip.total_distance,
            total_duration: trip.total_duration,
        },
        &stops,
    )
}

/// Rebuild a planner stop from its stored row. The stored `stop_type` is
/// the merged label ("10-hour rest + 34-hour reset"), so kinds are parsed
/// back from it.
fn stored_to_plan_stop(stored: &crate::types::StoredRestStop) -> hos::RestStop {
    let kinds = stored
        .stop_type
        .split(" + ")
        .filter_map(|label| match label {
            "10-hour rest" => Some(hos::StopKind::DailyRest),
            "34-hour reset" => Some(hos::StopKind::CycleReset),
            "30-min break" => Some(hos::StopKind::ShortBreak),
            "fuel" => Some(hos::StopKind::Fuel),
            _ => None,
        })
        .collect();

    hos::RestStop {
        kinds,
        duration_hours: stored.duration,
        distance_from_start: stored.distance_from_start,
        reason: String::new(),
    }
}
