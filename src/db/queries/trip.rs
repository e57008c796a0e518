//! Trip database queries

use anyhow::Result;
use sqlx::PgPool;
use uuid::Uuid;

use crate::services::hos::RestStop;
use crate::types::{CalculateTripRequest, StoredRestStop, Trip};

const TRIP_COLUMNS: &str = "id, current_location, pickup_location, drop_off_location, \
     current_cycle_used, total_distance, total_duration, route_data, \
     created_at, updated_at";

/// Persist a trip with its rest stops in one transaction
pub async fn create_trip(
    pool: &PgPool,
    input: &CalculateTripRequest,
    total_distance: f64,
    total_duration: f64,
    route_data: serde_json::Value,
    stops: &[RestStop],
) -> Result<(Trip, Vec<StoredRestStop>)> {
    let mut tx = pool.begin().await?;

    let trip = sqlx::query_as::<_, Trip>(&format!(
        r#"
        INSERT INTO trips (
            id, current_location, pickup_location, drop_off_location,
            current_cycle_used, total_distance, total_duration, route_data,
            created_at, updated_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NOW(), NOW())
        RETURNING {TRIP_COLUMNS}
        "#
    ))
    .bind(Uuid::new_v4())
    .bind(&input.current_location)
    .bind(&input.pickup_location)
    .bind(&input.drop_off_location)
    .bind(input.current_cycle_used)
    .bind(total_distance)
    .bind(total_duration)
    .bind(route_data)
    .fetch_one(&mut *tx)
    .await?;

    let mut stored = Vec::with_capacity(stops.len());
    for stop in stops {
        let row = sqlx::query_as::<_, StoredRestStop>(
            r#"
            INSERT INTO rest_stops (
                id, trip_id, location, stop_type, duration, distance_from_start
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, trip_id, location, stop_type, duration, distance_from_start
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(trip.id)
        .bind(format!("Rest stop at mile {:.1}", stop.distance_from_start))
        .bind(stop.label())
        .bind(stop.duration_hours)
        .bind(stop.distance_from_start)
        .fetch_one(&mut *tx)
        .await?;
        stored.push(row);
    }

    tx.commit().await?;

    Ok((trip, stored))
}

/// Get a trip by ID, with its stops ordered by distance from the start
pub async fn get_trip(pool: &PgPool, id: Uuid) -> Result<Option<(Trip, Vec<StoredRestStop>)>> {
    let trip = sqlx::query_as::<_, Trip>(&format!(
        "SELECT {TRIP_COLUMNS} FROM trips WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    let Some(trip) = trip else {
        return Ok(None);
    };

    let stops = sqlx::query_as::<_, StoredRestStop>(
        r#"
        SELECT id, trip_id, location, stop_type, duration, distance_from_start
        FROM rest_stops
        WHERE trip_id = $1
        ORDER BY distance_from_start
        "#,
    )
    .bind(trip.id)
    .fetch_all(pool)
    .await?;

    Ok(Some((trip, stops)))
}

/// List trips newest first
pub async fn list_trips(pool: &PgPool, limit: i64, offset: i64) -> Result<(Vec<Trip>, i64)> {
    let trips = sqlx::query_as::<_, Trip>(&format!(
        r#"
        SELECT {TRIP_COLUMNS}
        FROM trips
        ORDER BY created_at DESC
        LIMIT $1 OFFSET $2
        "#
    ))
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    let (total,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM trips")
        .fetch_one(pool)
        .await?;

    Ok((trips, total))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::hos::plan_rest_stops;

    async fn test_pool() -> PgPool {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL not set");
        let pool = crate::db::create_pool(&url).await.unwrap();
        crate::db::run_migrations(&pool).await.unwrap();
        pool
    }

    fn sample_request() -> CalculateTripRequest {
        CalculateTripRequest {
            current_location: "Los Angeles, CA".to_string(),
            pickup_location: "Phoenix, AZ".to_string(),
            drop_off_location: "Dallas, TX".to_string(),
            current_cycle_used: 12.5,
        }
    }

    #[tokio::test]
    #[ignore = "requires a running Postgres and DATABASE_URL"]
    async fn create_and_fetch_round_trip() {
        let pool = test_pool().await;
        let stops = plan_rest_stops(1000.0, 20.0, 12.5).unwrap();

        let (trip, stored) = create_trip(
            &pool,
            &sample_request(),
            1000.0,
            20.0,
            serde_json::json!({ "waypoints": [] }),
            &stops,
        )
        .await
        .unwrap();

        assert_eq!(stored.len(), stops.len());

        let (fetched, fetched_stops) = get_trip(&pool, trip.id).await.unwrap().unwrap();
        assert_eq!(fetched.id, trip.id);
        assert_eq!(fetched_stops.len(), stops.len());
        // Stops come back ordered by distance.
        for pair in fetched_stops.windows(2) {
            assert!(pair[0].distance_from_start <= pair[1].distance_from_start);
        }
    }

    #[tokio::test]
    #[ignore = "requires a running Postgres and DATABASE_URL"]
    async fn list_returns_newest_first() {
        let pool = test_pool().await;
        let (trips, total) = list_trips(&pool, 10, 0).await.unwrap();
        assert!(total >= trips.len() as i64);
        for pair in trips.windows(2) {
            assert!(pair[0].created_at >= pair[1].created_at);
        }
    }
}
