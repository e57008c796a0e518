//! Trip types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::services::eld::DailyLogSheet;
use crate::services::hos::AvailableHours;

/// Latitude/longitude pair
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

/// Trip entity (one planned haul with its stored route)
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Trip {
    pub id: Uuid,
    pub current_location: String,
    pub pickup_location: String,
    pub drop_off_location: String,
    pub current_cycle_used: f64,
    /// Road distance in miles
    pub total_distance: f64,
    /// Driving plus on-duty time in hours
    pub total_duration: f64,
    /// `{ geometry, waypoints, availableHours }` as returned to clients
    pub route_data: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Stored rest stop, ordered by distance from the trip start
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct StoredRestStop {
    pub id: Uuid,
    pub trip_id: Uuid,
    pub location: String,
    pub stop_type: String,
    pub duration: f64,
    pub distance_from_start: f64,
}

/// Payload of `roadlog.trip.calculate`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalculateTripRequest {
    pub current_location: String,
    pub pickup_location: String,
    pub drop_off_location: String,
    pub current_cycle_used: f64,
}

impl CalculateTripRequest {
    /// Boundary validation. The HOS core assumes the cycle figure is
    /// already inside [0, 70] and does not re-check it.
    pub fn validate(&self) -> Result<(), String> {
        for (field, value) in [
            ("currentLocation", &self.current_location),
            ("pickupLocation", &self.pickup_location),
            ("dropOffLocation", &self.drop_off_location),
        ] {
            if value.trim().is_empty() {
                return Err(format!("{} must not be empty", field));
            }
            if value.len() > 255 {
                return Err(format!("{} must be at most 255 characters", field));
            }
        }
        if !(0.0..=70.0).contains(&self.current_cycle_used) {
            return Err("currentCycleUsed must be between 0 and 70 hours".to_string());
        }
        Ok(())
    }
}

/// Payload of `roadlog.trip.get`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TripIdRequest {
    pub id: Uuid,
}

/// Remaining duty-cycle capacity, as serialized into replies and into
/// the trip's `route_data`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailableHoursPayload {
    pub cycle_hours_available: f64,
    pub daily_driving_available: f64,
    pub daily_duty_available: f64,
}

impl From<AvailableHours> for AvailableHoursPayload {
    fn from(hours: AvailableHours) -> Self {
        Self {
            cycle_hours_available: hours.cycle_hours_available,
            daily_driving_available: hours.daily_driving_available,
            daily_duty_available: hours.daily_duty_available,
        }
    }
}

/// Reply to `roadlog.trip.calculate`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalculateTripResponse {
    pub trip: Trip,
    pub rest_stops: Vec<StoredRestStop>,
    pub available_hours: AvailableHoursPayload,
    pub daily_logs: Vec<DailyLogSheet>,
}

/// Reply to `roadlog.trip.get`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetTripResponse {
    pub trip: Trip,
    pub rest_stops: Vec<StoredRestStop>,
    pub daily_logs: Vec<DailyLogSheet>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(cycle: f64) -> CalculateTripRequest {
        CalculateTripRequest {
            current_location: "Los Angeles, CA".to_string(),
            pickup_location: "Phoenix, AZ".to_string(),
            drop_off_location: "Dallas, TX".to_string(),
            current_cycle_used: cycle,
        }
    }

    #[test]
    fn validate_accepts_cycle_bounds_inclusive() {
        assert!(request(0.0).validate().is_ok());
        assert!(request(70.0).validate().is_ok());
        assert!(request(25.5).validate().is_ok());
    }

    #[test]
    fn validate_rejects_cycle_out_of_range() {
        assert!(request(-0.1).validate().is_err());
        assert!(request(70.1).validate().is_err());
    }

    #[test]
    fn validate_rejects_blank_and_oversized_locations() {
        let mut req = request(10.0);
        req.pickup_location = "   ".to_string();
        assert!(req.validate().is_err());

        let mut req = request(10.0);
        req.drop_off_location = "x".repeat(256);
        assert!(req.validate().is_err());
    }
}
