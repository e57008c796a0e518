//! ELD daily duty logs
//!
//! Splits a rest-stop plan into per-day log sheets of the kind a driver's
//! electronic logging device would render: contiguous duty segments
//! (driving, on-duty, sleeper) with per-day mileage and hour totals.
//! Day boundaries fall on the nightly 10-hour rests (or 34-hour resets);
//! breaks and fuel stops show up as on-duty segments inside a day.
//!
//! Logs are derived, not stored: `trip.get` recomputes them from the
//! stored stops.

use serde::{Deserialize, Serialize};

use crate::services::hos::{RestStop, PICKUP_DROPOFF_HOURS};

/// Duty status of one log segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DutyStatus {
    Driving,
    OnDuty,
    Sleeper,
}

/// One contiguous block on a day's log grid
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DutySegment {
    pub status: DutyStatus,
    /// Hours since the day's first duty event
    pub start_hour: f64,
    pub duration: f64,
}

/// One day's log sheet
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyLogSheet {
    /// 1-based day number within the trip
    pub day: u32,
    pub start_location: String,
    pub end_location: String,
    pub total_miles: f64,
    pub total_driving_hours: f64,
    /// Includes driving; excludes sleeper time
    pub total_on_duty_hours: f64,
    pub segments: Vec<DutySegment>,
}

/// The trip facts the log generator needs
#[derive(Debug, Clone, Copy)]
pub struct TripFacts<'a> {
    pub current_location: &'a str,
    pub pickup_location: &'a str,
    pub drop_off_location: &'a str,
    pub total_distance: f64,
    pub total_duration: f64,
}

/// How a day's log sheet closes
enum Closing {
    /// Nightly rest or cycle reset of the given duration
    Sleeper(f64),
    /// Final day: the fixed drop-off allowance
    DropOff,
}

/// Generate the per-day log sheets for a planned trip.
///
/// `stops` is the ordered plan from the HOS simulator; merged stops keep
/// their combined duration (a 10h rest merged with a 34h reset shows as a
/// single 44h sleeper block).
pub fn generate_daily_logs(trip: &TripFacts, stops: &[RestStop]) -> Vec<DailyLogSheet> {
    let driving_duration = (trip.total_duration - 2.0 * PICKUP_DROPOFF_HOURS).max(1.0);
    let avg_speed = trip.total_distance / driving_duration;

    let mut sheets = Vec::new();
    let mut day = 1u32;
    let mut day_start_distance = 0.0;
    let mut cursor = 0usize;

    while cursor < stops.len() {
        let Some(offset) = stops[cursor..].iter().position(RestStop::ends_driving_day) else {
            break;
        };
        let boundary_index = cursor + offset;
        let boundary = &stops[boundary_index];

        sheets.push(build_sheet(
            trip,
            day,
            day_start_distance,
            boundary.distance_from_start,
            &stops[cursor..boundary_index],
            Closing::Sleeper(boundary.duration_hours),
            avg_speed,
        ));

        day_start_distance = boundary.distance_from_start;
        cursor = boundary_index + 1;
        day += 1;
    }

    // Final day, if any distance remains past the last nightly rest.
    if day_start_distance < trip.total_distance {
        sheets.push(build_sheet(
            trip,
            day,
            day_start_distance,
            trip.total_distance,
            &stops[cursor..],
            Closing::DropOff,
            avg_speed,
        ));
    }

    sheets
}

fn build_sheet(
    trip: &TripFacts,
    day: u32,
    day_start_distance: f64,
    day_end_distance: f64,
    intermediate: &[RestStop],
    closing: Closing,
    avg_speed: f64,
) -> DailyLogSheet {
    const EPS: f64 = 1e-9;

    let mut segments = Vec::new();
    let mut hour = 0.0;
    let mut driving_hours = 0.0;
    let mut other_duty_hours = 0.0;
    let mut position = day_start_distance;

    // Day 1 opens with the on-duty pickup allowance.
    if day == 1 {
        segments.push(DutySegment {
            status: DutyStatus::OnDuty,
            start_hour: hour,
            duration: PICKUP_DROPOFF_HOURS,
        });
        other_duty_hours += PICKUP_DROPOFF_HOURS;
        hour += PICKUP_DROPOFF_HOURS;
    }

    // Drive from the current position to `target`, if there is distance
    // left to cover.
    fn drive_to(
        segments: &mut Vec<DutySegment>,
        hour: &mut f64,
        driving_hours: &mut f64,
        position: &mut f64,
        target: f64,
        avg_speed: f64,
    ) {
        let duration = (target - *position) / avg_speed;
        if duration > EPS {
            segments.push(DutySegment {
                status: DutyStatus::Driving,
                start_hour: *hour,
                duration,
            });
            *driving_hours += duration;
            *hour += duration;
            *position = target;
        }
    }

    for stop in intermediate {
        drive_to(
            &mut segments,
            &mut hour,
            &mut driving_hours,
            &mut position,
            stop.distance_from_start,
            avg_speed,
        );
        segments.push(DutySegment {
            status: DutyStatus::OnDuty,
            start_hour: hour,
            duration: stop.duration_hours,
        });
        other_duty_hours += stop.duration_hours;
        hour += stop.duration_hours;
    }

    drive_to(
        &mut segments,
        &mut hour,
        &mut driving_hours,
        &mut position,
        day_end_distance,
        avg_speed,
    );

    let is_final = matches!(closing, Closing::DropOff);
    match closing {
        Closing::Sleeper(duration) => {
            segments.push(DutySegment {
                status: DutyStatus::Sleeper,
                start_hour: hour,
                duration,
            });
        }
        Closing::DropOff => {
            segments.push(DutySegment {
                status: DutyStatus::OnDuty,
                start_hour: hour,
                duration: PICKUP_DROPOFF_HOURS,
            });
            other_duty_hours += PICKUP_DROPOFF_HOURS;
        }
    }

    DailyLogSheet {
        day,
        start_location: if day == 1 {
            trip.current_location.to_string()
        } else {
            "Continuing route".to_string()
        },
        end_location: if is_final {
            trip.drop_off_location.to_string()
        } else {
            "Rest area".to_string()
        },
        total_miles: day_end_distance - day_start_distance,
        total_driving_hours: driving_hours,
        total_on_duty_hours: driving_hours + other_duty_hours,
        segments,
    }
}
