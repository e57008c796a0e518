//! Hours-of-Service (HOS) simulation core.
//!
//! Given the two scalars the routing provider hands us — total road distance
//! and total trip duration — plus the hours already consumed in the current
//! 70-hour/8-day cycle, this module walks the trip segment by segment and
//! emits every rest, break and fuel stop the driver is required to take.
//! It is the only part of the worker with real algorithmic content; the
//! surrounding handlers, provider clients and queries are glue around it.
//!
//! The walk is a priority-ordered state machine: each iteration derives the
//! next action from the current counters (daily limit → 30-min break → fuel
//! → drive a segment) and applies it, possibly emitting a stop. Stops that
//! land within one mile of the previous stop are merged into it, so several
//! rules firing "at the same place" surface as one combined stop.

use thiserror::Error;
use tracing::warn;

// --- HOS regulatory constants (property-carrying drivers, 70h/8-day rule) ---

/// Maximum driving hours per day.
pub const MAX_DRIVING_HOURS: f64 = 11.0;

/// Maximum on-duty hours per day.
pub const MAX_ON_DUTY_HOURS: f64 = 14.0;

/// Off-duty rest required after hitting a daily limit.
pub const REQUIRED_REST_HOURS: f64 = 10.0;

/// Rolling 8-day cycle cap.
pub const MAX_CYCLE_HOURS: f64 = 70.0;

/// Off-duty period that zeroes the cycle's accumulated hours.
pub const CYCLE_RESET_HOURS: f64 = 34.0;

/// Continuous driving allowed before a 30-minute break.
pub const MAX_CONTINUOUS_DRIVING: f64 = 8.0;

/// Duration of the mandatory short break.
pub const REQUIRED_SHORT_BREAK: f64 = 0.5;

/// Fixed on-duty allowance charged for pickup and again for drop-off.
pub const PICKUP_DROPOFF_HOURS: f64 = 1.0;

/// Duration of a fuel stop.
pub const FUEL_STOP_HOURS: f64 = 0.5;

/// Distance interval between fuel stops, in miles.
pub const FUEL_INTERVAL_MILES: f64 = 1000.0;

/// Upper bound on a single drive segment, in hours.
const DRIVE_STEP_HOURS: f64 = 1.0;

/// Guardrail on loop iterations. Bounds pathological inputs (near-zero
/// average speed) instead of hanging; a legitimate run that trips it gets a
/// silently truncated plan, which callers can detect by comparing the last
/// stop distance against the trip distance.
const MAX_SIMULATION_TICKS: u32 = 200;

/// Stops closer together than this are merged into one combined stop.
const MERGE_WINDOW_MILES: f64 = 1.0;

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Error raised by the speed estimator and the planner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum HosError {
    /// Total duration does not even cover the two fixed cargo-handling
    /// stops, so no driving time remains.
    #[error("trip duration too short to contain pickup, drop-off and any driving")]
    InvalidTripDuration,
}

/// Remaining capacity snapshot for the current duty cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AvailableHours {
    /// `70 − currentCycleUsed`, clamped at zero.
    pub cycle_hours_available: f64,
    /// Daily driving cap (constant).
    pub daily_driving_available: f64,
    /// Daily on-duty cap (constant).
    pub daily_duty_available: f64,
}

/// Regulatory trigger behind a stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopKind {
    DailyRest,
    CycleReset,
    ShortBreak,
    Fuel,
}

impl StopKind {
    /// Wire/storage label, kept identical to what the log sheets display.
    pub const fn as_str(self) -> &'static str {
        match self {
            StopKind::DailyRest => "10-hour rest",
            StopKind::CycleReset => "34-hour reset",
            StopKind::ShortBreak => "30-min break",
            StopKind::Fuel => "fuel",
        }
    }
}

/// A mandatory stop on the trip, keyed by cumulative distance from the
/// start. A merged stop carries every contributing kind in emission order.
#[derive(Debug, Clone, PartialEq)]
pub struct RestStop {
    pub kinds: Vec<StopKind>,
    pub duration_hours: f64,
    pub distance_from_start: f64,
    pub reason: String,
}

impl RestStop {
    fn single(kind: StopKind, duration_hours: f64, distance: f64, reason: &str) -> Self {
        Self {
            kinds: vec![kind],
            duration_hours,
            distance_from_start: distance,
            reason: reason.to_string(),
        }
    }

    /// Combined label, e.g. `"10-hour rest + 34-hour reset"`.
    pub fn label(&self) -> String {
        self.kinds
            .iter()
            .map(|k| k.as_str())
            .collect::<Vec<_>>()
            .join(" + ")
    }

    /// True when this stop ends the driving day (nightly rest or cycle
    /// reset) — the boundary the daily log sheets split on.
    pub fn ends_driving_day(&self) -> bool {
        self.kinds
            .iter()
            .any(|k| matches!(k, StopKind::DailyRest | StopKind::CycleReset))
    }
}

// ---------------------------------------------------------------------------
// Available hours
// ---------------------------------------------------------------------------

/// Compute the remaining available hours for the current cycle.
///
/// Pure and total. The caller validates `current_cycle_used` into [0, 70];
/// values beyond 70 simply clamp the cycle figure at zero.
pub fn compute_available_hours(current_cycle_used: f64) -> AvailableHours {
    AvailableHours {
        cycle_hours_available: (MAX_CYCLE_HOURS - current_cycle_used).max(0.0),
        daily_driving_available: MAX_DRIVING_HOURS,
        daily_duty_available: MAX_ON_DUTY_HOURS,
    }
}

// ---------------------------------------------------------------------------
// Average speed
// ---------------------------------------------------------------------------

/// Derive the single constant speed used for the whole run.
///
/// The two fixed cargo-handling allowances are subtracted from the total
/// duration first; what remains is driving time. Speed does not vary by
/// segment or time of day — a deliberate simplification of the model.
pub fn average_speed(total_distance: f64, total_duration: f64) -> Result<f64, HosError> {
    let driving_duration = total_duration - 2.0 * PICKUP_DROPOFF_HOURS;
    if driving_duration <= 0.0 {
        return Err(HosError::InvalidTripDuration);
    }
    Ok(total_distance / driving_duration)
}

// ---------------------------------------------------------------------------
// Simulation state machine
// ---------------------------------------------------------------------------

/// Mutable counters for one simulation run. Owned exclusively by that run;
/// nothing here is shared or persisted.
#[derive(Debug, Clone)]
struct SimulationState {
    driving_hours_today: f64,
    duty_hours_today: f64,
    hours_since_break: f64,
    cycle_hours_used: f64,
    distance_traveled: f64,
    last_fuel_distance: f64,
    ticks: u32,
}

impl SimulationState {
    /// Initial state. The pickup allowance is charged immediately as
    /// on-duty (not driving) time, against both the day and the cycle.
    fn new(current_cycle_used: f64) -> Self {
        Self {
            driving_hours_today: 0.0,
            duty_hours_today: PICKUP_DROPOFF_HOURS,
            hours_since_break: 0.0,
            cycle_hours_used: current_cycle_used + PICKUP_DROPOFF_HOURS,
            distance_traveled: 0.0,
            last_fuel_distance: 0.0,
            ticks: 0,
        }
    }
}

/// The one action the simulator takes this iteration, re-derived from state
/// every pass. Variants are ordered by priority.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Action {
    /// A daily driving/on-duty cap is hit: 10h rest, possibly + 34h reset.
    DailyRest,
    /// Eight continuous driving hours: 30-minute break.
    ShortBreak,
    /// 1000 miles since the last fuel stop.
    Fuel,
    /// Drive for the given number of hours.
    Drive(f64),
    /// No forward progress is possible; end the run with what we have.
    Halt,
}

/// Decide the next action. Pure; the first rule that applies wins.
fn next_action(state: &SimulationState, avg_speed: f64, total_distance: f64) -> Action {
    if state.driving_hours_today >= MAX_DRIVING_HOURS
        || state.duty_hours_today >= MAX_ON_DUTY_HOURS
    {
        return Action::DailyRest;
    }
    if state.hours_since_break >= MAX_CONTINUOUS_DRIVING {
        return Action::ShortBreak;
    }
    if state.distance_traveled - state.last_fuel_distance >= FUEL_INTERVAL_MILES {
        return Action::Fuel;
    }

    let hours = max_drive_hours(state, total_distance - state.distance_traveled, avg_speed);
    if hours <= 0.0 {
        Action::Halt
    } else {
        Action::Drive(hours)
    }
}

/// Longest segment that can be driven before any constraint binds: the
/// fixed step cap, the three remaining headrooms, and the time left to
/// cover the remaining distance at the estimated speed.
fn max_drive_hours(state: &SimulationState, remaining_distance: f64, avg_speed: f64) -> f64 {
    let candidates = [
        DRIVE_STEP_HOURS,
        MAX_DRIVING_HOURS - state.driving_hours_today,
        MAX_ON_DUTY_HOURS - state.duty_hours_today,
        MAX_CONTINUOUS_DRIVING - state.hours_since_break,
        if avg_speed > 0.0 {
            remaining_distance / avg_speed
        } else {
            0.0
        },
    ];
    candidates
        .into_iter()
        .fold(f64::INFINITY, f64::min)
        .max(0.0)
}

/// Apply one action: mutate the counters and append any emitted stop.
fn apply_action(state: &mut SimulationState, action: Action, avg_speed: f64, stops: &mut Vec<RestStop>) {
    match action {
        Action::DailyRest => {
            push_merged(
                stops,
                RestStop::single(
                    StopKind::DailyRest,
                    REQUIRED_REST_HOURS,
                    state.distance_traveled,
                    "Reached daily HOS driving/on-duty limit",
                ),
            );
            // A rest is off-duty: it charges neither the day nor the cycle.
            if state.cycle_hours_used >= MAX_CYCLE_HOURS {
                push_merged(
                    stops,
                    RestStop::single(
                        StopKind::CycleReset,
                        CYCLE_RESET_HOURS,
                        state.distance_traveled,
                        "Cycle limit reached (70 hours) - performing reset",
                    ),
                );
                state.cycle_hours_used = 0.0;
            }
            state.driving_hours_today = 0.0;
            state.duty_hours_today = 0.0;
            state.hours_since_break = 0.0;
        }
        Action::ShortBreak => {
            push_merged(
                stops,
                RestStop::single(
                    StopKind::ShortBreak,
                    REQUIRED_SHORT_BREAK,
                    state.distance_traveled,
                    "8-hour continuous driving limit",
                ),
            );
            state.hours_since_break = 0.0;
            state.duty_hours_today += REQUIRED_SHORT_BREAK;
            state.cycle_hours_used += REQUIRED_SHORT_BREAK;
        }
        Action::Fuel => {
            push_merged(
                stops,
                RestStop::single(
                    StopKind::Fuel,
                    FUEL_STOP_HOURS,
                    state.distance_traveled,
                    "Scheduled fuel stop (every 1000 miles)",
                ),
            );
            state.last_fuel_distance = state.distance_traveled;
            state.duty_hours_today += FUEL_STOP_HOURS;
            state.cycle_hours_used += FUEL_STOP_HOURS;
        }
        Action::Drive(hours) => {
            state.distance_traveled += hours * avg_speed;
            state.driving_hours_today += hours;
            state.duty_hours_today += hours;
            state.hours_since_break += hours;
            state.cycle_hours_used += hours;
        }
        Action::Halt => {}
    }
}

/// Append a stop, merging it into the previous one when both fall within
/// one mile of each other. Only the most recent stop is ever considered —
/// a one-element look-back, not a global pass.
fn push_merged(stops: &mut Vec<RestStop>, new: RestStop) {
    match stops.last_mut() {
        Some(last)
            if (last.distance_from_start - new.distance_from_start).abs()
                < MERGE_WINDOW_MILES =>
        {
            last.kinds.extend(new.kinds);
            last.duration_hours += new.duration_hours;
            last.reason.push_str("; ");
            last.reason.push_str(&new.reason);
        }
        _ => stops.push(new),
    }
}

// ---------------------------------------------------------------------------
// Planner entry point
// ---------------------------------------------------------------------------

/// Walk the trip and emit every mandatory stop, ordered by distance.
///
/// `total_duration` includes the two fixed pickup/drop-off allowances; the
/// caller has validated `current_cycle_used` into [0, 70]. Reaching a
/// regulatory limit is expected control flow, not an error — the only
/// failure is a duration too short to contain any driving.
pub fn plan_rest_stops(
    total_distance: f64,
    total_duration: f64,
    current_cycle_used: f64,
) -> Result<Vec<RestStop>, HosError> {
    let avg_speed = average_speed(total_distance, total_duration)?;

    let mut state = SimulationState::new(current_cycle_used);
    let mut stops = Vec::new();

    while state.distance_traveled < total_distance {
        state.ticks += 1;
        if state.ticks > MAX_SIMULATION_TICKS {
            warn!(
                distance_traveled = state.distance_traveled,
                total_distance, "rest stop simulation hit the tick guardrail; plan is truncated"
            );
            break;
        }

        match next_action(&state, avg_speed, total_distance) {
            Action::Halt => break,
            action => apply_action(&mut state, action, avg_speed, &mut stops),
        }
    }

    Ok(stops)
}

// ===========================================================================
// Tests
// ===========================================================================
