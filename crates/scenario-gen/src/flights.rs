//! Inbound flight board.

use crate::surge_pressure;
use scenario_core::{
    FlightArrival, FlightStatus, SeedValue, FLIGHTS_MAX, FLIGHTS_MIN, PASSENGERS_MAX,
    PASSENGERS_MIN,
};
use scenario_seed::{Channel, ChannelRng};

const CARRIERS: [&str; 8] = ["AA", "DL", "UA", "WN", "AS", "B6", "F9", "NK"];
const ORIGINS: [&str; 12] = [
    "ORD", "DFW", "DEN", "LAX", "SEA", "JFK", "ATL", "SFO", "MSP", "BOS", "LAS", "SLC",
];

/// Delay reported for a disrupted flight at a given surge.
pub fn disruption_delay_minutes(surge: f64) -> u32 {
    10 + (20.0 * surge_pressure(surge) * 2.5).round() as u32
}

pub fn delay_label(minutes: u32) -> String {
    format!("Delayed {minutes} min")
}

/// Display label for a flight status; `minutes` is the ETA or the delay.
pub fn eta_label(status: FlightStatus, minutes: u32) -> String {
    match status {
        FlightStatus::OnTime => format!("ETA {minutes} min"),
        FlightStatus::Delayed => delay_label(minutes),
        FlightStatus::Landed => "Landed".to_string(),
        FlightStatus::Cancelled => "Cancelled".to_string(),
    }
}

/// 3-6 arrivals; the chance of a delay or cancellation rises with surge.
pub fn flight_arrivals(seed: SeedValue, surge: f64) -> Vec<FlightArrival> {
    let mut rng = ChannelRng::new(seed, Channel::Flights);
    let count = rng.range(FLIGHTS_MIN, FLIGHTS_MAX);
    let disrupt_p = 0.08 + 0.30 * surge_pressure(surge);
    let origins = rng.distinct_indices(ORIGINS.len(), count);
    let mut out = Vec::with_capacity(count);
    for origin in origins {
        let carrier = rng.pick(&CARRIERS).copied().unwrap_or(CARRIERS[0]);
        let number: u32 = rng.range(100, 2999);
        let passenger_count = rng.range(PASSENGERS_MIN, PASSENGERS_MAX);
        let (status, minutes) = if rng.chance(disrupt_p) {
            if rng.chance(0.15) {
                (FlightStatus::Cancelled, 0)
            } else {
                let max_delay = disruption_delay_minutes(surge).max(15);
                (FlightStatus::Delayed, rng.range(10, max_delay))
            }
        } else if rng.chance(0.25) {
            (FlightStatus::Landed, 0)
        } else {
            (FlightStatus::OnTime, rng.range(5u32, 90))
        };
        out.push(FlightArrival {
            flight_code: format!("{carrier}{number}"),
            origin: ORIGINS[origin].to_string(),
            passenger_count,
            status,
            eta_label: eta_label(status, minutes),
        });
    }
    out
}
