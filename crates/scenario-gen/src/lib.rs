#![deny(warnings)]

//! Metric generators: pure functions turning directory facts and seeded draws
//! into single snapshot fields.
//!
//! Every generator clamps to its documented bound. Generators that depend on
//! upstream fields (revenue, urgency copy, disruption odds) take those fields
//! as arguments and never re-roll them.

mod copy;
mod flights;
mod roster;
mod traffic;

pub use copy::{complaint_label, guest_complaint, urgency_message, GENERIC_COMPLAINTS};
pub use flights::{delay_label, disruption_delay_minutes, eta_label, flight_arrivals};
pub use roster::{driver_roster, limit_active};
pub use traffic::traffic_conditions;

use rust_decimal::Decimal;
use scenario_core::{
    PropertyRecord, RevenueImpact, SeedValue, OCCUPANCY_MAX, OCCUPANCY_MIN, REQUESTS_MAX,
    REQUESTS_MIN, SURGE_MAX, SURGE_MIN,
};
use scenario_seed::{next_in_range, Channel};
use tracing::warn;

/// Clamp a request count into [10, 45].
pub fn clamp_requests(requests: u32) -> u32 {
    requests.clamp(REQUESTS_MIN, REQUESTS_MAX)
}

/// Clamp a surge multiplier into [1.0, 3.5]; non-finite values become 1.0.
pub fn clamp_surge(surge: f64) -> f64 {
    if surge.is_finite() {
        surge.clamp(SURGE_MIN, SURGE_MAX)
    } else {
        SURGE_MIN
    }
}

/// Surge multiplier at full precision.
pub fn current_surge(seed: SeedValue) -> f64 {
    clamp_surge(next_in_range(seed, Channel::Surge, SURGE_MIN, SURGE_MAX))
}

/// Open ride requests.
pub fn active_requests(seed: SeedValue) -> u32 {
    clamp_requests(next_in_range(
        seed,
        Channel::ActiveRequests,
        REQUESTS_MIN,
        REQUESTS_MAX,
    ))
}

/// Fraction of the surge range in use, 0.0 at 1.0x and 1.0 at 3.5x.
pub(crate) fn surge_pressure(surge: f64) -> f64 {
    (clamp_surge(surge) - SURGE_MIN) / (SURGE_MAX - SURGE_MIN)
}

/// Revenue framing plus the per-unit ride value that reconstructs it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RevenueFigures {
    pub impact: RevenueImpact,
    pub average_ride_value: Decimal,
}

/// Hourly loss or earnings driven by the already-fixed requests and surge.
pub fn revenue(record: &PropertyRecord, requests: u32, surge: f64) -> RevenueFigures {
    let requests = clamp_requests(requests);
    let surge = clamp_surge(surge);
    let impact = match scenario_econ::revenue_impact(record, requests, surge) {
        Ok(impact) => impact,
        Err(e) => {
            warn!(property = %record.identifier, error = %e, "revenue model failed, reporting zero");
            zero_impact(record)
        }
    };
    let average_ride_value =
        scenario_econ::average_ride_value(impact.amount(), requests, surge).unwrap_or(Decimal::ZERO);
    RevenueFigures {
        impact,
        average_ride_value,
    }
}

fn zero_impact(record: &PropertyRecord) -> RevenueImpact {
    match record.monetization {
        scenario_core::MonetizationStatus::NotEarning => RevenueImpact::HourlyLoss(Decimal::ZERO),
        scenario_core::MonetizationStatus::AlreadyEarning => {
            RevenueImpact::HourlyEarned(Decimal::ZERO)
        }
    }
}

/// Hotel occupancy, lifted by surge; one decimal.
pub fn occupancy_pct(seed: SeedValue, surge: f64) -> f64 {
    let base = next_in_range(seed, Channel::Occupancy, OCCUPANCY_MIN, 88.0);
    let lifted = base + 10.0 * surge_pressure(surge);
    ((lifted * 10.0).round() / 10.0).clamp(OCCUPANCY_MIN, OCCUPANCY_MAX)
}
