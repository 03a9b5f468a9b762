//! Driver fleet attached to a property.

use crate::surge_pressure;
use rust_decimal::Decimal;
use scenario_core::{
    Driver, OnlineStatus, SeedValue, RATING_MAX, RATING_MIN, RIDE_COUNT_MAX, RIDE_COUNT_MIN,
    ROSTER_MAX, ROSTER_MIN,
};
use scenario_seed::{Channel, ChannelRng};

const NAMES: [&str; 12] = [
    "Marcus Johnson",
    "Elena Ruiz",
    "David Chen",
    "Aisha Patel",
    "Tom Becker",
    "Sofia Alvarez",
    "James Walker",
    "Priya Nair",
    "Luis Ortega",
    "Hannah Kim",
    "Omar Haddad",
    "Grace Liu",
];

const VEHICLES: [&str; 8] = [
    "Toyota Camry",
    "Honda Accord",
    "Tesla Model 3",
    "Chevrolet Suburban",
    "Lincoln Navigator",
    "Toyota Sienna",
    "Cadillac Escalade",
    "Hyundai Sonata",
];

/// Roster with identities from `identity` (stable per property) and
/// online statuses from `status` (per bucket). Higher surge puts more
/// drivers on the road.
pub fn driver_roster(identity: SeedValue, status: SeedValue, surge: f64) -> Vec<Driver> {
    let mut id_rng = ChannelRng::new(identity, Channel::Roster);
    let mut status_rng = ChannelRng::new(status, Channel::RosterStatus);
    let count = id_rng.range(ROSTER_MIN, ROSTER_MAX);
    let active_p = 0.45 + 0.375 * surge_pressure(surge);
    id_rng
        .distinct_indices(NAMES.len(), count)
        .into_iter()
        .map(|i| {
            let vehicle = id_rng.pick(&VEHICLES).copied().unwrap_or(VEHICLES[0]);
            let rating: f64 = id_rng.range(RATING_MIN, RATING_MAX);
            let ride_count = id_rng.range(RIDE_COUNT_MIN, RIDE_COUNT_MAX);
            let fare_cents: i64 = id_rng.range(1_800, 4_200);
            let earnings = scenario_econ::driver_earnings(ride_count, Decimal::new(fare_cents, 2))
                .unwrap_or(Decimal::ZERO);
            let online_status = if status_rng.chance(active_p) {
                if status_rng.chance(0.5) {
                    OnlineStatus::OnTrip
                } else {
                    OnlineStatus::Online
                }
            } else {
                OnlineStatus::Offline
            };
            Driver {
                name: NAMES[i].to_string(),
                vehicle: vehicle.to_string(),
                rating: ((rating * 100.0).round() / 100.0).clamp(RATING_MIN, RATING_MAX),
                ride_count,
                earnings,
                online_status,
            }
        })
        .collect()
}

/// Flip statuses so the number of active drivers lands in `[min, max]`.
///
/// Surplus drivers go offline from the end of the roster; missing drivers
/// come online from the front, so the adjustment is deterministic.
pub fn limit_active(roster: &mut [Driver], min: u32, max: u32) {
    let mut active = roster.iter().filter(|d| d.online_status.is_active()).count() as u32;
    for d in roster.iter_mut().rev() {
        if active <= max {
            break;
        }
        if d.online_status.is_active() {
            d.online_status = OnlineStatus::Offline;
            active -= 1;
        }
    }
    for d in roster.iter_mut() {
        if active >= min {
            break;
        }
        if !d.online_status.is_active() {
            d.online_status = OnlineStatus::Online;
            active += 1;
        }
    }
}
