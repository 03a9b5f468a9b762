//! Drive conditions on routes served from the property.

use crate::surge_pressure;
use scenario_core::{SeedValue, TrafficCondition, TrafficStatus, ROUTES_MAX, ROUTES_MIN};
use scenario_seed::{Channel, ChannelRng};

/// Route label and free-flow drive time in minutes.
const ROUTES: [(&str, u32); 7] = [
    ("Airport to Hotel", 18),
    ("Hotel to Convention Center", 12),
    ("Hotel to Downtown", 9),
    ("Hotel to Stadium", 15),
    ("Hotel to Old Town", 14),
    ("Hotel to Medical Center", 11),
    ("Hotel to University", 16),
];

/// 3-5 routes; delay scales with surge on top of a small baseline jitter.
pub fn traffic_conditions(seed: SeedValue, surge: f64) -> Vec<TrafficCondition> {
    let mut rng = ChannelRng::new(seed, Channel::Traffic);
    let count = rng.range(ROUTES_MIN, ROUTES_MAX);
    let pressure = surge_pressure(surge);
    rng.distinct_indices(ROUTES.len(), count)
        .into_iter()
        .map(|i| {
            let (label, free_flow) = ROUTES[i];
            let congestion: f64 = rng.range(0.3, 1.1);
            let jitter: u32 = rng.range(0, 3);
            let delay = (f64::from(free_flow) * 2.5 * pressure * congestion).round() as u32 + jitter;
            TrafficCondition {
                route_label: label.to_string(),
                current_minutes: free_flow + delay,
                delay_minutes: delay,
                status: TrafficStatus::from_delay(delay),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn calm_surge_is_light() {
        for s in 0..200u64 {
            for route in traffic_conditions(SeedValue(s), 1.0) {
                assert_eq!(route.status, TrafficStatus::Light);
                assert!(route.delay_minutes <= 3);
            }
        }
    }

    proptest! {
        #[test]
        fn routes_consistent(raw in any::<u64>(), surge in 1.0f64..=3.5) {
            let routes = traffic_conditions(SeedValue(raw), surge);
            prop_assert!((ROUTES_MIN..=ROUTES_MAX).contains(&routes.len()));
            for r in &routes {
                prop_assert_eq!(r.status, TrafficStatus::from_delay(r.delay_minutes));
                prop_assert!(r.current_minutes >= r.delay_minutes);
            }
        }
    }
}
