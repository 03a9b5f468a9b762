#![deny(warnings)]

//! Scenario aggregator: composes every generator into one coherent snapshot.
//!
//! Generators run in a fixed order so later fields consume earlier ones:
//!
//! 1. surge
//! 2. active requests (pinned near the previous value when evolving)
//! 3. revenue (from requests and surge)
//! 4. urgency copy (quotes requests and surge)
//! 5. guest complaint
//! 6. flight arrivals (disruption odds from surge)
//! 7. traffic conditions (delay from surge)
//! 8. driver roster (active count pinned when evolving)
//! 9. occupancy
//! 10. market position (from competitor tiers)
//!
//! A validation pass then checks the cross-field invariants. Violations are
//! corrected by re-deriving the offending field from already-fixed fields;
//! randomness is never re-rolled, so a snapshot stays a pure function of
//! `(record, seed, previous)`.

use property_directory::{Directory, DirectoryError, DirectoryMiss};
use rust_decimal::Decimal;
use scenario_core::{
    ConfigError, EngineConfig, FlightArrival, FlightStatus, MetricSnapshot, PropertyId,
    PropertyRecord, SeedValue, TimeBucket, TrafficCondition, TrafficStatus, COMPLAINT_AGE_MAX,
    COMPLAINT_AGE_MIN, OCCUPANCY_MAX, OCCUPANCY_MIN, PASSENGERS_MAX, PASSENGERS_MIN, RATING_MAX,
    RATING_MIN, RIDE_COUNT_MAX, RIDE_COUNT_MIN, SURGE_DISRUPTION_THRESHOLD,
};
use scenario_gen as gen;
use scenario_seed::{property_seed, seed_for};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, trace};

/// Errors constructing an engine.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Directory(#[from] DirectoryError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// A cross-field or bound rule a composed snapshot failed; always corrected.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum InvariantViolation {
    #[error("{field} outside its bound")]
    OutOfBounds { field: &'static str },
    #[error("surge {surge:.2} with no delayed or cancelled flight")]
    CalmFlightsUnderSurge { surge: f64 },
    #[error("surge {surge:.2} with no heavy traffic route")]
    LightTrafficUnderSurge { surge: f64 },
    #[error("hourly revenue {actual} does not follow requests and surge (expected {expected})")]
    RevenueDrift { expected: Decimal, actual: Decimal },
    #[error("revenue framing does not match monetization status")]
    RevenueFraming,
    #[error("urgency copy disagrees with displayed counters")]
    UrgencyMismatch,
    #[error("market share {actual} not explained by competitors (expected {expected})")]
    MarketShareDrift { expected: f64, actual: f64 },
}

/// Aggregation state machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AggregatePhase {
    /// Generators running.
    Composing,
    /// Invariants being checked and corrected.
    Validating,
    /// Snapshot returned to the caller.
    Finalized,
}

impl AggregatePhase {
    fn advance(self) -> Self {
        match self {
            AggregatePhase::Composing => AggregatePhase::Validating,
            AggregatePhase::Validating | AggregatePhase::Finalized => AggregatePhase::Finalized,
        }
    }
}

/// A finalized snapshot plus the corrections applied while validating it.
#[derive(Clone, Debug, PartialEq)]
pub struct AggregateReport {
    pub snapshot: MetricSnapshot,
    pub corrections: Vec<InvariantViolation>,
    pub phase: AggregatePhase,
}

/// Per-tick change limits for counters that should drift rather than jump.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SmoothingLimits {
    pub max_request_delta: u32,
    pub max_online_delta: u32,
}

impl From<&EngineConfig> for SmoothingLimits {
    fn from(cfg: &EngineConfig) -> Self {
        Self {
            max_request_delta: cfg.max_request_delta,
            max_online_delta: cfg.max_online_delta,
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct Pin {
    requests: u32,
    active_drivers: u32,
    limits: SmoothingLimits,
}

/// Shared, read-only scenario engine. One per process; wrap in `Arc`.
pub struct ScenarioEngine {
    directory: Arc<Directory>,
    config: EngineConfig,
    corrections: AtomicU64,
}

impl ScenarioEngine {
    pub fn new(directory: Arc<Directory>, config: EngineConfig) -> Result<Self, EngineError> {
        scenario_core::validate_config(&config)?;
        Ok(Self {
            directory,
            config,
            corrections: AtomicU64::new(0),
        })
    }

    /// Engine over the directory embedded in the binary.
    pub fn with_builtin_directory(config: EngineConfig) -> Result<Self, EngineError> {
        Self::new(Arc::new(Directory::builtin()?), config)
    }

    pub fn directory(&self) -> &Directory {
        &self.directory
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Directory record for an identifier.
    pub fn resolve(&self, identifier: &PropertyId) -> Result<PropertyRecord, DirectoryMiss> {
        self.directory.lookup(identifier).cloned()
    }

    /// Time bucket for an epoch timestamp at the configured width.
    pub fn bucket_at(&self, epoch_ms: i64) -> TimeBucket {
        TimeBucket::from_epoch_ms(epoch_ms, self.config.bucket_width_ms)
    }

    /// Total corrections applied since the engine was created.
    pub fn corrections_total(&self) -> u64 {
        self.corrections.load(Ordering::Relaxed)
    }

    pub fn aggregate(&self, record: &PropertyRecord, seed: SeedValue) -> MetricSnapshot {
        self.aggregate_report(record, seed).snapshot
    }

    pub fn aggregate_report(&self, record: &PropertyRecord, seed: SeedValue) -> AggregateReport {
        self.run(record, seed, None)
    }

    /// Next snapshot as a bounded perturbation of `previous`.
    ///
    /// Requests move at most `max_request_delta` and the active driver count
    /// at most `max_online_delta`; everything derived from them follows.
    /// A `previous` for another property is ignored.
    pub fn evolve(
        &self,
        record: &PropertyRecord,
        seed: SeedValue,
        previous: &MetricSnapshot,
    ) -> AggregateReport {
        if previous.property != record.identifier {
            return self.run(record, seed, None);
        }
        let pin = Pin {
            requests: gen::clamp_requests(previous.active_requests),
            active_drivers: previous.drivers_online(),
            limits: SmoothingLimits::from(&self.config),
        };
        self.run(record, seed, Some(pin))
    }

    /// Snapshot for a code and bucket, using the fallback record on a miss.
    pub fn snapshot_for(&self, identifier: &PropertyId, bucket: TimeBucket) -> MetricSnapshot {
        let record = self.directory.lookup_or_fallback(identifier);
        self.aggregate(&record, seed_for(identifier, bucket))
    }

    fn run(&self, record: &PropertyRecord, seed: SeedValue, pin: Option<Pin>) -> AggregateReport {
        let mut phase = AggregatePhase::Composing;
        trace!(property = %record.identifier, ?phase, pinned = pin.is_some());
        let mut snapshot = self.compose(record, seed, pin);
        phase = phase.advance();
        trace!(property = %record.identifier, ?phase);
        let corrections = self.enforce_invariants(record, &mut snapshot);
        phase = phase.advance();
        AggregateReport {
            snapshot,
            corrections,
            phase,
        }
    }

    fn compose(&self, record: &PropertyRecord, seed: SeedValue, pin: Option<Pin>) -> MetricSnapshot {
        let surge = gen::current_surge(seed);
        let mut requests = gen::active_requests(seed);
        if let Some(p) = pin {
            let lo = p.requests.saturating_sub(p.limits.max_request_delta);
            let hi = p.requests.saturating_add(p.limits.max_request_delta);
            requests = gen::clamp_requests(requests.clamp(lo, hi));
        }
        let revenue = gen::revenue(record, requests, surge);
        let urgency_message = gen::urgency_message(record.monetization, seed, requests, surge);
        let last_guest_complaint = gen::guest_complaint(record, seed);
        let flight_arrivals = gen::flight_arrivals(seed, surge);
        let traffic_conditions = gen::traffic_conditions(seed, surge);
        let mut driver_roster =
            gen::driver_roster(property_seed(&record.identifier), seed, surge);
        if let Some(p) = pin {
            let lo = p.active_drivers.saturating_sub(p.limits.max_online_delta);
            let hi = p.active_drivers.saturating_add(p.limits.max_online_delta);
            gen::limit_active(&mut driver_roster, lo, hi);
        }
        let occupancy_pct = gen::occupancy_pct(seed, surge);
        let market_position = self.expected_market(record);
        MetricSnapshot {
            property: record.identifier.clone(),
            seed,
            active_requests: requests,
            current_surge: surge,
            revenue: revenue.impact,
            average_ride_value: revenue.average_ride_value,
            occupancy_pct,
            urgency_message,
            last_guest_complaint,
            flight_arrivals,
            traffic_conditions,
            driver_roster,
            market_position,
        }
    }

    fn expected_market(&self, record: &PropertyRecord) -> scenario_core::MarketPosition {
        scenario_econ::market_position(
            record.tier,
            record.monetization,
            &self.directory.competitor_tiers(record),
        )
    }

    /// Check every bound and cross-field rule, correcting violations in place.
    ///
    /// Returns the violations found; an already-finalized snapshot yields none.
    pub fn enforce_invariants(
        &self,
        record: &PropertyRecord,
        s: &mut MetricSnapshot,
    ) -> Vec<InvariantViolation> {
        let mut found = clamp_bounds(s);

        if s.current_surge > SURGE_DISRUPTION_THRESHOLD {
            if !s.flight_arrivals.iter().any(|f| f.status.is_disrupted()) {
                found.push(InvariantViolation::CalmFlightsUnderSurge {
                    surge: s.current_surge,
                });
                delay_busiest_flight(&mut s.flight_arrivals, s.current_surge);
            }
            if !s
                .traffic_conditions
                .iter()
                .any(|r| r.status == TrafficStatus::Heavy)
            {
                found.push(InvariantViolation::LightTrafficUnderSurge {
                    surge: s.current_surge,
                });
                congest_slowest_route(&mut s.traffic_conditions);
            }
        }

        let expected = gen::revenue(record, s.active_requests, s.current_surge);
        if !s.revenue.matches(record.monetization) {
            found.push(InvariantViolation::RevenueFraming);
        } else if s.revenue != expected.impact {
            found.push(InvariantViolation::RevenueDrift {
                expected: expected.impact.amount(),
                actual: s.revenue.amount(),
            });
        }
        s.revenue = expected.impact;
        s.average_ride_value = expected.average_ride_value;

        let urgency =
            gen::urgency_message(record.monetization, s.seed, s.active_requests, s.current_surge);
        if s.urgency_message != urgency {
            found.push(InvariantViolation::UrgencyMismatch);
            s.urgency_message = urgency;
        }

        let market = self.expected_market(record);
        if s.market_position != market {
            found.push(InvariantViolation::MarketShareDrift {
                expected: market.market_share,
                actual: s.market_position.market_share,
            });
            s.market_position = market;
        }

        if !found.is_empty() {
            self.corrections
                .fetch_add(found.len() as u64, Ordering::Relaxed);
            for v in &found {
                debug!(property = %record.identifier, violation = %v, "corrected snapshot");
            }
        }
        found
    }
}

fn clamp_bounds(s: &mut MetricSnapshot) -> Vec<InvariantViolation> {
    let mut found = Vec::new();
    let mut flag = |field: &'static str| found.push(InvariantViolation::OutOfBounds { field });

    let requests = gen::clamp_requests(s.active_requests);
    if requests != s.active_requests {
        flag("active_requests");
        s.active_requests = requests;
    }
    let surge = gen::clamp_surge(s.current_surge);
    if surge != s.current_surge {
        flag("current_surge");
        s.current_surge = surge;
    }
    let occupancy = if s.occupancy_pct.is_finite() {
        s.occupancy_pct.clamp(OCCUPANCY_MIN, OCCUPANCY_MAX)
    } else {
        OCCUPANCY_MIN
    };
    if occupancy != s.occupancy_pct {
        flag("occupancy_pct");
        s.occupancy_pct = occupancy;
    }
    let c = &mut s.last_guest_complaint;
    let minutes = c.minutes_ago.clamp(COMPLAINT_AGE_MIN, COMPLAINT_AGE_MAX);
    if minutes != c.minutes_ago {
        flag("complaint_minutes_ago");
        c.minutes_ago = minutes;
        c.label = gen::complaint_label(minutes);
    }
    for f in &mut s.flight_arrivals {
        let p = f.passenger_count.clamp(PASSENGERS_MIN, PASSENGERS_MAX);
        if p != f.passenger_count {
            flag("passenger_count");
            f.passenger_count = p;
        }
    }
    for d in &mut s.driver_roster {
        let rating = if d.rating.is_finite() {
            d.rating.clamp(RATING_MIN, RATING_MAX)
        } else {
            RATING_MIN
        };
        if rating != d.rating {
            flag("rating");
            d.rating = rating;
        }
        let rides = d.ride_count.clamp(RIDE_COUNT_MIN, RIDE_COUNT_MAX);
        if rides != d.ride_count {
            flag("ride_count");
            d.ride_count = rides;
        }
        if d.earnings < Decimal::ZERO {
            flag("earnings");
            d.earnings = Decimal::ZERO;
        }
    }
    found
}

/// Mark the fullest flight (first on ties) as delayed.
fn delay_busiest_flight(flights: &mut [FlightArrival], surge: f64) {
    if let Some(f) = flights.iter_mut().rev().max_by_key(|f| f.passenger_count) {
        f.status = FlightStatus::Delayed;
        f.eta_label = gen::delay_label(gen::disruption_delay_minutes(surge));
    }
}

/// Raise the most delayed route (first on ties) to heavy traffic.
fn congest_slowest_route(routes: &mut [TrafficCondition]) {
    if let Some(r) = routes.iter_mut().rev().max_by_key(|r| r.delay_minutes) {
        let delay = r.delay_minutes.max(scenario_core::HEAVY_DELAY_MINUTES);
        r.current_minutes += delay - r.delay_minutes;
        r.delay_minutes = delay;
        r.status = TrafficStatus::Heavy;
    }
}
