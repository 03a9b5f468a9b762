#![deny(warnings)]

//! Core domain models and invariants for the property scenario engine.
//!
//! This crate defines the serializable types shared by the directory, the
//! generators, the aggregator and the refresh driver, along with the numeric
//! bounds every snapshot must respect and validation helpers for them.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Lower bound for simultaneous ride requests.
pub const REQUESTS_MIN: u32 = 10;
/// Upper bound for simultaneous ride requests.
pub const REQUESTS_MAX: u32 = 45;
/// Lowest surge multiplier.
pub const SURGE_MIN: f64 = 1.0;
/// Highest surge multiplier.
pub const SURGE_MAX: f64 = 3.5;
/// Above this surge, flights and traffic must show disruption.
pub const SURGE_DISRUPTION_THRESHOLD: f64 = 2.5;
/// Hours in the 30-day billing month used for hourly baselines.
pub const HOURS_PER_MONTH: u32 = 30 * 24;
/// Plausible window for the most recent guest complaint, in minutes.
pub const COMPLAINT_AGE_MIN: u32 = 2;
pub const COMPLAINT_AGE_MAX: u32 = 180;
/// Number of flight arrivals per snapshot.
pub const FLIGHTS_MIN: usize = 3;
pub const FLIGHTS_MAX: usize = 6;
/// Passengers per arriving flight.
pub const PASSENGERS_MIN: u32 = 40;
pub const PASSENGERS_MAX: u32 = 220;
/// Number of traffic routes per snapshot.
pub const ROUTES_MIN: usize = 3;
pub const ROUTES_MAX: usize = 5;
/// Delay at or above which a route reports heavy traffic.
pub const HEAVY_DELAY_MINUTES: u32 = 15;
/// Delay at or above which a route reports moderate traffic.
pub const MODERATE_DELAY_MINUTES: u32 = 5;
/// Number of drivers in a property's roster.
pub const ROSTER_MIN: usize = 4;
pub const ROSTER_MAX: usize = 8;
/// Driver rating bounds.
pub const RATING_MIN: f64 = 4.5;
pub const RATING_MAX: f64 = 5.0;
/// Lifetime ride count bounds for a driver.
pub const RIDE_COUNT_MIN: u32 = 50;
pub const RIDE_COUNT_MAX: u32 = 2500;
/// Hotel occupancy bounds in percent.
pub const OCCUPANCY_MIN: f64 = 55.0;
pub const OCCUPANCY_MAX: f64 = 98.0;

/// Width of a seed time bucket in milliseconds.
pub const BUCKET_WIDTH_MS: u64 = 5_000;
/// Default refresh cadence for subscriptions.
pub const DEFAULT_REFRESH_INTERVAL_MS: u64 = 3_000;
/// Largest per-tick change of `active_requests` between consecutive refreshes.
pub const MAX_REQUEST_DELTA: u32 = 3;
/// Largest per-tick change of the number of drivers available for rides.
pub const MAX_ONLINE_DELTA: u32 = 1;

/// Unique property code, e.g. "TEST-PHX-001".
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PropertyId(pub String);

impl PropertyId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PropertyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Partner program tier of a property.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// Listing only
    Basic,
    /// Listing plus dispatch integration
    Standard,
    /// Dedicated fleet allocation
    Premium,
}

impl Tier {
    /// Relative market weight used when splitting demand with competitors.
    pub fn market_weight(self) -> f64 {
        match self {
            Tier::Basic => 1.0,
            Tier::Standard => 1.5,
            Tier::Premium => 2.5,
        }
    }
}

/// Whether a property already earns from brokered rides.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonetizationStatus {
    NotEarning,
    AlreadyEarning,
}

/// Immutable directory facts about a property.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PropertyRecord {
    /// Unique property code.
    pub identifier: PropertyId,
    /// Display name.
    pub name: String,
    /// Street address.
    pub address: String,
    /// Program tier.
    pub tier: Tier,
    /// Current monetization status.
    pub monetization: MonetizationStatus,
    /// Monthly revenue the property could earn, in USD.
    pub monthly_potential: Decimal,
    /// Monthly revenue currently earned in USD (meaningful only when already earning).
    #[serde(default)]
    pub monthly_revenue: Decimal,
    /// Competing properties, in directory order.
    #[serde(default)]
    pub competitors: Vec<PropertyId>,
    /// Complaint templates specific to this property.
    #[serde(default)]
    pub seed_complaints: Vec<String>,
}

/// Quantized wall-clock window; all calls inside one window share a seed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimeBucket(pub u64);

impl TimeBucket {
    /// Bucket used for facts that never change over time.
    pub const ORIGIN: TimeBucket = TimeBucket(0);

    /// Quantize an epoch timestamp. Negative timestamps map to the origin.
    pub fn from_epoch_ms(epoch_ms: i64, width_ms: u64) -> Self {
        let ms = u64::try_from(epoch_ms).unwrap_or(0);
        TimeBucket(ms / width_ms.max(1))
    }

    pub fn next(self) -> Self {
        TimeBucket(self.0.saturating_add(1))
    }
}

/// Deterministic seed derived from a property and a time bucket.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SeedValue(pub u64);

/// Revenue framing for the current hour.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "usd", rename_all = "snake_case")]
pub enum RevenueImpact {
    /// Revenue a not-yet-earning property is missing out on.
    HourlyLoss(Decimal),
    /// Revenue an earning property collects.
    HourlyEarned(Decimal),
}

impl RevenueImpact {
    pub fn amount(&self) -> Decimal {
        match self {
            RevenueImpact::HourlyLoss(v) | RevenueImpact::HourlyEarned(v) => *v,
        }
    }

    /// Framing that matches a monetization status.
    pub fn matches(&self, status: MonetizationStatus) -> bool {
        matches!(
            (self, status),
            (RevenueImpact::HourlyLoss(_), MonetizationStatus::NotEarning)
                | (RevenueImpact::HourlyEarned(_), MonetizationStatus::AlreadyEarning)
        )
    }
}

/// Most recent guest complaint with a relative age.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GuestComplaint {
    pub text: String,
    /// Minutes since the complaint was filed.
    pub minutes_ago: u32,
    /// Human-readable age, e.g. "12 minutes ago".
    pub label: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlightStatus {
    OnTime,
    Delayed,
    Landed,
    Cancelled,
}

impl FlightStatus {
    pub fn is_disrupted(self) -> bool {
        matches!(self, FlightStatus::Delayed | FlightStatus::Cancelled)
    }
}

/// An inbound flight at the nearest airport.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FlightArrival {
    /// Carrier code plus number, e.g. "DL1542".
    pub flight_code: String,
    /// Origin airport code.
    pub origin: String,
    pub passenger_count: u32,
    pub status: FlightStatus,
    /// Display label, e.g. "ETA 14 min" or "Delayed 25 min".
    pub eta_label: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrafficStatus {
    Light,
    Moderate,
    Heavy,
}

impl TrafficStatus {
    /// Status implied by a delay in minutes.
    pub fn from_delay(delay_minutes: u32) -> Self {
        if delay_minutes >= HEAVY_DELAY_MINUTES {
            TrafficStatus::Heavy
        } else if delay_minutes >= MODERATE_DELAY_MINUTES {
            TrafficStatus::Moderate
        } else {
            TrafficStatus::Light
        }
    }
}

/// Current drive conditions on a route served from the property.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrafficCondition {
    pub route_label: String,
    /// Current end-to-end drive time in minutes.
    pub current_minutes: u32,
    /// Minutes above the free-flow drive time.
    pub delay_minutes: u32,
    pub status: TrafficStatus,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnlineStatus {
    Online,
    OnTrip,
    Offline,
}

impl OnlineStatus {
    /// Drivers counted as available to the property (idle or carrying a guest).
    pub fn is_active(self) -> bool {
        !matches!(self, OnlineStatus::Offline)
    }
}

/// A driver in the property's fleet.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Driver {
    pub name: String,
    pub vehicle: String,
    /// Rating in [4.5, 5.0], two decimals.
    pub rating: f64,
    /// Lifetime rides for this property.
    pub ride_count: u32,
    /// Lifetime earnings in USD.
    pub earnings: Decimal,
    pub online_status: OnlineStatus,
}

/// Share of local ride demand captured by the property.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MarketPosition {
    /// Percentage in [0, 100], one decimal.
    pub market_share: f64,
    pub competitor_count: u32,
    /// Sum of competitor tier weights explaining `100 - market_share`.
    pub competitor_weight: f64,
}

/// One internally consistent set of generated values for a property.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MetricSnapshot {
    pub property: PropertyId,
    /// Seed the snapshot was generated from.
    pub seed: SeedValue,
    /// Open ride requests in [10, 45].
    pub active_requests: u32,
    /// Surge multiplier in [1.0, 3.5], full precision.
    pub current_surge: f64,
    /// Hourly loss or hourly earnings, depending on monetization.
    pub revenue: RevenueImpact,
    /// Value per request-surge unit; `revenue = requests * surge * average_ride_value`.
    pub average_ride_value: Decimal,
    /// Hotel occupancy in percent.
    pub occupancy_pct: f64,
    pub urgency_message: String,
    pub last_guest_complaint: GuestComplaint,
    pub flight_arrivals: Vec<FlightArrival>,
    pub traffic_conditions: Vec<TrafficCondition>,
    pub driver_roster: Vec<Driver>,
    pub market_position: MarketPosition,
}

impl MetricSnapshot {
    /// Surge rounded to one decimal for display.
    pub fn surge_label(&self) -> String {
        surge_label(self.current_surge)
    }

    /// Drivers currently online or on a trip.
    pub fn drivers_online(&self) -> u32 {
        self.driver_roster
            .iter()
            .filter(|d| d.online_status.is_active())
            .count() as u32
    }
}

/// Format a surge multiplier with one decimal, e.g. "2.3".
pub fn surge_label(surge: f64) -> String {
    format!("{surge:.1}")
}

/// What the refresh driver does when a property code is not in the directory.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissPolicy {
    /// Emit a single not-found event and stop ticking.
    #[default]
    Terminate,
    /// Keep ticking against the fallback record.
    Fallback,
}

/// Tunables for bucketing and refresh smoothing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Width of a seed bucket in milliseconds (> 0).
    pub bucket_width_ms: u64,
    /// Default refresh interval in milliseconds (> 0).
    pub refresh_interval_ms: u64,
    /// Largest per-tick change in active requests.
    pub max_request_delta: u32,
    /// Largest per-tick change in active drivers.
    pub max_online_delta: u32,
    /// Directory miss handling for subscriptions.
    pub miss_policy: MissPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            bucket_width_ms: BUCKET_WIDTH_MS,
            refresh_interval_ms: DEFAULT_REFRESH_INTERVAL_MS,
            max_request_delta: MAX_REQUEST_DELTA,
            max_online_delta: MAX_ONLINE_DELTA,
            miss_policy: MissPolicy::Terminate,
        }
    }
}

impl EngineConfig {
    /// Parse and validate a YAML config document. Missing keys take defaults.
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        let cfg: EngineConfig =
            serde_yaml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        validate_config(&cfg)?;
        Ok(cfg)
    }
}

/// Invalid engine configuration.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("config parse error: {0}")]
    Parse(String),
    #[error("{0} must be > 0")]
    NonPositive(&'static str),
}

/// Validate engine tunables.
pub fn validate_config(cfg: &EngineConfig) -> Result<(), ConfigError> {
    if cfg.bucket_width_ms == 0 {
        return Err(ConfigError::NonPositive("bucket_width_ms"));
    }
    if cfg.refresh_interval_ms == 0 {
        return Err(ConfigError::NonPositive("refresh_interval_ms"));
    }
    if cfg.max_request_delta == 0 {
        return Err(ConfigError::NonPositive("max_request_delta"));
    }
    Ok(())
}

/// Validation errors for directory records and generated snapshots.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    /// Identifier must be non-empty.
    #[error("property identifier is empty")]
    EmptyIdentifier,
    /// Monetary values must be non-negative.
    #[error("negative monetary value on {0}")]
    NegativeMoney(String),
    /// A property may not list itself as a competitor.
    #[error("property {0} lists itself as a competitor")]
    SelfCompetitor(String),
    /// Numeric field outside its documented range.
    #[error("{field} = {value} outside [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
    /// List length outside its documented range.
    #[error("{field} has {len} entries, expected [{min}, {max}]")]
    BadLength {
        field: &'static str,
        len: usize,
        min: usize,
        max: usize,
    },
    /// Revenue framing disagrees with monetization status.
    #[error("revenue framing does not match monetization status")]
    RevenueFraming,
    /// Required text is empty.
    #[error("{0} is empty")]
    EmptyText(&'static str),
}

/// Validate a directory record.
pub fn validate_record(r: &PropertyRecord) -> Result<(), ValidationError> {
    if r.identifier.0.trim().is_empty() {
        return Err(ValidationError::EmptyIdentifier);
    }
    if r.monthly_potential < Decimal::ZERO || r.monthly_revenue < Decimal::ZERO {
        return Err(ValidationError::NegativeMoney(r.identifier.0.clone()));
    }
    if r.competitors.contains(&r.identifier) {
        return Err(ValidationError::SelfCompetitor(r.identifier.0.clone()));
    }
    Ok(())
}

fn check_range(field: &'static str, value: f64, min: f64, max: f64) -> Result<(), ValidationError> {
    if !value.is_finite() || value < min || value > max {
        return Err(ValidationError::OutOfRange {
            field,
            value,
            min,
            max,
        });
    }
    Ok(())
}

fn check_len(field: &'static str, len: usize, min: usize, max: usize) -> Result<(), ValidationError> {
    if len < min || len > max {
        return Err(ValidationError::BadLength {
            field,
            len,
            min,
            max,
        });
    }
    Ok(())
}

/// Validate every documented bound of a snapshot against its property.
pub fn validate_snapshot(
    s: &MetricSnapshot,
    status: MonetizationStatus,
) -> Result<(), ValidationError> {
    check_range(
        "active_requests",
        f64::from(s.active_requests),
        f64::from(REQUESTS_MIN),
        f64::from(REQUESTS_MAX),
    )?;
    check_range("current_surge", s.current_surge, SURGE_MIN, SURGE_MAX)?;
    check_range("occupancy_pct", s.occupancy_pct, OCCUPANCY_MIN, OCCUPANCY_MAX)?;
    if !s.revenue.matches(status) {
        return Err(ValidationError::RevenueFraming);
    }
    if s.revenue.amount() < Decimal::ZERO || s.average_ride_value < Decimal::ZERO {
        return Err(ValidationError::NegativeMoney("revenue".into()));
    }
    if s.urgency_message.trim().is_empty() {
        return Err(ValidationError::EmptyText("urgency_message"));
    }
    check_range(
        "complaint_minutes_ago",
        f64::from(s.last_guest_complaint.minutes_ago),
        f64::from(COMPLAINT_AGE_MIN),
        f64::from(COMPLAINT_AGE_MAX),
    )?;
    check_len("flight_arrivals", s.flight_arrivals.len(), FLIGHTS_MIN, FLIGHTS_MAX)?;
    for f in &s.flight_arrivals {
        check_range(
            "passenger_count",
            f64::from(f.passenger_count),
            f64::from(PASSENGERS_MIN),
            f64::from(PASSENGERS_MAX),
        )?;
    }
    check_len("traffic_conditions", s.traffic_conditions.len(), ROUTES_MIN, ROUTES_MAX)?;
    check_len("driver_roster", s.driver_roster.len(), ROSTER_MIN, ROSTER_MAX)?;
    for d in &s.driver_roster {
        check_range("rating", d.rating, RATING_MIN, RATING_MAX)?;
        check_range(
            "ride_count",
            f64::from(d.ride_count),
            f64::from(RIDE_COUNT_MIN),
            f64::from(RIDE_COUNT_MAX),
        )?;
        if d.earnings < Decimal::ZERO {
            return Err(ValidationError::NegativeMoney(d.name.clone()));
        }
    }
    check_range("market_share", s.market_position.market_share, 0.0, 100.0)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn record(id: &str) -> PropertyRecord {
        PropertyRecord {
            identifier: PropertyId::new(id),
            name: "Test Hotel".to_string(),
            address: "1 Test Way".to_string(),
            tier: Tier::Standard,
            monetization: MonetizationStatus::NotEarning,
            monthly_potential: Decimal::new(67_433, 0),
            monthly_revenue: Decimal::ZERO,
            competitors: vec![PropertyId::new("OTHER-1")],
            seed_complaints: vec![],
        }
    }

    #[test]
    fn serde_roundtrip_record() {
        let r = record("TEST-PHX-001");
        let s = serde_json::to_string(&r).unwrap();
        let back: PropertyRecord = serde_json::from_str(&s).unwrap();
        assert_eq!(back, r);
    }

    #[test]
    fn record_validation() {
        assert!(validate_record(&record("A")).is_ok());
        assert_eq!(
            validate_record(&record("  ")),
            Err(ValidationError::EmptyIdentifier)
        );
        let mut r = record("A");
        r.monthly_potential = Decimal::new(-1, 0);
        assert!(matches!(
            validate_record(&r),
            Err(ValidationError::NegativeMoney(_))
        ));
        let mut r = record("A");
        r.competitors.push(PropertyId::new("A"));
        assert_eq!(
            validate_record(&r),
            Err(ValidationError::SelfCompetitor("A".into()))
        );
    }

    #[test]
    fn revenue_framing_matches_status() {
        let loss = RevenueImpact::HourlyLoss(Decimal::ONE);
        let earned = RevenueImpact::HourlyEarned(Decimal::ONE);
        assert!(loss.matches(MonetizationStatus::NotEarning));
        assert!(!loss.matches(MonetizationStatus::AlreadyEarning));
        assert!(earned.matches(MonetizationStatus::AlreadyEarning));
        let json = serde_json::to_string(&loss).unwrap();
        assert!(json.contains("hourly_loss"));
    }

    #[test]
    fn traffic_status_thresholds() {
        assert_eq!(TrafficStatus::from_delay(0), TrafficStatus::Light);
        assert_eq!(TrafficStatus::from_delay(5), TrafficStatus::Moderate);
        assert_eq!(TrafficStatus::from_delay(14), TrafficStatus::Moderate);
        assert_eq!(TrafficStatus::from_delay(15), TrafficStatus::Heavy);
    }

    #[test]
    fn config_defaults_and_yaml() {
        let cfg = EngineConfig::from_yaml_str("bucket_width_ms: 3000\nmiss_policy: fallback\n")
            .unwrap();
        assert_eq!(cfg.bucket_width_ms, 3000);
        assert_eq!(cfg.refresh_interval_ms, DEFAULT_REFRESH_INTERVAL_MS);
        assert_eq!(cfg.miss_policy, MissPolicy::Fallback);
        assert_eq!(
            EngineConfig::from_yaml_str("bucket_width_ms: 0\n"),
            Err(ConfigError::NonPositive("bucket_width_ms"))
        );
        assert!(matches!(
            EngineConfig::from_yaml_str("bucket_width_ms: [1]\n"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn surge_label_rounds_one_decimal() {
        assert_eq!(surge_label(2.349), "2.3");
        assert_eq!(surge_label(1.0), "1.0");
    }

    proptest! {
        #[test]
        fn bucket_is_stable_within_window(ms in 0i64..10_000_000_000, width in 1u64..60_000) {
            let b = TimeBucket::from_epoch_ms(ms, width);
            let start = (b.0 * width) as i64;
            prop_assert_eq!(TimeBucket::from_epoch_ms(start, width), b);
            prop_assert_eq!(TimeBucket::from_epoch_ms(start + width as i64 - 1, width), b);
            prop_assert_eq!(TimeBucket::from_epoch_ms(start + width as i64, width), b.next());
        }
    }

    #[test]
    fn negative_epoch_maps_to_origin() {
        assert_eq!(TimeBucket::from_epoch_ms(-5, 1000), TimeBucket::ORIGIN);
    }
}
