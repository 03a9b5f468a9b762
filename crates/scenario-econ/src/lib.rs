#![deny(warnings)]

//! Revenue and market models for property scenarios.
//!
//! This module provides validated utilities for:
//! - Hourly baselines from monthly directory figures
//! - Load-driven hourly loss/earnings (never independent of requests and surge)
//! - Tier-weighted market share against a competitor set

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use scenario_core::{
    MarketPosition, MonetizationStatus, PropertyRecord, RevenueImpact, Tier, HOURS_PER_MONTH,
    REQUESTS_MAX, REQUESTS_MIN, SURGE_MAX, SURGE_MIN,
};
use thiserror::Error;

/// Lowest fraction of the hourly baseline a snapshot may report.
pub const LOAD_FACTOR_MIN: f64 = 0.8;
/// Highest fraction of the hourly baseline a snapshot may report.
pub const LOAD_FACTOR_MAX: f64 = 1.2;
/// Own-weight bonus for properties already running rides through the program.
pub const EARNING_SHARE_BONUS: f64 = 1.25;

/// Errors produced by revenue helpers.
#[derive(Debug, Error, PartialEq)]
pub enum EconError {
    /// Monetary inputs must be non-negative.
    #[error("invalid monetary value")]
    InvalidPrice,
    /// Numeric conversion failed or produced a non-finite value.
    #[error("non-finite numeric conversion")]
    NonFinite,
}

/// Hourly share of a monthly figure over a 30-day month.
///
/// Example:
/// let h = hourly_baseline(Decimal::new(720, 0)).unwrap();
/// assert_eq!(h, Decimal::ONE);
pub fn hourly_baseline(monthly: Decimal) -> Result<Decimal, EconError> {
    if monthly < Decimal::ZERO {
        return Err(EconError::InvalidPrice);
    }
    Ok(monthly / Decimal::from(HOURS_PER_MONTH))
}

/// Map demand load (`requests * surge`) linearly onto [0.8, 1.2].
///
/// Inputs outside their documented bounds are clamped first.
pub fn load_factor(requests: u32, surge: f64) -> f64 {
    let surge = if surge.is_finite() {
        surge.clamp(SURGE_MIN, SURGE_MAX)
    } else {
        SURGE_MIN
    };
    let requests = requests.clamp(REQUESTS_MIN, REQUESTS_MAX);
    let min_load = f64::from(REQUESTS_MIN) * SURGE_MIN;
    let max_load = f64::from(REQUESTS_MAX) * SURGE_MAX;
    let t = (f64::from(requests) * surge - min_load) / (max_load - min_load);
    (LOAD_FACTOR_MIN + (LOAD_FACTOR_MAX - LOAD_FACTOR_MIN) * t).clamp(LOAD_FACTOR_MIN, LOAD_FACTOR_MAX)
}

/// Hourly amount for the current load, rounded to cents.
pub fn hourly_amount(baseline: Decimal, requests: u32, surge: f64) -> Result<Decimal, EconError> {
    if baseline < Decimal::ZERO {
        return Err(EconError::InvalidPrice);
    }
    let factor = Decimal::from_f64(load_factor(requests, surge)).ok_or(EconError::NonFinite)?;
    Ok((baseline * factor).round_dp(2))
}

/// Value attributed to one request at one surge unit, rounded to cents.
pub fn average_ride_value(hourly: Decimal, requests: u32, surge: f64) -> Result<Decimal, EconError> {
    let load = f64::from(requests) * surge;
    if !(load.is_finite() && load > 0.0) {
        return Err(EconError::NonFinite);
    }
    let load = Decimal::from_f64(load).ok_or(EconError::NonFinite)?;
    Ok((hourly / load).round_dp(2))
}

/// Revenue framing for a property at the given load.
///
/// Not-earning properties report the loss against `monthly_potential`;
/// earning properties report earnings against `monthly_revenue`.
pub fn revenue_impact(
    record: &PropertyRecord,
    requests: u32,
    surge: f64,
) -> Result<RevenueImpact, EconError> {
    match record.monetization {
        MonetizationStatus::NotEarning => {
            let base = hourly_baseline(record.monthly_potential)?;
            Ok(RevenueImpact::HourlyLoss(hourly_amount(base, requests, surge)?))
        }
        MonetizationStatus::AlreadyEarning => {
            let base = hourly_baseline(record.monthly_revenue)?;
            Ok(RevenueImpact::HourlyEarned(hourly_amount(base, requests, surge)?))
        }
    }
}

/// Market position from own tier/status and the competitors' tiers.
///
/// share = 100 * own / (own + sum(competitor weights)), one decimal.
pub fn market_position(
    tier: Tier,
    status: MonetizationStatus,
    competitor_tiers: &[Tier],
) -> MarketPosition {
    let own = match status {
        MonetizationStatus::AlreadyEarning => tier.market_weight() * EARNING_SHARE_BONUS,
        MonetizationStatus::NotEarning => tier.market_weight(),
    };
    let competitor_weight: f64 = competitor_tiers.iter().map(|t| t.market_weight()).sum();
    let share = 100.0 * own / (own + competitor_weight);
    MarketPosition {
        market_share: ((share * 10.0).round() / 10.0).clamp(0.0, 100.0),
        competitor_count: competitor_tiers.len() as u32,
        competitor_weight,
    }
}

/// Lifetime driver earnings from a ride count and fare, rounded to cents.
pub fn driver_earnings(ride_count: u32, average_fare: Decimal) -> Result<Decimal, EconError> {
    if average_fare < Decimal::ZERO {
        return Err(EconError::InvalidPrice);
    }
    Ok((Decimal::from(ride_count) * average_fare).round_dp(2))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use scenario_core::PropertyId;

    fn record(status: MonetizationStatus) -> PropertyRecord {
        PropertyRecord {
            identifier: PropertyId::new("TEST-PHX-001"),
            name: "Test".into(),
            address: "Somewhere".into(),
            tier: Tier::Standard,
            monetization: status,
            monthly_potential: Decimal::new(67_433, 0),
            monthly_revenue: Decimal::new(36_000, 0),
            competitors: vec![],
            seed_complaints: vec![],
        }
    }

    #[test]
    fn baseline_is_thirty_day_hours() {
        assert_eq!(hourly_baseline(Decimal::new(720, 0)).unwrap(), Decimal::ONE);
        assert_eq!(
            hourly_baseline(Decimal::new(-1, 0)),
            Err(EconError::InvalidPrice)
        );
    }

    #[test]
    fn load_factor_endpoints() {
        assert!((load_factor(REQUESTS_MIN, SURGE_MIN) - LOAD_FACTOR_MIN).abs() < 1e-12);
        assert!((load_factor(REQUESTS_MAX, SURGE_MAX) - LOAD_FACTOR_MAX).abs() < 1e-12);
        // out-of-range inputs clamp
        assert!((load_factor(500, 99.0) - LOAD_FACTOR_MAX).abs() < 1e-12);
        assert!((load_factor(0, f64::NAN) - LOAD_FACTOR_MIN).abs() < 1e-12);
    }

    #[test]
    fn earning_property_reports_earnings() {
        let r = record(MonetizationStatus::AlreadyEarning);
        let impact = revenue_impact(&r, 20, 1.5).unwrap();
        assert!(matches!(impact, RevenueImpact::HourlyEarned(v) if v >= Decimal::ZERO));
        let r = record(MonetizationStatus::NotEarning);
        assert!(matches!(
            revenue_impact(&r, 20, 1.5).unwrap(),
            RevenueImpact::HourlyLoss(_)
        ));
    }

    #[test]
    fn market_share_explained_by_competitors() {
        let alone = market_position(Tier::Basic, MonetizationStatus::NotEarning, &[]);
        assert_eq!(alone.market_share, 100.0);
        let p = market_position(
            Tier::Standard,
            MonetizationStatus::NotEarning,
            &[Tier::Premium, Tier::Basic],
        );
        // 1.5 / (1.5 + 3.5) = 30%
        assert_eq!(p.market_share, 30.0);
        assert_eq!(p.competitor_count, 2);
        assert_eq!(p.competitor_weight, 3.5);
        let earning = market_position(
            Tier::Standard,
            MonetizationStatus::AlreadyEarning,
            &[Tier::Premium, Tier::Basic],
        );
        assert!(earning.market_share > p.market_share);
    }

    #[test]
    fn ride_value_reconstructs_hourly() {
        let hourly = Decimal::new(9_000, 2);
        let v = average_ride_value(hourly, 20, 1.5).unwrap();
        assert_eq!(v, Decimal::new(300, 2));
        assert_eq!(average_ride_value(hourly, 0, 1.5), Err(EconError::NonFinite));
    }

    #[test]
    fn earnings_round_to_cents() {
        assert_eq!(
            driver_earnings(3, Decimal::new(12_345, 4)).unwrap(),
            Decimal::new(370, 2)
        );
    }

    proptest! {
        #[test]
        fn hourly_within_twenty_percent(requests in REQUESTS_MIN..=REQUESTS_MAX,
                                        surge in SURGE_MIN..=SURGE_MAX,
                                        monthly in 0i64..5_000_000) {
            let base = hourly_baseline(Decimal::new(monthly, 0)).unwrap();
            let h = hourly_amount(base, requests, surge).unwrap();
            let lo = (base * Decimal::new(8, 1)).round_dp(2);
            let hi = (base * Decimal::new(12, 1)).round_dp(2);
            prop_assert!(h >= lo && h <= hi);
        }

        #[test]
        fn hourly_monotonic_in_load(requests in REQUESTS_MIN..REQUESTS_MAX, surge in SURGE_MIN..SURGE_MAX) {
            let base = Decimal::new(100, 0);
            let h1 = hourly_amount(base, requests, surge).unwrap();
            let h2 = hourly_amount(base, requests + 1, surge).unwrap();
            prop_assert!(h2 >= h1);
        }
    }
}
