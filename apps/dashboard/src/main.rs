#![deny(warnings)]

//! Headless dashboard: renders scenario snapshots into text panels.

use anyhow::Result;
use bevy_ecs::prelude::*;
use scenario_core::{EngineConfig, MetricSnapshot, PropertyId, RevenueImpact};
use scenario_engine::ScenarioEngine;
use scenario_runtime::{RefreshEvent, Ticker};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Resource)]
struct Feed {
    ticker: Ticker,
    now_ms: i64,
    step_ms: i64,
}

#[derive(Resource, Default)]
struct DashboardState {
    latest: Option<Arc<MetricSnapshot>>,
    missing: Option<PropertyId>,
    panels: Vec<String>,
}

fn refresh_system(mut feed: ResMut<Feed>, mut state: ResMut<DashboardState>) {
    let now = feed.now_ms;
    match feed.ticker.tick(now) {
        Some(RefreshEvent::Snapshot(s)) => state.latest = Some(s),
        Some(RefreshEvent::NotFound { identifier }) => state.missing = Some(identifier),
        None => {}
    }
    let step = feed.step_ms;
    feed.now_ms += step;
}

fn render_panels(mut state: ResMut<DashboardState>) {
    let panels = match (&state.latest, &state.missing) {
        (_, Some(id)) => vec![format!("Property {id} not found")],
        (Some(s), None) => panel_lines(s),
        (None, None) => vec!["Waiting for data".to_string()],
    };
    state.panels = panels;
}

fn panel_lines(s: &MetricSnapshot) -> Vec<String> {
    let mut lines = vec![
        format!("Property {}", s.property),
        format!(
            "Requests {} | Surge {}x | Drivers online {}/{}",
            s.active_requests,
            s.surge_label(),
            s.drivers_online(),
            s.driver_roster.len()
        ),
        match s.revenue {
            RevenueImpact::HourlyLoss(v) => format!("Losing ${v}/hr | avg ride ${}", s.average_ride_value),
            RevenueImpact::HourlyEarned(v) => {
                format!("Earning ${v}/hr | avg ride ${}", s.average_ride_value)
            }
        },
        format!(
            "Occupancy {:.1}% | Market share {:.1}% vs {} competitors",
            s.occupancy_pct, s.market_position.market_share, s.market_position.competitor_count
        ),
        s.urgency_message.clone(),
        format!(
            "Guest: \"{}\" ({})",
            s.last_guest_complaint.text, s.last_guest_complaint.label
        ),
        "Arrivals:".to_string(),
    ];
    lines.extend(s.flight_arrivals.iter().map(|f| {
        format!(
            "  {} from {}: {} pax, {}",
            f.flight_code, f.origin, f.passenger_count, f.eta_label
        )
    }));
    lines.push("Traffic:".to_string());
    lines.extend(s.traffic_conditions.iter().map(|r| {
        format!(
            "  {}: {} min (+{}) {:?}",
            r.route_label, r.current_minutes, r.delay_minutes, r.status
        )
    }));
    lines.push("Drivers:".to_string());
    lines.extend(s.driver_roster.iter().map(|d| {
        format!(
            "  {} ({}) {:.2} stars, {} rides, ${} {:?}",
            d.name, d.vehicle, d.rating, d.ride_count, d.earnings, d.online_status
        )
    }));
    lines
}

fn build_world(engine: Arc<ScenarioEngine>, property: PropertyId) -> (World, Schedule) {
    let step_ms = engine.config().refresh_interval_ms as i64;
    let mut world = World::new();
    world.insert_resource(Feed {
        ticker: Ticker::new(engine, property),
        now_ms: 0,
        step_ms,
    });
    world.insert_resource(DashboardState::default());
    let mut schedule = Schedule::default();
    schedule.add_systems((refresh_system, render_panels).chain());
    (world, schedule)
}

fn parse_args() -> (Option<String>, Option<u32>) {
    let mut property: Option<String> = None;
    let mut frames: Option<u32> = None;
    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--property" => property = it.next(),
            "--frames" => frames = it.next().and_then(|s| s.parse().ok()),
            _ => {}
        }
    }
    (property, frames)
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let (property, frames) = parse_args();
    let property = PropertyId::new(property.unwrap_or_else(|| "TEST-PHX-001".to_string()));
    let engine = Arc::new(ScenarioEngine::with_builtin_directory(EngineConfig::default())?);
    info!(%property, "dashboard starting");

    let (mut world, mut schedule) = build_world(engine, property);
    for _ in 0..frames.unwrap_or(1).max(1) {
        schedule.run(&mut world);
    }
    for line in &world.resource::<DashboardState>().panels {
        println!("{line}");
    }
    Ok(())
}
