#![deny(warnings)]

//! Headless CLI: subscribes to a property and prints each refresh.

use anyhow::{anyhow, bail, Context, Result};
use property_directory::Directory;
use scenario_core::{EngineConfig, MetricSnapshot, PropertyId, RevenueImpact};
use scenario_engine::ScenarioEngine;
use scenario_runtime::{RefreshDriver, RefreshEvent};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::LocalSet;
use tracing::info;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Default)]
struct Args {
    property: Option<String>,
    ticks: Option<u32>,
    interval_ms: Option<u64>,
    directory: Option<PathBuf>,
    config: Option<PathBuf>,
    json: bool,
}

fn parse_args<I: IntoIterator<Item = String>>(args: I) -> Args {
    let mut out = Args::default();
    let mut it = args.into_iter();
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--property" => out.property = it.next(),
            "--ticks" => out.ticks = it.next().and_then(|s| s.parse().ok()),
            "--interval-ms" => out.interval_ms = it.next().and_then(|s| s.parse().ok()),
            "--directory" => out.directory = it.next().map(PathBuf::from),
            "--config" => out.config = it.next().map(PathBuf::from),
            "--json" => out.json = true,
            _ => {}
        }
    }
    out
}

fn build_engine(args: &Args) -> Result<Arc<ScenarioEngine>> {
    let config = match &args.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            EngineConfig::from_yaml_str(&text)?
        }
        None => EngineConfig::default(),
    };
    let directory = match &args.directory {
        Some(path) => Directory::load(path)
            .with_context(|| format!("loading directory {}", path.display()))?,
        None => Directory::builtin()?,
    };
    info!(properties = directory.len(), ?config, "engine ready");
    Ok(Arc::new(ScenarioEngine::new(Arc::new(directory), config)?))
}

/// Run one subscription until `ticks` events arrived or it ended on its own.
async fn collect(
    engine: Arc<ScenarioEngine>,
    property: PropertyId,
    ticks: u32,
    interval: Option<Duration>,
) -> Vec<RefreshEvent> {
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let mut driver = RefreshDriver::new(engine);
    let interval = interval.unwrap_or_else(|| driver.configured_interval());
    driver.start(property, interval, move |event| {
        let _ = tx.send(event);
    });
    let mut events = Vec::new();
    while events.len() < ticks as usize {
        match rx.recv().await {
            Some(event) => events.push(event),
            None => break,
        }
    }
    driver.stop();
    events
}

fn summary_line(s: &MetricSnapshot) -> String {
    let revenue = match s.revenue {
        RevenueImpact::HourlyLoss(v) => format!("losing ${v}/hr"),
        RevenueImpact::HourlyEarned(v) => format!("earning ${v}/hr"),
    };
    format!(
        "{} | requests: {} | surge: {}x | {} | occupancy: {:.1}% | share: {:.1}% | drivers online: {}/{}",
        s.property,
        s.active_requests,
        s.surge_label(),
        revenue,
        s.occupancy_pct,
        s.market_position.market_share,
        s.drivers_online(),
        s.driver_roster.len()
    )
}

/// `RUST_LOG` alone decides the level; engine corrections log at debug.
fn log_subscriber(filter: EnvFilter) -> impl tracing::Subscriber + Send + Sync + 'static {
    tracing_subscriber::fmt().with_env_filter(filter).finish()
}

fn main() -> Result<()> {
    // Logging setup
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    log_subscriber(filter).init();

    let args = parse_args(std::env::args().skip(1));
    info!(
        ?args,
        git_sha = env!("GIT_SHA"),
        build_date = env!("BUILD_DATE"),
        "starting CLI"
    );
    let Some(code) = args.property.clone() else {
        bail!("usage: cli --property <ID> [--ticks N] [--interval-ms MS] [--directory PATH] [--config PATH] [--json]");
    };
    let engine = build_engine(&args)?;

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()?;
    let local = LocalSet::new();
    let events = local.block_on(
        &rt,
        collect(
            engine,
            PropertyId::new(code),
            args.ticks.unwrap_or(1).max(1),
            args.interval_ms.map(Duration::from_millis),
        ),
    );

    for event in events {
        match event {
            RefreshEvent::Snapshot(s) if args.json => println!("{}", serde_json::to_string(&*s)?),
            RefreshEvent::Snapshot(s) => println!("{}", summary_line(&s)),
            RefreshEvent::NotFound { identifier } => {
                return Err(anyhow!("property {identifier} not found"));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Args {
        parse_args(list.iter().map(|s| s.to_string()))
    }

    #[test]
    fn parses_flags() {
        let a = args(&[
            "--property",
            "SCT-003",
            "--ticks",
            "4",
            "--interval-ms",
            "250",
            "--json",
            "--bogus",
        ]);
        assert_eq!(a.property.as_deref(), Some("SCT-003"));
        assert_eq!(a.ticks, Some(4));
        assert_eq!(a.interval_ms, Some(250));
        assert!(a.json);
        assert!(a.directory.is_none());
    }

    #[test]
    fn env_filter_controls_level() {
        tracing::subscriber::with_default(log_subscriber(EnvFilter::new("debug")), || {
            assert!(tracing::enabled!(tracing::Level::DEBUG));
        });
        tracing::subscriber::with_default(log_subscriber(EnvFilter::new("info")), || {
            assert!(!tracing::enabled!(tracing::Level::DEBUG));
            assert!(tracing::enabled!(tracing::Level::INFO));
        });
    }

    #[test]
    fn build_metadata_embedded() {
        assert!(!env!("GIT_SHA").is_empty());
        assert!(!env!("BUILD_DATE").is_empty());
    }

    #[test]
    fn summary_mentions_framing() {
        let engine = build_engine(&Args::default()).unwrap();
        let s = engine.snapshot_for(&PropertyId::new("TEST-PHX-001"), scenario_core::TimeBucket(1));
        let line = summary_line(&s);
        assert!(line.starts_with("TEST-PHX-001 | requests: "));
        assert!(line.contains("losing $"));
    }

    #[tokio::test(start_paused = true)]
    async fn collects_requested_ticks() {
        let engine = build_engine(&Args::default()).unwrap();
        let events = LocalSet::new()
            .run_until(collect(
                engine,
                PropertyId::new("LAS-006"),
                3,
                Some(Duration::from_millis(100)),
            ))
            .await;
        assert_eq!(events.len(), 3);
        assert!(events
            .iter()
            .all(|e| matches!(e, RefreshEvent::Snapshot(s) if s.property.as_str() == "LAS-006")));
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_property_stops_early() {
        let engine = build_engine(&Args::default()).unwrap();
        let events = LocalSet::new()
            .run_until(collect(engine, PropertyId::new("NOPE-000"), 5, None))
            .await;
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], RefreshEvent::NotFound { .. }));
    }
}
