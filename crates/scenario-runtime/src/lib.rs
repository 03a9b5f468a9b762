#![deny(warnings)]

//! Periodic refresh of a property's scenario snapshot.
//!
//! A [`RefreshDriver`] owns one subscription: a local tokio task that wakes on
//! an interval, asks its [`Ticker`] for the next snapshot and hands the event
//! to the caller's callback. The driver must be started inside a
//! [`tokio::task::LocalSet`] on a current-thread runtime.

use chrono::Utc;
use scenario_core::{MetricSnapshot, MissPolicy, PropertyId, PropertyRecord};
use scenario_engine::ScenarioEngine;
use scenario_seed::seed_for;
use std::cell::Cell;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

pub use scenario_core::{DEFAULT_REFRESH_INTERVAL_MS, MAX_ONLINE_DELTA, MAX_REQUEST_DELTA};

/// What a subscription delivers on each tick.
#[derive(Clone, Debug, PartialEq)]
pub enum RefreshEvent {
    Snapshot(Arc<MetricSnapshot>),
    /// The identifier is not in the directory; the subscription has ended.
    NotFound { identifier: PropertyId },
}

/// Synchronous per-subscription state: resolved record, previous snapshot
/// and whether the subscription has ended.
pub struct Ticker {
    engine: Arc<ScenarioEngine>,
    identifier: PropertyId,
    record: Option<PropertyRecord>,
    previous: Option<Arc<MetricSnapshot>>,
    terminated: bool,
}

impl Ticker {
    pub fn new(engine: Arc<ScenarioEngine>, identifier: PropertyId) -> Self {
        let record = match engine.resolve(&identifier) {
            Ok(record) => Some(record),
            Err(miss) => match engine.config().miss_policy {
                MissPolicy::Terminate => {
                    warn!(%miss, "subscription will end on first tick");
                    None
                }
                MissPolicy::Fallback => Some(engine.directory().lookup_or_fallback(&identifier)),
            },
        };
        Self {
            engine,
            identifier,
            record,
            previous: None,
            terminated: false,
        }
    }

    /// Next event for the wall-clock time `now_ms`, or `None` once terminated.
    pub fn tick(&mut self, now_ms: i64) -> Option<RefreshEvent> {
        if self.terminated {
            return None;
        }
        let Some(record) = &self.record else {
            self.terminated = true;
            return Some(RefreshEvent::NotFound {
                identifier: self.identifier.clone(),
            });
        };
        let bucket = self.engine.bucket_at(now_ms);
        let seed = seed_for(&self.identifier, bucket);
        let snapshot = match &self.previous {
            Some(prev) => self.engine.evolve(record, seed, prev).snapshot,
            None => self.engine.aggregate(record, seed),
        };
        debug!(property = %self.identifier, bucket = bucket.0, requests = snapshot.active_requests, "tick");
        let snapshot = Arc::new(snapshot);
        self.previous = Some(Arc::clone(&snapshot));
        Some(RefreshEvent::Snapshot(snapshot))
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    pub fn previous(&self) -> Option<&Arc<MetricSnapshot>> {
        self.previous.as_ref()
    }
}

enum Lifecycle {
    Idle,
    Running {
        active: Rc<Cell<bool>>,
        task: JoinHandle<()>,
    },
    Stopped,
}

/// One refresh subscription.
pub struct RefreshDriver {
    engine: Arc<ScenarioEngine>,
    state: Lifecycle,
}

impl RefreshDriver {
    pub fn new(engine: Arc<ScenarioEngine>) -> Self {
        Self {
            engine,
            state: Lifecycle::Idle,
        }
    }

    /// Interval from the engine config.
    pub fn configured_interval(&self) -> Duration {
        Duration::from_millis(self.engine.config().refresh_interval_ms)
    }

    /// Begin refreshing `identifier` every `interval`, first tick immediately.
    ///
    /// # Panics
    ///
    /// If the driver is already running, or when called outside a `LocalSet`.
    pub fn start<F>(&mut self, identifier: PropertyId, interval: Duration, mut on_event: F)
    where
        F: FnMut(RefreshEvent) + 'static,
    {
        if let Lifecycle::Running { .. } = self.state {
            panic!("RefreshDriver::start: subscription already running; call stop() first");
        }
        let interval = interval.max(Duration::from_millis(1));
        let active = Rc::new(Cell::new(true));
        let gate = Rc::clone(&active);
        let mut ticker = Ticker::new(Arc::clone(&self.engine), identifier.clone());
        let anchor_ms = Utc::now().timestamp_millis();
        let origin = tokio::time::Instant::now();
        info!(property = %identifier, interval_ms = interval.as_millis() as u64, "subscription started");

        let task = tokio::task::spawn_local(async move {
            let mut timer = tokio::time::interval(interval);
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                timer.tick().await;
                if !gate.get() {
                    break;
                }
                let now_ms = anchor_ms + origin.elapsed().as_millis() as i64;
                match ticker.tick(now_ms) {
                    Some(event) => on_event(event),
                    None => break,
                }
                if ticker.is_terminated() {
                    info!(property = %identifier, "subscription ended: property not found");
                    break;
                }
            }
        });
        self.state = Lifecycle::Running { active, task };
    }

    /// End the subscription; no callback runs after this returns.
    ///
    /// Idempotent once started.
    ///
    /// # Panics
    ///
    /// If the driver was never started.
    pub fn stop(&mut self) {
        match std::mem::replace(&mut self.state, Lifecycle::Stopped) {
            Lifecycle::Idle => {
                self.state = Lifecycle::Idle;
                panic!("RefreshDriver::stop: subscription was never started");
            }
            Lifecycle::Running { active, task } => {
                active.set(false);
                task.abort();
                info!("subscription stopped");
            }
            Lifecycle::Stopped => {}
        }
    }

    /// True while the refresh task is alive.
    pub fn is_running(&self) -> bool {
        match &self.state {
            Lifecycle::Running { task, .. } => !task.is_finished(),
            Lifecycle::Idle | Lifecycle::Stopped => false,
        }
    }
}

impl Drop for RefreshDriver {
    fn drop(&mut self) {
        if let Lifecycle::Running { active, task } = &self.state {
            active.set(false);
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scenario_core::{EngineConfig, BUCKET_WIDTH_MS};
    use std::cell::RefCell;
    use tokio::task::LocalSet;

    fn engine_with(policy: MissPolicy) -> Arc<ScenarioEngine> {
        let cfg = EngineConfig {
            miss_policy: policy,
            ..EngineConfig::default()
        };
        Arc::new(ScenarioEngine::with_builtin_directory(cfg).unwrap())
    }

    fn snapshot(event: RefreshEvent) -> Arc<MetricSnapshot> {
        match event {
            RefreshEvent::Snapshot(s) => s,
            other => panic!("expected snapshot, got {other:?}"),
        }
    }

    #[test]
    fn ticker_smooths_across_buckets() {
        let mut ticker = Ticker::new(engine_with(MissPolicy::Terminate), PropertyId::new("TEST-PHX-001"));
        let mut prev = snapshot(ticker.tick(0).unwrap());
        for i in 1..300i64 {
            let next = snapshot(ticker.tick(i * BUCKET_WIDTH_MS as i64).unwrap());
            assert!(next.active_requests.abs_diff(prev.active_requests) <= MAX_REQUEST_DELTA);
            assert!(next.drivers_online().abs_diff(prev.drivers_online()) <= MAX_ONLINE_DELTA);
            prev = next;
        }
        assert_eq!(ticker.previous(), Some(&prev));
    }

    #[test]
    fn ticker_same_bucket_is_stable() {
        let mut ticker = Ticker::new(engine_with(MissPolicy::Terminate), PropertyId::new("SCT-003"));
        let a = snapshot(ticker.tick(1_000).unwrap());
        let b = snapshot(ticker.tick(1_500).unwrap());
        // seeded fields agree inside one bucket
        assert_eq!(a.seed, b.seed);
        assert_eq!(a.current_surge, b.current_surge);
        assert_eq!(a.flight_arrivals, b.flight_arrivals);
    }

    #[test]
    fn subscriptions_agree_on_bucket_fields() {
        let engine = engine_with(MissPolicy::Terminate);
        let id = PropertyId::new("TEST-PHX-001");
        let mut veteran = Ticker::new(Arc::clone(&engine), id.clone());
        for i in 0..40i64 {
            veteran.tick(i * 3_000);
        }
        let mut fresh = Ticker::new(engine, id);
        for now in [120_000i64, 125_000, 131_000] {
            let a = snapshot(veteran.tick(now).unwrap());
            let b = snapshot(fresh.tick(now).unwrap());
            assert_eq!(a.seed, b.seed);
            assert_eq!(a.current_surge, b.current_surge);
            assert_eq!(a.flight_arrivals, b.flight_arrivals);
            assert_eq!(a.traffic_conditions, b.traffic_conditions);
            assert_eq!(a.last_guest_complaint, b.last_guest_complaint);
        }
    }

    #[test]
    fn ticker_reports_miss_once() {
        let id = PropertyId::new("DOES-NOT-EXIST");
        let mut ticker = Ticker::new(engine_with(MissPolicy::Terminate), id.clone());
        assert_eq!(ticker.tick(0), Some(RefreshEvent::NotFound { identifier: id }));
        assert!(ticker.is_terminated());
        assert_eq!(ticker.tick(5_000), None);
        assert_eq!(ticker.tick(10_000), None);
    }

    #[test]
    fn ticker_fallback_policy_renders() {
        let id = PropertyId::new("DOES-NOT-EXIST");
        let mut ticker = Ticker::new(engine_with(MissPolicy::Fallback), id.clone());
        let s = snapshot(ticker.tick(0).unwrap());
        assert_eq!(s.property, id);
        assert!(!ticker.is_terminated());
    }

    #[tokio::test(start_paused = true)]
    async fn no_callbacks_after_stop() {
        let local = LocalSet::new();
        local
            .run_until(async {
                let events = Rc::new(RefCell::new(Vec::new()));
                let sink = Rc::clone(&events);
                let mut driver = RefreshDriver::new(engine_with(MissPolicy::Terminate));
                let interval = driver.configured_interval();
                driver.start(PropertyId::new("TEST-PHX-001"), interval, move |e| {
                    sink.borrow_mut().push(e)
                });
                assert!(driver.is_running());
                tokio::time::sleep(interval * 2 + interval / 2).await;
                let seen = events.borrow().len();
                assert!(seen >= 2, "only {seen} ticks");

                driver.stop();
                assert!(!driver.is_running());
                tokio::time::sleep(interval * 4).await;
                assert_eq!(events.borrow().len(), seen);
                driver.stop();
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn missing_property_ends_subscription() {
        let local = LocalSet::new();
        local
            .run_until(async {
                let events = Rc::new(RefCell::new(Vec::new()));
                let sink = Rc::clone(&events);
                let mut driver = RefreshDriver::new(engine_with(MissPolicy::Terminate));
                driver.start(
                    PropertyId::new("DOES-NOT-EXIST"),
                    Duration::from_millis(100),
                    move |e| sink.borrow_mut().push(e),
                );
                tokio::time::sleep(Duration::from_millis(1_000)).await;
                assert_eq!(
                    *events.borrow(),
                    vec![RefreshEvent::NotFound {
                        identifier: PropertyId::new("DOES-NOT-EXIST")
                    }]
                );
                assert!(!driver.is_running());
                driver.stop();
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn restart_after_stop() {
        let local = LocalSet::new();
        local
            .run_until(async {
                let count = Rc::new(Cell::new(0u32));
                let mut driver = RefreshDriver::new(engine_with(MissPolicy::Terminate));
                for _ in 0..2 {
                    let c = Rc::clone(&count);
                    driver.start(PropertyId::new("LAS-006"), Duration::from_millis(50), move |_| {
                        c.set(c.get() + 1)
                    });
                    tokio::time::sleep(Duration::from_millis(120)).await;
                    driver.stop();
                }
                assert!(count.get() >= 4);
            })
            .await;
    }

    #[tokio::test]
    #[should_panic(expected = "already running")]
    async fn double_start_panics() {
        let local = LocalSet::new();
        local
            .run_until(async {
                let mut driver = RefreshDriver::new(engine_with(MissPolicy::Terminate));
                let id = PropertyId::new("TEST-PHX-001");
                driver.start(id.clone(), Duration::from_secs(1), |_| {});
                driver.start(id, Duration::from_secs(1), |_| {});
            })
            .await;
    }

    #[test]
    #[should_panic(expected = "never started")]
    fn stop_before_start_panics() {
        let mut driver = RefreshDriver::new(engine_with(MissPolicy::Terminate));
        driver.stop();
    }
}
