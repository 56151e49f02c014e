//! Multi-location alerting scenarios driven through the public API.

use alert_engine::{
    AlertEngineConfig, AlertEngineError, AlertRepository, AlertStateMachine, CheckCycleRunner,
    CheckExecutor, IncidentRepository, InMemoryRepository, NoopDispatcher, NotificationDispatcher,
    PubSubDispatcher, RetryConfig, TriggerMode,
};
use async_trait::async_trait;
use check_scheduler::{Scheduler, SchedulerConfig};
use durable_store::{DurableStore, MemoryStore, StoreError};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;
use uptime_common::{
    AlertEventV1, AlertType, CheckInterval, CheckResult, Monitor, ALERT_EVENTS_CHANNEL,
};

struct Fixture {
    machine: Arc<AlertStateMachine>,
    repo: Arc<InMemoryRepository>,
}

fn fixture(
    mode: TriggerMode,
    store: Arc<dyn DurableStore>,
    dispatcher: Arc<dyn NotificationDispatcher>,
    monitors: &[(&str, &[&str])],
) -> Fixture {
    let repo = Arc::new(InMemoryRepository::new());
    for (id, locations) in monitors {
        repo.upsert_monitor(
            Monitor::new(
                *id,
                format!("https://{}.example.com", id),
                CheckInterval::OneMinute,
                locations.iter().map(|l| l.to_string()).collect(),
            )
            .with_failure_threshold(3),
        );
    }
    let config = AlertEngineConfig {
        trigger_mode: mode,
        ..Default::default()
    };
    let machine = AlertStateMachine::new(
        config,
        store,
        repo.clone(),
        repo.clone(),
        repo.clone(),
        dispatcher,
    )
    .unwrap();
    Fixture {
        machine: Arc::new(machine),
        repo,
    }
}

async fn feed(machine: &AlertStateMachine, monitor_id: &str, cycle: &[(&str, bool)]) {
    for (location, ok) in cycle {
        let result = if *ok {
            CheckResult::success(monitor_id, *location).with_status_code(200)
        } else {
            CheckResult::failure(monitor_id, *location, "connection timed out")
        };
        machine.process_check_result(&result).await.unwrap();
    }
}

#[tokio::test]
async fn all_mode_alerts_after_third_failing_cycle_and_recovers() {
    let f = fixture(
        TriggerMode::All,
        Arc::new(MemoryStore::new()),
        Arc::new(NoopDispatcher),
        &[("m", &["A", "B"][..])],
    );

    for cycle in 1..=3 {
        feed(&f.machine, "m", &[("A", false), ("B", false)]).await;
        let failures = f.repo.alerts_of_type("m", AlertType::Failure).len();
        let expected = if cycle < 3 { 0 } else { 1 };
        assert_eq!(failures, expected, "after cycle {}", cycle);
    }

    feed(&f.machine, "m", &[("A", true), ("B", true)]).await;

    let recoveries = f.repo.alerts_of_type("m", AlertType::Recovery);
    assert_eq!(recoveries.len(), 1);
    let failure = &f.repo.alerts_of_type("m", AlertType::Failure)[0];
    assert!(failure.resolved_at.is_some());
    assert!(f.repo.find_active_incident("m").await.unwrap().is_none());
    assert_eq!(f.repo.incidents_for("m").len(), 1);
}

#[tokio::test]
async fn all_mode_partial_failure_never_alerts() {
    let f = fixture(
        TriggerMode::All,
        Arc::new(MemoryStore::new()),
        Arc::new(NoopDispatcher),
        &[("m", &["A", "B"][..])],
    );

    for _ in 0..10 {
        feed(&f.machine, "m", &[("A", false), ("B", true)]).await;
    }
    assert!(f.repo.alerts_for("m").is_empty());
    assert_eq!(f.machine.tracking_state("m").await.unwrap().consecutive_failures, 0);
}

#[tokio::test]
async fn any_mode_single_location_drives_counter() {
    let f = fixture(
        TriggerMode::Any,
        Arc::new(MemoryStore::new()),
        Arc::new(NoopDispatcher),
        &[("m", &["A", "B"][..])],
    );

    for cycle in 1..=3 {
        feed(&f.machine, "m", &[("A", false), ("B", true)]).await;
        let failures = f.repo.alerts_of_type("m", AlertType::Failure).len();
        assert_eq!(failures, if cycle < 3 { 0 } else { 1 }, "after cycle {}", cycle);
    }

    // B keeps succeeding; no recovery while A still fails.
    feed(&f.machine, "m", &[("B", true)]).await;
    assert!(f.repo.alerts_of_type("m", AlertType::Recovery).is_empty());

    feed(&f.machine, "m", &[("A", true)]).await;
    assert_eq!(f.repo.alerts_of_type("m", AlertType::Recovery).len(), 1);
    assert!(f.repo.find_active_alerts("m").await.unwrap().is_empty());
}

#[tokio::test]
async fn alert_events_are_published_and_outcomes_recorded() {
    let store = Arc::new(MemoryStore::new());
    let dispatcher = Arc::new(PubSubDispatcher::new(
        store.clone(),
        ALERT_EVENTS_CHANNEL,
        RetryConfig::new(2, 1),
    ));
    let f = fixture(TriggerMode::Any, store.clone(), dispatcher, &[("m", &["A"][..])]);

    for _ in 0..3 {
        feed(&f.machine, "m", &[("A", false)]).await;
    }

    let events: Vec<AlertEventV1> = store
        .published_on(ALERT_EVENTS_CHANNEL)
        .iter()
        .map(|raw| serde_json::from_str(raw).unwrap())
        .collect();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].alert_type, AlertType::Failure);
    assert_eq!(events[0].monitor_url, "https://m.example.com");

    let alert = &f.repo.alerts_of_type("m", AlertType::Failure)[0];
    assert_eq!(events[0].alert_id, alert.id);
    let outcome = alert.notifications.values().next().unwrap();
    assert!(outcome.delivered);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_results_for_one_monitor_are_serialised() {
    const TASKS: u32 = 8;
    let f = fixture(
        TriggerMode::Any,
        Arc::new(MemoryStore::new()),
        Arc::new(NoopDispatcher),
        &[("m", &["A", "B"][..])],
    );

    let handles: Vec<_> = (0..TASKS)
        .map(|i| {
            let machine = f.machine.clone();
            let location = if i % 2 == 0 { "A" } else { "B" };
            tokio::spawn(async move {
                machine
                    .process_check_result(&CheckResult::failure("m", location, "connection timed out"))
                    .await
            })
        })
        .collect();
    for outcome in futures::future::join_all(handles).await {
        outcome.unwrap().unwrap();
    }

    let state = f.machine.tracking_state("m").await.unwrap();
    assert_eq!(state.consecutive_failures, TASKS);
    assert!(state.is_in_failure_state);
    assert_eq!(f.repo.alerts_of_type("m", AlertType::Failure).len(), 1);
    assert_eq!(f.repo.incidents_for("m").len(), 1);
}

/// Fails every operation touching one monitor's keys.
struct PoisonedStore {
    inner: MemoryStore,
    poisoned: &'static str,
}

impl PoisonedStore {
    fn check(&self, key: &str) -> durable_store::Result<()> {
        if key.contains(self.poisoned) {
            return Err(StoreError::Unavailable(format!("{} unreachable", key)));
        }
        Ok(())
    }
}

#[async_trait]
impl DurableStore for PoisonedStore {
    async fn get(&self, key: &str) -> durable_store::Result<Option<String>> {
        self.check(key)?;
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> durable_store::Result<()> {
        self.check(key)?;
        self.inner.set(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> durable_store::Result<()> {
        self.check(key)?;
        self.inner.delete(key).await
    }

    async fn increment_counter(&self, key: &str, ttl: Duration) -> durable_store::Result<i64> {
        self.check(key)?;
        self.inner.increment_counter(key, ttl).await
    }

    async fn reset_counter(&self, key: &str) -> durable_store::Result<()> {
        self.check(key)?;
        self.inner.reset_counter(key).await
    }

    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> durable_store::Result<bool> {
        self.check(key)?;
        self.inner.set_if_absent(key, value, ttl).await
    }

    async fn publish(&self, channel: &str, message: &str) -> durable_store::Result<()> {
        self.inner.publish(channel, message).await
    }

    async fn keys(&self, pattern: &str) -> durable_store::Result<Vec<String>> {
        self.inner.keys(pattern).await
    }
}

#[tokio::test]
async fn store_errors_propagate_for_one_monitor_only() {
    let store = Arc::new(PoisonedStore {
        inner: MemoryStore::new(),
        poisoned: "broken",
    });
    let f = fixture(
        TriggerMode::Any,
        store,
        Arc::new(NoopDispatcher),
        &[("broken", &["A"][..]), ("healthy", &["A"][..])],
    );

    for _ in 0..3 {
        let err = f
            .machine
            .process_check_result(&CheckResult::failure("broken", "A", "timeout"))
            .await
            .unwrap_err();
        assert!(matches!(err, AlertEngineError::Store(_)));
        assert!(err.is_retryable());

        feed(&f.machine, "healthy", &[("A", false)]).await;
    }

    assert!(f.repo.alerts_for("broken").is_empty());
    assert_eq!(f.repo.alerts_of_type("healthy", AlertType::Failure).len(), 1);
}

#[tokio::test]
async fn deleted_monitor_mid_stream_is_dropped() {
    let f = fixture(
        TriggerMode::Any,
        Arc::new(MemoryStore::new()),
        Arc::new(NoopDispatcher),
        &[("m", &["A"][..])],
    );
    feed(&f.machine, "m", &[("A", false)]).await;
    f.repo.remove_monitor("m");

    let outcome = f
        .machine
        .process_check_result(&CheckResult::failure("m", "A", "timeout"))
        .await
        .unwrap();
    assert!(!outcome.monitor_found);
    assert_eq!(f.machine.tracking_state("m").await.unwrap().consecutive_failures, 1);
}

struct AlwaysDown;

#[async_trait]
impl CheckExecutor for AlwaysDown {
    async fn execute(&self, monitor: &Monitor, location: &str) -> anyhow::Result<CheckResult> {
        Ok(CheckResult::failure(&monitor.id, location, "connection refused").with_status_code(503))
    }
}

#[tokio::test(start_paused = true)]
async fn scheduled_cycles_raise_a_single_failure_alert() {
    let store = Arc::new(MemoryStore::new());
    let f = fixture(
        TriggerMode::All,
        store.clone(),
        Arc::new(NoopDispatcher),
        &[("m", &["us-east", "eu-west"][..])],
    );
    let runner = Arc::new(CheckCycleRunner::new(
        f.repo.clone(),
        Arc::new(AlwaysDown),
        f.machine.clone(),
    ));

    let scheduler = Scheduler::new(SchedulerConfig::default(), store, runner).unwrap();
    scheduler.start().await.unwrap();
    scheduler
        .schedule_check("m", CheckInterval::OneMinute)
        .await
        .unwrap();

    // At least five cadence boundaries pass whatever the wall-clock phase.
    tokio::time::sleep(Duration::from_secs(330)).await;
    assert_eq!(scheduler.stop().await, 0);

    let state = f.machine.tracking_state("m").await.unwrap();
    assert!(state.consecutive_failures >= 5);
    assert!(state.is_in_failure_state);
    assert_eq!(f.repo.alerts_of_type("m", AlertType::Failure).len(), 1);

    let incident = f.repo.find_active_incident("m").await.unwrap().unwrap();
    assert!(incident.root_cause.contains("503"));
    assert_eq!(incident.affected_locations, vec!["eu-west".to_string(), "us-east".to_string()]);
}
