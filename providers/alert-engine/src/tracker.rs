//! Failure-tracking transitions.
//!
//! Pure functions over [`AlertTrackingState`]; the state machine owns loading,
//! persisting and side effects. Counter reset and recovery eligibility are
//! deliberately separate predicates: in `any` mode one success can leave the
//! counter running while other locations still fail.

use std::collections::BTreeSet;
use uptime_common::{AlertTrackingState, CheckResult, Monitor};

use crate::TriggerMode;

/// Configured locations of a monitor, deduplicated.
pub(crate) fn configured_locations(monitor: &Monitor) -> BTreeSet<String> {
    monitor.probe_locations.iter().cloned().collect()
}

/// Drops locations that are no longer configured, keeping the failing set a
/// subset of the monitor's locations.
pub(crate) fn prune_locations(state: &mut AlertTrackingState, locations: &BTreeSet<String>) {
    state.failing_locations.retain(|l| locations.contains(l));
    state.round_failures.retain(|l| locations.contains(l));
}

/// Applies one result to the tracking state.
pub(crate) fn apply_result(
    state: &mut AlertTrackingState,
    result: &CheckResult,
    locations: &BTreeSet<String>,
    mode: TriggerMode,
) {
    if result.success {
        state.failing_locations.remove(&result.location);
        state.round_failures.remove(&result.location);
        if counter_should_reset(state, locations, mode) {
            state.consecutive_failures = 0;
            state.round_failures.clear();
        }
        return;
    }

    state.failing_locations.insert(result.location.clone());
    state.last_failure_at = Some(result.timestamp);

    match mode {
        TriggerMode::Any => {
            state.consecutive_failures = state.consecutive_failures.saturating_add(1);
        }
        TriggerMode::All => {
            // One increment per round in which every location has failed.
            state.round_failures.insert(result.location.clone());
            if !locations.is_empty() && locations.is_subset(&state.round_failures) {
                state.consecutive_failures = state.consecutive_failures.saturating_add(1);
                state.round_failures.clear();
            }
        }
    }
}

pub(crate) fn counter_should_reset(
    state: &AlertTrackingState,
    locations: &BTreeSet<String>,
    mode: TriggerMode,
) -> bool {
    match mode {
        TriggerMode::Any => state.failing_locations.is_empty(),
        TriggerMode::All => !trigger_condition_holds(state, locations, mode),
    }
}

/// Whether the failing set currently satisfies the trigger mode.
pub(crate) fn trigger_condition_holds(
    state: &AlertTrackingState,
    locations: &BTreeSet<String>,
    mode: TriggerMode,
) -> bool {
    match mode {
        TriggerMode::Any => !state.failing_locations.is_empty(),
        TriggerMode::All => state.all_failing(locations),
    }
}

pub(crate) fn failure_alert_due(
    state: &AlertTrackingState,
    threshold: u32,
    locations: &BTreeSet<String>,
    mode: TriggerMode,
) -> bool {
    state.consecutive_failures >= threshold
        && !state.is_in_failure_state
        && trigger_condition_holds(state, locations, mode)
}

pub(crate) fn recovery_eligible(state: &AlertTrackingState, result: &CheckResult, mode: TriggerMode) -> bool {
    if !result.success || !state.is_in_failure_state {
        return false;
    }
    match mode {
        TriggerMode::Any => state.failing_locations.is_empty(),
        TriggerMode::All => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uptime_common::CheckInterval;

    fn monitor(locations: &[&str]) -> Monitor {
        Monitor::new(
            "m1",
            "https://example.com",
            CheckInterval::OneMinute,
            locations.iter().map(|l| l.to_string()).collect(),
        )
    }

    fn fail(location: &str) -> CheckResult {
        CheckResult::failure("m1", location, "connection refused")
    }

    fn ok(location: &str) -> CheckResult {
        CheckResult::success("m1", location)
    }

    #[test]
    fn test_all_mode_needs_every_location() {
        let locations = configured_locations(&monitor(&["a", "b"]));
        let mut state = AlertTrackingState::new("m1");

        apply_result(&mut state, &fail("a"), &locations, TriggerMode::All);
        assert_eq!(state.consecutive_failures, 0);
        apply_result(&mut state, &fail("a"), &locations, TriggerMode::All);
        assert_eq!(state.consecutive_failures, 0);

        apply_result(&mut state, &fail("b"), &locations, TriggerMode::All);
        assert_eq!(state.consecutive_failures, 1);
        assert!(trigger_condition_holds(&state, &locations, TriggerMode::All));
    }

    #[test]
    fn test_all_mode_advances_once_per_round() {
        let locations = configured_locations(&monitor(&["a", "b"]));
        let mut state = AlertTrackingState::new("m1");

        for cycle in 1..=3 {
            apply_result(&mut state, &fail("a"), &locations, TriggerMode::All);
            apply_result(&mut state, &fail("b"), &locations, TriggerMode::All);
            assert_eq!(state.consecutive_failures, cycle);
        }
    }

    #[test]
    fn test_all_mode_single_success_resets() {
        let locations = configured_locations(&monitor(&["a", "b"]));
        let mut state = AlertTrackingState::new("m1");
        apply_result(&mut state, &fail("a"), &locations, TriggerMode::All);
        apply_result(&mut state, &fail("b"), &locations, TriggerMode::All);

        apply_result(&mut state, &ok("a"), &locations, TriggerMode::All);
        assert_eq!(state.consecutive_failures, 0);
        assert!(state.round_failures.is_empty());
        assert_eq!(state.failing_locations.iter().collect::<Vec<_>>(), vec!["b"]);
    }

    #[test]
    fn test_any_mode_counts_every_failure() {
        let locations = configured_locations(&monitor(&["a", "b"]));
        let mut state = AlertTrackingState::new("m1");

        apply_result(&mut state, &fail("a"), &locations, TriggerMode::Any);
        apply_result(&mut state, &fail("a"), &locations, TriggerMode::Any);
        assert_eq!(state.consecutive_failures, 2);
        assert_eq!(state.failing_locations.len(), 1);
    }

    #[test]
    fn test_any_mode_reset_waits_for_empty_failing_set() {
        let locations = configured_locations(&monitor(&["a", "b"]));
        let mut state = AlertTrackingState::new("m1");
        apply_result(&mut state, &fail("a"), &locations, TriggerMode::Any);
        apply_result(&mut state, &fail("b"), &locations, TriggerMode::Any);

        apply_result(&mut state, &ok("a"), &locations, TriggerMode::Any);
        assert_eq!(state.consecutive_failures, 2);

        apply_result(&mut state, &ok("b"), &locations, TriggerMode::Any);
        assert_eq!(state.consecutive_failures, 0);
    }

    #[test]
    fn test_recovery_predicate_differs_by_mode() {
        let mut state = AlertTrackingState::new("m1");
        state.is_in_failure_state = true;
        state.failing_locations.insert("b".to_string());

        assert!(!recovery_eligible(&state, &ok("a"), TriggerMode::Any));
        assert!(recovery_eligible(&state, &ok("a"), TriggerMode::All));
        assert!(!recovery_eligible(&state, &fail("a"), TriggerMode::All));

        state.failing_locations.clear();
        assert!(recovery_eligible(&state, &ok("a"), TriggerMode::Any));
        state.is_in_failure_state = false;
        assert!(!recovery_eligible(&state, &ok("a"), TriggerMode::Any));
    }

    #[test]
    fn test_failure_alert_due() {
        let locations = configured_locations(&monitor(&["a"]));
        let mut state = AlertTrackingState::new("m1");
        state.consecutive_failures = 3;
        state.failing_locations.insert("a".to_string());

        assert!(failure_alert_due(&state, 3, &locations, TriggerMode::All));
        assert!(!failure_alert_due(&state, 4, &locations, TriggerMode::All));

        state.is_in_failure_state = true;
        assert!(!failure_alert_due(&state, 3, &locations, TriggerMode::All));
    }

    #[test]
    fn test_prune_drops_removed_locations() {
        let mut state = AlertTrackingState::new("m1");
        state.failing_locations.insert("gone".to_string());
        state.failing_locations.insert("a".to_string());
        state.round_failures.insert("gone".to_string());

        prune_locations(&mut state, &configured_locations(&monitor(&["a"])));
        assert_eq!(state.failing_locations.iter().collect::<Vec<_>>(), vec!["a"]);
        assert!(state.round_failures.is_empty());
    }
}
