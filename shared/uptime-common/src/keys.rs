//! Durable-store key namespace shared by the scheduler and the alert engine.

pub const SCHEDULE_KEY_PREFIX: &str = "uptime:schedule:";
pub const SCHEDULE_KEY_PATTERN: &str = "uptime:schedule:*";

/// Pub/sub channel carrying `CheckDueV1` messages.
pub const CHECKS_DUE_CHANNEL: &str = "uptime:checks:due";
/// Pub/sub channel carrying `AlertEventV1` messages.
pub const ALERT_EVENTS_CHANNEL: &str = "uptime:alerts:events";

pub fn schedule_key(monitor_id: &str) -> String {
    format!("{}{}", SCHEDULE_KEY_PREFIX, monitor_id)
}

/// Inverse of [`schedule_key`]. Returns `None` for foreign keys and empty ids.
pub fn monitor_id_from_schedule_key(key: &str) -> Option<&str> {
    key.strip_prefix(SCHEDULE_KEY_PREFIX)
        .filter(|id| !id.is_empty())
}

pub fn alert_state_key(monitor_id: &str) -> String {
    format!("uptime:alert_state:{}", monitor_id)
}

pub fn location_failure_key(monitor_id: &str, location: &str) -> String {
    format!("uptime:location_failures:{}:{}", monitor_id, location)
}

pub fn ssl_alert_key(monitor_id: &str, alert_type: &str) -> String {
    format!("uptime:ssl_alert:{}:{}", monitor_id, alert_type)
}

/// Claimed by the first scheduler instance to fire `monitor_id` at `tick_ts`
/// (unix seconds of the aligned tick).
pub fn fire_lock_key(monitor_id: &str, tick_ts: i64) -> String {
    format!("uptime:fire_lock:{}:{}", monitor_id, tick_ts)
}
