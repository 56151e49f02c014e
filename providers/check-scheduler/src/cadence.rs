//! Wall-clock aligned fire times.

use chrono::{DateTime, Utc};
use cron::Schedule;
use std::str::FromStr;
use uptime_common::CheckInterval;

use crate::{Result, SchedulerError};

/// First cadence boundary strictly after `after`.
pub fn next_fire_after(interval: CheckInterval, after: DateTime<Utc>) -> Result<DateTime<Utc>> {
    let expr = interval.cron_expression();
    let schedule = Schedule::from_str(expr)
        .map_err(|e| SchedulerError::InvalidSchedule(format!("invalid cron '{}': {}", expr, e)))?;
    schedule
        .after(&after)
        .next()
        .ok_or_else(|| SchedulerError::InvalidSchedule(format!("no upcoming tick for cron '{}'", expr)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, h, m, s).unwrap()
    }

    #[test]
    fn test_five_minute_boundaries() {
        let next = next_fire_after(CheckInterval::FiveMinutes, at(12, 3, 10)).unwrap();
        assert_eq!(next, at(12, 5, 0));

        // Exactly on a boundary moves to the next one.
        let next = next_fire_after(CheckInterval::FiveMinutes, at(12, 5, 0)).unwrap();
        assert_eq!(next, at(12, 10, 0));
    }

    #[test]
    fn test_one_minute_boundaries() {
        let next = next_fire_after(CheckInterval::OneMinute, at(23, 59, 30)).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2024, 5, 2, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_every_supported_interval_parses() {
        for interval in CheckInterval::ALL {
            let now = Utc::now();
            let next = next_fire_after(interval, now).unwrap();
            assert!(next > now);
            assert!(next - now <= chrono::Duration::seconds(interval.as_secs() as i64));
        }
    }
}
