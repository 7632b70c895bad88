//! Per-endpoint alert cooldown.
//!
//! Every registered endpoint starts with a last-alert time at the Unix
//! epoch, so its first unhealthy observation always alerts. The owner
//! records each alert attempt, successful or not; further alerts for that
//! endpoint are suppressed until the interval has fully elapsed.

use chrono::{DateTime, TimeDelta, Utc};
use std::collections::HashMap;
use std::time::Duration;

use crate::models::Endpoint;

/// True iff strictly more than `interval` has passed since `last_alert`.
pub fn should_alert(now: DateTime<Utc>, last_alert: DateTime<Utc>, interval: TimeDelta) -> bool {
    now - last_alert > interval
}

#[derive(Debug)]
pub struct AlertThrottle {
    interval: TimeDelta,
    last_alert: HashMap<Endpoint, DateTime<Utc>>,
}

impl AlertThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval: TimeDelta::from_std(interval).unwrap_or(TimeDelta::MAX),
            last_alert: HashMap::new(),
        }
    }

    /// Adds an epoch entry for `endpoint`; existing entries are kept.
    pub fn register(&mut self, endpoint: &Endpoint) {
        self.last_alert
            .entry(endpoint.clone())
            .or_insert(DateTime::<Utc>::UNIX_EPOCH);
    }

    pub fn last_alert(&self, endpoint: &Endpoint) -> Option<DateTime<Utc>> {
        self.last_alert.get(endpoint).copied()
    }

    pub fn permits(&self, endpoint: &Endpoint, now: DateTime<Utc>) -> bool {
        let last = self.last_alert(endpoint).unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
        should_alert(now, last, self.interval)
    }

    pub fn record_alert_sent(&mut self, endpoint: &Endpoint, now: DateTime<Utc>) {
        self.last_alert.insert(endpoint.clone(), now);
    }
}
