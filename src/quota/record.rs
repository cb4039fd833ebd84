//! Usage Records
//!
//! Per-user usage history as persisted by the caller. Each event aggregates
//! all units granted by one call at one instant.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::{QuotaError, QuotaResult};

/// Units granted at a single instant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageEvent {
    /// When the units were granted
    #[serde(with = "chrono::serde::ts_seconds")]
    pub at: DateTime<Utc>,

    /// Number of units granted
    pub units: u32,
}

impl UsageEvent {
    /// Create a new usage event
    pub fn new(at: DateTime<Utc>, units: u32) -> Self {
        Self { at, units }
    }
}

/// A user's usage history and cooldown state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageRecord {
    /// Granted usage, ordered by time
    #[serde(default)]
    pub events: Vec<UsageEvent>,

    /// All requests are rejected until this instant
    #[serde(default, with = "chrono::serde::ts_seconds_option")]
    pub cooldown_until: Option<DateTime<Utc>>,
}

impl UsageRecord {
    /// Create an empty record for a first-time user
    pub fn new() -> Self {
        Self::default()
    }

    /// Total units across all events
    pub fn total_units(&self) -> i64 {
        self.events.iter().map(|e| i64::from(e.units)).sum()
    }

    /// Timestamp of the oldest event
    pub fn oldest(&self) -> Option<DateTime<Utc>> {
        self.events.iter().map(|e| e.at).min()
    }

    /// Timestamp of the newest event
    pub fn newest(&self) -> Option<DateTime<Utc>> {
        self.events.iter().map(|e| e.at).max()
    }

    /// Whether any event was recorded after `now` (clock went backward)
    pub fn is_ahead_of(&self, now: DateTime<Utc>) -> bool {
        self.newest().is_some_and(|newest| newest > now)
    }

    /// Whether a cooldown is still pending at `now`
    pub fn cooldown_active(&self, now: DateTime<Utc>) -> bool {
        self.cooldown_until.is_some_and(|until| until > now)
    }

    /// Check a record loaded from storage before it is trusted
    pub fn validate(&self, user_id: &str) -> QuotaResult<()> {
        if let Some(pos) = self.events.iter().position(|e| e.units == 0) {
            return Err(QuotaError::corrupt(
                user_id,
                format!("event {} has zero units", pos),
            ));
        }
        Ok(())
    }
}
