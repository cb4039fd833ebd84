//! Quota Status Types
//!
//! Decision and status projections returned by the gate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::record::UsageRecord;

/// Traffic-light classification of today's usage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusColor {
    /// Within the daily cap
    Green,
    /// Spending the overdraft
    Yellow,
    /// Past the overdraft, or in cooldown
    Red,
}

impl StatusColor {
    /// Classify today's usage against the daily cap
    ///
    /// An active cooldown forces `Red` regardless of counts.
    pub fn classify(used_today: i64, daily_cap: i64, overdraft: i64, cooldown_active: bool) -> Self {
        if cooldown_active {
            StatusColor::Red
        } else if used_today <= daily_cap {
            StatusColor::Green
        } else if used_today <= daily_cap + overdraft {
            StatusColor::Yellow
        } else {
            StatusColor::Red
        }
    }

    /// Lowercase label
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusColor::Green => "green",
            StatusColor::Yellow => "yellow",
            StatusColor::Red => "red",
        }
    }
}

impl std::fmt::Display for StatusColor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Quota state for display
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaStatus {
    /// Units left in the rolling window (may be negative after a policy change)
    pub remaining_quota: i64,

    /// Amortized daily allowance
    pub daily_cap: i64,

    /// Status color
    pub color: StatusColor,

    /// Pending cooldown deadline
    #[serde(with = "chrono::serde::ts_seconds_option")]
    pub cooldown_until: Option<DateTime<Utc>>,

    /// Days until the oldest usage rolls off (at least 1)
    pub days_left: i64,

    /// Units used in the trailing 24 hours
    pub used_today: i64,

    /// Units left under today's cap, excluding overdraft
    pub allowed_today: i64,
}

/// Outcome of a request evaluation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    /// Units granted by this call
    pub allowed: u32,

    /// Status after this call's consumption
    pub status: QuotaStatus,

    /// Updated record the caller must persist
    pub record: UsageRecord,

    /// A stored event lies after `now`
    pub clock_skew: bool,
}

impl Decision {
    /// Whether this call set a new cooldown
    pub fn cooldown_triggered(&self, before: Option<DateTime<Utc>>) -> bool {
        self.status.cooldown_until.is_some() && self.status.cooldown_until != before
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_tiers() {
        assert_eq!(StatusColor::classify(0, 13, 3, false), StatusColor::Green);
        assert_eq!(StatusColor::classify(13, 13, 3, false), StatusColor::Green);
        assert_eq!(StatusColor::classify(14, 13, 3, false), StatusColor::Yellow);
        assert_eq!(StatusColor::classify(16, 13, 3, false), StatusColor::Yellow);
        assert_eq!(StatusColor::classify(17, 13, 3, false), StatusColor::Red);
    }

    #[test]
    fn test_classify_cooldown_forces_red() {
        assert_eq!(StatusColor::classify(0, 13, 3, true), StatusColor::Red);
    }

    #[test]
    fn test_classify_negative_cap() {
        assert_eq!(StatusColor::classify(0, -1, 3, false), StatusColor::Yellow);
        assert_eq!(StatusColor::classify(3, -1, 3, false), StatusColor::Red);
    }

    #[test]
    fn test_color_serialization() {
        assert_eq!(serde_json::to_string(&StatusColor::Yellow).unwrap(), "\"yellow\"");
        assert_eq!(StatusColor::Red.to_string(), "red");
    }
}
