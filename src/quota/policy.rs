//! Quota Policy
//!
//! Tunable constants for the rolling quota window, the overdraft buffer and
//! the cooldown penalty.

use chrono::Duration;
use serde::{Deserialize, Serialize};

use super::error::{QuotaError, QuotaResult};

/// Default rolling window length in days
pub const DEFAULT_WINDOW_DAYS: u32 = 30;
/// Default units granted per window
pub const DEFAULT_MAX_QUOTA: u32 = 400;
/// Default grace units above the daily cap
pub const DEFAULT_OVERDRAFT: u32 = 3;
/// Default minimum cooldown once a penalty triggers
pub const DEFAULT_BASE_COOLDOWN_HOURS: u32 = 2;
/// Default units of overreach per extra cooldown hour
pub const DEFAULT_UNITS_PER_EXTRA_HOUR: u32 = 20;

/// Longest accepted rolling window (100 years)
pub const MAX_WINDOW_DAYS: u32 = 36_500;
/// Longest accepted base cooldown (one year)
pub const MAX_BASE_COOLDOWN_HOURS: u32 = 8_760;

/// Seconds in one day, used for the trailing "today" window and days-left rounding
pub const SECONDS_PER_DAY: i64 = 86_400;

/// Quota policy for one deployment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuotaPolicy {
    /// Rolling window length in days
    pub window_days: u32,

    /// Units allowed per rolling window
    pub max_quota: u32,

    /// Grace units above the computed daily cap
    pub overdraft: u32,

    /// Minimum cooldown length in hours
    pub base_cooldown_hours: u32,

    /// One extra cooldown hour per this many units of overreach
    pub units_per_extra_hour: u32,
}

impl Default for QuotaPolicy {
    fn default() -> Self {
        Self {
            window_days: DEFAULT_WINDOW_DAYS,
            max_quota: DEFAULT_MAX_QUOTA,
            overdraft: DEFAULT_OVERDRAFT,
            base_cooldown_hours: DEFAULT_BASE_COOLDOWN_HOURS,
            units_per_extra_hour: DEFAULT_UNITS_PER_EXTRA_HOUR,
        }
    }
}

impl QuotaPolicy {
    /// Create the default policy
    pub fn new() -> Self {
        Self::default()
    }

    /// Rolling window as a duration
    pub fn window(&self) -> Duration {
        Duration::days(i64::from(self.window_days))
    }

    /// Cooldown length for a given overreach, in hours
    ///
    /// `excess` is floored at 1 so any penalty lasts longer than the base.
    pub fn cooldown_hours(&self, excess: i64) -> i64 {
        let excess = excess.max(1);
        let per_hour = i64::from(self.units_per_extra_hour.max(1));
        let extra_hours = (excess + per_hour - 1) / per_hour;
        i64::from(self.base_cooldown_hours) + extra_hours
    }

    /// Reject values that would break the cap arithmetic
    pub fn validate(&self) -> QuotaResult<()> {
        if self.window_days == 0 {
            return Err(QuotaError::InvalidPolicy(
                "window_days must be > 0".to_string(),
            ));
        }
        if self.window_days > MAX_WINDOW_DAYS {
            return Err(QuotaError::InvalidPolicy(format!(
                "window_days must be <= {}",
                MAX_WINDOW_DAYS
            )));
        }
        if self.base_cooldown_hours > MAX_BASE_COOLDOWN_HOURS {
            return Err(QuotaError::InvalidPolicy(format!(
                "base_cooldown_hours must be <= {}",
                MAX_BASE_COOLDOWN_HOURS
            )));
        }
        if self.max_quota == 0 {
            return Err(QuotaError::InvalidPolicy(
                "max_quota must be > 0".to_string(),
            ));
        }
        if self.units_per_extra_hour == 0 {
            return Err(QuotaError::InvalidPolicy(
                "units_per_extra_hour must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}
