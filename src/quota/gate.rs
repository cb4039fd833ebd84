//! Quota Gate
//!
//! Pure decision function over a user's [`UsageRecord`]: rolling-window
//! pruning, an amortized daily cap, a fixed overdraft buffer and an
//! escalating cooldown for over-limit requests.
//!
//! The gate never reads the clock and never performs I/O. Callers supply
//! `now`, persist the returned record, and serialize calls per user.

use chrono::{DateTime, Duration, Utc};

use super::policy::{QuotaPolicy, SECONDS_PER_DAY};
use super::record::{UsageEvent, UsageRecord};
use super::status::{Decision, QuotaStatus, StatusColor};

/// Keep only events inside the rolling window ending at `now`
///
/// A window reaching before the earliest representable time keeps every event.
pub fn prune_window(events: &[UsageEvent], now: DateTime<Utc>, policy: &QuotaPolicy) -> Vec<UsageEvent> {
    match now.checked_sub_signed(policy.window()) {
        Some(cutoff) => events.iter().filter(|e| e.at >= cutoff).copied().collect(),
        None => events.to_vec(),
    }
}

/// Units used in the trailing 24 hours
pub fn used_today(events: &[UsageEvent], now: DateTime<Utc>) -> i64 {
    let cutoff = now.checked_sub_signed(Duration::seconds(SECONDS_PER_DAY));
    events
        .iter()
        .filter(|e| cutoff.map_or(true, |cutoff| e.at >= cutoff))
        .map(|e| i64::from(e.units))
        .sum()
}

/// Daily-cap derivation over a pruned event list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapSnapshot {
    /// Units used in the window
    pub used: i64,

    /// `max_quota - used`, may be zero or negative
    pub remaining_quota: i64,

    /// Days until the oldest usage rolls off, in `1..=window_days`
    pub days_left: i64,

    /// `floor(remaining_quota / days_left)`
    pub daily_cap: i64,
}

impl CapSnapshot {
    /// Derive the cap from already-pruned events
    pub fn derive(events: &[UsageEvent], now: DateTime<Utc>, policy: &QuotaPolicy) -> Self {
        let used: i64 = events.iter().map(|e| i64::from(e.units)).sum();
        let remaining_quota = i64::from(policy.max_quota) - used;
        let window_days = i64::from(policy.window_days.max(1));

        let days_left = match events.iter().map(|e| e.at).min() {
            Some(oldest) if used > 0 => match oldest.checked_add_signed(policy.window()) {
                Some(rolls_off) => {
                    let secs = (rolls_off - now).num_seconds();
                    // Upper clamp only matters when the clock went backward
                    ceil_div(secs, SECONDS_PER_DAY).max(1).min(window_days)
                }
                None => window_days,
            },
            _ => window_days,
        };

        Self {
            used,
            remaining_quota,
            days_left,
            daily_cap: remaining_quota.div_euclid(days_left),
        }
    }
}

/// `now + hours`, saturating at the latest representable time
fn cooldown_deadline(now: DateTime<Utc>, hours: i64) -> DateTime<Utc> {
    Duration::try_hours(hours)
        .and_then(|delta| now.checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

fn ceil_div(value: i64, divisor: i64) -> i64 {
    -((-value).div_euclid(divisor))
}

/// Rolling-window quota gate
#[derive(Debug, Clone, Copy, Default)]
pub struct QuotaGate {
    policy: QuotaPolicy,
}

impl QuotaGate {
    /// Create a gate for the given policy
    pub fn new(policy: QuotaPolicy) -> Self {
        Self { policy }
    }

    /// Policy this gate enforces
    pub fn policy(&self) -> &QuotaPolicy {
        &self.policy
    }

    /// Decide how many of `requested_units` to grant at `now`
    ///
    /// Returns the grant, the status after consumption, and the record the
    /// caller must persist. A request of zero units never appends usage and
    /// never triggers a cooldown.
    pub fn evaluate_request(
        &self,
        record: UsageRecord,
        now: DateTime<Utc>,
        requested_units: u32,
    ) -> Decision {
        let clock_skew = record.is_ahead_of(now);
        let mut events = prune_window(&record.events, now, &self.policy);

        if record.cooldown_active(now) {
            // Pending cooldown: reject without touching usage or the deadline
            let snapshot = CapSnapshot::derive(&events, now, &self.policy);
            let status = self.project(&events, now, &snapshot, record.cooldown_until);
            return Decision {
                allowed: 0,
                status,
                record: UsageRecord {
                    events,
                    cooldown_until: record.cooldown_until,
                },
                clock_skew,
            };
        }

        let overdraft = i64::from(self.policy.overdraft);
        let snapshot = CapSnapshot::derive(&events, now, &self.policy);
        let used_today_before = used_today(&events, now);
        let allowed_today = (snapshot.daily_cap - used_today_before).max(0);
        let allowed_with_overdraft = allowed_today + overdraft;
        let requested = i64::from(requested_units);

        // Bounds the grant in both the normal and the penalty path
        let headroom = snapshot.remaining_quota.min(allowed_with_overdraft).max(0);
        let allowed = requested_units.min(u32::try_from(headroom).unwrap_or(u32::MAX));

        let over_limit = requested > allowed_with_overdraft
            || used_today_before >= snapshot.daily_cap + overdraft;
        let cooldown_until = if requested_units > 0 && over_limit {
            let hours = self.policy.cooldown_hours(requested - allowed_with_overdraft);
            Some(cooldown_deadline(now, hours))
        } else {
            None
        };

        if allowed > 0 {
            events.push(UsageEvent::new(now, allowed));
        }
        let events = prune_window(&events, now, &self.policy);

        let status = self.project(&events, now, &snapshot, cooldown_until);
        Decision {
            allowed,
            status,
            record: UsageRecord {
                events,
                cooldown_until,
            },
            clock_skew,
        }
    }

    /// Read-only status at `now`
    ///
    /// Never produces a record to persist. A lapsed cooldown is reported
    /// as absent.
    pub fn current_status(&self, record: &UsageRecord, now: DateTime<Utc>) -> QuotaStatus {
        let events = prune_window(&record.events, now, &self.policy);
        let snapshot = CapSnapshot::derive(&events, now, &self.policy);
        let cooldown_until = record.cooldown_until.filter(|until| *until > now);
        self.project(&events, now, &snapshot, cooldown_until)
    }

    /// Status over `events`, reporting the cap and days left of `snapshot`
    fn project(
        &self,
        events: &[UsageEvent],
        now: DateTime<Utc>,
        snapshot: &CapSnapshot,
        cooldown_until: Option<DateTime<Utc>>,
    ) -> QuotaStatus {
        let used: i64 = events.iter().map(|e| i64::from(e.units)).sum();
        let used_today = used_today(events, now);
        let cooldown_active = cooldown_until.is_some_and(|until| until > now);

        QuotaStatus {
            remaining_quota: i64::from(self.policy.max_quota) - used,
            daily_cap: snapshot.daily_cap,
            color: StatusColor::classify(
                used_today,
                snapshot.daily_cap,
                i64::from(self.policy.overdraft),
                cooldown_active,
            ),
            cooldown_until,
            days_left: snapshot.days_left,
            used_today,
            allowed_today: (snapshot.daily_cap - used_today).max(0),
        }
    }
}
