//! Property-Based Tests for the Quota Gate
//!
//! Invariants checked against random usage histories and request sequences:
//!
//! - **Pruning**: later pruning never resurrects an event dropped earlier
//! - **Ceiling**: window usage never exceeds `max_quota`
//! - **Cooldown**: a pending cooldown grants nothing
//! - **Overdraft**: grants stay within today's allowance plus overdraft
//! - **Escalation**: cooldown length follows the overreach exactly
//! - **Peek**: zero-unit requests change nothing
//!
//! # Running the Tests
//!
//! ```bash
//! cargo test --lib quota::proptests
//! ```

use chrono::{DateTime, Duration, Utc};
use proptest::prelude::*;

use super::gate::{prune_window, used_today, CapSnapshot, QuotaGate};
use super::policy::{QuotaPolicy, SECONDS_PER_DAY};
use super::record::{UsageEvent, UsageRecord};
use super::status::StatusColor;

const T: i64 = 1_700_000_000;
const WINDOW_SECS: i64 = 30 * SECONDS_PER_DAY;

fn ts(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap()
}

// Helper: events spread over the last 40 days, at most `max_quota` units total
fn arb_record() -> impl Strategy<Value = UsageRecord> {
    prop::collection::vec((0i64..40 * SECONDS_PER_DAY, 1u32..25), 0..30).prop_map(|raw| {
        let mut total = 0u32;
        let mut events: Vec<UsageEvent> = raw
            .into_iter()
            .filter_map(|(age, units)| {
                if total + units > 400 {
                    return None;
                }
                total += units;
                Some(UsageEvent::new(ts(T - age), units))
            })
            .collect();
        events.sort_by_key(|e| e.at);
        UsageRecord {
            events,
            cooldown_until: None,
        }
    })
}

// ============================================================================
// Property 1: Monotonic pruning
// ============================================================================

proptest! {
    #[test]
    fn prop_pruning_is_monotonic(record in arb_record(), step in 0i64..(10 * SECONDS_PER_DAY)) {
        let policy = QuotaPolicy::default();
        let first = prune_window(&record.events, ts(T), &policy);
        let second = prune_window(&record.events, ts(T + step), &policy);

        for event in &second {
            prop_assert!(first.contains(event));
        }
        for event in &first {
            prop_assert!(event.at >= ts(T - WINDOW_SECS));
        }
    }
}

// ============================================================================
// Property 2: Quota ceiling over request sequences
// ============================================================================

proptest! {
    #[test]
    fn prop_quota_ceiling_holds(
        record in arb_record(),
        requests in prop::collection::vec((0u32..80, 0i64..(6 * 3600)), 1..40)
    ) {
        let gate = QuotaGate::default();
        let mut record = record;
        let mut now = T;

        for (units, gap) in requests {
            now += gap;
            let decision = gate.evaluate_request(record, ts(now), units);
            prop_assert!(decision.record.total_units() <= 400);
            prop_assert!(decision.status.days_left >= 1);
            for event in &decision.record.events {
                prop_assert!(event.at >= ts(now - WINDOW_SECS));
            }
            record = decision.record;
        }
    }
}

// ============================================================================
// Property 3: Cooldown enforcement
// ============================================================================

proptest! {
    #[test]
    fn prop_cooldown_grants_nothing(
        record in arb_record(),
        remaining_secs in 1i64..(48 * 3600),
        units in 0u32..1000
    ) {
        let mut record = record;
        record.cooldown_until = Some(ts(T + remaining_secs));
        let before = record.clone();

        let decision = QuotaGate::default().evaluate_request(record, ts(T), units);

        prop_assert_eq!(decision.allowed, 0);
        prop_assert_eq!(decision.status.color, StatusColor::Red);
        prop_assert_eq!(decision.record.cooldown_until, before.cooldown_until);
        prop_assert_eq!(
            decision.record.events,
            prune_window(&before.events, ts(T), &QuotaPolicy::default())
        );
    }
}

// ============================================================================
// Property 4: Overdraft bound and escalation formula
// ============================================================================

proptest! {
    #[test]
    fn prop_overdraft_bound_and_escalation(record in arb_record(), units in 0u32..500) {
        let policy = QuotaPolicy::default();
        let pruned = prune_window(&record.events, ts(T), &policy);
        let snapshot = CapSnapshot::derive(&pruned, ts(T), &policy);
        let today = used_today(&pruned, ts(T));
        let allowed_today = (snapshot.daily_cap - today).max(0);
        let with_overdraft = allowed_today + i64::from(policy.overdraft);

        let decision = QuotaGate::new(policy).evaluate_request(record, ts(T), units);
        let allowed = i64::from(decision.allowed);

        prop_assert!(allowed <= with_overdraft);
        prop_assert!(allowed <= snapshot.remaining_quota.max(0));
        prop_assert!(decision.allowed <= units);

        if i64::from(units) > with_overdraft {
            let excess = i64::from(units) - with_overdraft;
            let hours = 2 + (excess + 19) / 20;
            prop_assert_eq!(
                decision.record.cooldown_until,
                Some(ts(T) + Duration::hours(hours))
            );
        }
    }
}

// ============================================================================
// Property 5: Zero-unit requests are a pure peek
// ============================================================================

proptest! {
    #[test]
    fn prop_zero_request_is_peek(record in arb_record()) {
        let gate = QuotaGate::default();
        let status = gate.current_status(&record, ts(T));
        let before_units = prune_window(&record.events, ts(T), gate.policy())
            .iter()
            .map(|e| i64::from(e.units))
            .sum::<i64>();

        let decision = gate.evaluate_request(record, ts(T), 0);

        prop_assert_eq!(decision.allowed, 0);
        prop_assert!(decision.record.cooldown_until.is_none());
        prop_assert_eq!(decision.record.total_units(), before_units);
        prop_assert_eq!(decision.status, status);
    }
}

// ============================================================================
// Property 6: Color is a function of counts alone
// ============================================================================

proptest! {
    #[test]
    fn prop_color_is_monotone(cap in -20i64..40, used in 0i64..80) {
        let color = StatusColor::classify(used, cap, 3, false);
        let next = StatusColor::classify(used + 1, cap, 3, false);
        let rank = |c: StatusColor| match c {
            StatusColor::Green => 0,
            StatusColor::Yellow => 1,
            StatusColor::Red => 2,
        };
        prop_assert!(rank(next) >= rank(color));
        prop_assert_eq!(color, StatusColor::classify(used, cap, 3, false));
    }
}
