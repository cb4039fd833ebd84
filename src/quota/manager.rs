//! Quota Manager
//!
//! Runs the load / evaluate / persist cycle for a user under a per-user lock,
//! so concurrent requests for the same user cannot double-spend quota.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, MutexGuard as StdMutexGuard};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::clock::{Clock, SystemClock};
use super::error::QuotaResult;
use super::gate::QuotaGate;
use super::policy::QuotaPolicy;
use super::record::UsageRecord;
use super::status::{Decision, QuotaStatus};
use super::store::{validate_user_id, RecordStore};
use crate::metrics::{self, RequestOutcome};

/// Per-user quota manager
#[derive(Clone)]
pub struct QuotaManager {
    /// Pure decision function
    gate: QuotaGate,

    /// Record persistence
    store: Arc<dyn RecordStore>,

    /// Time source
    clock: Arc<dyn Clock>,

    /// One async mutex per user with a request in flight
    user_locks: UserLocks,
}

impl std::fmt::Debug for QuotaManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuotaManager")
            .field("policy", self.gate.policy())
            .finish_non_exhaustive()
    }
}

impl QuotaManager {
    /// Create a manager on the system clock
    pub fn new(policy: QuotaPolicy, store: Arc<dyn RecordStore>) -> Self {
        Self {
            gate: QuotaGate::new(policy),
            store,
            clock: Arc::new(SystemClock),
            user_locks: Arc::new(StdMutex::new(HashMap::new())),
        }
    }

    /// Replace the time source
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Policy being enforced
    pub fn policy(&self) -> &QuotaPolicy {
        self.gate.policy()
    }

    /// Evaluate a request for `units` and persist the outcome
    pub async fn request(&self, user_id: &str, units: u32) -> QuotaResult<Decision> {
        validate_user_id(user_id)?;

        let entry = UserLockEntry::acquire(&self.user_locks, user_id);
        let _guard = entry.lock.lock().await;
        self.evaluate_locked(user_id, units).await
    }

    /// Current status without writing anything back
    pub async fn status(&self, user_id: &str) -> QuotaResult<QuotaStatus> {
        let record = self.load_record(user_id).await?;
        let now = self.clock.now();

        if record.is_ahead_of(now) {
            warn!(user_id, now = %now, "Stored usage is newer than the current time");
            metrics::QUOTA_CLOCK_SKEW_TOTAL.inc();
        }

        Ok(self.gate.current_status(&record, now))
    }

    async fn evaluate_locked(&self, user_id: &str, units: u32) -> QuotaResult<Decision> {
        let record = self.load_record(user_id).await?;
        let now = self.clock.now();
        let pending_cooldown = record.cooldown_until.filter(|until| *until > now);

        let decision = self.gate.evaluate_request(record, now, units);

        if decision.clock_skew {
            warn!(user_id, now = %now, "Stored usage is newer than the current time");
            metrics::QUOTA_CLOCK_SKEW_TOTAL.inc();
        }

        self.store.save(user_id, &decision.record).await?;

        let triggered = decision.cooldown_triggered(pending_cooldown);
        let outcome = RequestOutcome::from_grant(units, decision.allowed, pending_cooldown.is_some());
        metrics::record_decision(outcome, decision.allowed, triggered);

        if triggered {
            warn!(
                user_id,
                requested = units,
                allowed = decision.allowed,
                cooldown_until = ?decision.status.cooldown_until,
                "Quota overreach, cooldown imposed"
            );
        } else {
            info!(
                user_id,
                requested = units,
                allowed = decision.allowed,
                outcome = outcome.as_str(),
                color = %decision.status.color,
                "Quota request evaluated"
            );
        }

        Ok(decision)
    }

    async fn load_record(&self, user_id: &str) -> QuotaResult<UsageRecord> {
        let record = match self.store.load(user_id).await? {
            Some(record) => record,
            None => {
                debug!(user_id, "No usage record yet, starting empty");
                UsageRecord::new()
            }
        };
        record.validate(user_id)?;
        Ok(record)
    }

    /// Number of users with a lock entry
    pub fn active_user_locks(&self) -> usize {
        lock_map(&self.user_locks).len()
    }
}

type UserLocks = Arc<StdMutex<HashMap<String, Arc<Mutex<()>>>>>;

/// The map is never left mid-update, so a poisoned lock is still usable
fn lock_map(locks: &UserLocks) -> StdMutexGuard<'_, HashMap<String, Arc<Mutex<()>>>> {
    locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Handle on a user's lock entry; drops the entry once nobody else holds it
struct UserLockEntry<'a> {
    locks: &'a UserLocks,
    user_id: String,
    lock: Arc<Mutex<()>>,
}

impl<'a> UserLockEntry<'a> {
    fn acquire(locks: &'a UserLocks, user_id: &str) -> Self {
        let lock = lock_map(locks)
            .entry(user_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        Self {
            locks,
            user_id: user_id.to_string(),
            lock,
        }
    }
}

impl Drop for UserLockEntry<'_> {
    fn drop(&mut self) {
        let mut locks = lock_map(self.locks);
        // Map entry plus this handle: nobody else is waiting
        if Arc::strong_count(&self.lock) == 2 {
            locks.remove(&self.user_id);
        }
    }
}
