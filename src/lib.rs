//! QuotaGate Library
//!
//! Rolling-window usage quotas for generation requests: a pure decision
//! gate, record stores, and a manager that serializes per-user updates.

pub mod config;
pub mod metrics;
pub mod quota;

pub use config::Config;
pub use quota::{
    Decision, QuotaError, QuotaGate, QuotaManager, QuotaPolicy, QuotaResult, QuotaStatus,
    StatusColor, UsageEvent, UsageRecord,
};
