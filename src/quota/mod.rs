//! Usage Quota Module
//!
//! Gates how many generation units a user may consume over a rolling window.
//!
//! # Features
//!
//! - Rolling 30-day window with stale usage pruned on every call
//! - Amortized daily cap tied to when the oldest usage rolls off
//! - Fixed overdraft buffer above the daily cap
//! - Escalating cooldown after over-limit requests
//! - Read-only status projection for display
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Quota Manager                          │
//! │        per-user lock  →  load  →  evaluate  →  save          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────┐          │
//! │  │ Quota Gate  │  │   Policy    │  │    Clock    │          │
//! │  │   (pure)    │  │             │  │             │          │
//! │  └─────────────┘  └─────────────┘  └─────────────┘          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌─────────────────────────────────────────────────────┐    │
//! │  │          Record Store (In-Memory / JSON files)       │    │
//! │  └─────────────────────────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod clock;
pub mod error;
pub mod gate;
pub mod manager;
pub mod policy;
pub mod record;
pub mod status;
pub mod store;

#[cfg(test)]
mod proptests;

pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{QuotaError, QuotaResult};
pub use gate::{CapSnapshot, QuotaGate};
pub use manager::QuotaManager;
pub use policy::QuotaPolicy;
pub use record::{UsageEvent, UsageRecord};
pub use status::{Decision, QuotaStatus, StatusColor};
pub use store::{FileRecordStore, MemoryRecordStore, RecordStore};
