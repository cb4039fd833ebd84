// Prometheus metrics for quota decisions
//
// - Requests by outcome (counter)
// - Units granted (counter)
// - Cooldowns triggered (counter)
// - Clock skew observations (counter)

use lazy_static::lazy_static;
use prometheus::core::Collector;
use prometheus::{Encoder, IntCounter, IntCounterVec, Registry, TextEncoder};
use std::sync::Arc;

lazy_static! {
    pub static ref REGISTRY: Arc<Registry> = Arc::new(Registry::new());

    pub static ref QUOTA_REQUESTS_TOTAL: IntCounterVec = IntCounterVec::new(
        prometheus::Opts::new("quotagate_requests_total", "Quota evaluations by outcome"),
        &["outcome"]
    ).expect("Failed to create quota requests metric");

    pub static ref QUOTA_UNITS_GRANTED_TOTAL: IntCounter = IntCounter::new(
        "quotagate_units_granted_total",
        "Total units granted across all users"
    ).expect("Failed to create units granted metric");

    pub static ref QUOTA_COOLDOWNS_TRIGGERED_TOTAL: IntCounter = IntCounter::new(
        "quotagate_cooldowns_triggered_total",
        "Total cooldown penalties imposed"
    ).expect("Failed to create cooldowns metric");

    pub static ref QUOTA_CLOCK_SKEW_TOTAL: IntCounter = IntCounter::new(
        "quotagate_clock_skew_total",
        "Evaluations where stored usage was newer than the current time"
    ).expect("Failed to create clock skew metric");
}

/// Outcome label for one evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    /// Every requested unit granted
    Granted,
    /// Some units granted
    Partial,
    /// Nothing granted, no cooldown pending beforehand
    Denied,
    /// Rejected by a pending cooldown
    Cooldown,
}

impl RequestOutcome {
    /// Classify a grant against the request
    pub fn from_grant(requested: u32, allowed: u32, in_cooldown: bool) -> Self {
        if in_cooldown {
            RequestOutcome::Cooldown
        } else if allowed == 0 && requested > 0 {
            RequestOutcome::Denied
        } else if allowed < requested {
            RequestOutcome::Partial
        } else {
            RequestOutcome::Granted
        }
    }

    /// Metric label value
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestOutcome::Granted => "granted",
            RequestOutcome::Partial => "partial",
            RequestOutcome::Denied => "denied",
            RequestOutcome::Cooldown => "cooldown",
        }
    }
}

/// Initialize metrics registry; repeated calls are harmless
pub fn init() -> prometheus::Result<()> {
    register(Box::new(QUOTA_REQUESTS_TOTAL.clone()))?;
    register(Box::new(QUOTA_UNITS_GRANTED_TOTAL.clone()))?;
    register(Box::new(QUOTA_COOLDOWNS_TRIGGERED_TOTAL.clone()))?;
    register(Box::new(QUOTA_CLOCK_SKEW_TOTAL.clone()))?;
    Ok(())
}

fn register(collector: Box<dyn Collector>) -> prometheus::Result<()> {
    match REGISTRY.register(collector) {
        Ok(()) | Err(prometheus::Error::AlreadyReg) => Ok(()),
        Err(e) => Err(e),
    }
}

/// Record one evaluation
pub fn record_decision(outcome: RequestOutcome, granted: u32, cooldown_triggered: bool) {
    QUOTA_REQUESTS_TOTAL
        .with_label_values(&[outcome.as_str()])
        .inc();
    QUOTA_UNITS_GRANTED_TOTAL.inc_by(u64::from(granted));
    if cooldown_triggered {
        QUOTA_COOLDOWNS_TRIGGERED_TOTAL.inc();
    }
}

/// Gather all metrics in Prometheus text format
pub fn gather_metrics() -> anyhow::Result<String> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| anyhow::anyhow!("Failed to encode metrics: {}", e))?;
    String::from_utf8(buffer).map_err(|e| anyhow::anyhow!("Invalid UTF-8 in metrics: {}", e))
}
