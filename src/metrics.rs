//! Prometheus metrics for the help-channel pool.
//!
//! The pool only pushes counters and gauges; aggregation and querying happen
//! in the external collector. Category sizes, claim volume, session outcomes
//! and durations are enough to alert on a degraded pool.

use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use std::sync::OnceLock;

/// Global Prometheus registry for all metrics.
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

pub fn registry() -> &'static Registry {
    REGISTRY.get_or_init(Registry::new)
}

// ========================================================================
// Gauges (category sizes)
// ========================================================================

/// Channels currently in the Available category.
pub static AVAILABLE_CHANNELS: OnceLock<IntGauge> = OnceLock::new();

/// Channels currently in the In-Use category.
pub static IN_USE_CHANNELS: OnceLock<IntGauge> = OnceLock::new();

/// Channels currently in the Dormant category.
pub static DORMANT_CHANNELS: OnceLock<IntGauge> = OnceLock::new();

// ========================================================================
// Counters
// ========================================================================

/// Total channel claims.
pub static CLAIMS_TOTAL: OnceLock<IntCounter> = OnceLock::new();

/// Sessions closed, by close reason and whether the question was answered.
pub static SESSIONS_CLOSED: OnceLock<IntCounterVec> = OnceLock::new();

/// Missing-claimant recoveries (history scan, bot fallback).
pub static CLAIMANT_RECOVERIES: OnceLock<IntCounter> = OnceLock::new();

/// Times the name pool was exhausted while replenishing.
pub static NAMES_EXHAUSTED: OnceLock<IntCounter> = OnceLock::new();

/// Staff notifications actually sent (rate-limited drops excluded).
pub static STAFF_NOTIFICATIONS: OnceLock<IntCounter> = OnceLock::new();

// ========================================================================
// Histograms
// ========================================================================

/// In-use duration of a help session, in seconds.
pub static SESSION_DURATION: OnceLock<Histogram> = OnceLock::new();

/// Initialize the Prometheus metrics registry.
///
/// Must be called once at startup before any metrics are recorded. Recording
/// before init is a silent no-op, which keeps unit tests decoupled.
pub fn init() {
    let r = registry();

    macro_rules! register {
        ($metric:ident, $init:expr) => {
            let m = $init.expect(concat!(stringify!($metric), " creation failed"));
            if let Err(e) = r.register(Box::new(m.clone())) {
                tracing::warn!(error = %e, concat!("Failed to register metric ", stringify!($metric)));
            }
            let _ = $metric.set(m);
        };
    }

    register!(AVAILABLE_CHANNELS, IntGauge::new("helppool_available_channels", "Channels in the Available category"));
    register!(IN_USE_CHANNELS, IntGauge::new("helppool_in_use_channels", "Channels in the In-Use category"));
    register!(DORMANT_CHANNELS, IntGauge::new("helppool_dormant_channels", "Channels in the Dormant category"));
    register!(CLAIMS_TOTAL, IntCounter::new("helppool_claims_total", "Total channel claims"));
    register!(SESSIONS_CLOSED, IntCounterVec::new(
        Opts::new("helppool_sessions_closed_total", "Help sessions closed"),
        &["closed_on", "answered"]));
    register!(CLAIMANT_RECOVERIES, IntCounter::new("helppool_claimant_recoveries_total", "Missing-claimant recovery scans"));
    register!(NAMES_EXHAUSTED, IntCounter::new("helppool_names_exhausted_total", "Name pool exhaustion events"));
    register!(STAFF_NOTIFICATIONS, IntCounter::new("helppool_staff_notifications_total", "Staff notifications sent"));
    register!(SESSION_DURATION, Histogram::with_opts(
        HistogramOpts::new("helppool_session_duration_seconds", "In-use duration of help sessions")
            .buckets(vec![60.0, 300.0, 900.0, 1800.0, 3600.0, 7200.0, 14400.0, 43200.0, 86400.0])));
}

/// Gather all metrics and encode them in Prometheus text format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = registry().gather();
    let mut buffer = vec![];
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode Prometheus metrics");
        return String::new();
    }
    match String::from_utf8(buffer) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "Prometheus metrics were not valid UTF-8");
            String::new()
        }
    }
}

// ============================================================================
// Helper functions for pool metric updates
// ============================================================================

/// Set the three category-size gauges from absolute counts.
#[inline]
pub fn set_category_sizes(available: i64, in_use: i64, dormant: i64) {
    if let Some(g) = AVAILABLE_CHANNELS.get() {
        g.set(available);
    }
    if let Some(g) = IN_USE_CHANNELS.get() {
        g.set(in_use);
    }
    if let Some(g) = DORMANT_CHANNELS.get() {
        g.set(dormant);
    }
}

/// Record a claim (Available -> In-Use).
#[inline]
pub fn record_claim() {
    if let Some(c) = CLAIMS_TOTAL.get() {
        c.inc();
    }
    if let Some(g) = AVAILABLE_CHANNELS.get() {
        g.dec();
    }
    if let Some(g) = IN_USE_CHANNELS.get() {
        g.inc();
    }
}

/// Record a session close (In-Use -> Dormant).
#[inline]
pub fn record_session_closed(closed_on: &str, answered: bool, duration_secs: f64) {
    if let Some(c) = SESSIONS_CLOSED.get() {
        c.with_label_values(&[closed_on, if answered { "yes" } else { "no" }])
            .inc();
    }
    if let Some(h) = SESSION_DURATION.get() {
        h.observe(duration_secs);
    }
    if let Some(g) = IN_USE_CHANNELS.get() {
        g.dec();
    }
    if let Some(g) = DORMANT_CHANNELS.get() {
        g.inc();
    }
}

/// Record a replenishment (Dormant -> Available).
#[inline]
pub fn record_made_available() {
    if let Some(g) = DORMANT_CHANNELS.get() {
        g.dec();
    }
    if let Some(g) = AVAILABLE_CHANNELS.get() {
        g.inc();
    }
}

/// Record a missing-claimant recovery.
#[inline]
pub fn record_recovery() {
    if let Some(c) = CLAIMANT_RECOVERIES.get() {
        c.inc();
    }
}

/// Record a name pool exhaustion event.
#[inline]
pub fn record_names_exhausted() {
    if let Some(c) = NAMES_EXHAUSTED.get() {
        c.inc();
    }
}

/// Record a staff notification that was actually delivered.
#[inline]
pub fn record_staff_notification() {
    if let Some(c) = STAFF_NOTIFICATIONS.get() {
        c.inc();
    }
}
