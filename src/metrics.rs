//! Prometheus metrics collection for pvchd.
//!
//! Metrics are exposed on the HTTP endpoint served by [`crate::http`].
//!
//! ## Lifecycle Metrics
//!
//! - `pvch_created_total` - Private channels provisioned
//! - `pvch_deleted_total{reason}` - Deletions by reason (manual, forced, expired)
//! - `pvch_notices_total` - Expiry notices posted
//! - `pvch_extensions_total` - Successful extensions
//! - `pvch_external_failures_total{operation}` - Failed platform calls
//! - `pvch_active_channels` - Records currently in the registry
//! - `pvch_sweep_duration_seconds` - Sweep tick latency

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
// Counters (monotonic increasing)
// ========================================================================

/// Total private channels created.
pub static CHANNELS_CREATED: OnceLock<IntCounter> = OnceLock::new();

/// Total private channels deleted, by reason.
pub static CHANNELS_DELETED: OnceLock<IntCounterVec> = OnceLock::new();

/// Total expiry notices posted.
pub static NOTICES_SENT: OnceLock<IntCounter> = OnceLock::new();

/// Total successful extensions.
pub static EXTENSIONS: OnceLock<IntCounter> = OnceLock::new();

/// Platform calls that failed, by operation.
pub static EXTERNAL_FAILURES: OnceLock<IntCounterVec> = OnceLock::new();

// ========================================================================
// Gauges and histograms
// ========================================================================

/// Records currently held in the registry.
pub static ACTIVE_CHANNELS: OnceLock<IntGauge> = OnceLock::new();

/// Wall time of one sweep tick.
pub static SWEEP_DURATION: OnceLock<Histogram> = OnceLock::new();

/// Initialize the Prometheus metrics registry.
///
/// Called once at startup. Helpers below are no-ops until this has run, so
/// library users and unit tests that skip it pay nothing.
pub fn init() {
    let r = registry();

    macro_rules! register {
        ($metric:ident, $init:expr) => {
            match $init {
                Ok(m) => {
                    if let Err(e) = r.register(Box::new(m.clone())) {
                        tracing::warn!(error = %e, concat!("Failed to register metric ", stringify!($metric)));
                    }
                    let _ = $metric.set(m);
                }
                Err(e) => {
                    tracing::warn!(error = %e, concat!("Failed to create metric ", stringify!($metric)));
                }
            }
        };
    }

    register!(CHANNELS_CREATED, IntCounter::new("pvch_created_total", "Private channels created"));
    register!(CHANNELS_DELETED, IntCounterVec::new(Opts::new("pvch_deleted_total", "Private channels deleted by reason"), &["reason"]));
    register!(NOTICES_SENT, IntCounter::new("pvch_notices_total", "Expiry notices posted"));
    register!(EXTENSIONS, IntCounter::new("pvch_extensions_total", "Successful extensions"));
    register!(EXTERNAL_FAILURES, IntCounterVec::new(Opts::new("pvch_external_failures_total", "Failed platform calls by operation"), &["operation"]));
    register!(ACTIVE_CHANNELS, IntGauge::new("pvch_active_channels", "Private channels in the registry"));
    register!(SWEEP_DURATION, Histogram::with_opts(
        HistogramOpts::new("pvch_sweep_duration_seconds", "Expiry sweep latency")
            .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 30.0])));
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
// Helper functions for lifecycle metric updates
// ============================================================================

#[inline]
pub fn inc_channels_created() {
    if let Some(c) = CHANNELS_CREATED.get() {
        c.inc();
    }
}

#[inline]
pub fn record_deletion(reason: &str) {
    if let Some(c) = CHANNELS_DELETED.get() {
        c.with_label_values(&[reason]).inc();
    }
}

#[inline]
pub fn inc_notices() {
    if let Some(c) = NOTICES_SENT.get() {
        c.inc();
    }
}

#[inline]
pub fn inc_extensions() {
    if let Some(c) = EXTENSIONS.get() {
        c.inc();
    }
}

/// Record a failed platform call.
#[inline]
pub fn record_external_failure(operation: &str) {
    if let Some(c) = EXTERNAL_FAILURES.get() {
        c.with_label_values(&[operation]).inc();
    }
}

#[inline]
pub fn set_active_channels(count: usize) {
    if let Some(g) = ACTIVE_CHANNELS.get() {
        g.set(count as i64);
    }
}

#[inline]
pub fn observe_sweep(duration_secs: f64) {
    if let Some(h) = SWEEP_DURATION.get() {
        h.observe(duration_secs);
    }
}
