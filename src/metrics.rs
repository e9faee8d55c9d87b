//! Prometheus metrics collection for rangehubd.
//!
//! Tracks authentication outcomes, signature verification results, live
//! connection counts, and broadcast fan-out. Auth failures are labelled with
//! the internal error code - this is the only place the specific rejection
//! reason leaves the process, and it is never correlated with a response.

use prometheus::{
    Encoder, Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge,
    IntGaugeVec, Opts, Registry, TextEncoder,
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

/// Total bearer tokens issued.
pub static TOKENS_ISSUED: OnceLock<IntCounter> = OnceLock::new();

/// Guard rejections by internal error code.
pub static AUTH_FAILURES: OnceLock<IntCounterVec> = OnceLock::new();

/// Site signature verifications by outcome.
pub static SIGNATURE_CHECKS: OnceLock<IntCounterVec> = OnceLock::new();

/// Events broadcast by topic.
pub static EVENTS_BROADCAST: OnceLock<IntCounterVec> = OnceLock::new();

// ========================================================================
// Gauges (can increase/decrease)
// ========================================================================

/// Currently connected realtime viewers.
pub static LIVE_CONNECTIONS: OnceLock<IntGauge> = OnceLock::new();

/// Members per event channel.
pub static CHANNEL_MEMBERS: OnceLock<IntGaugeVec> = OnceLock::new();

// ========================================================================
// Histograms
// ========================================================================

/// Recipients per broadcast event.
pub static EVENT_FANOUT: OnceLock<Histogram> = OnceLock::new();

/// Request handling latency by route.
pub static REQUEST_LATENCY: OnceLock<HistogramVec> = OnceLock::new();

/// Initialize the Prometheus metrics registry.
///
/// Must be called once at startup before any metrics are recorded.
pub fn init() {
    let r = registry();

    // Helper macro to register metric
    macro_rules! register {
        ($metric:ident, $init:expr) => {
            let m = $init.expect(concat!(stringify!($metric), " creation failed"));
            if let Err(e) = r.register(Box::new(m.clone())) {
                tracing::warn!(error = %e, concat!("Failed to register metric ", stringify!($metric)));
            }
            let _ = $metric.set(m);
        };
    }

    register!(TOKENS_ISSUED, IntCounter::new("hub_tokens_issued_total", "Bearer tokens issued"));
    register!(AUTH_FAILURES, IntCounterVec::new(Opts::new("hub_auth_failures_total", "Guard rejections by internal error code"), &["reason"]));
    register!(SIGNATURE_CHECKS, IntCounterVec::new(Opts::new("hub_signature_checks_total", "Site signature verifications by outcome"), &["outcome"]));
    register!(EVENTS_BROADCAST, IntCounterVec::new(Opts::new("hub_events_broadcast_total", "Events broadcast by topic"), &["topic"]));
    register!(LIVE_CONNECTIONS, IntGauge::new("hub_live_connections", "Currently connected realtime viewers"));
    register!(CHANNEL_MEMBERS, IntGaugeVec::new(Opts::new("hub_channel_members", "Members per event channel"), &["channel"]));
    register!(EVENT_FANOUT, Histogram::with_opts(
        HistogramOpts::new("hub_event_fanout", "Recipients per broadcast event")
            .buckets(vec![1.0, 2.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0])));
    register!(REQUEST_LATENCY, HistogramVec::new(
        HistogramOpts::new("hub_request_duration_seconds", "Request handling latency by route")
            .buckets(vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0]),
        &["route"]));
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
// Helper functions for metric updates
// ============================================================================

/// Record an issued bearer token.
#[inline]
pub fn record_token_issued() {
    if let Some(c) = TOKENS_ISSUED.get() {
        c.inc();
    }
}

/// Record a guard rejection by internal error code.
#[inline]
pub fn record_auth_failure(reason: &str) {
    if let Some(c) = AUTH_FAILURES.get() {
        c.with_label_values(&[reason]).inc();
    }
}

/// Record a site signature verification outcome.
#[inline]
pub fn record_signature_check(accepted: bool) {
    if let Some(c) = SIGNATURE_CHECKS.get() {
        let outcome = if accepted { "accepted" } else { "rejected" };
        c.with_label_values(&[outcome]).inc();
    }
}

/// Record one broadcast with its fan-out.
#[inline]
pub fn record_broadcast(topic: &str, recipients: usize) {
    if let Some(c) = EVENTS_BROADCAST.get() {
        c.with_label_values(&[topic]).inc();
    }
    if let Some(h) = EVENT_FANOUT.get() {
        h.observe(recipients as f64);
    }
}

/// Track a realtime connection joining a channel.
#[inline]
pub fn connection_opened(channel: &str) {
    if let Some(g) = LIVE_CONNECTIONS.get() {
        g.inc();
    }
    if let Some(g) = CHANNEL_MEMBERS.get() {
        g.with_label_values(&[channel]).inc();
    }
}

/// Track a realtime connection leaving a channel.
#[inline]
pub fn connection_closed(channel: &str) {
    if let Some(g) = LIVE_CONNECTIONS.get() {
        g.dec();
    }
    if let Some(g) = CHANNEL_MEMBERS.get() {
        g.with_label_values(&[channel]).dec();
    }
}

/// Record a handled request with latency.
#[inline]
pub fn record_request(route: &str, duration_secs: f64) {
    if let Some(h) = REQUEST_LATENCY.get() {
        h.with_label_values(&[route]).observe(duration_secs);
    }
}
