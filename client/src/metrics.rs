//! Prometheus metrics for the marketplace client.
//!
//! The [`ClientMetrics`] struct owns a dedicated [`Registry`]; callers can
//! render it in the Prometheus text exposition format with
//! [`ClientMetrics::encode_text`].

use prometheus::{
    register_histogram_with_registry, register_int_counter_with_registry,
    register_int_gauge_with_registry, Encoder, Histogram, HistogramOpts, IntCounter, IntGauge,
    Opts, Registry, TextEncoder,
};

/// Central collection of client-level Prometheus metrics.
pub struct ClientMetrics {
    pub registry: Registry,

    // ── Counters ────────────────────────────────────────────────────────
    /// Write actions that passed local checks and were reserved.
    pub actions_started: IntCounter,
    pub actions_settled: IntCounter,
    pub actions_failed: IntCounter,
    /// Failures caused by the confirmation timeout.
    pub actions_timed_out: IntCounter,
    /// Actions refused because one was already in flight for the same key.
    pub duplicate_submissions: IntCounter,
    /// Actions refused by validation, authentication or a precondition.
    pub local_rejections: IntCounter,
    pub fetch_failures: IntCounter,

    // ── Gauges ──────────────────────────────────────────────────────────
    pub actions_in_flight: IntGauge,

    // ── Histograms ──────────────────────────────────────────────────────
    /// Time from submission to confirmation, in milliseconds.
    pub confirmation_latency_ms: Histogram,
}

impl ClientMetrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let actions_started = register_int_counter_with_registry!(
            Opts::new("market_actions_started_total", "Write actions started"),
            registry
        )
        .expect("failed to register actions_started counter");

        let actions_settled = register_int_counter_with_registry!(
            Opts::new("market_actions_settled_total", "Write actions settled"),
            registry
        )
        .expect("failed to register actions_settled counter");

        let actions_failed = register_int_counter_with_registry!(
            Opts::new("market_actions_failed_total", "Write actions failed"),
            registry
        )
        .expect("failed to register actions_failed counter");

        let actions_timed_out = register_int_counter_with_registry!(
            Opts::new(
                "market_actions_timed_out_total",
                "Write actions whose confirmation timed out"
            ),
            registry
        )
        .expect("failed to register actions_timed_out counter");

        let duplicate_submissions = register_int_counter_with_registry!(
            Opts::new(
                "market_duplicate_submissions_total",
                "Actions refused because one was in flight for the same entity"
            ),
            registry
        )
        .expect("failed to register duplicate_submissions counter");

        let local_rejections = register_int_counter_with_registry!(
            Opts::new(
                "market_local_rejections_total",
                "Actions refused before reaching the gateway"
            ),
            registry
        )
        .expect("failed to register local_rejections counter");

        let fetch_failures = register_int_counter_with_registry!(
            Opts::new("market_fetch_failures_total", "Failed gateway reads"),
            registry
        )
        .expect("failed to register fetch_failures counter");

        let actions_in_flight = register_int_gauge_with_registry!(
            Opts::new("market_actions_in_flight", "Write actions not yet terminal"),
            registry
        )
        .expect("failed to register actions_in_flight gauge");

        // Exponential buckets covering 100 ms → ~27 min.
        let confirmation_latency_ms = register_histogram_with_registry!(
            HistogramOpts::new(
                "market_confirmation_latency_ms",
                "Submission to confirmation latency in milliseconds"
            )
            .buckets(prometheus::exponential_buckets(100.0, 2.0, 15).unwrap()),
            registry
        )
        .expect("failed to register confirmation_latency_ms histogram");

        Self {
            registry,
            actions_started,
            actions_settled,
            actions_failed,
            actions_timed_out,
            duplicate_submissions,
            local_rejections,
            fetch_failures,
            actions_in_flight,
            confirmation_latency_ms,
        }
    }

    /// Render every metric in the text exposition format.
    pub fn encode_text(&self) -> String {
        let mut buf = Vec::new();
        if let Err(e) = TextEncoder::new().encode(&self.registry.gather(), &mut buf) {
            tracing::warn!(error = %e, "failed to encode metrics");
        }
        String::from_utf8_lossy(&buf).into_owned()
    }
}

impl Default for ClientMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_are_registered() {
        let metrics = ClientMetrics::new();
        metrics.actions_started.inc();
        metrics.confirmation_latency_ms.observe(250.0);
        let text = metrics.encode_text();
        assert!(text.contains("market_actions_started_total 1"));
        assert!(text.contains("market_confirmation_latency_ms_bucket"));
    }

    #[test]
    fn separate_instances_do_not_collide() {
        let a = ClientMetrics::new();
        let b = ClientMetrics::new();
        a.actions_failed.inc();
        assert_eq!(a.actions_failed.get(), 1);
        assert_eq!(b.actions_failed.get(), 0);
    }
}
