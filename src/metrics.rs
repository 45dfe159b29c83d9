//! Metrics collection and export module

use prometheus::{Histogram, HistogramOpts, IntCounter, IntGauge, Opts, Registry};
use std::time::Instant;

/// Global metrics registry
pub struct Metrics {
    registry: Registry,

    // Counters
    pub confirmations_total: IntCounter,
    pub confirmations_success: IntCounter,
    pub confirmations_rejected: IntCounter,
    pub confirmations_timeout: IntCounter,
    pub duplicates_short_circuited: IntCounter,
    pub delegate_unavailable_total: IntCounter,
    pub non_chain_resolved: IntCounter,

    // Gauges
    pub inflight_confirmations: IntGauge,

    // Histograms
    pub confirm_latency: Histogram,
    pub verify_latency: Histogram,
    pub poll_attempts: Histogram,
}

impl Metrics {
    /// Create new metrics instance
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let confirmations_total = IntCounter::with_opts(Opts::new(
            "confirmations_total",
            "Total number of confirmation flows started",
        ))?;

        let confirmations_success = IntCounter::with_opts(Opts::new(
            "confirmations_success",
            "Confirmations that ended in a success terminal state",
        ))?;

        let confirmations_rejected = IntCounter::with_opts(Opts::new(
            "confirmations_rejected",
            "Confirmations rejected on-chain or by the verification backend",
        ))?;

        let confirmations_timeout = IntCounter::with_opts(Opts::new(
            "confirmations_timeout",
            "Confirmations that exhausted the polling budget without finalizing",
        ))?;

        let duplicates_short_circuited = IntCounter::with_opts(Opts::new(
            "duplicates_short_circuited",
            "Duplicate submissions that observed an existing flow instead of starting one",
        ))?;

        let delegate_unavailable_total = IntCounter::with_opts(Opts::new(
            "delegate_unavailable_total",
            "Verifications deferred because the backend was unavailable",
        ))?;

        let non_chain_resolved = IntCounter::with_opts(Opts::new(
            "non_chain_resolved",
            "Non-chain payment references resolved without polling",
        ))?;

        let inflight_confirmations = IntGauge::with_opts(Opts::new(
            "inflight_confirmations",
            "Confirmation flows currently in progress",
        ))?;

        let confirm_latency = Histogram::with_opts(
            HistogramOpts::new(
                "confirm_latency_seconds",
                "End-to-end confirmation latency",
            )
            .buckets(vec![0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0]),
        )?;

        let verify_latency = Histogram::with_opts(
            HistogramOpts::new(
                "verify_latency_seconds",
                "Backend verification call latency",
            )
            .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.0, 5.0, 10.0, 20.0]),
        )?;

        let poll_attempts = Histogram::with_opts(
            HistogramOpts::new(
                "poll_attempts",
                "Polling attempts needed to reach a terminal chain state",
            )
            .buckets(vec![1.0, 2.0, 3.0, 5.0, 8.0, 13.0, 21.0, 30.0]),
        )?;

        registry.register(Box::new(confirmations_total.clone()))?;
        registry.register(Box::new(confirmations_success.clone()))?;
        registry.register(Box::new(confirmations_rejected.clone()))?;
        registry.register(Box::new(confirmations_timeout.clone()))?;
        registry.register(Box::new(duplicates_short_circuited.clone()))?;
        registry.register(Box::new(delegate_unavailable_total.clone()))?;
        registry.register(Box::new(non_chain_resolved.clone()))?;
        registry.register(Box::new(inflight_confirmations.clone()))?;
        registry.register(Box::new(confirm_latency.clone()))?;
        registry.register(Box::new(verify_latency.clone()))?;
        registry.register(Box::new(poll_attempts.clone()))?;

        Ok(Self {
            registry,
            confirmations_total,
            confirmations_success,
            confirmations_rejected,
            confirmations_timeout,
            duplicates_short_circuited,
            delegate_unavailable_total,
            non_chain_resolved,
            inflight_confirmations,
            confirm_latency,
            verify_latency,
            poll_attempts,
        })
    }

    /// Get the registry for exporting
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new().expect("Failed to create metrics")
    }
}

/// Global metrics instance
pub fn metrics() -> &'static Metrics {
    static METRICS: once_cell::sync::Lazy<Metrics> =
        once_cell::sync::Lazy::new(|| Metrics::new().expect("Failed to initialize metrics"));
    &METRICS
}

/// Timer helper for measuring operation duration
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn observe_duration(&self, histogram: &Histogram) {
        histogram.observe(self.start.elapsed().as_secs_f64());
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}
