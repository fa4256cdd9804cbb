//! # Submission Metrics
//!
//! Prometheus counters for the submission engine. Everything lives in a
//! dedicated registry prefixed `nova_`, so embedding applications can merge
//! it with their own without name clashes.
//!
//! The engine never requires metrics; attach them with
//! [`SubmissionEngine::with_metrics`](crate::engine::SubmissionEngine::with_metrics).

use prometheus::core::Collector;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};

use crate::error::ErrorKind;

/// Metric handles for the submission layer. Cheap to clone.
#[derive(Clone)]
pub struct SubmissionMetrics {
    registry: Registry,
    /// Calls to `submit`.
    pub submissions_total: IntCounter,
    /// Attempts started across all submissions.
    pub attempts_total: IntCounter,
    /// Backoff sleeps taken before a retry.
    pub retries_total: IntCounter,
    /// Validity windows fetched.
    pub window_fetches_total: IntCounter,
    /// Confirmations settled by a status lookup instead of the subscription.
    pub fallback_confirmations_total: IntCounter,
    /// Successful submissions.
    pub confirmed_total: IntCounter,
    /// Failed submissions, labelled by error kind.
    pub failures_total: IntCounterVec,
    /// Wall-clock time of `submit`, in seconds.
    pub submission_latency_seconds: Histogram,
}

fn register<C: Collector + Clone + 'static>(registry: &Registry, collector: C) -> C {
    registry
        .register(Box::new(collector.clone()))
        .expect("metric registration");
    collector
}

impl Default for SubmissionMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl SubmissionMetrics {
    /// Creates and registers all metrics.
    pub fn new() -> Self {
        let registry = Registry::new_custom(Some("nova".into()), None)
            .expect("failed to create prometheus registry");

        let submissions_total = register(
            &registry,
            IntCounter::new("submissions_total", "Total transaction submissions")
                .expect("metric creation"),
        );
        let attempts_total = register(
            &registry,
            IntCounter::new("submission_attempts_total", "Total submission attempts")
                .expect("metric creation"),
        );
        let retries_total = register(
            &registry,
            IntCounter::new(
                "submission_retries_total",
                "Retries taken after a retryable failure",
            )
            .expect("metric creation"),
        );
        let window_fetches_total = register(
            &registry,
            IntCounter::new("validity_window_fetches_total", "Validity windows fetched")
                .expect("metric creation"),
        );
        let fallback_confirmations_total = register(
            &registry,
            IntCounter::new(
                "fallback_confirmations_total",
                "Confirmations resolved by signature status lookup",
            )
            .expect("metric creation"),
        );
        let confirmed_total = register(
            &registry,
            IntCounter::new("submissions_confirmed_total", "Submissions that confirmed")
                .expect("metric creation"),
        );
        let failures_total = register(
            &registry,
            IntCounterVec::new(
                Opts::new("submission_failures_total", "Failed submissions by kind"),
                &["kind"],
            )
            .expect("metric creation"),
        );
        let submission_latency_seconds = register(
            &registry,
            Histogram::with_opts(
                HistogramOpts::new(
                    "submission_latency_seconds",
                    "End-to-end submission latency in seconds",
                )
                .buckets(vec![0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0]),
            )
            .expect("metric creation"),
        );

        Self {
            registry,
            submissions_total,
            attempts_total,
            retries_total,
            window_fetches_total,
            fallback_confirmations_total,
            confirmed_total,
            failures_total,
            submission_latency_seconds,
        }
    }

    /// Counts one failed submission.
    pub fn record_failure(&self, kind: ErrorKind) {
        self.failures_total.with_label_values(&[kind.as_str()]).inc();
    }

    /// Failures recorded for `kind`.
    pub fn failures(&self, kind: ErrorKind) -> u64 {
        self.failures_total.with_label_values(&[kind.as_str()]).get()
    }

    /// Renders all metrics in the Prometheus text exposition format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
