use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use std::sync::{Arc, OnceLock};
use tracing::info;

// Declare the static OnceLock to hold the Metrics.
static METRICS_INSTANCE: OnceLock<Arc<Metrics>> = OnceLock::new();

/// Lazily initializes and gets a reference to the process-wide `Metrics`.
pub fn get_metrics() -> &'static Arc<Metrics> {
    METRICS_INSTANCE.get_or_init(|| {
        info!("Initializing Metrics ...");
        Metrics::new()
    })
}

#[derive(Clone)]
pub struct Metrics {
    pub registry: Registry,

    // Refresh metrics
    pub refresh_calls: IntCounter,
    pub refresh_failures: IntCounterVec,
    pub refresh_waiters: IntCounter,
    pub refreshing: IntGauge,

    // Request metrics
    pub requests: IntCounterVec,
    pub request_retries: IntCounter,

    // Credential slot
    pub credential_slot_failures: IntCounterVec,
}

impl Metrics {
    fn new() -> Arc<Self> {
        let registry = Registry::new_custom(Some("bearerpipeline".into()), None).unwrap();

        let metrics: Arc<Metrics> = Arc::new(Self {
            // Refresh
            refresh_calls: IntCounter::new("refresh_calls_total", "Refresh network calls issued").unwrap(),
            refresh_failures: IntCounterVec::new(Opts::new("refresh_failures_total", "Refresh failures by reason"), &["reason"]).unwrap(),
            refresh_waiters: IntCounter::new("refresh_waiters_total", "Callers joined to an in-flight refresh").unwrap(),
            refreshing: IntGauge::new("refreshing", "1 while a refresh is in flight").unwrap(),

            // Requests
            requests: IntCounterVec::new(Opts::new("requests_total", "Outbound requests by outcome"), &["outcome"]).unwrap(),
            request_retries: IntCounter::new("request_retries_total", "Requests resent after a 401").unwrap(),

            credential_slot_failures: IntCounterVec::new(Opts::new("credential_slot_failures_total", "Credential slot I/O failures"), &["op"]).unwrap(),

            registry,
        });

        // Register all metrics in the registry
        let reg = &metrics.registry;
        reg.register(Box::new(metrics.refresh_calls.clone())).unwrap();
        reg.register(Box::new(metrics.refresh_failures.clone())).unwrap();
        reg.register(Box::new(metrics.refresh_waiters.clone())).unwrap();
        reg.register(Box::new(metrics.refreshing.clone())).unwrap();
        reg.register(Box::new(metrics.requests.clone())).unwrap();
        reg.register(Box::new(metrics.request_retries.clone())).unwrap();
        reg.register(Box::new(metrics.credential_slot_failures.clone())).unwrap();

        metrics
    }

    /// Prometheus text exposition of every registered metric.
    pub fn render(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
            return format!("# failed to encode metrics: {}\n", err);
        }
        String::from_utf8_lossy(&buffer).into_owned()
    }
}
