// src/metrics/collector.rs
use prometheus::{
    Encoder, Histogram, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use std::sync::Arc;
use std::time::Instant;
use anyhow::Result;

pub struct MetricsRegistry {
    registry: Registry,
    collector: Arc<MetricsCollector>,
}

impl MetricsRegistry {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();
        let collector = Arc::new(MetricsCollector::new(&registry)?);

        Ok(Self {
            registry,
            collector,
        })
    }

    pub fn collector(&self) -> Arc<MetricsCollector> {
        self.collector.clone()
    }

    pub fn gather(&self) -> Result<Vec<u8>> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(buffer)
    }
}

pub struct MetricsCollector {
    // Poller metrics
    pub fetches_total: IntCounterVec,
    pub fetch_duration_seconds: Histogram,
    pub results_discarded_total: IntCounterVec,
    pub active_pollers: IntGauge,

    // API metrics
    pub api_requests_total: IntCounterVec,
    pub api_request_duration_seconds: HistogramVec,
}

impl MetricsCollector {
    pub fn new(registry: &Registry) -> Result<Self> {
        let fetches_total = IntCounterVec::new(
            Opts::new("health_fetches_total", "Health fetches by trigger and outcome"),
            &["trigger", "outcome"],
        )?;
        registry.register(Box::new(fetches_total.clone()))?;

        let fetch_duration_seconds = Histogram::with_opts(HistogramOpts::new(
            "health_fetch_duration_seconds",
            "Health fetch duration in seconds",
        ))?;
        registry.register(Box::new(fetch_duration_seconds.clone()))?;

        let results_discarded_total = IntCounterVec::new(
            Opts::new(
                "health_results_discarded_total",
                "Fetch results dropped before reaching the poller state",
            ),
            &["reason"],
        )?;
        registry.register(Box::new(results_discarded_total.clone()))?;

        let active_pollers =
            IntGauge::new("health_active_pollers", "Number of live poller activations")?;
        registry.register(Box::new(active_pollers.clone()))?;

        let api_requests_total = IntCounterVec::new(
            Opts::new("health_api_requests_total", "Requests served by the health API"),
            &["path", "status"],
        )?;
        registry.register(Box::new(api_requests_total.clone()))?;

        let api_request_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "health_api_request_duration_seconds",
                "Health API request duration in seconds",
            ),
            &["path"],
        )?;
        registry.register(Box::new(api_request_duration_seconds.clone()))?;

        Ok(Self {
            fetches_total,
            fetch_duration_seconds,
            results_discarded_total,
            active_pollers,
            api_requests_total,
            api_request_duration_seconds,
        })
    }

    pub fn record_fetch(&self, trigger: &str, outcome: &str, duration: std::time::Duration) {
        self.fetches_total
            .with_label_values(&[trigger, outcome])
            .inc();

        self.fetch_duration_seconds.observe(duration.as_secs_f64());
    }

    pub fn record_discarded(&self, reason: &str) {
        self.results_discarded_total
            .with_label_values(&[reason])
            .inc();
    }

    pub fn poller_activated(&self) {
        self.active_pollers.inc();
    }

    pub fn poller_deactivated(&self) {
        self.active_pollers.dec();
    }

    pub fn record_api_request(&self, path: &str, status_code: u16, duration: std::time::Duration) {
        let status = status_code.to_string();
        self.api_requests_total
            .with_label_values(&[path, &status])
            .inc();

        self.api_request_duration_seconds
            .with_label_values(&[path])
            .observe(duration.as_secs_f64());
    }
}

// Helper for timing operations
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> std::time::Duration {
        self.start.elapsed()
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}
