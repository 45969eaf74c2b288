//! Prometheus metrics for the request pipeline
//!
//! Provides metrics collection for:
//! - Request latency (histogram)
//! - CSRF token fetches (counter)
//! - Session refreshes (counter)
//! - Slow requests (counter)

use std::time::Duration;

use prometheus::{
    HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};

/// Request pipeline metrics, kept in a private registry so several clients can
/// coexist in one process.
pub struct RequestMetrics {
    registry: Registry,

    /// Request latency histogram
    pub request_latency: HistogramVec,

    /// CSRF token endpoint calls
    pub csrf_fetches: IntCounter,

    /// Session refresh attempts by outcome
    pub session_refreshes: IntCounterVec,

    /// Requests slower than the configured threshold
    pub slow_requests: IntCounter,
}

impl RequestMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let request_latency = HistogramVec::new(
            HistogramOpts::new(
                "shortlink_request_latency_seconds",
                "Request latency in seconds",
            ),
            &["method", "status"],
        )?;
        let csrf_fetches = IntCounter::with_opts(Opts::new(
            "shortlink_csrf_fetches_total",
            "Total number of CSRF token fetches",
        ))?;
        let session_refreshes = IntCounterVec::new(
            Opts::new(
                "shortlink_session_refreshes_total",
                "Total number of session refresh attempts",
            ),
            &["outcome"],
        )?;
        let slow_requests = IntCounter::with_opts(Opts::new(
            "shortlink_slow_requests_total",
            "Total number of slow requests",
        ))?;

        registry.register(Box::new(request_latency.clone()))?;
        registry.register(Box::new(csrf_fetches.clone()))?;
        registry.register(Box::new(session_refreshes.clone()))?;
        registry.register(Box::new(slow_requests.clone()))?;

        Ok(Self {
            registry,
            request_latency,
            csrf_fetches,
            session_refreshes,
            slow_requests,
        })
    }

    /// Record request latency; `status` is the status class ("2xx", "timeout", ...).
    pub fn record_latency(&self, method: &str, status: &str, duration: Duration) {
        self.request_latency
            .with_label_values(&[method, status])
            .observe(duration.as_secs_f64());
    }

    pub fn record_refresh(&self, success: bool) {
        let outcome = if success { "success" } else { "failure" };
        self.session_refreshes.with_label_values(&[outcome]).inc();
    }

    pub fn csrf_fetch_count(&self) -> u64 {
        self.csrf_fetches.get()
    }

    pub fn refresh_count(&self) -> u64 {
        self.session_refreshes.with_label_values(&["success"]).get()
            + self.session_refreshes.with_label_values(&["failure"]).get()
    }

    /// Get metrics in Prometheus text format
    pub fn gather(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        encoder
            .encode_to_string(&metric_families)
            .unwrap_or_default()
    }
}

/// Status class label for a response status code.
pub fn status_class(status: u16) -> &'static str {
    match status {
        100..=199 => "1xx",
        200..=299 => "2xx",
        300..=399 => "3xx",
        400..=499 => "4xx",
        _ => "5xx",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_class() {
        assert_eq!(status_class(204), "2xx");
        assert_eq!(status_class(401), "4xx");
        assert_eq!(status_class(503), "5xx");
    }

    #[test]
    fn test_independent_registries() {
        let a = RequestMetrics::new().unwrap();
        let b = RequestMetrics::new().unwrap();

        a.csrf_fetches.inc();
        a.record_refresh(true);
        a.record_refresh(false);

        assert_eq!(a.csrf_fetch_count(), 1);
        assert_eq!(a.refresh_count(), 2);
        assert_eq!(b.csrf_fetch_count(), 0);
    }

    #[test]
    fn test_gather() {
        let metrics = RequestMetrics::new().unwrap();
        metrics.record_latency("GET", "2xx", Duration::from_millis(100));
        metrics.slow_requests.inc();

        let output = metrics.gather();
        assert!(output.contains("shortlink_request_latency_seconds"));
        assert!(output.contains("shortlink_slow_requests_total 1"));
    }
}
