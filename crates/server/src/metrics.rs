use std::time::Duration;

use prometheus::{
    CounterVec, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry,
};

/// Metrics collects and exposes HTTP server and ordering metrics.
pub(crate) struct Metrics {
    registry: Registry,
    http_requests_total: CounterVec,
    http_request_duration_seconds: HistogramVec,
    errors_total: CounterVec,
    network_traffic_bytes: CounterVec,
    orders_created_total: IntCounter,
    order_failures_total: IntCounterVec,
}

impl Metrics {
    pub(crate) fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let http_requests_total = CounterVec::new(
            Opts::new("http_requests_total", "Total number of HTTP requests"),
            &["method", "endpoint", "status"],
        )?;

        let http_request_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "http_request_duration_seconds",
                "HTTP request duration in seconds",
            ),
            &["method", "endpoint"],
        )?;

        let errors_total = CounterVec::new(
            Opts::new("errors_total", "Total number of errors"),
            &["source", "endpoint"],
        )?;

        let network_traffic_bytes = CounterVec::new(
            Opts::new("network_traffic_bytes", "Network traffic in bytes"),
            &["direction"],
        )?;

        let orders_created_total =
            IntCounter::new("orders_created_total", "Total number of orders created")?;

        let order_failures_total = IntCounterVec::new(
            Opts::new("order_failures_total", "Rejected or failed order creations"),
            &["reason"],
        )?;

        registry.register(Box::new(http_requests_total.clone()))?;
        registry.register(Box::new(http_request_duration_seconds.clone()))?;
        registry.register(Box::new(errors_total.clone()))?;
        registry.register(Box::new(network_traffic_bytes.clone()))?;
        registry.register(Box::new(orders_created_total.clone()))?;
        registry.register(Box::new(order_failures_total.clone()))?;

        Ok(Self {
            registry,
            http_requests_total,
            http_request_duration_seconds,
            errors_total,
            network_traffic_bytes,
            orders_created_total,
            order_failures_total,
        })
    }

    pub(crate) fn record_request(&self, method: &str, endpoint: &str, status: u16, duration: Duration) {
        let status = status.to_string();
        self.http_requests_total
            .with_label_values(&[method, endpoint, status.as_str()])
            .inc();
        self.http_request_duration_seconds
            .with_label_values(&[method, endpoint])
            .observe(duration.as_secs_f64());
    }

    pub(crate) fn record_error(&self, source: &str, endpoint: &str) {
        self.errors_total
            .with_label_values(&[source, endpoint])
            .inc();
    }

    pub(crate) fn record_network_traffic(&self, direction: &str, bytes: usize) {
        self.network_traffic_bytes
            .with_label_values(&[direction])
            .inc_by(bytes as f64);
    }

    pub(crate) fn record_order_created(&self) {
        self.orders_created_total.inc();
    }

    pub(crate) fn record_order_failure(&self, reason: &str) {
        self.order_failures_total.with_label_values(&[reason]).inc();
    }

    /// Prometheus text exposition of every registered metric.
    pub(crate) fn encode(&self) -> Result<String, prometheus::Error> {
        use prometheus::Encoder;
        let mut buffer = Vec::new();
        prometheus::TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_counters_are_exported() {
        let metrics = Metrics::new().unwrap();
        metrics.record_order_created();
        metrics.record_order_failure("product_not_found");
        metrics.record_request("POST", "/api/orders", 201, Duration::from_millis(3));

        let text = metrics.encode().unwrap();
        assert!(text.contains("orders_created_total 1"));
        assert!(text.contains(r#"order_failures_total{reason="product_not_found"} 1"#));
        let line = text
            .lines()
            .find(|l| l.starts_with("http_requests_total{"))
            .unwrap();
        assert!(line.contains(r#"endpoint="/api/orders""#));
        assert!(line.contains(r#"status="201""#));
    }
}
