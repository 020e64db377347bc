//! Lock-free per-label-tuple counters and the Prometheus/debug exposition
//! surfaces (specification §5 "metrics counters: lock-free atomic counters,
//! one per label tuple", §6 `:9090` and `/_debug/metrics`).

use std::time::Instant;

use prometheus::{IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use serde::Serialize;
use tracing::warn;

/// Owns the Prometheus registry and every counter this process exposes.
/// Constructed once at startup and shared (via `Arc`) with both proxy cores.
pub struct Metrics {
    started_at: Instant,
    registry: Registry,
    requests_total: IntCounterVec,
    errors_total: IntCounterVec,
    bandwidth_bytes_total: IntCounterVec,
    active_connections: IntGauge,
}

impl Metrics {
    pub fn new() -> Metrics {
        let registry = Registry::new();

        let requests_total = IntCounterVec::new(
            Opts::new("requests_total", "Requests handled, by body and protocol"),
            &["body", "protocol"],
        )
        .expect("static metric descriptor is valid");
        let errors_total = IntCounterVec::new(
            Opts::new("errors_total", "Errors surfaced, by kind and body"),
            &["kind", "body"],
        )
        .expect("static metric descriptor is valid");
        let bandwidth_bytes_total = IntCounterVec::new(
            Opts::new("bandwidth_bytes_total", "Bytes transferred, by body and direction"),
            &["body", "direction"],
        )
        .expect("static metric descriptor is valid");
        let active_connections = IntGauge::new(
            "active_connections",
            "Connections currently being handled concurrently",
        )
        .expect("static metric descriptor is valid");

        for collector in [
            Box::new(requests_total.clone()) as Box<dyn prometheus::core::Collector>,
            Box::new(errors_total.clone()),
            Box::new(bandwidth_bytes_total.clone()),
            Box::new(active_connections.clone()),
        ] {
            if let Err(err) = registry.register(collector) {
                warn!(%err, "failed to register metrics collector");
            }
        }

        Metrics {
            started_at: Instant::now(),
            registry,
            requests_total,
            errors_total,
            bandwidth_bytes_total,
            active_connections,
        }
    }

    pub fn record_request(&self, body: &str, protocol: &str) {
        self.requests_total.with_label_values(&[body, protocol]).inc();
    }

    pub fn record_error(&self, kind: &str, body: &str) {
        self.errors_total.with_label_values(&[kind, body]).inc();
    }

    pub fn record_bytes(&self, body: &str, direction: &str, count: u64) {
        self.bandwidth_bytes_total
            .with_label_values(&[body, direction])
            .inc_by(count);
    }

    pub fn connection_opened(&self) {
        self.active_connections.inc();
    }

    pub fn connection_closed(&self) {
        self.active_connections.dec();
    }

    pub fn uptime_seconds(&self) -> f64 {
        self.started_at.elapsed().as_secs_f64()
    }

    /// Prometheus text exposition for the `:9090 GET /metrics` listener.
    pub fn render_prometheus(&self) -> String {
        let encoder = TextEncoder::new();
        let families = self.registry.gather();
        encoder.encode_to_string(&families).unwrap_or_default()
    }

    /// JSON shape for `GET /_debug/metrics` (specification §6).
    pub fn debug_json(&self) -> DebugMetrics {
        let mut requests_by_body: Vec<BodyCount> = Vec::new();
        let mut bandwidth_by_body: Vec<BodyCount> = Vec::new();

        for family in self.registry.gather() {
            let pairs = family
                .get_metric()
                .iter()
                .map(|m| {
                    let body = m
                        .get_label()
                        .iter()
                        .find(|l| l.get_name() == "body")
                        .map(|l| l.get_value().to_string())
                        .unwrap_or_else(|| "unknown".to_string());
                    (body, m.get_counter().get_value() as u64)
                });

            match family.get_name() {
                "requests_total" => {
                    for (body, value) in pairs {
                        merge_count(&mut requests_by_body, body, value);
                    }
                }
                "bandwidth_bytes_total" => {
                    for (body, value) in pairs {
                        merge_count(&mut bandwidth_by_body, body, value);
                    }
                }
                _ => {}
            }
        }

        DebugMetrics {
            uptime_s: self.uptime_seconds(),
            active_connections: self.active_connections.get(),
            requests_total: requests_by_body,
            bandwidth_bytes_total: bandwidth_by_body,
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Metrics::new()
    }
}

fn merge_count(entries: &mut Vec<BodyCount>, body: String, value: u64) {
    if let Some(existing) = entries.iter_mut().find(|e| e.body == body) {
        existing.count += value;
    } else {
        entries.push(BodyCount { body, count: value });
    }
}

#[derive(Debug, Serialize)]
pub struct BodyCount {
    pub body: String,
    pub count: u64,
}

/// `GET /_debug/metrics` response body (specification §6). `active_connections`
/// stands in for the spec's "goroutine-equivalent count" in a Rust runtime
/// where tasks, not goroutines, are the unit of concurrency.
#[derive(Debug, Serialize)]
pub struct DebugMetrics {
    pub uptime_s: f64,
    pub active_connections: i64,
    pub requests_total: Vec<BodyCount>,
    pub bandwidth_bytes_total: Vec<BodyCount>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_and_reports_requests_per_body() {
        let metrics = Metrics::new();
        metrics.record_request("mars", "http");
        metrics.record_request("mars", "http");
        metrics.record_request("europa", "socks");

        let json = metrics.debug_json();
        let mars = json.requests_total.iter().find(|e| e.body == "mars").unwrap();
        assert_eq!(mars.count, 2);
    }

    #[test]
    fn prometheus_text_contains_metric_names() {
        let metrics = Metrics::new();
        metrics.record_request("mars", "http");
        let text = metrics.render_prometheus();
        assert!(text.contains("requests_total"));
    }

    #[test]
    fn active_connections_tracks_open_and_close() {
        let metrics = Metrics::new();
        metrics.connection_opened();
        metrics.connection_opened();
        metrics.connection_closed();
        assert_eq!(metrics.debug_json().active_connections, 1);
    }
}
