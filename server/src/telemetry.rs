use metrics::{counter, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::time::Instant;
use tracing_subscriber::EnvFilter;

pub struct Telemetry;

impl Telemetry {
    pub fn record_request(route: &str) {
        counter!("http_requests_total", "route" => route.to_string()).increment(1);
    }

    pub fn record_error(route: &str, code: &str) {
        counter!("http_errors_total", "route" => route.to_string(), "code" => code.to_string())
            .increment(1);
    }

    pub fn record_latency(route: &str, duration_ms: f64) {
        histogram!("http_request_duration_ms", "route" => route.to_string()).record(duration_ms);
    }
}

pub struct RequestTimer {
    start: Instant,
    route: &'static str
}

impl RequestTimer {
    pub fn new(route: &'static str) -> Self {
        Telemetry::record_request(route);
        Self {
            start: Instant::now(),
            route
        }
    }

    pub fn finish(self) {
        let duration = self.start.elapsed().as_millis() as f64;
        Telemetry::record_latency(self.route, duration);
    }
}

/// Installs the fmt subscriber. `RUST_LOG` wins over the configured level.
pub fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Installs the global Prometheus recorder and returns the handle that
/// renders `GET /metrics`.
pub fn init_metrics() -> anyhow::Result<PrometheusHandle> {
    Ok(PrometheusBuilder::new().install_recorder()?)
}
