use crate::ServiceInfo;
use hyper::{Method, StatusCode};
use prometheus_client::{
    encoding::EncodeLabelSet,
    metrics::{counter::Counter, family::Family, histogram::Histogram, info::Info},
    registry::{Registry, Unit},
};
use tokio::time;

#[derive(Clone, Debug)]
pub struct HttpMetrics {
    requests: Family<RouteLabels, Counter>,
    durations: Family<RouteLabels, Histogram>,
}

/// Requests are labeled by route template so that volume names do not become label values.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct RouteLabels {
    route: &'static str,
    method: &'static str,
    status: String,
}

/// Registers a constant `service_info` metric describing the running service.
pub fn register_info(reg: &mut Registry, info: &ServiceInfo) {
    reg.register(
        "service",
        "Describes the running service",
        Info::new(vec![
            ("version", info.version.clone()),
            ("mode", info.mode.clone()),
            ("service", info.service.clone()),
        ]),
    );
}

// === impl HttpMetrics ===

impl Default for HttpMetrics {
    fn default() -> Self {
        Self {
            requests: Family::default(),
            durations: Family::new_with_constructor(|| {
                Histogram::new([0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0])
            }),
        }
    }
}

impl HttpMetrics {
    pub fn register(reg: &mut Registry) -> Self {
        let metrics = Self::default();
        reg.register(
            "requests",
            "Total number of HTTP requests handled, by route template, method and status",
            metrics.requests.clone(),
        );
        reg.register_with_unit(
            "request_duration",
            "Histogram of HTTP request handling latency (seconds)",
            Unit::Seconds,
            metrics.durations.clone(),
        );
        metrics
    }

    pub(crate) fn record(
        &self,
        route: &'static str,
        method: &Method,
        status: StatusCode,
        elapsed: time::Duration,
    ) {
        let labels = RouteLabels {
            route,
            method: method_label(method),
            status: status.as_str().to_string(),
        };
        self.requests.get_or_create(&labels).inc();
        self.durations
            .get_or_create(&labels)
            .observe(elapsed.as_secs_f64());
    }
}

fn method_label(method: &Method) -> &'static str {
    match *method {
        Method::GET => "GET",
        Method::HEAD => "HEAD",
        Method::POST => "POST",
        Method::PUT => "PUT",
        Method::DELETE => "DELETE",
        Method::PATCH => "PATCH",
        Method::OPTIONS => "OPTIONS",
        _ => "other",
    }
}
