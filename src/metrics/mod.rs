use std::sync::Once;

use lazy_static::lazy_static;
use prometheus::Encoder;
use prometheus::IntCounter;
use prometheus::IntCounterVec;
use prometheus::Opts;
use prometheus::Registry;
use tracing::error;

lazy_static! {
    pub static ref REQUESTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("etcd_client_requests_total", "HTTP calls issued, by verb"),
        &["verb"]
    )
    .expect("metric can not be created");

    pub static ref REQUEST_ERRORS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("etcd_client_request_errors_total", "Completed calls with a non-OK status, by code"),
        &["code"]
    )
    .expect("metric can not be created");

    pub static ref LEADER_REDIRECTS: IntCounter = IntCounter::new(
        "etcd_client_leader_redirects_total",
        "Leader redirects followed"
    )
    .expect("metric can not be created");

    pub static ref WATCH_RETRIES: IntCounter = IntCounter::new(
        "etcd_client_watch_retries_total",
        "Watch long-polls retried after a transient failure"
    )
    .expect("metric can not be created");

    pub static ref WATCH_UPDATES_DELIVERED: IntCounter = IntCounter::new(
        "etcd_client_watch_updates_delivered_total",
        "Watch updates handed to user callbacks"
    )
    .expect("metric can not be created");

    pub static ref REGISTRY: Registry = Registry::new();
}

static REGISTER: Once = Once::new();

fn register_custom_metrics(registry: &Registry) {
    registry
        .register(Box::new(REQUESTS_TOTAL.clone()))
        .expect("collector can be registered");
    registry
        .register(Box::new(REQUEST_ERRORS_TOTAL.clone()))
        .expect("collector can be registered");
    registry
        .register(Box::new(LEADER_REDIRECTS.clone()))
        .expect("collector can be registered");
    registry
        .register(Box::new(WATCH_RETRIES.clone()))
        .expect("collector can be registered");
    registry
        .register(Box::new(WATCH_UPDATES_DELIVERED.clone()))
        .expect("collector can be registered");
}

/// Renders all client metrics in the Prometheus text format.
pub fn gather_text() -> String {
    REGISTER.call_once(|| register_custom_metrics(&REGISTRY));

    let encoder = prometheus::TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&REGISTRY.gather(), &mut buffer) {
        error!("could not encode client metrics: {}", e);
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_else(|e| {
        error!("client metrics could not be from_utf8'd: {}", e);
        String::new()
    })
}
