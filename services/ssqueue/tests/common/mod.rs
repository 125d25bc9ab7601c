#![allow(dead_code)]

use axum::body::Body;
use axum::http::Request;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use ssqueue::app::{AppState, ServiceState, build_router, build_service_router};
use ssqueue::observability::LogTags;
use ssqueue_core::Registry;
use std::sync::Arc;
use std::time::Duration;

pub type TestService = axum::routing::RouterIntoService<Body, ()>;

pub fn ready_registry() -> Arc<Registry> {
    let registry = Arc::new(Registry::new());
    registry.startup();
    registry
}

pub fn api_app(registry: &Arc<Registry>, default_get_timeout: Duration) -> TestService {
    build_router(AppState {
        registry: Arc::clone(registry),
        default_get_timeout,
    })
    .into_service()
}

pub fn service_app(registry: &Arc<Registry>, log_tags: LogTags) -> TestService {
    let metrics = PrometheusBuilder::new().build_recorder().handle();
    service_app_with_metrics(registry, log_tags, metrics)
}

pub fn service_app_with_metrics(
    registry: &Arc<Registry>,
    log_tags: LogTags,
    metrics: PrometheusHandle,
) -> TestService {
    build_service_router(ServiceState {
        registry: Arc::clone(registry),
        metrics,
        log_tags,
    })
    .into_service()
}

pub fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

pub fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("request")
}

pub async fn read_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json")
}

pub async fn read_text(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    String::from_utf8(bytes.to_vec()).expect("utf8")
}
