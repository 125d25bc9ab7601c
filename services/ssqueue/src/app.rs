//! HTTP application wiring.
//!
//! # Purpose
//! Builds the public API router and the service router, and defines the
//! shared state injected into handlers.
//!
//! # Notes
//! Both routers share one `Registry` handle; nothing in the process reaches
//! the registry through a global.
use crate::api;
use crate::observability::{self, LogTags};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use ssqueue_core::Registry;
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;
use tracing_opentelemetry::OpenTelemetrySpanExt;

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<Registry>,
    pub default_get_timeout: Duration,
}

#[derive(Clone)]
pub struct ServiceState {
    pub registry: Arc<Registry>,
    pub metrics: PrometheusHandle,
    pub log_tags: LogTags,
}

pub fn build_router(state: AppState) -> Router {
    let trace_layer =
        TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
            let parent = observability::trace_context_from_headers(request.headers());
            let span = tracing::info_span!(
                "http.request",
                method = %request.method(),
                uri = %request.uri(),
                version = ?request.version()
            );
            span.set_parent(parent);
            span
        });

    Router::new()
        .route(
            "/api/v1/send",
            axum::routing::post(api::messages::send_message),
        )
        .route("/api/v1/get", axum::routing::get(api::messages::get_message))
        .layer(trace_layer)
        .with_state(state)
}

pub fn build_service_router(state: ServiceState) -> Router {
    Router::new()
        .route("/liveness", axum::routing::get(api::system::liveness))
        .route("/readiness", axum::routing::get(api::system::readiness))
        .route("/metrics", axum::routing::get(api::system::metrics))
        .route(
            "/log/tag/on",
            axum::routing::get(api::system::log_tag_on).post(api::system::log_tag_on),
        )
        .route(
            "/log/tag/off",
            axum::routing::get(api::system::log_tag_off).post(api::system::log_tag_off),
        )
        .with_state(state)
}
