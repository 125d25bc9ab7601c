//! Service endpoints: probes, metrics, and log-tag toggles.
//!
//! # Key invariants and assumptions
//! - Probes are fast and side-effect free; readiness only reads the
//!   registry's flag.
use crate::api::error::{ApiError, api_not_ready, api_validation_error};
use crate::api::types::{HealthStatus, TagQuery};
use crate::app::ServiceState;
use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;

pub(crate) async fn liveness() -> StatusCode {
    StatusCode::OK
}

pub(crate) async fn readiness(
    State(state): State<ServiceState>,
) -> Result<Json<HealthStatus>, ApiError> {
    if !state.registry.is_ready() {
        return Err(api_not_ready());
    }
    Ok(Json(HealthStatus {
        status: "ok".to_string(),
    }))
}

pub(crate) async fn metrics(State(state): State<ServiceState>) -> String {
    state.metrics.render()
}

pub(crate) async fn log_tag_on(
    State(state): State<ServiceState>,
    Query(query): Query<TagQuery>,
) -> Result<&'static str, ApiError> {
    let tag = required_tag(&query)?;
    state.log_tags.on(tag);
    tracing::info!(tag_name = tag, "log tag enabled");
    Ok("ok")
}

pub(crate) async fn log_tag_off(
    State(state): State<ServiceState>,
    Query(query): Query<TagQuery>,
) -> Result<&'static str, ApiError> {
    let tag = required_tag(&query)?;
    state.log_tags.off(tag);
    tracing::info!(tag_name = tag, "log tag disabled");
    Ok("ok")
}

fn required_tag(query: &TagQuery) -> Result<&str, ApiError> {
    if query.tag.is_empty() {
        return Err(api_validation_error("tag is required"));
    }
    Ok(&query.tag)
}
