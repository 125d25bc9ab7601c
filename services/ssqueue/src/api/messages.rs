//! Send/get message handlers.
//!
//! # Purpose
//! Translates HTTP requests into registry calls. The get handler bounds the
//! long poll by the request timeout; if the client disconnects, axum drops
//! the handler future, which cancels the pop and releases the consumer
//! registration.
use crate::api::error::{ApiError, api_queue_error, api_validation_error};
use crate::api::timeout::parse_timeout;
use crate::api::types::{GetQuery, GetResponse, SendRequest, SendResponse};
use crate::app::AppState;
use axum::Json;
use axum::body::Bytes;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

pub(crate) async fn send_message(
    State(state): State<AppState>,
    payload: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    // Parsed by hand so producers need not set a JSON content type.
    let body: SendRequest = serde_json::from_slice(&payload).map_err(|err| {
        tracing::debug!(error = %err, "rejecting send request");
        api_validation_error("bad request, invalid message")
    })?;

    let id = state
        .registry
        .send(&body.topic, body.data, body.name, body.persistent)
        .map_err(api_queue_error)?;
    Ok((StatusCode::CREATED, Json(SendResponse { id })))
}

pub(crate) async fn get_message(
    State(state): State<AppState>,
    query: Result<Query<GetQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(query) = query.map_err(|_| api_validation_error("bad request, invalid query"))?;
    let timeout = match query.timeout.as_deref().filter(|raw| !raw.is_empty()) {
        Some(raw) => {
            parse_timeout(raw).ok_or_else(|| api_validation_error("bad request, invalid timeout"))?
        }
        None => state.default_get_timeout,
    };

    let Some(item) = state
        .registry
        .get_timeout(&query.topic, timeout)
        .await
        .map_err(api_queue_error)?
    else {
        return Ok(StatusCode::NO_CONTENT.into_response());
    };

    let (id, data, from) = item.into_parts();
    let from = from.unwrap_or_default();
    tracing::info!(
        tag = "trace",
        topic = %query.topic,
        consumer = %query.name,
        producer = %from,
        "receive message"
    );
    Ok((StatusCode::OK, Json(GetResponse { id, from, data })).into_response())
}
