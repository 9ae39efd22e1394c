// File: src/handlers.rs
// Purpose: HTTP handlers for field validation, batch validation, stats and health

use axum::{
    body::Bytes,
    extract::{ConnectInfo, Path, Query, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
};
use chrono::Utc;
use fieldgate_core::{BatchValidationRequest, FieldValidationRequest, FieldValidationResponse, LookupCheck};
use fieldgate_runtime::{BatchVerdict, ServiceError, Verdict};
use serde_json::json;
use std::collections::HashMap;
use std::net::SocketAddr;
use tracing::debug;
use uuid::Uuid;

use crate::AppState;

const RATE_LIMITED_MESSAGE: &str = "Too many validation requests, slow down";

/// `POST /api/validate/:field`
pub async fn validate_field(
    State(state): State<AppState>,
    Path(field): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let request_id = Uuid::new_v4();
    let request = match parse_field_request(&headers, &body, &query) {
        Ok(request) => request,
        Err(message) => return error_response(StatusCode::BAD_REQUEST, &message),
    };
    let client = client_id(&headers, connect_info.map(|ConnectInfo(addr)| addr));
    debug!(%request_id, field = %field, client = %client, "validate field");

    let mut response = match state.service.validate_field(&client, &field, &request).await {
        Ok(verdict) => verdict_response(&field, verdict),
        Err(err @ ServiceError::UnknownField(_)) => error_response(StatusCode::NOT_FOUND, &err.to_string()),
    };

    if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
        response.headers_mut().insert("x-request-id", value);
    }
    response
}

/// `POST /api/validate`
pub async fn validate_batch(
    State(state): State<AppState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    Json(request): Json<BatchValidationRequest>,
) -> Response {
    let client = client_id(&headers, connect_info.map(|ConnectInfo(addr)| addr));

    match state.service.validate_batch(&client, &request).await {
        BatchVerdict::RateLimited => error_response(StatusCode::TOO_MANY_REQUESTS, RATE_LIMITED_MESSAGE),
        BatchVerdict::Completed(response) => {
            let status = if response.valid {
                StatusCode::OK
            } else {
                StatusCode::UNPROCESSABLE_ENTITY
            };
            (status, Json(response)).into_response()
        }
    }
}

/// `GET /api/validate/stats`
pub async fn stats(State(state): State<AppState>) -> Response {
    Json(state.service.metrics()).into_response()
}

/// `GET /health`
pub async fn health(State(state): State<AppState>) -> Response {
    let uptime = Utc::now().signed_duration_since(state.started_at);
    Json(json!({
        "status": "ok",
        "started_at": state.started_at.to_rfc3339(),
        "uptime_secs": uptime.num_seconds(),
        "fields": state.service.rules().len(),
    }))
    .into_response()
}

fn verdict_response(field: &str, verdict: Verdict) -> Response {
    let cache = match &verdict {
        Verdict::Cached(_) => "hit",
        _ => "miss",
    };

    let Some(errors) = verdict.into_errors() else {
        let body = json!({ "valid": false, "field": field, "error": RATE_LIMITED_MESSAGE });
        return (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
    };

    let body = FieldValidationResponse::from_errors(field, errors);
    let status = if body.valid {
        StatusCode::OK
    } else {
        StatusCode::UNPROCESSABLE_ENTITY
    };

    let mut response = (status, Json(body)).into_response();
    response
        .headers_mut()
        .insert("x-validation-cache", HeaderValue::from_static(cache));
    response
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

/// Identify the caller for rate limiting: `X-Client-ID`, then the first
/// `X-Forwarded-For` hop, then the peer address
pub fn client_id(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    if let Some(id) = header("x-client-id") {
        return id.to_string();
    }

    if let Some(hop) = header("x-forwarded-for")
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
    {
        return hop.to_string();
    }

    peer.map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "anonymous".to_string())
}

/// Build a field request from a JSON or urlencoded body plus query overrides.
///
/// In urlencoded bodies `value`, `check`, `exclude_id` and `locale` are
/// reserved; every other key becomes a related value.
pub fn parse_field_request(
    headers: &HeaderMap,
    body: &[u8],
    query: &HashMap<String, String>,
) -> Result<FieldValidationRequest, String> {
    let content_type = headers
        .get("content-type")
        .and_then(|ct| ct.to_str().ok())
        .unwrap_or("");

    let mut request = if body.is_empty() {
        FieldValidationRequest::default()
    } else if content_type.contains("application/json") {
        serde_json::from_slice::<FieldValidationRequest>(body)
            .map_err(|e| format!("Invalid JSON body: {}", e))?
    } else if content_type.contains("application/x-www-form-urlencoded") {
        let mut request = FieldValidationRequest::default();
        for (key, value) in parse_urlencoded(body) {
            match key.as_str() {
                "value" => request.value = value,
                "check" => request.check = Some(value.parse()?),
                "exclude_id" => request.exclude_id = Some(value).filter(|v| !v.is_empty()),
                "locale" => request.locale = Some(value).filter(|v| !v.is_empty()),
                _ => {
                    request.related.insert(key, value);
                }
            }
        }
        request
    } else {
        FieldValidationRequest::default()
    };

    if let Some(check) = query.get("check") {
        request.check = Some(check.parse::<LookupCheck>()?);
    }
    if let Some(id) = query.get("exclude_id").filter(|v| !v.is_empty()) {
        request.exclude_id = Some(id.clone());
    }
    if let Some(locale) = query.get("locale").filter(|v| !v.is_empty()) {
        request.locale = Some(locale.clone());
    }

    Ok(request)
}

fn parse_urlencoded(body: &[u8]) -> Vec<(String, String)> {
    let form_str = String::from_utf8_lossy(body);
    form_str
        .split('&')
        .filter_map(|pair| {
            pair.split_once('=').map(|(k, v)| {
                (
                    urlencoding::decode(&k.replace('+', " ")).unwrap_or_default().to_string(),
                    urlencoding::decode(&v.replace('+', " ")).unwrap_or_default().to_string(),
                )
            })
        })
        .collect()
}
