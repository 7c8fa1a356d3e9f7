//! Route handlers

use axum::{
    extract::State,
    http::{header::SET_COOKIE, HeaderMap, HeaderValue},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;

use super::AppState;
use crate::config::StorageMode;
use crate::storage::CookieJar;

/// Liveness check; never touches the backend
pub async fn health() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

/// `GET /api/stats`
pub async fn stats(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    match state.dashboard.config().storage {
        StorageMode::Cookie => {
            let jar = CookieJar::from_headers(&headers);
            let stats = state.dashboard.stats(&jar).await;
            json_with_cookies(stats, &jar)
        }
        StorageMode::Memory => {
            let stats = state.dashboard.stats(Arc::clone(&state.memory)).await;
            Json(stats).into_response()
        }
    }
}

/// `GET /api/status`
pub async fn status(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    match state.dashboard.config().storage {
        StorageMode::Cookie => {
            let jar = CookieJar::from_headers(&headers);
            let status = state.dashboard.status(&jar).await;
            json_with_cookies(status, &jar)
        }
        StorageMode::Memory => {
            let status = state.dashboard.status(Arc::clone(&state.memory)).await;
            Json(status).into_response()
        }
    }
}

/// Serializes `body` as JSON and attaches the jar's queued `Set-Cookie` headers
fn json_with_cookies<T: Serialize>(body: T, jar: &CookieJar) -> Response {
    let mut response = Json(body).into_response();
    for cookie in jar.set_cookie_headers() {
        match HeaderValue::from_str(&cookie) {
            Ok(value) => {
                response.headers_mut().append(SET_COOKIE, value);
            }
            Err(e) => tracing::warn!(error = %e, "Dropping unencodable Set-Cookie header"),
        }
    }
    response
}
