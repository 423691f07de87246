//! Request middleware: response cache lookup, HTTPS redirect, panic
//! recovery and the legacy error policy.

use std::any::Any;

use axum::{
    extract::{Request, State},
    http::{header, StatusCode, Uri},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::debug;

use super::handlers::AppState;
use crate::error::{GatewayError, RequestFailed};
use crate::response::ResponseEnvelope;

/// Cache key of a request: its path plus query string, verbatim.
pub fn cache_key(uri: &Uri) -> &str {
    uri.path_and_query()
        .map(|path_and_query| path_and_query.as_str())
        .unwrap_or_else(|| uri.path())
}

// == Cache Lookup ==
/// Answers from the response cache when a live entry exists for the request.
pub async fn serve_from_cache(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let key = cache_key(request.uri()).to_string();
    let cached = state.cache.write().await.get(&key);

    match cached {
        Some(envelope) => {
            debug!(key = %key, "Response cache hit");
            envelope.into_response()
        }
        None => next.run(request).await,
    }
}

// == HTTPS Redirect ==
/// Sends requests that reached the proxy over plain http to https.
pub async fn redirect_http(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if !state.config.redirect_http {
        return next.run(request).await;
    }

    let forwarded_http = request
        .headers()
        .get("x-forwarded-proto")
        .and_then(|value| value.to_str().ok())
        .map_or(false, |proto| proto.eq_ignore_ascii_case("http"));
    let location = request
        .headers()
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .filter(|_| forwarded_http)
        .map(|host| format!("https://{}{}", host, cache_key(request.uri())));

    match location {
        Some(location) => (StatusCode::FOUND, [(header::LOCATION, location)]).into_response(),
        None => next.run(request).await,
    }
}

// == Legacy Error Policy ==
/// Replaces failed responses with an empty 204 when legacy mode is on.
///
/// The failure has already been logged by the error's response conversion.
pub async fn legacy_error_policy(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let response = next.run(request).await;

    if state.config.legacy_empty_errors && response.extensions().get::<RequestFailed>().is_some() {
        return ResponseEnvelope::no_content().into_response();
    }
    response
}

// == Panic Recovery ==
/// Turns a panic raised while handling a request into a logged 500.
///
/// The response goes through [`GatewayError`], so it carries the failure
/// marker and the legacy policy applies to it like any other error.
pub fn recover_from_panic(payload: Box<dyn Any + Send + 'static>) -> Response {
    let message = payload
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| payload.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic payload");

    GatewayError::Internal(format!("handler panicked: {}", message)).into_response()
}
