//! API Handlers
//!
//! HTTP request handlers for the data API and the site glue routes.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{
        rejection::{PathRejection, QueryRejection},
        Path, Query, Request, State,
    },
    http::{header, HeaderMap, StatusCode, Uri},
    response::{IntoResponse, Response},
};
use serde_json::Value;
use tower::ServiceExt;
use tower_http::services::ServeDir;
use tracing::debug;

use super::middleware::cache_key;
use super::validation::validate_number_parameter;
use crate::backend::{ReportSource, TimeWindow};
use crate::cache::{CachePolicy, SharedCache};
use crate::config::Config;
use crate::error::{GatewayError, Result};
use crate::models::{AreaQuery, FormatQuery};
use crate::response::{prepare_response, OutputFormat, ResponseEnvelope};

/// Body of every unmatched request.
pub const NOT_FOUND_BODY: &str = "Error 404 - Page not found";

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Response cache keyed by request path and query
    pub cache: SharedCache,
    /// Domain data behind the API
    pub source: Arc<dyn ReportSource>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(cache: SharedCache, source: Arc<dyn ReportSource>, config: Config) -> Self {
        Self {
            cache,
            source,
            config: Arc::new(config),
        }
    }

    /// Builds the envelope for `data` and stores it under the request key.
    async fn respond(
        &self,
        uri: &Uri,
        data: Option<Value>,
        format: OutputFormat,
        policy: CachePolicy,
    ) -> ResponseEnvelope {
        let envelope = prepare_response(data.as_ref(), format);
        let key = cache_key(uri);
        let ttl = policy.ttl(self.config.cache_ttl());

        debug!(key = %key, status = envelope.status_code, ?policy, "Caching response");
        self.cache.write().await.put(key, envelope.clone(), ttl);
        envelope
    }
}

// == Data API ==

/// Handler for GET /P/data/api/v2/reports/confirmed
pub async fn confirmed_reports_handler(
    State(state): State<AppState>,
    uri: Uri,
    query: std::result::Result<Query<FormatQuery>, QueryRejection>,
) -> Result<ResponseEnvelope> {
    let Query(query) = query?;
    let window = TimeWindow::trailing(state.config.time_window);
    let data = state.source.confirmed_reports(window).await?;

    Ok(state
        .respond(&uri, data, query.output_format(), CachePolicy::Temporary)
        .await)
}

/// Handler for GET /P/data/api/v2/reports/confirmed/:id
///
/// `id` must be a positive integer.
pub async fn confirmed_report_handler(
    State(state): State<AppState>,
    uri: Uri,
    id: std::result::Result<Path<String>, PathRejection>,
    query: std::result::Result<Query<FormatQuery>, QueryRejection>,
) -> Result<ResponseEnvelope> {
    let Path(id) = id?;
    let Query(query) = query?;
    let id = validate_number_parameter(&id, 0)?;
    let data = state.source.confirmed_report(id).await?;

    Ok(state
        .respond(&uri, data, query.output_format(), CachePolicy::Temporary)
        .await)
}

/// Handler for GET /P/data/api/v2/iot/smartsensors
pub async fn smart_sensors_handler(
    State(state): State<AppState>,
    uri: Uri,
    query: std::result::Result<Query<FormatQuery>, QueryRejection>,
) -> Result<ResponseEnvelope> {
    let Query(query) = query?;
    let window = TimeWindow::trailing(state.config.floodgauge_time_window);
    let data = state.source.smart_sensors(window).await?;

    Ok(state
        .respond(&uri, data, query.output_format(), CachePolicy::Temporary)
        .await)
}

/// Handler for GET /P/data/api/v2/infrastructure/floodgauges
///
/// Gauge readings change continuously, so unlike the other infrastructure
/// layers they are windowed and cached temporarily.
pub async fn flood_gauges_handler(
    State(state): State<AppState>,
    uri: Uri,
    query: std::result::Result<Query<FormatQuery>, QueryRejection>,
) -> Result<ResponseEnvelope> {
    let Query(query) = query?;
    let table = state
        .config
        .infrastructure_table("floodgauges")
        .ok_or_else(|| GatewayError::Internal("no table configured for floodgauges".to_string()))?;
    let window = TimeWindow::trailing(state.config.floodgauge_time_window);
    let data = state.source.flood_gauges(window, table).await?;

    Ok(state
        .respond(&uri, data, query.output_format(), CachePolicy::Temporary)
        .await)
}

/// Handler for GET /P/data/api/v2/infrastructure/:name
///
/// Layers are static and cached permanently.
pub async fn infrastructure_handler(
    State(state): State<AppState>,
    uri: Uri,
    name: std::result::Result<Path<String>, PathRejection>,
    query: std::result::Result<Query<FormatQuery>, QueryRejection>,
) -> Result<ResponseEnvelope> {
    let Path(name) = name?;
    let Query(query) = query?;
    let table = state
        .config
        .infrastructure_table(&name)
        .ok_or_else(|| GatewayError::InvalidParameter(format!("unknown infrastructure type '{}'", name)))?;
    let data = state.source.infrastructure(table).await?;

    Ok(state
        .respond(&uri, data, query.output_format(), CachePolicy::Permanent)
        .await)
}

/// Handler for GET /P/data/api/v2/floodwatch/reports
pub async fn floodwatch_reports_handler(
    State(state): State<AppState>,
    uri: Uri,
    query: std::result::Result<Query<AreaQuery>, QueryRejection>,
) -> Result<ResponseEnvelope> {
    let Query(query) = query?;
    let window = TimeWindow::trailing(state.config.time_window);
    let data = state.source.reports_by_area(window, query.area()).await?;

    Ok(state
        .respond(&uri, data, query.output_format(), CachePolicy::Temporary)
        .await)
}

// == Redirects ==

/// Handler for GET /P/data/api/v1/*rest
///
/// Permanently moves the request to the same path under v2.
pub async fn api_v1_redirect_handler(State(state): State<AppState>, uri: Uri) -> Response {
    let v1_prefix = format!("{}/api/v1", state.config.data_prefix());
    let rest = uri.path().strip_prefix(&v1_prefix).unwrap_or_default();
    let mut location = format!("{}/api/v2{}", state.config.data_prefix(), rest);
    if let Some(query) = uri.query() {
        location.push('?');
        location.push_str(query);
    }

    (
        StatusCode::MOVED_PERMANENTLY,
        [
            (header::LOCATION, location),
            (header::CACHE_CONTROL, "max-age=60".to_string()),
        ],
    )
        .into_response()
}

/// Handler for GET / and GET /ROOT_REDIRECT
///
/// Sends the client to the localized site when it accepts the locale
/// language, otherwise to the default language.
pub async fn language_redirect_handler(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let accept_language = headers
        .get(header::ACCEPT_LANGUAGE)
        .and_then(|value| value.to_str().ok());
    let language = if accepts_language(accept_language, &state.config.language_locale) {
        &state.config.language_locale
    } else {
        &state.config.language_default
    };

    let location = format!("/{}/{}", state.config.root_redirect, language);
    (StatusCode::FOUND, [(header::LOCATION, location)]).into_response()
}

/// True if an `Accept-Language` header admits `language`.
///
/// A missing header admits every language; `*` and region variants such
/// as `id-ID` match, and a `q=0` weight excludes the range.
pub fn accepts_language(header: Option<&str>, language: &str) -> bool {
    let Some(header) = header else {
        return true;
    };

    header.split(',').any(|range| {
        let mut parts = range.split(';').map(str::trim);
        let tag = parts.next().unwrap_or_default();
        let excluded = parts.any(|param| {
            param
                .strip_prefix("q=")
                .and_then(|q| q.trim().parse::<f32>().ok())
                .map_or(false, |q| q <= 0.0)
        });

        let primary = tag.split('-').next().unwrap_or_default();
        !excluded && (tag == "*" || primary.eq_ignore_ascii_case(language) || tag.eq_ignore_ascii_case(language))
    })
}

// == Static Files ==

/// Fallback handler: static files under /P, 404 for everything else.
pub async fn static_or_not_found(State(state): State<AppState>, request: Request) -> Response {
    let prefix = format!("/{}", state.config.url_prefix);
    let rest = match request.uri().path().strip_prefix(&prefix) {
        Some("") => "/".to_string(),
        Some(rest) if rest.starts_with('/') => rest.to_string(),
        _ => return not_found().await.into_response(),
    };

    let target = match request.uri().query() {
        Some(query) => format!("{}?{}", rest, query),
        None => rest,
    };
    let Ok(uri) = target.parse::<Uri>() else {
        return not_found().await.into_response();
    };

    let (mut parts, body) = request.into_parts();
    parts.uri = uri;
    let request = Request::from_parts(parts, body);

    match ServeDir::new(&state.config.public_dir).oneshot(request).await {
        Ok(response) if response.status() != StatusCode::NOT_FOUND => response.map(Body::new),
        _ => not_found().await.into_response(),
    }
}

/// Handler for unmatched routes.
pub async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, NOT_FOUND_BODY)
}
