//! API Routes
//!
//! Configures the Axum router with the data API, redirects and static site.

use axum::{
    http::{header, HeaderValue},
    middleware,
    routing::get,
    Router,
};
use tower_http::{
    catch_panic::CatchPanicLayer, compression::CompressionLayer, services::ServeFile,
    set_header::SetResponseHeaderLayer, trace::TraceLayer,
};

use super::handlers::{
    api_v1_redirect_handler, confirmed_report_handler, confirmed_reports_handler,
    flood_gauges_handler, floodwatch_reports_handler, infrastructure_handler,
    language_redirect_handler, smart_sensors_handler, static_or_not_found, AppState,
};
use super::middleware::{legacy_error_policy, recover_from_panic, redirect_http, serve_from_cache};

/// Creates the main router with all endpoints configured.
///
/// # Endpoints (`P` is the configured URL prefix)
/// - `GET /P/data/api/v2/...` - cached data routes
/// - `GET /P/data/api/v1/*` - permanent redirect to v2
/// - `GET /` and `GET /ROOT_REDIRECT` - language redirect
/// - `GET /robots.txt` - robots file
/// - `/P/*` - static site, anything else 404
///
/// # Middleware
/// - CORS headers on data routes
/// - Panics answered with a logged 500
/// - Optional HTTP to HTTPS redirect and gzip compression
/// - Tracing: Logs all requests for debugging
pub fn create_router(state: AppState) -> Router {
    let config = state.config.clone();
    let root_redirect = format!("/{}", config.root_redirect);

    let mut app = Router::new()
        .route("/", get(language_redirect_handler))
        .route_service("/robots.txt", ServeFile::new(&config.robots_file));

    if root_redirect != "/" {
        app = app.route(&root_redirect, get(language_redirect_handler));
    }

    if config.data_api {
        app = app.merge(data_router(state.clone()));
    }

    let mut app = app
        .fallback(static_or_not_found)
        .layer(CatchPanicLayer::custom(recover_from_panic))
        .layer(middleware::from_fn_with_state(state.clone(), redirect_http));

    if config.compression {
        app = app.layer(CompressionLayer::new());
    }

    app.layer(TraceLayer::new_for_http()).with_state(state)
}

/// Data routes, each consulting the response cache before its handler.
fn data_router(state: AppState) -> Router<AppState> {
    let data = state.config.data_prefix();
    let v2 = format!("{}/api/v2", data);

    let mut cached = Router::new()
        .route(&format!("{v2}/reports/confirmed"), get(confirmed_reports_handler))
        .route(&format!("{v2}/reports/confirmed/:id"), get(confirmed_report_handler))
        .route(&format!("{v2}/iot/smartsensors"), get(smart_sensors_handler))
        .route(&format!("{v2}/infrastructure/floodgauges"), get(flood_gauges_handler))
        .route(&format!("{v2}/infrastructure/:name"), get(infrastructure_handler));

    if state.config.floodwatch_api {
        cached = cached
            .route(&format!("{v2}/floodwatch/reports"), get(floodwatch_reports_handler))
            .route(&format!("{v2}/floodwatch/reports/"), get(floodwatch_reports_handler));
    }

    cached
        .route_layer(middleware::from_fn_with_state(state.clone(), serve_from_cache))
        .route(&format!("{data}/api/v1/*rest"), get(api_v1_redirect_handler))
        // Inside the legacy policy so recovered panics become 204 too
        .layer(CatchPanicLayer::custom(recover_from_panic))
        .layer(middleware::from_fn_with_state(state, legacy_error_policy))
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("*"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static("X-Requested-With"),
        ))
}
