//! Integration Tests for API Endpoints
//!
//! Tests the full request/response cycle through the router, with a scripted
//! report source standing in for the database.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, Response, StatusCode},
    Router,
};
use disaster_gateway::{
    api::{create_router, NOT_FOUND_BODY},
    backend::{BackendError, ReportSource, TimeWindow},
    cache, AppState, Config,
};
use serde_json::{json, Value};
use tower::ServiceExt;

// == Scripted Source ==

#[derive(Clone)]
enum Reply {
    Data(Value),
    Empty,
    Down,
    Broken,
    Crash,
}

/// Answers every dataset with the current reply and records its arguments.
struct ScriptedSource {
    reply: Mutex<Reply>,
    calls: AtomicU32,
    seen: Mutex<Vec<String>>,
}

impl ScriptedSource {
    fn new(reply: Reply) -> Arc<Self> {
        Arc::new(Self {
            reply: Mutex::new(reply),
            calls: AtomicU32::new(0),
            seen: Mutex::new(Vec::new()),
        })
    }

    fn set_reply(&self, reply: Reply) {
        *self.reply.lock().unwrap() = reply;
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }

    fn answer(&self, argument: String) -> Result<Option<Value>, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(argument);

        let reply = self.reply.lock().unwrap().clone();
        match reply {
            Reply::Data(value) => Ok(Some(value)),
            Reply::Empty => Ok(None),
            Reply::Down => Err(BackendError::Connection("connection refused".into())),
            Reply::Broken => Err(BackendError::Query("relation does not exist".into())),
            Reply::Crash => panic!("row decoder hit an unexpected geometry"),
        }
    }
}

#[async_trait]
impl ReportSource for ScriptedSource {
    async fn confirmed_reports(&self, _: TimeWindow) -> Result<Option<Value>, BackendError> {
        self.answer("reports".into())
    }

    async fn confirmed_report(&self, id: i64) -> Result<Option<Value>, BackendError> {
        self.answer(format!("report:{}", id))
    }

    async fn smart_sensors(&self, _: TimeWindow) -> Result<Option<Value>, BackendError> {
        self.answer("sensors".into())
    }

    async fn flood_gauges(&self, _: TimeWindow, table: &str) -> Result<Option<Value>, BackendError> {
        self.answer(format!("gauges:{}", table))
    }

    async fn infrastructure(&self, table: &str) -> Result<Option<Value>, BackendError> {
        self.answer(format!("infrastructure:{}", table))
    }

    async fn reports_by_area(
        &self,
        _: TimeWindow,
        area_name: Option<&str>,
    ) -> Result<Option<Value>, BackendError> {
        self.answer(format!("area:{}", area_name.unwrap_or("*")))
    }
}

// == Helper Functions ==

fn sample_collection() -> Value {
    json!({
        "type": "FeatureCollection",
        "features": [{
            "type": "Feature",
            "geometry": { "type": "Point", "coordinates": [106.8, -6.2] },
            "properties": { "pkey": 1, "text": "banjir di kemang" }
        }]
    })
}

fn create_test_app(source: Arc<ScriptedSource>, config: Config) -> Router {
    let state = AppState::new(cache::shared(), source, config);
    create_router(state)
}

async fn send(app: &Router, uri: &str) -> Response<Body> {
    app.clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

async fn body_to_string(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

const REPORTS: &str = "/banjir/data/api/v2/reports/confirmed";

// == Data Endpoint Tests ==

#[tokio::test]
async fn test_reports_as_json() {
    let source = ScriptedSource::new(Reply::Data(sample_collection()));
    let app = create_test_app(source, Config::default());

    let response = send(&app, REPORTS).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "application/json");
    assert_eq!(response.headers()["access-control-allow-origin"], "*");
    assert_eq!(
        response.headers()["access-control-allow-headers"],
        "X-Requested-With"
    );

    let body: Value = serde_json::from_str(&body_to_string(response).await).unwrap();
    assert_eq!(body, sample_collection());
}

#[tokio::test]
async fn test_reports_as_topojson() {
    let source = ScriptedSource::new(Reply::Data(sample_collection()));
    let app = create_test_app(source, Config::default());

    let response = send(&app, &format!("{}?format=topojson", REPORTS)).await;

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = serde_json::from_str(&body_to_string(response).await).unwrap();
    assert_eq!(body["type"], "Topology");

    let geometries = body["objects"]["collection"]["geometries"].as_array().unwrap();
    assert_eq!(geometries.len(), 1);
    assert_eq!(geometries[0]["type"], "Point");
    assert_eq!(geometries[0]["properties"]["pkey"], 1);
}

#[tokio::test]
async fn test_no_data_is_no_content() {
    let source = ScriptedSource::new(Reply::Empty);
    let app = create_test_app(source, Config::default());

    let response = send(&app, "/banjir/data/api/v2/iot/smartsensors").await;

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(response.headers().get("content-type").is_none());
    assert!(body_to_string(response).await.is_empty());
}

#[tokio::test]
async fn test_single_report_id_is_validated() {
    let source = ScriptedSource::new(Reply::Data(sample_collection()));
    let app = create_test_app(source.clone(), Config::default());

    for bad in ["abc", "0", "-4", "1.5"] {
        let response = send(&app, &format!("{}/{}", REPORTS, bad)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "id {bad:?}");

        let body: Value = serde_json::from_str(&body_to_string(response).await).unwrap();
        assert!(body["error"].as_str().unwrap().contains("Invalid parameter"));
    }
    assert_eq!(source.calls(), 0);

    let response = send(&app, &format!("{}/42", REPORTS)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(source.seen(), vec!["report:42".to_string()]);
}

#[tokio::test]
async fn test_infrastructure_layers() {
    let source = ScriptedSource::new(Reply::Data(sample_collection()));
    let app = create_test_app(source.clone(), Config::default());

    let response = send(&app, "/banjir/data/api/v2/infrastructure/pumps").await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = send(&app, "/banjir/data/api/v2/infrastructure/floodgauges").await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = send(&app, "/banjir/data/api/v2/infrastructure/bridges").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    assert_eq!(
        source.seen(),
        vec![
            "infrastructure:pumps".to_string(),
            "gauges:floodgauge_reports".to_string()
        ]
    );
}

#[tokio::test]
async fn test_floodwatch_area_filter() {
    let source = ScriptedSource::new(Reply::Empty);
    let config = Config {
        floodwatch_api: true,
        ..Config::default()
    };
    let app = create_test_app(source.clone(), config);

    send(&app, "/banjir/data/api/v2/floodwatch/reports?area_name=Menteng").await;
    send(&app, "/banjir/data/api/v2/floodwatch/reports/").await;

    assert_eq!(
        source.seen(),
        vec!["area:Menteng".to_string(), "area:*".to_string()]
    );
}

// == Cache Tests ==

#[tokio::test]
async fn test_cache_hit_skips_source() {
    let source = ScriptedSource::new(Reply::Data(sample_collection()));
    let app = create_test_app(source.clone(), Config::default());

    let first = body_to_string(send(&app, REPORTS).await).await;

    // A cached response is served even while the backend is down
    source.set_reply(Reply::Down);
    let response = send(&app, REPORTS).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["access-control-allow-origin"], "*");
    assert_eq!(body_to_string(response).await, first);
    assert_eq!(source.calls(), 1);
}

#[tokio::test]
async fn test_cache_key_includes_query() {
    let source = ScriptedSource::new(Reply::Data(sample_collection()));
    let app = create_test_app(source.clone(), Config::default());

    send(&app, REPORTS).await;
    send(&app, &format!("{}?format=topojson", REPORTS)).await;
    send(&app, &format!("{}?format=topojson", REPORTS)).await;

    assert_eq!(source.calls(), 2);
}

#[tokio::test]
async fn test_empty_responses_are_cached() {
    let source = ScriptedSource::new(Reply::Empty);
    let app = create_test_app(source.clone(), Config::default());

    assert_eq!(send(&app, REPORTS).await.status(), StatusCode::NO_CONTENT);
    assert_eq!(send(&app, REPORTS).await.status(), StatusCode::NO_CONTENT);
    assert_eq!(source.calls(), 1);
}

#[tokio::test]
async fn test_errors_are_not_cached() {
    let source = ScriptedSource::new(Reply::Down);
    let app = create_test_app(source.clone(), Config::default());

    assert_eq!(
        send(&app, REPORTS).await.status(),
        StatusCode::SERVICE_UNAVAILABLE
    );

    source.set_reply(Reply::Data(sample_collection()));
    assert_eq!(send(&app, REPORTS).await.status(), StatusCode::OK);
    assert_eq!(source.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_temporary_entries_expire() {
    let source = ScriptedSource::new(Reply::Data(sample_collection()));
    let app = create_test_app(source.clone(), Config::default());

    send(&app, REPORTS).await;
    tokio::time::advance(Duration::from_secs(59)).await;
    send(&app, REPORTS).await;
    assert_eq!(source.calls(), 1);

    tokio::time::advance(Duration::from_secs(2)).await;
    send(&app, REPORTS).await;
    assert_eq!(source.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_infrastructure_is_cached_permanently() {
    let source = ScriptedSource::new(Reply::Data(sample_collection()));
    let app = create_test_app(source.clone(), Config::default());
    let uri = "/banjir/data/api/v2/infrastructure/waterways";

    send(&app, uri).await;
    tokio::time::advance(Duration::from_secs(24 * 3600)).await;
    let response = send(&app, uri).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(source.calls(), 1);
}

// == Error Policy Tests ==

#[tokio::test]
async fn test_backend_errors_propagate() {
    let source = ScriptedSource::new(Reply::Down);
    let app = create_test_app(source.clone(), Config::default());

    let response = send(&app, REPORTS).await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body: Value = serde_json::from_str(&body_to_string(response).await).unwrap();
    assert!(body["error"].as_str().unwrap().contains("connection refused"));

    source.set_reply(Reply::Broken);
    let response = send(&app, "/banjir/data/api/v2/iot/smartsensors").await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_legacy_mode_answers_errors_with_no_content() {
    let source = ScriptedSource::new(Reply::Broken);
    let config = Config {
        legacy_empty_errors: true,
        ..Config::default()
    };
    let app = create_test_app(source, config);

    for uri in [
        REPORTS.to_string(),
        format!("{}/abc", REPORTS),
        "/banjir/data/api/v2/infrastructure/bridges".to_string(),
    ] {
        let response = send(&app, &uri).await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT, "{uri}");
        assert!(body_to_string(response).await.is_empty());
    }

    // Unknown routes still answer 404
    let response = send(&app, "/nowhere").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_malformed_query_is_a_bad_request() {
    let source = ScriptedSource::new(Reply::Data(sample_collection()));
    let app = create_test_app(source.clone(), Config::default());

    for uri in [
        format!("{}?format=topojson&format=json", REPORTS),
        "/banjir/data/api/v2/infrastructure/pumps?format=a&format=b".to_string(),
    ] {
        let response = send(&app, &uri).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(response.headers()["access-control-allow-origin"], "*");
        let body: Value = serde_json::from_str(&body_to_string(response).await).unwrap();
        assert!(body["error"].as_str().unwrap().contains("format"), "{body}");
    }
    assert_eq!(source.calls(), 0);
}

#[tokio::test]
async fn test_legacy_mode_answers_malformed_query_with_no_content() {
    let config = Config {
        legacy_empty_errors: true,
        ..Config::default()
    };
    let app = create_test_app(ScriptedSource::new(Reply::Empty), config);

    let response = send(&app, &format!("{}?format=topojson&format=json", REPORTS)).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(body_to_string(response).await.is_empty());
}

#[tokio::test]
async fn test_panicking_source_answers_server_error() {
    let source = ScriptedSource::new(Reply::Crash);
    let app = create_test_app(source.clone(), Config::default());

    let response = send(&app, REPORTS).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = serde_json::from_str(&body_to_string(response).await).unwrap();
    assert!(body["error"].as_str().unwrap().contains("unexpected geometry"));

    // The router keeps serving after a panic, and the failure was not cached
    source.set_reply(Reply::Data(sample_collection()));
    let response = send(&app, REPORTS).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(source.calls(), 2);
}

#[tokio::test]
async fn test_legacy_mode_answers_panics_with_no_content() {
    let config = Config {
        legacy_empty_errors: true,
        ..Config::default()
    };
    let app = create_test_app(ScriptedSource::new(Reply::Crash), config);

    let response = send(&app, "/banjir/data/api/v2/iot/smartsensors").await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(body_to_string(response).await.is_empty());
}

// == Glue Route Tests ==

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let app = create_test_app(ScriptedSource::new(Reply::Empty), Config::default());

    for uri in ["/nowhere", "/banjir/data/api/v3/reports", "/banjirx"] {
        let response = send(&app, uri).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{uri}");
        assert_eq!(body_to_string(response).await, NOT_FOUND_BODY);
    }
}

#[tokio::test]
async fn test_v1_redirects_to_v2() {
    let source = ScriptedSource::new(Reply::Empty);
    let app = create_test_app(source.clone(), Config::default());

    let response = send(
        &app,
        "/banjir/data/api/v1/reports/confirmed?format=topojson",
    )
    .await;

    assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY);
    assert_eq!(
        response.headers()["location"],
        "/banjir/data/api/v2/reports/confirmed?format=topojson"
    );
    assert_eq!(response.headers()["cache-control"], "max-age=60");
    assert_eq!(source.calls(), 0);
}

#[tokio::test]
async fn test_language_redirect() {
    let app = create_test_app(ScriptedSource::new(Reply::Empty), Config::default());

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/banjir")
                .header("accept-language", "id-ID,id;q=0.9")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(response.headers()["location"], "/banjir/id");

    let response = app
        .oneshot(
            Request::builder()
                .uri("/")
                .header("accept-language", "fr")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.headers()["location"], "/banjir/en");
}

#[tokio::test]
async fn test_static_files_under_prefix() {
    let public_dir = std::env::temp_dir().join(format!("gateway-public-{}", std::process::id()));
    std::fs::create_dir_all(public_dir.join("js")).unwrap();
    std::fs::write(public_dir.join("js/map.js"), "console.log('peta');").unwrap();

    let config = Config {
        public_dir: public_dir.clone(),
        ..Config::default()
    };
    let app = create_test_app(ScriptedSource::new(Reply::Empty), config);

    let response = send(&app, "/banjir/js/map.js").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_to_string(response).await, "console.log('peta');");

    let response = send(&app, "/banjir/js/missing.js").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_to_string(response).await, NOT_FOUND_BODY);

    std::fs::remove_dir_all(public_dir).ok();
}

#[tokio::test]
async fn test_robots_file_is_served() {
    let robots_file = std::env::temp_dir().join(format!("gateway-robots-{}.txt", std::process::id()));
    std::fs::write(&robots_file, "User-agent: *\nDisallow: /banjir/data/\n").unwrap();

    let config = Config {
        robots_file: robots_file.clone(),
        ..Config::default()
    };
    let app = create_test_app(ScriptedSource::new(Reply::Empty), config);

    let response = send(&app, "/robots.txt").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "text/plain");
    assert_eq!(
        body_to_string(response).await,
        "User-agent: *\nDisallow: /banjir/data/\n"
    );

    std::fs::remove_file(robots_file).ok();
}
