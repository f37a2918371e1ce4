//! Router tests driving the HTTP surface with in-memory requests.

use std::sync::Arc;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode, header};
use camino::Utf8PathBuf;
use mapedit_core::SqliteFeatureStore;
use mapedit_data::OsmImporter;
use mapedit_data::overpass::test_support::StubOverpassSource;
use mapedit_server::{AppState, StyleProxy, StyleSettings, router};
use serde_json::{Value, json};
use tempfile::TempDir;
use tower::ServiceExt;

const TRAFFIC_LIGHTS: &str = r#"{"elements": [
    {"type": "node", "id": 31, "lat": 52.52, "lon": 13.40,
     "tags": {"highway": "traffic_signals", "ref": "A7"}},
    {"type": "node", "id": 32, "lat": 52.53, "lon": 13.41,
     "tags": {"highway": "traffic_signals"}}
]}"#;

const STYLE: &str = r#"{"version": 8, "sources": {"openmaptiles": {"type": "vector", "url": "https://tiles.example/v3.json"}}, "layers": []}"#;

struct TestApp {
    _dir: TempDir,
    source: Arc<StubOverpassSource>,
    router: Router,
}

impl TestApp {
    fn new() -> Self {
        Self::with_source(StubOverpassSource::with_json(TRAFFIC_LIGHTS))
    }

    fn with_source(source: StubOverpassSource) -> Self {
        let dir = TempDir::new().expect("tempdir");
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 tempdir");
        std::fs::write(root.join("style.json"), STYLE).expect("write style");
        let store = SqliteFeatureStore::open(root.join("features.db")).expect("open store");
        let source = Arc::new(source);
        let importer = OsmImporter::new(source.clone());
        let style = StyleProxy::new(StyleSettings {
            path: root.join("style.json"),
            source: "openmaptiles".to_owned(),
            tile_url_template: "http://localhost:8080/data/v3/{z}/{x}/{y}.pbf".to_owned(),
        });
        Self {
            _dir: dir,
            source,
            router: router(AppState::new(store, importer, style)),
        }
    }

    async fn call(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("build request");
        self.send(request).await
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("JSON body")
        };
        (status, body)
    }

    async fn create_point(&self, name: &str) -> i64 {
        let (status, body) = self
            .call(
                Method::POST,
                "/features",
                Some(json!({
                    "name": name,
                    "geometry": {"type": "Point", "coordinates": [13.4, 52.5]}
                })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body["id"].as_i64().expect("numeric id")
    }
}

#[tokio::test]
async fn banner_and_health_respond() {
    let app = TestApp::new();

    let (status, body) = app.call(Method::GET, "/", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"message": "Map Editor API", "version": "1.0.0"}));

    let (status, body) = app.call(Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "healthy"}));
}

#[tokio::test]
async fn created_feature_is_listed_and_fetched() {
    let app = TestApp::new();
    let (status, created) = app
        .call(
            Method::POST,
            "/features",
            Some(json!({
                "name": "Main Street",
                "geometry": {"type": "LineString", "coordinates": [[13.4, 52.5], [13.41, 52.51]]},
                "properties": {"colour": "red"},
                "road_type": "primary",
                "lane_count": 2
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{created}");
    let id = created["id"].as_i64().expect("numeric id");
    assert_eq!(created["road_type"], "primary");
    assert_eq!(created["properties"], json!({"colour": "red"}));

    let (status, collection) = app.call(Method::GET, "/features", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(collection["type"], "FeatureCollection");
    assert_eq!(collection["features"].as_array().map(Vec::len), Some(1));

    let (status, feature) = app.call(Method::GET, &format!("/features/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(feature["type"], "Feature");
    assert_eq!(feature["id"], id);
    assert_eq!(feature["geometry"]["type"], "LineString");
    assert_eq!(feature["properties"]["name"], "Main Street");
    assert_eq!(feature["properties"]["lane_count"], 2);
    assert_eq!(feature["properties"]["colour"], "red");
    assert!(feature["properties"].get("description").is_none());
}

#[tokio::test]
async fn missing_feature_is_404_with_detail() {
    let app = TestApp::new();
    for method in [Method::GET, Method::DELETE] {
        let (status, body) = app.call(method, "/features/999", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, json!({"detail": "Feature not found"}));
    }

    let (status, _) = app
        .call(Method::PUT, "/features/999", Some(json!({"name": "ghost"})))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn invalid_geometry_is_400() {
    let app = TestApp::new();
    let (status, body) = app
        .call(
            Method::POST,
            "/features",
            Some(json!({"geometry": {"type": "LineString", "coordinates": [[0.0, 0.0]]}})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let detail = body["detail"].as_str().expect("detail string");
    assert!(detail.starts_with("Error creating feature:"), "{detail}");
}

#[tokio::test]
async fn malformed_json_is_400() {
    let app = TestApp::new();
    let request = Request::builder()
        .method(Method::POST)
        .uri("/features")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{\"geometry\": "))
        .expect("build request");
    let (status, body) = app.send(request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].is_string());
}

#[tokio::test]
async fn non_numeric_id_is_400() {
    let app = TestApp::new();
    let (status, body) = app.call(Method::GET, "/features/abc", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].is_string());
}

#[tokio::test]
async fn partial_update_keeps_other_fields() {
    let app = TestApp::new();
    let id = app.create_point("Old name").await;

    let (status, updated) = app
        .call(
            Method::PUT,
            &format!("/features/{id}"),
            Some(json!({"name": "New name", "icon": "💡"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{updated}");
    assert_eq!(updated["name"], "New name");
    assert_eq!(updated["icon"], "💡");
    assert_eq!(
        updated["geometry"],
        json!({"type": "Point", "coordinates": [13.4, 52.5]})
    );

    let (status, cleared) = app
        .call(Method::PUT, &format!("/features/{id}"), Some(json!({"icon": null})))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(cleared.get("icon").is_none_or(Value::is_null));
    assert_eq!(cleared["name"], "New name");
}

#[tokio::test]
async fn clearing_geometry_is_rejected() {
    let app = TestApp::new();
    let id = app.create_point("Pin").await;
    let (status, body) = app
        .call(Method::PUT, &format!("/features/{id}"), Some(json!({"geometry": null})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["detail"],
        "Error updating feature: geometry cannot be cleared"
    );
}

#[tokio::test]
async fn delete_and_clear_all() {
    let app = TestApp::new();
    let first = app.create_point("one").await;
    for name in ["two", "three"] {
        app.create_point(name).await;
    }

    let (status, body) = app
        .call(Method::DELETE, &format!("/features/{first}"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"message": "Feature deleted successfully"}));

    let (status, body) = app.call(Method::DELETE, "/features/clear-all", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deleted_count"], 2);

    let (_, collection) = app.call(Method::GET, "/features", None).await;
    assert_eq!(collection["features"], json!([]));
}

#[tokio::test]
async fn traffic_light_import_is_deduplicated() {
    let app = TestApp::new();
    let bbox = json!({"north": 52.54, "south": 52.51, "east": 13.42, "west": 13.39});

    let (status, body) = app
        .call(Method::POST, "/load-osm-traffic-lights", Some(bbox.clone()))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["traffic_lights_loaded"], 2);

    let (status, body) = app
        .call(Method::POST, "/load-osm-traffic-lights", Some(bbox))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["traffic_lights_loaded"], 0);
    assert_eq!(body["report"]["skipped_existing"], 2);
    assert_eq!(app.source.queries().len(), 2);

    let (_, collection) = app.call(Method::GET, "/features", None).await;
    let names: Vec<&str> = collection["features"]
        .as_array()
        .expect("features array")
        .iter()
        .filter_map(|feature| feature["properties"]["name"].as_str())
        .collect();
    assert_eq!(names, ["Traffic Light A7", "Traffic Light"]);
}

#[tokio::test]
async fn unavailable_upstream_is_400() {
    let app = TestApp::with_source(StubOverpassSource::unavailable(3, "connection refused"));
    let (status, body) = app
        .call(
            Method::POST,
            "/load-osm-buildings",
            Some(json!({"north": 52.54, "south": 52.51, "east": 13.42, "west": 13.39})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let detail = body["detail"].as_str().expect("detail string");
    assert!(detail.starts_with("Error loading OSM data:"), "{detail}");
}

#[tokio::test]
async fn inverted_bbox_is_400_without_query() {
    let app = TestApp::new();
    let (status, _) = app
        .call(
            Method::POST,
            "/load-osm-roads",
            Some(json!({"north": 52.51, "south": 52.54, "east": 13.42, "west": 13.39})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(app.source.queries().is_empty());
}

#[tokio::test]
async fn map_style_points_at_local_tiles() {
    let app = TestApp::new();
    let (status, style) = app.call(Method::GET, "/map-style", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        style["sources"]["openmaptiles"],
        json!({"type": "vector", "tiles": ["http://localhost:8080/data/v3/{z}/{x}/{y}.pbf"]})
    );
}

#[tokio::test]
async fn cors_preflight_is_allowed() {
    let app = TestApp::new();
    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/features")
        .header(header::ORIGIN, "http://editor.example")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .body(Body::empty())
        .expect("build request");
    let response = app.router.clone().oneshot(request).await.expect("response");
    assert!(response.status().is_success());
    assert_eq!(
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .and_then(|value| value.to_str().ok()),
        Some("http://editor.example")
    );
}
