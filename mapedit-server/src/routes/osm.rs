//! OSM import handlers, one per category.

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use mapedit_core::BoundingBox;
use mapedit_data::{ImportReport, OsmCategory};
use serde_json::{Map, Value, json};

use crate::error::ApiError;
use crate::state::AppState;

pub(crate) async fn buildings(
    state: State<AppState>,
    bbox: Result<Json<BoundingBox>, JsonRejection>,
) -> Result<Json<Map<String, Value>>, ApiError> {
    load(state, bbox, OsmCategory::Buildings).await
}

pub(crate) async fn roads(
    state: State<AppState>,
    bbox: Result<Json<BoundingBox>, JsonRejection>,
) -> Result<Json<Map<String, Value>>, ApiError> {
    load(state, bbox, OsmCategory::Roads).await
}

pub(crate) async fn streetlights(
    state: State<AppState>,
    bbox: Result<Json<BoundingBox>, JsonRejection>,
) -> Result<Json<Map<String, Value>>, ApiError> {
    load(state, bbox, OsmCategory::Streetlights).await
}

pub(crate) async fn traffic_lights(
    state: State<AppState>,
    bbox: Result<Json<BoundingBox>, JsonRejection>,
) -> Result<Json<Map<String, Value>>, ApiError> {
    load(state, bbox, OsmCategory::TrafficLights).await
}

/// Fetch on the async executor, then persist on the blocking pool.
async fn load(
    State(state): State<AppState>,
    bbox: Result<Json<BoundingBox>, JsonRejection>,
    category: OsmCategory,
) -> Result<Json<Map<String, Value>>, ApiError> {
    let Json(bbox) = bbox?;
    let batch = state.importer().collect(category, &bbox).await?;
    let report = state
        .with_features(move |features| batch.persist(features.store()).map_err(ApiError::from))
        .await?;
    Ok(Json(summary(&report)))
}

/// Response body: message, `<category>_loaded` and the full report.
fn summary(report: &ImportReport) -> Map<String, Value> {
    let label = report.category.as_str().replace('_', " ");
    let mut body = Map::new();
    body.insert(
        "message".to_owned(),
        Value::String(format!(
            "Loaded {} {label} from OpenStreetMap",
            report.inserted
        )),
    );
    body.insert(
        format!("{}_loaded", report.category.as_str()),
        json!(report.inserted),
    );
    body.insert("report".to_owned(), json!(report));
    body
}
