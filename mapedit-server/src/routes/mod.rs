//! HTTP routes.

mod features;
mod osm;
mod style;

use axum::extract::Request;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use log::info;
use serde_json::{Value, json};
use tower_http::cors::CorsLayer;

use crate::state::AppState;

/// Version reported by the root banner.
pub const API_VERSION: &str = "1.0.0";

/// Build the application router over `state`.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(banner))
        .route("/health", get(health))
        .route("/features", get(features::list).post(features::create))
        .route("/features/clear-all", delete(features::clear_all))
        .route(
            "/features/{id}",
            get(features::get_one)
                .put(features::update)
                .delete(features::delete_one),
        )
        .route("/load-osm-buildings", post(osm::buildings))
        .route("/load-osm-roads", post(osm::roads))
        .route("/load-osm-streetlights", post(osm::streetlights))
        .route("/load-osm-traffic-lights", post(osm::traffic_lights))
        .route("/map-style", get(style::map_style))
        .layer(middleware::from_fn(log_request))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

async fn banner() -> Json<Value> {
    Json(json!({ "message": "Map Editor API", "version": API_VERSION }))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}

async fn log_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_owned();
    let response = next.run(request).await;
    info!("{method} {path} -> {}", response.status());
    response
}
