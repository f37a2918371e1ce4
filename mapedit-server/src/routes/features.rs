//! Feature CRUD handlers.

use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use mapedit_core::{FeatureResponse, FeatureUpdate, NewFeature};
use serde::Serialize;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub(crate) struct Deleted {
    message: &'static str,
}

#[derive(Debug, Serialize)]
pub(crate) struct Cleared {
    message: String,
    deleted_count: u64,
}

pub(crate) async fn list(
    State(state): State<AppState>,
) -> Result<Json<geojson::FeatureCollection>, ApiError> {
    let collection = state
        .with_features(|features| {
            features
                .list_features()
                .map_err(|err| ApiError::from_read(&err))
        })
        .await?;
    Ok(Json(collection))
}

pub(crate) async fn get_one(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<geojson::Feature>, ApiError> {
    let Path(id) = id?;
    let feature = state
        .with_features(move |features| {
            features
                .get_feature(id)
                .map_err(|err| ApiError::from_read(&err))
        })
        .await?;
    Ok(Json(feature))
}

pub(crate) async fn create(
    State(state): State<AppState>,
    payload: Result<Json<NewFeature>, JsonRejection>,
) -> Result<Json<FeatureResponse>, ApiError> {
    let Json(input) = payload?;
    let created = state
        .with_features(move |features| {
            features
                .create_feature(input)
                .map_err(|err| ApiError::from_write("creating", &err))
        })
        .await?;
    Ok(Json(created))
}

pub(crate) async fn update(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
    payload: Result<Json<FeatureUpdate>, JsonRejection>,
) -> Result<Json<FeatureResponse>, ApiError> {
    let Path(id) = id?;
    let Json(update) = payload?;
    let updated = state
        .with_features(move |features| {
            features
                .update_feature(id, update)
                .map_err(|err| ApiError::from_write("updating", &err))
        })
        .await?;
    Ok(Json(updated))
}

pub(crate) async fn delete_one(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<Deleted>, ApiError> {
    let Path(id) = id?;
    state
        .with_features(move |features| {
            features
                .delete_feature(id)
                .map_err(|err| ApiError::from_write("deleting", &err))
        })
        .await?;
    Ok(Json(Deleted {
        message: "Feature deleted successfully",
    }))
}

pub(crate) async fn clear_all(State(state): State<AppState>) -> Result<Json<Cleared>, ApiError> {
    let deleted_count = state
        .with_features(|features| {
            features
                .clear_all_features()
                .map_err(|err| ApiError::from_write("clearing", &err))
        })
        .await?;
    Ok(Json(Cleared {
        message: format!("Deleted {deleted_count} features"),
        deleted_count,
    }))
}
