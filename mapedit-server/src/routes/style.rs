//! Map style handler.

use axum::Json;
use axum::extract::State;
use serde_json::{Map, Value};

use crate::error::ApiError;
use crate::state::AppState;

pub(crate) async fn map_style(
    State(state): State<AppState>,
) -> Result<Json<Map<String, Value>>, ApiError> {
    let style = state
        .with_style(|proxy| proxy.get_map_style().map_err(ApiError::from))
        .await?;
    Ok(Json(style))
}
