use axum::extract::State;
use axum::Json;

use super::with_store;
use crate::api::error::ApiError;
use crate::api::types::AppState;
use crate::model::Course;

pub async fn list(State(state): State<AppState>) -> Result<Json<Vec<Course>>, ApiError> {
    let courses = with_store(&state, |store| store.list_courses())
        .await?
        .map_err(|e| ApiError::store(e, "db_query_failed"))?;
    Ok(Json(courses))
}
