use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde_json::json;
use tracing::info;

use super::with_store;
use crate::api::error::{err, ApiError};
use crate::api::types::AppState;
use crate::model::{Student, StudentFilter, StudentPayload};

fn student_id(id: Result<Path<i64>, PathRejection>) -> Result<i64, ApiError> {
    match id {
        Ok(Path(v)) => Ok(v),
        Err(rejection) => Err(err(
            StatusCode::BAD_REQUEST,
            "bad_params",
            "invalid student id",
            Some(json!({ "rejection": rejection.body_text() })),
        )),
    }
}

fn body(payload: Result<Json<StudentPayload>, JsonRejection>) -> Result<StudentPayload, ApiError> {
    match payload {
        Ok(Json(v)) => Ok(v),
        Err(rejection) => Err(err(
            StatusCode::BAD_REQUEST,
            "bad_json",
            rejection.body_text(),
            None,
        )),
    }
}

pub async fn list(
    State(state): State<AppState>,
    filter: Result<Query<StudentFilter>, QueryRejection>,
) -> Result<Json<Vec<Student>>, ApiError> {
    let Query(filter) = filter.map_err(|rejection| {
        err(
            StatusCode::BAD_REQUEST,
            "bad_params",
            "invalid query string",
            Some(json!({ "rejection": rejection.body_text() })),
        )
    })?;
    let students = with_store(&state, move |store| store.list_students(&filter))
        .await?
        .map_err(|e| ApiError::store(e, "db_query_failed"))?;
    Ok(Json(students))
}

pub async fn get_one(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<Student>, ApiError> {
    let id = student_id(id)?;
    let student = with_store(&state, move |store| store.get_student(id))
        .await?
        .map_err(|e| ApiError::store(e, "db_query_failed"))?;
    student.map(Json).ok_or_else(ApiError::student_not_found)
}

pub async fn create(
    State(state): State<AppState>,
    payload: Result<Json<StudentPayload>, JsonRejection>,
) -> Result<(StatusCode, Json<Student>), ApiError> {
    let input = body(payload)?.validate(&state.ages)?;
    let student = with_store(&state, move |store| store.create_student(&input))
        .await?
        .map_err(|e| ApiError::store(e, "db_insert_failed"))?;
    info!(student_id = student.id, "student created");
    Ok((StatusCode::CREATED, Json(student)))
}

pub async fn update(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
    payload: Result<Json<StudentPayload>, JsonRejection>,
) -> Result<Json<Student>, ApiError> {
    let id = student_id(id)?;
    let input = body(payload)?.validate(&state.ages)?;
    let student = with_store(&state, move |store| store.update_student(id, &input))
        .await?
        .map_err(|e| ApiError::store(e, "db_update_failed"))?;
    let Some(student) = student else {
        return Err(ApiError::student_not_found());
    };
    info!(student_id = id, "student updated");
    Ok(Json(student))
}

pub async fn delete(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let id = student_id(id)?;
    let removed = with_store(&state, move |store| store.delete_student(id))
        .await?
        .map_err(|e| ApiError::store(e, "db_delete_failed"))?;
    if !removed {
        return Err(ApiError::student_not_found());
    }
    info!(student_id = id, "student deleted");
    Ok(Json(json!({ "message": "Student deleted" })))
}
