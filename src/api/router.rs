use axum::extract::Request;
use axum::http::{Method, StatusCode, Uri};
use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use super::error::{err, ApiError};
use super::handlers::{self, courses, students};
use super::types::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(handlers::core::health))
        .route(
            "/api/students",
            get(students::list).post(students::create),
        )
        .route(
            "/api/students/{id}",
            get(students::get_one)
                .put(students::update)
                .delete(students::delete),
        )
        .route("/api/courses", get(courses::list))
        .fallback(unknown_route)
        .method_not_allowed_fallback(wrong_method)
        .layer(TraceLayer::new_for_http().make_span_with(|req: &Request| {
            tracing::info_span!(
                "http",
                request_id = %Uuid::new_v4(),
                method = %req.method(),
                uri = %req.uri(),
            )
        }))
        .with_state(state)
}

async fn unknown_route(uri: Uri) -> ApiError {
    err(
        StatusCode::NOT_FOUND,
        "not_implemented",
        format!("unknown route: {}", uri.path()),
        None,
    )
}

async fn wrong_method(method: Method, uri: Uri) -> ApiError {
    err(
        StatusCode::METHOD_NOT_ALLOWED,
        "method_not_allowed",
        format!("{} not supported on {}", method, uri.path()),
        None,
    )
}
