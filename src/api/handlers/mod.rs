use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use crate::db::Database;
use crate::models::*;
use crate::tree::Tree;

type ApiError = (StatusCode, Json<ErrorBody>);

// ============================================================
// Error Handling
// ============================================================

/// Log an internal error and return a sanitized response to the client.
fn internal_error(e: impl std::fmt::Display) -> ApiError {
    tracing::error!("Internal error: {}", e);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorBody::new("Internal server error")),
    )
}

fn bad_request(msg: impl Into<String>) -> ApiError {
    let msg = msg.into();
    tracing::warn!("Rejected request: {}", msg);
    (StatusCode::BAD_REQUEST, Json(ErrorBody::new(msg)))
}

// ============================================================
// Health
// ============================================================

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

// ============================================================
// Lists
// ============================================================

/// An unknown list is returned as an empty one.
pub async fn get_list(
    State(db): State<Database>,
    Path(list_id): Path<String>,
) -> Result<Json<TodoList>, ApiError> {
    let list = db.get_list(&list_id).map_err(internal_error)?;
    Ok(Json(list.unwrap_or(TodoList {
        list_id,
        todos: Vec::new(),
    })))
}

pub async fn put_list(
    State(db): State<Database>,
    Path(list_id): Path<String>,
    payload: Result<Json<UpdateListInput>, JsonRejection>,
) -> Result<Json<TodoList>, ApiError> {
    let Json(input) = payload.map_err(|rejection| bad_request(rejection.body_text()))?;

    // Reject trees with repeated or empty ids before they reach storage.
    Tree::from_nodes(input.todos.clone()).map_err(|e| bad_request(e.to_string()))?;

    let list = db
        .upsert_list(&list_id, input.todos)
        .map_err(internal_error)?;
    tracing::info!(
        list_id = %list.list_id,
        nodes = count_nodes(&list.todos),
        "stored list"
    );
    Ok(Json(list))
}

pub async fn delete_list(
    State(db): State<Database>,
    Path(list_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let removed = db.delete_list(&list_id).map_err(internal_error)?;
    tracing::info!(list_id = %list_id, removed, "deleted list");
    Ok(Json(serde_json::json!({ "message": "List deleted successfully" })))
}

pub async fn list_lists(State(db): State<Database>) -> Result<Json<Vec<ListSummary>>, ApiError> {
    db.list_summaries().map(Json).map_err(internal_error)
}

/// Plain `OPTIONS` requests; CORS preflights are answered by the CORS layer.
pub async fn preflight() -> StatusCode {
    StatusCode::OK
}

pub async fn method_not_allowed() -> ApiError {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(ErrorBody::new("Method not allowed")),
    )
}
