//! Read-mostly admin endpoints over the registry and autopost tasks.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use warden_common::ChatSettings;

use crate::broadcast::AutopostInfo;
use crate::state::AppState;

pub async fn list_chats(
    State(state): State<AppState>,
) -> Result<Json<Vec<ChatSettings>>, StatusCode> {
    state.registry.list().await.map(Json).map_err(|e| {
        tracing::error!(error = %e, "Failed to list chats");
        StatusCode::INTERNAL_SERVER_ERROR
    })
}

pub async fn list_autoposts(State(state): State<AppState>) -> Json<Vec<AutopostInfo>> {
    Json(state.autoposts.list())
}

pub async fn cancel_autopost(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> Result<Json<AutopostInfo>, StatusCode> {
    let info = state.autoposts.cancel(&task_id).ok_or(StatusCode::NOT_FOUND)?;
    tracing::info!(task_id = %task_id, "Autopost cancelled over HTTP");
    Ok(Json(info))
}
