//! Unread tracking: the count is always derived from the ledger — no
//! persisted counter, so there is no counter to drift.

use axum::Json;
use axum::extract::{Extension, Path, State};
use serde_json::json;
use tracing::error;

use hearth_types::api::Claims;

use crate::error::ApiError;
use crate::messages::conversation_context;
use crate::state::AppState;

/// POST /conversations/{id}/read — bulk-mark the other party's messages as
/// read. Idempotent; the viewer's own messages are never touched.
pub async fn mark_read(
    State(state): State<AppState>,
    Path(conversation_id): Path<i64>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let marked = mark(&state, conversation_id, claims.sub).await?;
    Ok(Json(json!({ "marked": marked })))
}

pub async fn mark(
    state: &AppState,
    conversation_id: i64,
    viewer_id: i64,
) -> Result<usize, ApiError> {
    conversation_context(state, conversation_id, viewer_id).await?;

    let db = state.db.clone();
    let marked = tokio::task::spawn_blocking(move || db.mark_read(conversation_id, viewer_id))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal(e.into())
        })??;

    Ok(marked)
}

pub async fn count(
    state: &AppState,
    conversation_id: i64,
    viewer_id: i64,
) -> Result<i64, ApiError> {
    conversation_context(state, conversation_id, viewer_id).await?;

    let db = state.db.clone();
    let count = tokio::task::spawn_blocking(move || db.unread_count(conversation_id, viewer_id))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal(e.into())
        })??;

    Ok(count)
}
