use axum::Json;
use axum::extract::{Extension, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use tracing::error;

use hearth_types::api::{Claims, ConversationSummary, NewConversationRequest};

use crate::error::ApiError;
use crate::state::AppState;
use crate::views;

/// POST /conversations — find-or-create the caller's conversation for a
/// property. Safe to call repeatedly; concurrent first calls converge on
/// one row (the storage uniqueness constraint arbitrates, and the loser
/// re-fetches instead of erroring).
pub async fn create_conversation(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<NewConversationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let summary = create_or_get(&state, claims.sub, req.property_id).await?;
    Ok((StatusCode::OK, Json(summary)))
}

pub async fn create_or_get(
    state: &AppState,
    guest_id: i64,
    property_id: i64,
) -> Result<ConversationSummary, ApiError> {
    let db = state.db.clone();
    let result = tokio::task::spawn_blocking(move || {
        let Some(property) = db.get_property(property_id)? else {
            return Ok(Err(ApiError::PropertyNotFound(property_id)));
        };
        if property.owner_id == guest_id {
            return Ok(Err(ApiError::SelfMessagingNotAllowed));
        }

        let conversation = db.create_or_get_conversation(property_id, guest_id)?;
        let summary = views::conversation_summary(&db, &conversation, &property, guest_id)?;
        Ok::<_, anyhow::Error>(Ok(summary))
    })
    .await
    .map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        ApiError::Internal(e.into())
    })??;

    result
}

/// GET /conversations — every conversation the caller takes part in, on
/// either side, shaped for their role.
pub async fn list_conversations(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<ConversationSummary>>, ApiError> {
    let summaries = list_for(&state, claims.sub).await?;
    Ok(Json(summaries))
}

pub async fn list_for(
    state: &AppState,
    viewer_id: i64,
) -> Result<Vec<ConversationSummary>, ApiError> {
    let db = state.db.clone();
    let summaries = tokio::task::spawn_blocking(move || {
        let conversations = db.list_conversations_for(viewer_id)?;
        let mut summaries = Vec::with_capacity(conversations.len());
        for conversation in &conversations {
            let property = db
                .get_property(conversation.property_id)?
                .ok_or_else(|| {
                    anyhow::anyhow!(
                        "conversation {} references missing property",
                        conversation.id
                    )
                })?;
            summaries.push(views::conversation_summary(
                &db,
                conversation,
                &property,
                viewer_id,
            )?);
        }
        Ok::<_, anyhow::Error>(summaries)
    })
    .await
    .map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        ApiError::Internal(e.into())
    })??;

    Ok(summaries)
}
