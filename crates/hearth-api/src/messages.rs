use std::collections::HashMap;

use axum::Json;
use axum::extract::{Extension, Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as B64;
use tracing::{error, warn};

use hearth_db::models::{AttachmentRow, ConversationRow, PropertyRow};
use hearth_types::api::{Claims, MessageListResponse, MessagePageQuery, MessageView};
use hearth_types::events::GatewayEvent;

use crate::attachments::{MAX_FILES_PER_MESSAGE, StagedUpload, StoredAttachment};
use crate::error::ApiError;
use crate::state::AppState;
use crate::views;

/// POST /conversations/{id}/messages — multipart body with an optional
/// `message` text field and up to 5 `files` parts.
pub async fn send_message(
    State(state): State<AppState>,
    Path(conversation_id): Path<i64>,
    Extension(claims): Extension<Claims>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let mut text: Option<String> = None;
    let mut files: Vec<StagedUpload> = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::InvalidUpload(e.to_string()))?
    {
        match field.name() {
            Some("message") => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| ApiError::InvalidUpload(e.to_string()))?;
                if !value.trim().is_empty() {
                    text = Some(value);
                }
            }
            Some("files") => {
                let original_name = field
                    .file_name()
                    .map(str::to_string)
                    .unwrap_or_else(|| "file".to_string());
                let declared_mime = field.content_type().map(str::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::InvalidUpload(e.to_string()))?;
                files.push(StagedUpload {
                    original_name,
                    declared_mime,
                    bytes,
                });
            }
            other => {
                warn!("ignoring unknown multipart field {:?}", other);
            }
        }
    }

    let view = append(&state, conversation_id, claims.sub, text, files).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

/// Append one message to a conversation's ledger.
///
/// Every file is validated before anything is persisted; the message row and
/// its attachment rows commit as one transaction; the realtime publish fires
/// only after the commit and its failure is non-fatal — the ledger is
/// already the source of truth.
pub async fn append(
    state: &AppState,
    conversation_id: i64,
    sender_id: i64,
    text: Option<String>,
    files: Vec<StagedUpload>,
) -> Result<MessageView, ApiError> {
    let (_, property) = conversation_context(state, conversation_id, sender_id).await?;

    if text.is_none() && files.is_empty() {
        return Err(ApiError::EmptyMessage);
    }
    if files.len() > MAX_FILES_PER_MESSAGE {
        return Err(ApiError::TooManyFiles {
            max: MAX_FILES_PER_MESSAGE,
            got: files.len(),
        });
    }

    // Validate the whole set before the first byte is written.
    for file in &files {
        crate::attachments::validate(file)?;
    }

    let mut stored: Vec<StoredAttachment> = Vec::with_capacity(files.len());
    for file in &files {
        stored.push(state.store.store(file).await?);
    }

    let db = state.db.clone();
    let rows: Vec<_> = stored.iter().map(StoredAttachment::to_row).collect();
    let text_for_insert = text.clone();
    let insert = tokio::task::spawn_blocking(move || {
        db.insert_message_with_files(conversation_id, sender_id, text_for_insert.as_deref(), &rows)
    })
    .await
    .map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        ApiError::Internal(e.into())
    })?;

    let (message, attachments) = match insert {
        Ok(pair) => pair,
        Err(e) => {
            // The ledger rejected the append — undo the disk writes so no
            // orphaned media outlives the aborted message.
            for attachment in &stored {
                state.store.remove(&attachment.path).await;
            }
            return Err(ApiError::Internal(e));
        }
    };

    state.dispatcher.publish(GatewayEvent::MessageSent {
        conversation_id,
        message: views::message_payload(&message, &attachments, property.owner_id),
    });

    Ok(views::message_view(
        &message,
        &attachments,
        property.owner_id,
        sender_id,
    ))
}

/// GET /conversations/{id}?page=&limit= — one page of the ledger for the
/// viewer, `(created_at, id)` ascending.
pub async fn get_messages(
    State(state): State<AppState>,
    Path(conversation_id): Path<i64>,
    Query(query): Query<MessagePageQuery>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<MessageListResponse>, ApiError> {
    let (messages, next_page) = list(
        &state,
        conversation_id,
        claims.sub,
        query.page.as_deref(),
        query.limit,
    )
    .await?;

    Ok(Json(MessageListResponse {
        messages,
        next_page,
    }))
}

pub async fn list(
    state: &AppState,
    conversation_id: i64,
    viewer_id: i64,
    page: Option<&str>,
    limit: u32,
) -> Result<(Vec<MessageView>, Option<String>), ApiError> {
    let (_, property) = conversation_context(state, conversation_id, viewer_id).await?;

    let after = page.map(decode_page_token).transpose()?;
    let limit = limit.clamp(1, 200);

    let db = state.db.clone();
    let (rows, attachment_rows) = tokio::task::spawn_blocking(move || {
        let rows = db.list_messages(
            conversation_id,
            after.as_ref().map(|(ts, id)| (ts.as_str(), *id)),
            limit,
        )?;
        let ids: Vec<i64> = rows.iter().map(|m| m.id).collect();
        let attachment_rows = db.attachments_for_messages(&ids)?;
        Ok::<_, anyhow::Error>((rows, attachment_rows))
    })
    .await
    .map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        ApiError::Internal(e.into())
    })??;

    let next_page = if rows.len() == limit as usize {
        rows.last().map(|m| encode_page_token(&m.created_at, m.id))
    } else {
        None
    };

    // Group attachments by message id (cheap in-memory work, fine on the
    // async thread).
    let mut files_map: HashMap<i64, Vec<AttachmentRow>> = HashMap::new();
    for attachment in attachment_rows {
        files_map.entry(attachment.message_id).or_default().push(attachment);
    }

    let empty: Vec<AttachmentRow> = Vec::new();
    let messages = rows
        .iter()
        .map(|row| {
            let attachments = files_map.get(&row.id).unwrap_or(&empty);
            views::message_view(row, attachments, property.owner_id, viewer_id)
        })
        .collect();

    Ok((messages, next_page))
}

/// Resolve a conversation and check the caller is one of its two
/// participants — the precondition shared by every ledger operation.
pub(crate) async fn conversation_context(
    state: &AppState,
    conversation_id: i64,
    viewer_id: i64,
) -> Result<(ConversationRow, PropertyRow), ApiError> {
    let db = state.db.clone();
    let context = tokio::task::spawn_blocking(move || db.get_conversation_context(conversation_id))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal(e.into())
        })??;

    let (conversation, property) =
        context.ok_or(ApiError::ConversationNotFound(conversation_id))?;

    if viewer_id != conversation.user_id && viewer_id != property.owner_id {
        return Err(ApiError::NotParticipant);
    }

    Ok((conversation, property))
}

// -- Page tokens --

/// Opaque keyset cursor: base64 of `created_at|id` of the last message on
/// the previous page. Restartable and immune to timestamp collisions.
fn encode_page_token(created_at: &str, id: i64) -> String {
    B64.encode(format!("{created_at}|{id}"))
}

fn decode_page_token(token: &str) -> Result<(String, i64), ApiError> {
    let raw = B64.decode(token).map_err(|_| ApiError::BadPageToken)?;
    let raw = String::from_utf8(raw).map_err(|_| ApiError::BadPageToken)?;
    let (created_at, id) = raw.rsplit_once('|').ok_or(ApiError::BadPageToken)?;
    let id: i64 = id.parse().map_err(|_| ApiError::BadPageToken)?;
    Ok((created_at.to_string(), id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_token_roundtrip() {
        let token = encode_page_token("2026-08-06T10:00:00.000000Z", 42);
        let (created_at, id) = decode_page_token(&token).unwrap();
        assert_eq!(created_at, "2026-08-06T10:00:00.000000Z");
        assert_eq!(id, 42);
    }

    #[test]
    fn garbage_tokens_are_rejected() {
        assert!(matches!(
            decode_page_token("not-base64!!!"),
            Err(ApiError::BadPageToken)
        ));
        // Valid base64, wrong shape.
        let token = B64.encode("no separator here");
        assert!(matches!(
            decode_page_token(&token),
            Err(ApiError::BadPageToken)
        ));
    }
}
