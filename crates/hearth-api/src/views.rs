//! Presentation adapters: shape ledger rows into host-facing and
//! customer-facing view models, and into the versioned realtime payload.
//! Storage rows never leave this layer.

use anyhow::Result;
use chrono::{DateTime, Utc};
use tracing::warn;

use hearth_db::Database;
use hearth_db::models::{AttachmentRow, ConversationRow, MessageRow, PropertyRow};
use hearth_types::api::{AttachmentView, ConversationSummary, MessageView, UserView};
use hearth_types::events::{FilePayload, MessagePayload};
use hearth_types::models::Role;

/// Parse a stored timestamp. Columns written by this core are RFC-3339, but
/// rows seeded with SQLite's `datetime('now')` default lack a timezone, so
/// fall back to naive UTC before giving up.
pub fn parse_db_time(raw: &str) -> DateTime<Utc> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| {
            chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            warn!("Corrupt timestamp '{}': {}", raw, e);
            DateTime::default()
        })
}

/// The list preview for a conversation's latest message: its text, or `""`
/// when it carries attachments without text. Never a placeholder naming the
/// media kind — a text message that happens to contain the word "image"
/// previews like any other.
pub fn preview(text: Option<&str>) -> String {
    text.unwrap_or_default().to_string()
}

pub fn attachment_view(row: &AttachmentRow) -> AttachmentView {
    let kind = row.kind.parse().unwrap_or_else(|e| {
        warn!("Corrupt attachment kind on row {}: {}", row.id, e);
        hearth_types::models::AttachmentKind::from_mime(&row.mime_type)
    });

    AttachmentView {
        id: row.id,
        kind,
        url: format!("/attachments/{}", row.id),
        name: row.file_name.clone(),
        size: row.file_size,
    }
}

/// A ledger row annotated for one viewer: the sender's role (derived from
/// the property owner) plus whether the viewer sent it.
pub fn message_view(
    row: &MessageRow,
    attachments: &[AttachmentRow],
    property_owner_id: i64,
    viewer_id: i64,
) -> MessageView {
    let files: Vec<AttachmentView> = attachments.iter().map(attachment_view).collect();

    MessageView {
        id: row.id,
        text: row.message.clone(),
        sender: Role::of(row.sender_id, property_owner_id),
        mine: row.sender_id == viewer_id,
        timestamp: parse_db_time(&row.created_at),
        read: row.read,
        files: if files.is_empty() { None } else { Some(files) },
    }
}

/// The `message.sent` wire payload. Deliberately a separate struct from the
/// REST view so the realtime schema can evolve independently of storage.
pub fn message_payload(
    row: &MessageRow,
    attachments: &[AttachmentRow],
    property_owner_id: i64,
) -> MessagePayload {
    let files: Vec<FilePayload> = attachments
        .iter()
        .map(|a| {
            let view = attachment_view(a);
            FilePayload {
                id: view.id,
                kind: view.kind,
                url: view.url,
                name: view.name,
                size: view.size,
            }
        })
        .collect();

    MessagePayload {
        id: row.id,
        text: row.message.clone(),
        sender: Role::of(row.sender_id, property_owner_id),
        timestamp: parse_db_time(&row.created_at),
        read: row.read,
        files: if files.is_empty() { None } else { Some(files) },
    }
}

/// Assemble one conversation-list row for a viewer. Synchronous — callers
/// run it inside `spawn_blocking` alongside the queries it makes.
pub fn conversation_summary(
    db: &Database,
    conversation: &ConversationRow,
    property: &PropertyRow,
    viewer_id: i64,
) -> Result<ConversationSummary> {
    let viewer_role = Role::of(viewer_id, property.owner_id);

    let counterpart_id = match viewer_role {
        Role::Host => conversation.user_id,
        Role::Customer => property.owner_id,
    };
    let counterpart = db
        .get_user(counterpart_id)?
        .map(|u| UserView {
            id: u.id,
            display_name: u.display_name,
            avatar: u.avatar,
        })
        .unwrap_or_else(|| {
            warn!("Conversation {} counterpart {} missing", conversation.id, counterpart_id);
            UserView {
                id: counterpart_id,
                display_name: "unknown".into(),
                avatar: None,
            }
        });

    let unread_count = db.unread_count(conversation.id, viewer_id)?;
    let last = db.last_message(conversation.id)?;

    let (last_message_preview, last_message_at) = match &last {
        Some((row, _)) => (
            preview(row.message.as_deref()),
            Some(parse_db_time(&row.created_at)),
        ),
        None => (String::new(), None),
    };

    Ok(ConversationSummary {
        id: conversation.id,
        property_id: property.id,
        property_title: property.title.clone(),
        role: viewer_role,
        counterpart,
        unread_count,
        last_message_preview,
        last_message_at,
        created_at: parse_db_time(&conversation.created_at),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use hearth_types::models::AttachmentKind;

    fn message_row(id: i64, sender_id: i64, text: Option<&str>) -> MessageRow {
        MessageRow {
            id,
            conversation_id: 1,
            sender_id,
            message: text.map(str::to_owned),
            read: false,
            created_at: "2026-08-06T10:00:00.000000Z".into(),
            updated_at: "2026-08-06T10:00:00.000000Z".into(),
        }
    }

    fn attachment_row(id: i64) -> AttachmentRow {
        AttachmentRow {
            id,
            message_id: 1,
            kind: "image".into(),
            file_path: "abc".into(),
            file_name: "photo.jpg".into(),
            mime_type: "image/jpeg".into(),
            file_size: 512,
        }
    }

    #[test]
    fn preview_is_empty_for_attachment_only_messages() {
        assert_eq!(preview(None), "");
        // Never a placeholder naming the media kind.
        assert_ne!(preview(None), "image");
        assert_ne!(preview(None), "video");
    }

    #[test]
    fn preview_keeps_text_mentioning_media_words() {
        // The legacy substring heuristic would wrongly suppress this.
        assert_eq!(
            preview(Some("can you send an image of the video doorbell?")),
            "can you send an image of the video doorbell?"
        );
    }

    #[test]
    fn sender_role_follows_property_owner() {
        let owner_id = 10;
        let guest_id = 20;

        let from_host = message_view(&message_row(1, owner_id, Some("hi")), &[], owner_id, guest_id);
        assert_eq!(from_host.sender, Role::Host);
        assert!(!from_host.mine);

        let from_guest = message_view(&message_row(2, guest_id, Some("hi")), &[], owner_id, guest_id);
        assert_eq!(from_guest.sender, Role::Customer);
        assert!(from_guest.mine);
    }

    #[test]
    fn message_view_carries_attachment_urls() {
        let view = message_view(
            &message_row(1, 20, None),
            &[attachment_row(7)],
            10,
            20,
        );
        let files = view.files.unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].url, "/attachments/7");
        assert_eq!(files[0].kind, AttachmentKind::Image);
        assert!(view.text.is_none());
    }

    #[test]
    fn payload_serializes_iso8601_timestamps() {
        let payload = message_payload(&message_row(1, 20, Some("hello")), &[], 10);
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["timestamp"], "2026-08-06T10:00:00Z");
        assert_eq!(json["sender"], "customer");
    }

    #[test]
    fn db_time_parse_handles_sqlite_default_format() {
        let parsed = parse_db_time("2026-08-06 10:00:00");
        assert_eq!(parsed.to_rfc3339(), "2026-08-06T10:00:00+00:00");

        let parsed = parse_db_time("2026-08-06T10:00:00.123456Z");
        assert_eq!(parsed.timestamp_subsec_micros(), 123456);
    }
}
