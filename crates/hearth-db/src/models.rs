/// Database row types — these map directly to SQLite rows.
/// Distinct from hearth-types API models to keep the DB layer independent.
use hearth_types::models::AttachmentKind;

pub struct UserRow {
    pub id: i64,
    pub display_name: String,
    pub avatar: Option<String>,
    pub created_at: String,
}

pub struct PropertyRow {
    pub id: i64,
    pub owner_id: i64,
    pub title: String,
    pub created_at: String,
}

pub struct ConversationRow {
    pub id: i64,
    pub property_id: i64,
    pub user_id: i64,
    pub created_at: String,
}

pub struct MessageRow {
    pub id: i64,
    pub conversation_id: i64,
    pub sender_id: i64,
    pub message: Option<String>,
    pub read: bool,
    pub created_at: String,
    pub updated_at: String,
}

pub struct AttachmentRow {
    pub id: i64,
    pub message_id: i64,
    pub kind: String,
    pub file_path: String,
    pub file_name: String,
    pub mime_type: String,
    pub file_size: i64,
}

/// Input for the atomic message + attachments insert.
pub struct NewAttachment {
    pub kind: AttachmentKind,
    pub file_path: String,
    pub file_name: String,
    pub mime_type: String,
    pub file_size: i64,
}
