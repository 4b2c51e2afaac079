use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{AttachmentKind, Role};

// -- JWT Claims --

/// JWT claims shared across hearth-api (REST middleware) and hearth-gateway
/// (websocket authentication). Canonical definition lives here in
/// hearth-types to eliminate duplication. Token issuance happens outside
/// this core; we only validate and thread `sub` through as the viewer id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64,
    pub name: String,
    pub exp: usize,
}

// -- Conversations --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewConversationRequest {
    pub property_id: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserView {
    pub id: i64,
    pub display_name: String,
    pub avatar: Option<String>,
}

/// One row of the caller's conversation list. `role` is the caller's own
/// side; `counterpart` is the other party.
#[derive(Debug, Serialize)]
pub struct ConversationSummary {
    pub id: i64,
    pub property_id: i64,
    pub property_title: String,
    pub role: Role,
    pub counterpart: UserView,
    pub unread_count: i64,
    /// Text of the latest message, or `""` when that message carries
    /// attachments without text. Never a placeholder naming the media kind.
    pub last_message_preview: String,
    pub last_message_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

// -- Messages --

#[derive(Debug, Clone, Serialize)]
pub struct AttachmentView {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: AttachmentKind,
    pub url: String,
    pub name: String,
    pub size: i64,
}

#[derive(Debug, Serialize)]
pub struct MessageView {
    pub id: i64,
    pub text: Option<String>,
    pub sender: Role,
    /// Whether the requesting viewer sent this message.
    pub mine: bool,
    pub timestamp: DateTime<Utc>,
    pub read: bool,
    pub files: Option<Vec<AttachmentView>>,
}

#[derive(Debug, Serialize)]
pub struct MessageListResponse {
    pub messages: Vec<MessageView>,
    /// Opaque token for the next page; absent on the last page.
    pub next_page: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MessagePageQuery {
    pub page: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_limit() -> u32 {
    50
}
