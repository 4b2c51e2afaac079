use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{AttachmentKind, Role};

/// Wire form of one attachment on a realtime payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilePayload {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: AttachmentKind,
    pub url: String,
    pub name: String,
    pub size: i64,
}

/// Versioned realtime payload for a newly created message. Built by the
/// presentation layer — a storage row never crosses the wire directly, so
/// the schema can evolve without breaking connected clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessagePayload {
    pub id: i64,
    pub text: Option<String>,
    /// Role of the sender, derived from the property owner.
    pub sender: Role,
    pub timestamp: DateTime<Utc>,
    pub read: bool,
    pub files: Option<Vec<FilePayload>>,
}

/// Events sent over the websocket gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayEvent {
    /// Server confirms successful authentication
    #[serde(rename = "ready")]
    Ready { user_id: i64 },

    /// Reply to a subscribe command with the granted conversation ids.
    /// Ids the caller is not a participant of are silently absent.
    #[serde(rename = "subscribed")]
    Subscribed { conversation_ids: Vec<i64> },

    /// A new message was appended to a conversation's ledger.
    /// Delivery is best-effort and at-most-once; the ledger is the source
    /// of truth and clients reconcile via the message list, de-duplicating
    /// by message id.
    #[serde(rename = "message.sent")]
    MessageSent {
        conversation_id: i64,
        message: MessagePayload,
    },
}

impl GatewayEvent {
    /// Returns the conversation id if this event is scoped to a single
    /// conversation. Events that return `None` are connection-level and are
    /// delivered regardless of subscriptions.
    pub fn conversation_id(&self) -> Option<i64> {
        match self {
            Self::MessageSent {
                conversation_id, ..
            } => Some(*conversation_id),
            Self::Ready { .. } | Self::Subscribed { .. } => None,
        }
    }
}

/// Commands sent FROM client TO server over the websocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayCommand {
    /// Replace this connection's conversation subscriptions. Each id is
    /// granted only if the caller is that conversation's guest or the
    /// owner of its property.
    #[serde(rename = "subscribe")]
    Subscribe { conversation_ids: Vec<i64> },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_sent_event_name_and_shape() {
        let event = GatewayEvent::MessageSent {
            conversation_id: 7,
            message: MessagePayload {
                id: 42,
                text: Some("Hi, is it available?".into()),
                sender: Role::Customer,
                timestamp: "2026-08-06T10:00:00Z".parse().unwrap(),
                read: false,
                files: None,
            },
        };

        let json: serde_json::Value = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "message.sent");
        assert_eq!(json["data"]["conversation_id"], 7);
        assert_eq!(json["data"]["message"]["sender"], "customer");
        assert_eq!(json["data"]["message"]["read"], false);
        assert!(json["data"]["message"]["files"].is_null());
    }

    #[test]
    fn subscribe_command_roundtrip() {
        let raw = r#"{"type":"subscribe","data":{"conversation_ids":[1,2,3]}}"#;
        let cmd: GatewayCommand = serde_json::from_str(raw).unwrap();
        let GatewayCommand::Subscribe { conversation_ids } = cmd;
        assert_eq!(conversation_ids, vec![1, 2, 3]);
    }

    #[test]
    fn file_payload_uses_type_key() {
        let file = FilePayload {
            id: 1,
            kind: AttachmentKind::Video,
            url: "/attachments/1".into(),
            name: "tour.mp4".into(),
            size: 1024,
        };
        let json = serde_json::to_value(&file).unwrap();
        assert_eq!(json["type"], "video");
    }
}
