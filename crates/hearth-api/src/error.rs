use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("property {0} does not exist")]
    PropertyNotFound(i64),

    #[error("a host cannot message their own listing")]
    SelfMessagingNotAllowed,

    #[error("conversation {0} does not exist")]
    ConversationNotFound(i64),

    #[error("not a participant of this conversation")]
    NotParticipant,

    #[error("a message needs text or at least one attachment")]
    EmptyMessage,

    #[error("at most {max} attachments per message, got {got}")]
    TooManyFiles { max: usize, got: usize },

    #[error("{name} is {size} bytes, over the {max} byte limit")]
    FileTooLarge { name: String, size: usize, max: usize },

    #[error("{name}: unsupported file type {mime}")]
    UnsupportedFileType { name: String, mime: String },

    #[error("attachment {0} does not exist")]
    AttachmentNotFound(i64),

    #[error("malformed upload: {0}")]
    InvalidUpload(String),

    #[error("page token is not valid")]
    BadPageToken,

    #[error("missing or invalid credentials")]
    Unauthorized,

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::PropertyNotFound(_) => "property_not_found",
            Self::SelfMessagingNotAllowed => "self_messaging_not_allowed",
            Self::ConversationNotFound(_) => "conversation_not_found",
            Self::NotParticipant => "not_participant",
            Self::EmptyMessage => "empty_message",
            Self::TooManyFiles { .. } => "too_many_files",
            Self::FileTooLarge { .. } => "file_too_large",
            Self::UnsupportedFileType { .. } => "unsupported_file_type",
            Self::AttachmentNotFound(_) => "attachment_not_found",
            Self::InvalidUpload(_) => "invalid_upload",
            Self::BadPageToken => "bad_page_token",
            Self::Unauthorized => "unauthorized",
            Self::Internal(_) => "internal",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::EmptyMessage
            | Self::TooManyFiles { .. }
            | Self::FileTooLarge { .. }
            | Self::UnsupportedFileType { .. }
            | Self::InvalidUpload(_)
            | Self::BadPageToken => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::SelfMessagingNotAllowed | Self::NotParticipant => StatusCode::FORBIDDEN,
            Self::PropertyNotFound(_)
            | Self::ConversationNotFound(_)
            | Self::AttachmentNotFound(_) => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The request field a validation error points at, for client display.
    fn field(&self) -> Option<&'static str> {
        match self {
            Self::EmptyMessage => Some("message"),
            Self::TooManyFiles { .. }
            | Self::FileTooLarge { .. }
            | Self::UnsupportedFileType { .. }
            | Self::InvalidUpload(_) => Some("files"),
            Self::BadPageToken => Some("page"),
            _ => None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Internal details go to the log, never to the client.
        if let Self::Internal(ref e) = self {
            error!("internal error: {:#}", e);
            return (
                status,
                Json(json!({ "error": "internal", "message": "internal server error" })),
            )
                .into_response();
        }

        // Rejected authorization attempts leave a trace; they are never
        // retried on the caller's behalf.
        if status == StatusCode::FORBIDDEN || status == StatusCode::UNAUTHORIZED {
            warn!("request rejected: {}", self);
        }

        let mut body = json!({ "error": self.code(), "message": self.to_string() });
        if let Some(field) = self.field() {
            body["field"] = json!(field);
        }

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_carry_field_detail() {
        let err = ApiError::FileTooLarge {
            name: "big.mp4".into(),
            size: 11 * 1024 * 1024,
            max: 10 * 1024 * 1024,
        };
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.code(), "file_too_large");
        assert_eq!(err.field(), Some("files"));
    }

    #[test]
    fn authorization_errors_are_forbidden() {
        assert_eq!(ApiError::NotParticipant.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            ApiError::SelfMessagingNotAllowed.status(),
            StatusCode::FORBIDDEN
        );
    }
}
