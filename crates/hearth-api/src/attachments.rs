use std::path::PathBuf;

use anyhow::Result;
use axum::body::Bytes;
use axum::extract::{Extension, Path, State};
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use tracing::{error, info, warn};
use uuid::Uuid;

use hearth_db::models::NewAttachment;
use hearth_types::api::Claims;
use hearth_types::models::AttachmentKind;

use crate::error::ApiError;
use crate::state::AppState;

/// 10 MB per attachment.
pub const MAX_FILE_SIZE: usize = 10 * 1024 * 1024;

/// At most 5 attachments on a single message.
pub const MAX_FILES_PER_MESSAGE: usize = 5;

/// Extension → MIME whitelist. Anything outside this table is rejected.
const ALLOWED_TYPES: &[(&str, &str)] = &[
    ("jpeg", "image/jpeg"),
    ("jpg", "image/jpeg"),
    ("png", "image/png"),
    ("gif", "image/gif"),
    ("mp4", "video/mp4"),
    ("mov", "video/quicktime"),
    ("avi", "video/x-msvideo"),
];

/// An uploaded file as it arrives from the multipart request, before
/// validation or persistence.
pub struct StagedUpload {
    pub original_name: String,
    pub declared_mime: Option<String>,
    pub bytes: Bytes,
}

/// A validated, persisted attachment — everything the ledger needs to record
/// it and hand back a retrievable descriptor.
pub struct StoredAttachment {
    pub kind: AttachmentKind,
    /// Name within the store directory (a uuid), recorded as `file_path`.
    pub path: String,
    pub original_name: String,
    pub mime_type: String,
    pub size: i64,
}

impl StoredAttachment {
    pub fn to_row(&self) -> NewAttachment {
        NewAttachment {
            kind: self.kind,
            file_path: self.path.clone(),
            file_name: self.original_name.clone(),
            mime_type: self.mime_type.clone(),
            file_size: self.size,
        }
    }
}

/// Resolve the effective MIME type of an upload against the whitelist.
///
/// A declared whitelisted MIME wins. Browsers that upload with no content
/// type (or a generic octet-stream) fall back to the file extension.
/// Anything else is rejected.
pub fn resolve_mime(original_name: &str, declared: Option<&str>) -> Option<&'static str> {
    if let Some(declared) = declared {
        if let Some((_, mime)) = ALLOWED_TYPES.iter().find(|(_, m)| *m == declared) {
            return Some(mime);
        }
        if declared != "application/octet-stream" {
            return None;
        }
    }

    let ext = original_name.rsplit_once('.')?.1.to_ascii_lowercase();
    ALLOWED_TYPES
        .iter()
        .find(|(e, _)| *e == ext)
        .map(|(_, mime)| *mime)
}

/// Validate one upload against the whitelist and size cap. Runs for every
/// file before anything touches disk or the database, so a bad file aborts
/// the whole append with nothing persisted.
pub fn validate(upload: &StagedUpload) -> Result<(&'static str, AttachmentKind), ApiError> {
    let mime = resolve_mime(&upload.original_name, upload.declared_mime.as_deref()).ok_or_else(
        || ApiError::UnsupportedFileType {
            name: upload.original_name.clone(),
            mime: upload
                .declared_mime
                .clone()
                .unwrap_or_else(|| "unknown".into()),
        },
    )?;

    if upload.bytes.len() > MAX_FILE_SIZE {
        return Err(ApiError::FileTooLarge {
            name: upload.original_name.clone(),
            size: upload.bytes.len(),
            max: MAX_FILE_SIZE,
        });
    }

    Ok((mime, AttachmentKind::from_mime(mime)))
}

/// On-disk media store. Each attachment is a flat uuid-named file under the
/// store directory; the database holds the descriptor.
pub struct AttachmentStore {
    dir: PathBuf,
}

impl AttachmentStore {
    pub async fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        info!("Attachment store directory: {}", dir.display());
        Ok(Self { dir })
    }

    fn disk_path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    /// Validate and persist one upload, returning its descriptor.
    pub async fn store(&self, upload: &StagedUpload) -> Result<StoredAttachment, ApiError> {
        let (mime, kind) = validate(upload)?;

        let name = Uuid::new_v4().to_string();
        tokio::fs::write(self.disk_path(&name), &upload.bytes)
            .await
            .map_err(|e| {
                error!("failed to write attachment {}: {}", name, e);
                ApiError::Internal(e.into())
            })?;

        Ok(StoredAttachment {
            kind,
            path: name,
            original_name: upload.original_name.clone(),
            mime_type: mime.to_string(),
            size: upload.bytes.len() as i64,
        })
    }

    /// Best-effort removal, used to undo disk writes when the ledger
    /// transaction fails. Tolerates files that are already gone.
    pub async fn remove(&self, path: &str) {
        match tokio::fs::remove_file(self.disk_path(path)).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("attachment file {} already gone", path);
            }
            Err(e) => {
                warn!("failed to remove attachment file {}: {}", path, e);
            }
        }
    }

    pub async fn read(&self, path: &str) -> std::io::Result<Vec<u8>> {
        tokio::fs::read(self.disk_path(path)).await
    }
}

/// GET /attachments/{id} — serve a stored attachment with its recorded MIME
/// type. Participant checks happen against the owning conversation.
pub async fn download(
    State(state): State<AppState>,
    Path(attachment_id): Path<i64>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.clone();
    let row = tokio::task::spawn_blocking(move || {
        let Some(row) = db.get_attachment(attachment_id)? else {
            return Ok(None);
        };
        let conversation_id = db
            .conversation_of_message(row.message_id)?
            .ok_or_else(|| anyhow::anyhow!("attachment {} has no message", attachment_id))?;
        let participant = db.is_participant(conversation_id, claims.sub)?;
        Ok::<_, anyhow::Error>(Some((row, participant)))
    })
    .await
    .map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        ApiError::Internal(e.into())
    })??;

    let (row, participant) = row.ok_or(ApiError::AttachmentNotFound(attachment_id))?;
    if !participant {
        return Err(ApiError::NotParticipant);
    }

    let bytes = state.store.read(&row.file_path).await.map_err(|e| {
        error!("failed to read attachment {}: {}", row.file_path, e);
        ApiError::AttachmentNotFound(attachment_id)
    })?;

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, row.mime_type),
            (
                header::CONTENT_DISPOSITION,
                format!("inline; filename=\"{}\"", row.file_name),
            ),
        ],
        bytes,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn staged(name: &str, mime: Option<&str>, len: usize) -> StagedUpload {
        StagedUpload {
            original_name: name.to_string(),
            declared_mime: mime.map(str::to_string),
            bytes: Bytes::from(vec![0u8; len]),
        }
    }

    #[test]
    fn whitelisted_mime_passes() {
        let (mime, kind) = validate(&staged("photo.jpg", Some("image/jpeg"), 100)).unwrap();
        assert_eq!(mime, "image/jpeg");
        assert_eq!(kind, AttachmentKind::Image);
    }

    #[test]
    fn video_mime_classifies_as_video() {
        let (mime, kind) = validate(&staged("tour.mov", Some("video/quicktime"), 100)).unwrap();
        assert_eq!(mime, "video/quicktime");
        assert_eq!(kind, AttachmentKind::Video);
    }

    #[test]
    fn extension_fallback_covers_generic_content_type() {
        let (mime, _) = validate(&staged("clip.MP4", Some("application/octet-stream"), 100)).unwrap();
        assert_eq!(mime, "video/mp4");

        let (mime, _) = validate(&staged("pic.png", None, 100)).unwrap();
        assert_eq!(mime, "image/png");
    }

    #[test]
    fn disallowed_type_is_rejected() {
        let err = validate(&staged("notes.pdf", Some("application/pdf"), 100)).unwrap_err();
        assert!(matches!(err, ApiError::UnsupportedFileType { .. }));

        // A bad declared type never falls through to the extension.
        let err = validate(&staged("pic.jpg", Some("application/pdf"), 100)).unwrap_err();
        assert!(matches!(err, ApiError::UnsupportedFileType { .. }));

        let err = validate(&staged("noextension", None, 100)).unwrap_err();
        assert!(matches!(err, ApiError::UnsupportedFileType { .. }));
    }

    #[test]
    fn oversized_file_is_rejected() {
        let err = validate(&staged("big.jpg", Some("image/jpeg"), MAX_FILE_SIZE + 1)).unwrap_err();
        assert!(matches!(err, ApiError::FileTooLarge { .. }));

        // Exactly at the limit is fine.
        validate(&staged("ok.jpg", Some("image/jpeg"), MAX_FILE_SIZE)).unwrap();
    }

    #[tokio::test]
    async fn store_and_read_roundtrip() {
        let dir = std::env::temp_dir().join(format!("hearth-store-{}", Uuid::new_v4()));
        let store = AttachmentStore::new(&dir).await.unwrap();

        let upload = StagedUpload {
            original_name: "photo.jpg".into(),
            declared_mime: Some("image/jpeg".into()),
            bytes: Bytes::from_static(b"jpeg bytes"),
        };

        let stored = store.store(&upload).await.unwrap();
        assert_eq!(stored.size, 10);
        assert_eq!(stored.mime_type, "image/jpeg");

        let back = store.read(&stored.path).await.unwrap();
        assert_eq!(back, b"jpeg bytes");

        // remove is idempotent
        store.remove(&stored.path).await;
        store.remove(&stored.path).await;
        assert!(store.read(&stored.path).await.is_err());

        tokio::fs::remove_dir_all(&dir).await.ok();
    }
}
