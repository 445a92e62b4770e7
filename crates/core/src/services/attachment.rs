//! Attachment upload service: size/MIME validation plus storage.

use chrono::Utc;
use ripple_common::{AppError, AppResult, IdGenerator, StorageBackend};
use ripple_db::{entities::stored_file, repositories::StoredFileRepository};
use sea_orm::Set;
use std::sync::Arc;

/// Maximum attachment size: 10 MiB.
pub const MAX_ATTACHMENT_SIZE: usize = 10 * 1024 * 1024;

/// Allowed document MIME types: PDF, Word, Excel, plain text.
pub const ALLOWED_DOCUMENT_TYPES: &[&str] = &[
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "text/plain",
    "application/vnd.ms-excel",
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
];

/// Allowed image MIME types.
pub const ALLOWED_IMAGE_TYPES: &[&str] = &[
    "image/jpeg",
    "image/png",
    "image/gif",
    "image/bmp",
    "image/webp",
];

/// What kind of attachment an upload claims to be; each kind has its own
/// MIME allow-list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentKind {
    Image,
    Document,
}

impl AttachmentKind {
    const fn allowed_types(self) -> &'static [&'static str] {
        match self {
            Self::Image => ALLOWED_IMAGE_TYPES,
            Self::Document => ALLOWED_DOCUMENT_TYPES,
        }
    }
}

/// An upload to validate and store.
#[derive(Debug)]
pub struct UploadInput {
    pub name: String,
    pub content_type: String,
    pub data: Vec<u8>,
    pub kind: AttachmentKind,
}

/// Validate an upload against the size cap and the kind's MIME allow-list.
pub fn validate_upload(input: &UploadInput) -> AppResult<()> {
    if input.data.is_empty() {
        return Err(AppError::Validation("File is empty".to_string()));
    }

    if input.data.len() > MAX_ATTACHMENT_SIZE {
        return Err(AppError::Validation(
            "File exceeds the 10 MB size limit".to_string(),
        ));
    }

    if !input
        .kind
        .allowed_types()
        .contains(&input.content_type.as_str())
    {
        return Err(AppError::Validation(format!(
            "Unsupported content type: {}",
            input.content_type
        )));
    }

    Ok(())
}

/// Attachment service: validates uploads, writes blobs to the storage
/// backend and records a stored-file row.
#[derive(Clone)]
pub struct AttachmentService {
    file_repo: StoredFileRepository,
    storage: Arc<dyn StorageBackend>,
    id_gen: IdGenerator,
}

impl AttachmentService {
    /// Create a new attachment service.
    #[must_use]
    pub fn new(file_repo: StoredFileRepository, storage: Arc<dyn StorageBackend>) -> Self {
        Self {
            file_repo,
            storage,
            id_gen: IdGenerator::new(),
        }
    }

    /// Validate, store and record an upload. Returns the stored-file row.
    pub async fn upload(&self, user_id: &str, input: UploadInput) -> AppResult<stored_file::Model> {
        validate_upload(&input)?;

        let file_id = self.id_gen.generate();
        let extension = extension_for(&input.name);
        let key = match extension {
            Some(ext) => format!("{}/{file_id}.{ext}", &file_id[..2]),
            None => format!("{}/{file_id}", &file_id[..2]),
        };

        let blob = self
            .storage
            .put(&key, &input.data, &input.content_type)
            .await?;

        let model = stored_file::ActiveModel {
            id: Set(file_id),
            user_id: Set(user_id.to_string()),
            name: Set(input.name),
            content_type: Set(input.content_type),
            size: Set(blob.size as i64),
            url: Set(blob.url),
            created_at: Set(Utc::now().into()),
        };

        self.file_repo.create(model).await
    }

    /// Get a stored file by ID.
    pub async fn get(&self, id: &str) -> AppResult<stored_file::Model> {
        self.file_repo.get_by_id(id).await
    }

    /// Ensure a referenced file exists and is of the expected kind.
    pub async fn require_kind(&self, id: &str, kind: AttachmentKind) -> AppResult<stored_file::Model> {
        let file = self.file_repo.get_by_id(id).await?;

        if !kind.allowed_types().contains(&file.content_type.as_str()) {
            return Err(AppError::Validation(format!(
                "File {id} is not a valid {}",
                match kind {
                    AttachmentKind::Image => "image",
                    AttachmentKind::Document => "document",
                }
            )));
        }

        Ok(file)
    }
}

fn extension_for(name: &str) -> Option<&str> {
    let ext = name.rsplit('.').next()?;
    if ext.len() > 8 || ext == name {
        return None;
    }
    Some(ext)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn image_upload(content_type: &str, size: usize) -> UploadInput {
        UploadInput {
            name: "photo.png".to_string(),
            content_type: content_type.to_string(),
            data: vec![0u8; size],
            kind: AttachmentKind::Image,
        }
    }

    #[test]
    fn test_validate_accepts_png() {
        let input = image_upload("image/png", 1024);
        assert!(validate_upload(&input).is_ok());
    }

    #[test]
    fn test_validate_rejects_oversize() {
        let input = image_upload("image/png", MAX_ATTACHMENT_SIZE + 1);
        assert!(matches!(
            validate_upload(&input),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_validate_accepts_exact_limit() {
        let input = image_upload("image/png", MAX_ATTACHMENT_SIZE);
        assert!(validate_upload(&input).is_ok());
    }

    #[test]
    fn test_validate_rejects_wrong_mime_for_kind() {
        // A PDF is fine as a document but not as an image
        let mut input = image_upload("application/pdf", 1024);
        assert!(matches!(
            validate_upload(&input),
            Err(AppError::Validation(_))
        ));

        input.kind = AttachmentKind::Document;
        assert!(validate_upload(&input).is_ok());
    }

    #[test]
    fn test_validate_rejects_unknown_mime() {
        let mut input = image_upload("application/x-msdownload", 1024);
        input.kind = AttachmentKind::Document;
        assert!(matches!(
            validate_upload(&input),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_validate_rejects_empty_file() {
        let input = image_upload("image/png", 0);
        assert!(matches!(
            validate_upload(&input),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_extension_for() {
        assert_eq!(extension_for("photo.png"), Some("png"));
        assert_eq!(extension_for("archive.tar.gz"), Some("gz"));
        assert_eq!(extension_for("noext"), None);
    }
}
