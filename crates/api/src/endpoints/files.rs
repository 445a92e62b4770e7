//! File upload endpoints.

use axum::{
    extract::{Multipart, State},
    routing::post,
    Router,
};
use chrono::{DateTime, Utc};
use ripple_common::{AppError, AppResult};
use ripple_core::{AttachmentKind, UploadInput};
use serde::Serialize;
use tracing::info;

use crate::{extractors::AuthUser, middleware::AppState, response::ApiResponse};

/// Create files router.
pub fn router() -> Router<AppState> {
    Router::new().route("/", post(upload))
}

/// Stored file response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileResponse {
    pub id: String,
    pub name: String,
    pub content_type: String,
    pub size: i64,
    pub url: String,
    pub created_at: DateTime<Utc>,
}

/// Upload a file as multipart form data.
///
/// Fields: `file` (the blob) and optional `kind` (`image` or `document`,
/// defaulting to `image`). Size and MIME rules are enforced per kind.
async fn upload(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<ApiResponse<FileResponse>> {
    let mut kind = AttachmentKind::Image;
    let mut upload: Option<(String, String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Malformed multipart body: {e}")))?
    {
        let field_name = field.name().map(std::string::ToString::to_string);
        match field_name.as_deref() {
            Some("kind") => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("Malformed field: {e}")))?;
                kind = match value.as_str() {
                    "image" => AttachmentKind::Image,
                    "document" => AttachmentKind::Document,
                    other => {
                        return Err(AppError::Validation(format!(
                            "Unknown attachment kind: {other}"
                        )))
                    }
                };
            }
            Some("file") => {
                let name = field
                    .file_name()
                    .unwrap_or("upload")
                    .to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("Malformed field: {e}")))?;
                upload = Some((name, content_type, data.to_vec()));
            }
            _ => {}
        }
    }

    let Some((name, content_type, data)) = upload else {
        return Err(AppError::Validation("Missing file field".to_string()));
    };

    info!(user_id = %user.id, name = %name, size = data.len(), "Uploading file");

    let stored = state
        .attachment_service
        .upload(
            &user.id,
            UploadInput {
                name,
                content_type,
                data,
                kind,
            },
        )
        .await?;

    Ok(ApiResponse::ok(FileResponse {
        id: stored.id,
        name: stored.name,
        content_type: stored.content_type,
        size: stored.size,
        url: state.absolute_url(&stored.url),
        created_at: stored.created_at.into(),
    }))
}
