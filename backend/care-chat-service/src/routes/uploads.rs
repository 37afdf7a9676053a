use crate::error::AppError;
use crate::middleware::auth::AuthUser;
use crate::state::AppState;
use axum::{
    extract::{Multipart, State},
    Json,
};
use serde::Serialize;

const CHAT_IMAGE_FOLDER: &str = "chat_images";

#[derive(Debug, Serialize)]
pub struct ChatImageResponse {
    pub attachment_url: String,
}

fn is_image(content_type: Option<&str>) -> bool {
    content_type.is_some_and(|ct| ct.trim().to_ascii_lowercase().starts_with("image/"))
}

/// Accepts a multipart `file` field holding an image and returns the value to
/// put in a message's `attachment_url`.
pub async fn upload_chat_image(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    mut multipart: Multipart,
) -> Result<Json<ChatImageResponse>, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("invalid multipart body: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }
        if !is_image(field.content_type()) {
            return Err(AppError::BadRequest("Only image files are allowed.".into()));
        }
        let file_name = field.file_name().map(str::to_string);
        let bytes = field.bytes().await.map_err(|e| {
            if e.status() == axum::http::StatusCode::PAYLOAD_TOO_LARGE {
                AppError::UploadTooLarge {
                    max_bytes: state.uploads.max_bytes(),
                }
            } else {
                AppError::BadRequest(format!("failed to read upload: {e}"))
            }
        })?;

        let attachment_url = state
            .uploads
            .store_bytes(CHAT_IMAGE_FOLDER, file_name.as_deref(), &bytes)
            .await?;
        tracing::debug!(user_id = user.id, %attachment_url, "chat image stored");
        return Ok(Json(ChatImageResponse { attachment_url }));
    }

    Err(AppError::BadRequest("multipart field 'file' is required".into()))
}
