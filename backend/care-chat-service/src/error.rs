use crate::middleware::error_handling;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        error_handling::into_response(self).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("could not validate credentials")]
    Unauthorized,

    #[error("{0}")]
    Forbidden(String),

    #[error("Not a conversation participant")]
    NotAParticipant,

    #[error("Cannot mark your own message as read")]
    OwnMessage,

    #[error("Conversation not found")]
    ConversationNotFound,

    #[error("Message not found")]
    MessageNotFound,

    #[error("One or more participants were not found")]
    ParticipantNotFound,

    #[error("upload too large (max {max_bytes} bytes)")]
    UploadTooLarge { max_bytes: usize },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("internal server error")]
    Internal,
}

impl AppError {
    /// Returns HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            AppError::BadRequest(_) => 400,
            AppError::Unauthorized => 401,
            AppError::Forbidden(_) | AppError::NotAParticipant | AppError::OwnMessage => 403,
            AppError::ConversationNotFound
            | AppError::MessageNotFound
            | AppError::ParticipantNotFound => 404,
            AppError::UploadTooLarge { .. } => 413,
            AppError::Config(_)
            | AppError::Database(_)
            | AppError::Storage(_)
            | AppError::Internal => 500,
        }
    }

    /// Text placed in an inline `{error}` frame on the live channel.
    ///
    /// Server-side failures are not described to the client.
    pub fn frame_message(&self) -> String {
        match self.status_code() {
            500 => "Internal server error".to_string(),
            _ => self.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(AppError::NotAParticipant.status_code(), 403);
        assert_eq!(AppError::OwnMessage.status_code(), 403);
        assert_eq!(AppError::ConversationNotFound.status_code(), 404);
        assert_eq!(AppError::BadRequest("x".into()).status_code(), 400);
        assert_eq!(AppError::Database(sqlx::Error::RowNotFound).status_code(), 500);
    }

    #[test]
    fn test_frame_message_hides_internal_details() {
        let err = AppError::Database(sqlx::Error::PoolTimedOut);
        assert_eq!(err.frame_message(), "Internal server error");
        assert_eq!(
            AppError::NotAParticipant.frame_message(),
            "Not a conversation participant"
        );
    }
}
