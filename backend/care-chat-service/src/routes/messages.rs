use crate::error::AppError;
use crate::middleware::auth::AuthUser;
use crate::models::{ConversationId, HistoryPage, Message, MessageId};
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

pub async fn get_message_history(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(conversation_id): Path<ConversationId>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryPage>, AppError> {
    let page = state
        .conversations
        .history(&user, conversation_id, query.limit, query.offset)
        .await?;
    Ok(Json(page))
}

pub async fn mark_message_read(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(message_id): Path<MessageId>,
) -> Result<Json<Message>, AppError> {
    let message = state.conversations.mark_read(&user, message_id).await?;
    Ok(Json(message))
}
