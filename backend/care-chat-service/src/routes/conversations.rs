use crate::error::AppError;
use crate::middleware::auth::AuthUser;
use crate::models::{ConversationId, ConversationListItem, ConversationSummary, UserId};
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct CreateConversationRequest {
    #[serde(default)]
    pub participant_ids: Vec<UserId>,
    pub title: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DirectConversationQuery {
    pub user_a: UserId,
    pub user_b: UserId,
}

pub async fn create_conversation(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(body): Json<CreateConversationRequest>,
) -> Result<(StatusCode, Json<ConversationSummary>), AppError> {
    let conversation = state
        .conversations
        .create(&user, &body.participant_ids, body.title.as_deref())
        .await?;
    Ok((StatusCode::CREATED, Json(conversation)))
}

pub async fn get_conversation(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<ConversationId>,
) -> Result<Json<ConversationSummary>, AppError> {
    let conversation = state.conversations.get_for(&user, id).await?;
    Ok(Json(conversation))
}

pub async fn get_or_create_direct(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Query(query): Query<DirectConversationQuery>,
) -> Result<Json<ConversationSummary>, AppError> {
    let conversation = state
        .conversations
        .get_or_create_direct(&user, query.user_a, query.user_b)
        .await?;
    Ok(Json(conversation))
}

pub async fn list_user_conversations(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(user_id): Path<UserId>,
) -> Result<Json<Vec<ConversationListItem>>, AppError> {
    let items = state.conversations.list_for_user(&user, user_id).await?;
    Ok(Json(items))
}
