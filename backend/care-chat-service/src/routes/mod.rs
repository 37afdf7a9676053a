use crate::middleware;
use crate::state::AppState;
use crate::websocket::handlers::ws_handler;
use axum::{
    extract::{DefaultBodyLimit, State},
    routing::{get, patch, post},
    Json, Router,
};
use serde_json::json;
use tower_http::services::ServeDir;

pub mod conversations;
use conversations::{
    create_conversation, get_conversation, get_or_create_direct, list_user_conversations,
};
pub mod messages;
use messages::{get_message_history, mark_message_read};
pub mod uploads;
use uploads::upload_chat_image;

/// Multipart framing allowance on top of the file size limit.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let online_users = state.registry.online_count();
    tracing::debug!(online_users, "health check");
    Json(json!({
        "status": "ok",
        "online_users": online_users,
    }))
}

pub fn build_router(state: AppState) -> Router {
    let upload_limit = state.uploads.max_bytes() + MULTIPART_OVERHEAD_BYTES;
    let media = ServeDir::new(state.uploads.root());

    let router = Router::new()
        .route("/health", get(health))
        .route("/conversations", post(create_conversation))
        .route("/conversations/by-users", get(get_or_create_direct))
        .route("/conversations/:id", get(get_conversation))
        .route("/conversations/:id/messages", get(get_message_history))
        .route("/users/:user_id/conversations", get(list_user_conversations))
        .route("/messages/:id/read", patch(mark_message_read))
        .route(
            "/uploads/chat-image",
            post(upload_chat_image).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/ws", get(ws_handler))
        .nest_service("/media", media);

    middleware::with_defaults(router).with_state(state)
}
