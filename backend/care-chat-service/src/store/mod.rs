//! Durable conversation, participant and message state.
//!
//! Every implementation upholds the same contract:
//! - `append_message` assigns the message timestamp and updates the conversation
//!   summary atomically, serialized per conversation, so `last_message_at` always
//!   equals the newest committed message timestamp.
//! - `get_or_create_direct` returns one canonical conversation per unordered pair
//!   of users, even under concurrent callers.

mod memory;
mod postgres;

pub use memory::MemoryConversationStore;
pub use postgres::PgConversationStore;

use crate::error::AppResult;
use crate::models::{
    ConversationId, ConversationListItem, ConversationSummary, HistoryPage, Message, MessageId,
    NewMessage, UserId, UserIdentity,
};
use async_trait::async_trait;
use std::sync::Arc;

pub type SharedStore = Arc<dyn ConversationStore>;

#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Insert or refresh the mirrored user record
    async fn upsert_user(&self, user: &UserIdentity) -> AppResult<()>;

    async fn find_user(&self, id: UserId) -> AppResult<Option<UserIdentity>>;

    /// Users among `ids` that exist; unknown ids are omitted
    async fn find_users(&self, ids: &[UserId]) -> AppResult<Vec<UserIdentity>>;

    /// Create a conversation binding `participants` together in one unit
    async fn create_conversation(
        &self,
        participants: &[UserIdentity],
        title: Option<&str>,
    ) -> AppResult<ConversationSummary>;

    /// Conversation whose participant set is exactly `{a, b}`, created if absent
    async fn get_or_create_direct(
        &self,
        a: &UserIdentity,
        b: &UserIdentity,
    ) -> AppResult<ConversationSummary>;

    async fn get_conversation(&self, id: ConversationId) -> AppResult<Option<ConversationSummary>>;

    async fn participant_ids(&self, id: ConversationId) -> AppResult<Vec<UserId>>;

    async fn is_participant(&self, id: ConversationId, user_id: UserId) -> AppResult<bool>;

    /// Conversations of `user_id`, most recent activity first, with unread counts
    async fn list_for_user(&self, user_id: UserId) -> AppResult<Vec<ConversationListItem>>;

    /// Persist a message and update the conversation summary.
    ///
    /// Fails with `ConversationNotFound` when the conversation does not exist.
    async fn append_message(&self, message: NewMessage) -> AppResult<Message>;

    /// One page of history: `offset` counts back from the newest message and the
    /// page is returned oldest first
    async fn message_history(
        &self,
        id: ConversationId,
        limit: i64,
        offset: i64,
    ) -> AppResult<HistoryPage>;

    async fn get_message(&self, id: MessageId) -> AppResult<Option<Message>>;

    /// Set the read flag; already-read messages are returned unchanged
    async fn mark_read(&self, id: MessageId) -> AppResult<Message>;
}
