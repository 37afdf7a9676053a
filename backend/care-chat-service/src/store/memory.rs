use super::ConversationStore;
use crate::error::{AppError, AppResult};
use crate::models::{
    conversation::inbox_order, next_timestamp, ConversationId, ConversationListItem,
    ConversationSummary, HistoryPage, Message, MessageId, NewMessage, UserId, UserIdentity,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone)]
struct ConversationRecord {
    id: ConversationId,
    title: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    last_message_at: Option<DateTime<Utc>>,
    last_message_preview: Option<String>,
    /// Role snapshots live only in the relational schema
    participants: Vec<UserId>,
}

impl ConversationRecord {
    fn summary(&self) -> ConversationSummary {
        let mut participant_ids = self.participants.clone();
        participant_ids.sort_unstable();
        ConversationSummary {
            id: self.id,
            title: self.title.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            last_message_at: self.last_message_at,
            last_message_preview: self.last_message_preview.clone(),
            participant_ids,
        }
    }

    fn has_participant(&self, user_id: UserId) -> bool {
        self.participants.contains(&user_id)
    }
}

#[derive(Default)]
struct Inner {
    users: HashMap<UserId, UserIdentity>,
    conversations: BTreeMap<ConversationId, ConversationRecord>,
    messages: BTreeMap<MessageId, Message>,
    next_conversation_id: ConversationId,
    next_message_id: MessageId,
}

impl Inner {
    fn insert_conversation(
        &mut self,
        participants: &[UserIdentity],
        title: Option<&str>,
    ) -> ConversationSummary {
        self.next_conversation_id += 1;
        let now = Utc::now();
        let record = ConversationRecord {
            id: self.next_conversation_id,
            title: title.map(str::to_string),
            created_at: now,
            updated_at: now,
            last_message_at: None,
            last_message_preview: None,
            participants: participants.iter().map(|user| user.id).collect(),
        };
        let summary = record.summary();
        self.conversations.insert(record.id, record);
        summary
    }

    fn ordered_messages(&self, id: ConversationId) -> Vec<&Message> {
        let mut messages: Vec<&Message> = self
            .messages
            .values()
            .filter(|m| m.conversation_id == id)
            .collect();
        messages.sort_by(|a, b| a.sent_at.cmp(&b.sent_at).then(a.id.cmp(&b.id)));
        messages
    }
}

/// In-process store. All state sits behind one mutex that is never held across
/// an await point, which also serializes appends per conversation.
#[derive(Default)]
pub struct MemoryConversationStore {
    inner: Mutex<Inner>,
}

impl MemoryConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_users(users: impl IntoIterator<Item = UserIdentity>) -> Self {
        let store = Self::new();
        {
            let mut inner = store.inner.lock();
            for user in users {
                inner.users.insert(user.id, user);
            }
        }
        store
    }
}

#[async_trait]
impl ConversationStore for MemoryConversationStore {
    async fn upsert_user(&self, user: &UserIdentity) -> AppResult<()> {
        self.inner.lock().users.insert(user.id, user.clone());
        Ok(())
    }

    async fn find_user(&self, id: UserId) -> AppResult<Option<UserIdentity>> {
        Ok(self.inner.lock().users.get(&id).cloned())
    }

    async fn find_users(&self, ids: &[UserId]) -> AppResult<Vec<UserIdentity>> {
        let inner = self.inner.lock();
        Ok(ids
            .iter()
            .filter_map(|id| inner.users.get(id).cloned())
            .collect())
    }

    async fn create_conversation(
        &self,
        participants: &[UserIdentity],
        title: Option<&str>,
    ) -> AppResult<ConversationSummary> {
        let mut inner = self.inner.lock();
        if participants
            .iter()
            .any(|p| !inner.users.contains_key(&p.id))
        {
            return Err(AppError::ParticipantNotFound);
        }
        Ok(inner.insert_conversation(participants, title))
    }

    async fn get_or_create_direct(
        &self,
        a: &UserIdentity,
        b: &UserIdentity,
    ) -> AppResult<ConversationSummary> {
        let mut inner = self.inner.lock();
        let existing = inner.conversations.values().find(|c| {
            c.participants.len() == 2 && c.has_participant(a.id) && c.has_participant(b.id)
        });
        if let Some(conversation) = existing {
            return Ok(conversation.summary());
        }
        if !inner.users.contains_key(&a.id) || !inner.users.contains_key(&b.id) {
            return Err(AppError::ParticipantNotFound);
        }
        Ok(inner.insert_conversation(&[a.clone(), b.clone()], None))
    }

    async fn get_conversation(&self, id: ConversationId) -> AppResult<Option<ConversationSummary>> {
        Ok(self
            .inner
            .lock()
            .conversations
            .get(&id)
            .map(ConversationRecord::summary))
    }

    async fn participant_ids(&self, id: ConversationId) -> AppResult<Vec<UserId>> {
        Ok(self
            .inner
            .lock()
            .conversations
            .get(&id)
            .map(|c| c.summary().participant_ids)
            .unwrap_or_default())
    }

    async fn is_participant(&self, id: ConversationId, user_id: UserId) -> AppResult<bool> {
        Ok(self
            .inner
            .lock()
            .conversations
            .get(&id)
            .is_some_and(|c| c.has_participant(user_id)))
    }

    async fn list_for_user(&self, user_id: UserId) -> AppResult<Vec<ConversationListItem>> {
        let inner = self.inner.lock();
        let mut summaries: Vec<ConversationSummary> = inner
            .conversations
            .values()
            .filter(|c| c.has_participant(user_id))
            .map(ConversationRecord::summary)
            .collect();
        summaries.sort_by(inbox_order);

        Ok(summaries
            .into_iter()
            .map(|conversation| {
                let unread_count = inner
                    .messages
                    .values()
                    .filter(|m| {
                        m.conversation_id == conversation.id
                            && m.sender_id != user_id
                            && !m.is_read
                    })
                    .count() as i64;
                ConversationListItem {
                    conversation,
                    unread_count,
                }
            })
            .collect())
    }

    async fn append_message(&self, message: NewMessage) -> AppResult<Message> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        let conversation = inner
            .conversations
            .get_mut(&message.conversation_id)
            .ok_or(AppError::ConversationNotFound)?;

        let sent_at = next_timestamp(Utc::now(), conversation.last_message_at);
        if let Some(preview) = message.preview() {
            conversation.last_message_preview = Some(preview);
        }
        conversation.last_message_at = Some(sent_at);
        conversation.updated_at = Utc::now();

        inner.next_message_id += 1;
        let stored = Message {
            id: inner.next_message_id,
            conversation_id: message.conversation_id,
            sender_id: message.sender_id,
            content: message.content,
            attachment_url: message.attachment_url,
            kind: message.kind,
            sent_at,
            // The sender has read their own message.
            is_read: true,
        };
        inner.messages.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn message_history(
        &self,
        id: ConversationId,
        limit: i64,
        offset: i64,
    ) -> AppResult<HistoryPage> {
        let inner = self.inner.lock();
        let ordered = inner.ordered_messages(id);
        let total = ordered.len() as i64;

        let limit = usize::try_from(limit).unwrap_or(0);
        let offset = usize::try_from(offset).unwrap_or(0);
        let mut items: Vec<Message> = ordered
            .into_iter()
            .rev()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect();
        items.reverse();

        Ok(HistoryPage { items, total })
    }

    async fn get_message(&self, id: MessageId) -> AppResult<Option<Message>> {
        Ok(self.inner.lock().messages.get(&id).cloned())
    }

    async fn mark_read(&self, id: MessageId) -> AppResult<Message> {
        let mut inner = self.inner.lock();
        let message = inner
            .messages
            .get_mut(&id)
            .ok_or(AppError::MessageNotFound)?;
        message.is_read = true;
        Ok(message.clone())
    }
}
