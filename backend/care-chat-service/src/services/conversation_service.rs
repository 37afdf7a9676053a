use crate::error::{AppError, AppResult};
use crate::models::{
    ConversationId, ConversationListItem, ConversationSummary, HistoryPage, Message, MessageId,
    UserId, UserIdentity,
};
use crate::store::SharedStore;
use std::collections::BTreeSet;

pub const DEFAULT_HISTORY_LIMIT: i64 = 50;
pub const MAX_HISTORY_LIMIT: i64 = 200;

/// Conversation lifecycle and reads, with the caller's access checked first.
#[derive(Clone)]
pub struct ConversationService {
    store: SharedStore,
}

impl ConversationService {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Create a conversation between `caller` and `participant_ids`.
    ///
    /// Every id must resolve to a user; nothing is persisted otherwise.
    pub async fn create(
        &self,
        caller: &UserIdentity,
        participant_ids: &[UserId],
        title: Option<&str>,
    ) -> AppResult<ConversationSummary> {
        let ids: BTreeSet<UserId> = participant_ids
            .iter()
            .copied()
            .chain(std::iter::once(caller.id))
            .collect();
        if ids.len() < 2 {
            return Err(AppError::BadRequest(
                "A conversation requires at least two participants".into(),
            ));
        }

        let ids: Vec<UserId> = ids.into_iter().collect();
        let users = self.store.find_users(&ids).await?;
        if users.len() != ids.len() {
            return Err(AppError::ParticipantNotFound);
        }

        let title = title.map(str::trim).filter(|t| !t.is_empty());
        let conversation = self.store.create_conversation(&users, title).await?;
        tracing::info!(
            conversation_id = conversation.id,
            created_by = caller.id,
            participants = ids.len(),
            "conversation created"
        );
        Ok(conversation)
    }

    pub async fn get_for(
        &self,
        caller: &UserIdentity,
        id: ConversationId,
    ) -> AppResult<ConversationSummary> {
        let conversation = self
            .store
            .get_conversation(id)
            .await?
            .ok_or(AppError::ConversationNotFound)?;
        if !conversation.participant_ids.contains(&caller.id) {
            return Err(AppError::NotAParticipant);
        }
        Ok(conversation)
    }

    /// The conversation whose members are exactly `user_a` and `user_b`.
    pub async fn get_or_create_direct(
        &self,
        caller: &UserIdentity,
        user_a: UserId,
        user_b: UserId,
    ) -> AppResult<ConversationSummary> {
        if caller.id != user_a && caller.id != user_b {
            return Err(AppError::Forbidden("Access denied".into()));
        }
        if user_a == user_b {
            return Err(AppError::BadRequest(
                "user_a and user_b must be different".into(),
            ));
        }

        let users = self.store.find_users(&[user_a, user_b]).await?;
        let find = |id: UserId| users.iter().find(|u| u.id == id).cloned();
        let (Some(a), Some(b)) = (find(user_a), find(user_b)) else {
            return Err(AppError::ParticipantNotFound);
        };

        self.store.get_or_create_direct(&a, &b).await
    }

    pub async fn list_for_user(
        &self,
        caller: &UserIdentity,
        user_id: UserId,
    ) -> AppResult<Vec<ConversationListItem>> {
        if caller.id != user_id {
            return Err(AppError::Forbidden(
                "Cannot view another user's conversations".into(),
            ));
        }
        self.store.list_for_user(user_id).await
    }

    /// `limit` defaults to 50 and must be within 1..=200; `offset` counts back
    /// from the newest message.
    pub async fn history(
        &self,
        caller: &UserIdentity,
        id: ConversationId,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> AppResult<HistoryPage> {
        let limit = limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
        let offset = offset.unwrap_or(0);
        if !(1..=MAX_HISTORY_LIMIT).contains(&limit) {
            return Err(AppError::BadRequest(format!(
                "limit must be between 1 and {MAX_HISTORY_LIMIT}"
            )));
        }
        if offset < 0 {
            return Err(AppError::BadRequest("offset must be non-negative".into()));
        }

        self.get_for(caller, id).await?;
        self.store.message_history(id, limit, offset).await
    }

    /// Recipient acknowledgement; repeating it is a no-op.
    pub async fn mark_read(
        &self,
        caller: &UserIdentity,
        message_id: MessageId,
    ) -> AppResult<Message> {
        let message = self
            .store
            .get_message(message_id)
            .await?
            .ok_or(AppError::MessageNotFound)?;

        if !self
            .store
            .is_participant(message.conversation_id, caller.id)
            .await?
        {
            return Err(AppError::NotAParticipant);
        }
        if message.sender_id == caller.id {
            return Err(AppError::OwnMessage);
        }
        if message.is_read {
            return Ok(message);
        }
        self.store.mark_read(message_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MessageKind, NewMessage, UserRole};
    use crate::store::{ConversationStore, MemoryConversationStore};
    use std::sync::Arc;

    fn user(id: UserId) -> UserIdentity {
        UserIdentity::new(id, UserRole::Patient)
    }

    fn service() -> (ConversationService, SharedStore) {
        let store: SharedStore = Arc::new(MemoryConversationStore::with_users(
            (1..=4).map(user).collect::<Vec<_>>(),
        ));
        (ConversationService::new(store.clone()), store)
    }

    async fn send(
        store: &SharedStore,
        conversation_id: ConversationId,
        sender_id: UserId,
        body: &str,
    ) -> Message {
        store
            .append_message(NewMessage {
                conversation_id,
                sender_id,
                content: Some(body.into()),
                attachment_url: None,
                kind: MessageKind::Text,
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_includes_caller() {
        let (service, _) = service();
        let conv = service.create(&user(1), &[2, 3], Some("Care team")).await.unwrap();
        assert_eq!(conv.participant_ids, vec![1, 2, 3]);
        assert_eq!(conv.title.as_deref(), Some("Care team"));
    }

    #[tokio::test]
    async fn test_create_requires_two_distinct_participants() {
        let (service, _) = service();
        let err = service.create(&user(1), &[1], None).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_create_with_unknown_participant_persists_nothing() {
        let (service, store) = service();
        let err = service.create(&user(1), &[2, 99], None).await.unwrap_err();
        assert!(matches!(err, AppError::ParticipantNotFound));
        assert!(store.list_for_user(1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_non_participant_cannot_read_conversation() {
        let (service, _) = service();
        let conv = service.create(&user(1), &[2], None).await.unwrap();
        let err = service.get_for(&user(3), conv.id).await.unwrap_err();
        assert!(matches!(err, AppError::NotAParticipant));
        let err = service.get_for(&user(3), 999).await.unwrap_err();
        assert!(matches!(err, AppError::ConversationNotFound));
    }

    #[tokio::test]
    async fn test_direct_access_rules() {
        let (service, _) = service();
        assert!(matches!(
            service.get_or_create_direct(&user(3), 1, 2).await.unwrap_err(),
            AppError::Forbidden(_)
        ));
        assert!(matches!(
            service.get_or_create_direct(&user(1), 1, 1).await.unwrap_err(),
            AppError::BadRequest(_)
        ));
        assert!(matches!(
            service.get_or_create_direct(&user(1), 1, 77).await.unwrap_err(),
            AppError::ParticipantNotFound
        ));
    }

    #[tokio::test]
    async fn test_concurrent_get_or_create_direct_converges() {
        let (service, store) = service();
        let mut tasks = Vec::new();
        for i in 0..16 {
            let service = service.clone();
            tasks.push(tokio::spawn(async move {
                if i % 2 == 0 {
                    service.get_or_create_direct(&user(1), 1, 2).await
                } else {
                    service.get_or_create_direct(&user(2), 2, 1).await
                }
            }));
        }
        let mut ids = BTreeSet::new();
        for task in tasks {
            ids.insert(task.await.unwrap().unwrap().id);
        }
        assert_eq!(ids.len(), 1);
        assert_eq!(store.list_for_user(1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_history_pages_concatenate_to_full_history() {
        let (service, store) = service();
        let conv = service.create(&user(1), &[2], None).await.unwrap();
        for i in 0..7 {
            send(&store, conv.id, 1 + (i % 2), &format!("m{i}")).await;
        }

        let full = service.history(&user(1), conv.id, Some(200), None).await.unwrap();
        assert_eq!(full.items.len(), 7);

        let mut paged = Vec::new();
        for offset in [6, 3, 0] {
            let page = service
                .history(&user(2), conv.id, Some(3), Some(offset))
                .await
                .unwrap();
            paged.extend(page.items);
        }
        assert_eq!(paged, full.items);
    }

    #[tokio::test]
    async fn test_history_validates_paging() {
        let (service, _) = service();
        let conv = service.create(&user(1), &[2], None).await.unwrap();
        for (limit, offset) in [(Some(0), None), (Some(201), None), (None, Some(-1))] {
            let err = service
                .history(&user(1), conv.id, limit, offset)
                .await
                .unwrap_err();
            assert!(matches!(err, AppError::BadRequest(_)));
        }
        let err = service.history(&user(3), conv.id, None, None).await.unwrap_err();
        assert!(matches!(err, AppError::NotAParticipant));
    }

    #[tokio::test]
    async fn test_mark_read_rules() {
        let (service, store) = service();
        let conv = service.create(&user(1), &[2], None).await.unwrap();
        let message = send(&store, conv.id, 1, "hello").await;

        let err = service.mark_read(&user(1), message.id).await.unwrap_err();
        assert!(matches!(err, AppError::OwnMessage));

        let err = service.mark_read(&user(3), message.id).await.unwrap_err();
        assert!(matches!(err, AppError::NotAParticipant));

        assert!(message.is_read);
        let read = service.mark_read(&user(2), message.id).await.unwrap();
        assert!(read.is_read);
        assert_eq!(read.sent_at, message.sent_at);
        let again = service.mark_read(&user(2), message.id).await.unwrap();
        assert!(again.is_read);

        let err = service.mark_read(&user(2), 999).await.unwrap_err();
        assert!(matches!(err, AppError::MessageNotFound));
    }

    #[tokio::test]
    async fn test_list_orders_by_latest_message() {
        let (service, store) = service();
        let quiet = service.create(&user(1), &[4], None).await.unwrap();
        let older = service.create(&user(1), &[2], None).await.unwrap();
        let newer = service.create(&user(1), &[3], None).await.unwrap();
        send(&store, older.id, 2, "first").await;
        send(&store, newer.id, 3, "second").await;

        let items = service.list_for_user(&user(1), 1).await.unwrap();
        let ids: Vec<_> = items.iter().map(|i| i.conversation.id).collect();
        assert_eq!(ids, vec![newer.id, older.id, quiet.id]);
        // Messages are stored read, so the inbox shows nothing unread.
        assert!(items.iter().all(|item| item.unread_count == 0));

        let err = service.list_for_user(&user(2), 1).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }
}
