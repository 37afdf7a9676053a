use crate::error::{AppError, AppResult};
use crate::models::{ConversationId, Message, MessageKind, NewMessage, UserId};
use crate::store::SharedStore;
use crate::websocket::ConnectionRegistry;
use tracing::{debug, error};

/// Sole writer of new messages and the single point of fan-out.
#[derive(Clone)]
pub struct MessageRouter {
    store: SharedStore,
    registry: ConnectionRegistry,
}

impl MessageRouter {
    pub fn new(store: SharedStore, registry: ConnectionRegistry) -> Self {
        Self { store, registry }
    }

    /// Persist a message from `sender_id` and push it to every online participant,
    /// the sender included. A frame without content or attachment is still stored;
    /// it just leaves the conversation preview as it was.
    pub async fn route_inbound(
        &self,
        sender_id: UserId,
        conversation_id: ConversationId,
        kind: MessageKind,
        content: Option<String>,
        attachment_url: Option<String>,
    ) -> AppResult<Message> {
        let content = content.filter(|c| !c.is_empty());
        let attachment_url = attachment_url.filter(|u| !u.is_empty());

        self.ensure_participant(conversation_id, sender_id).await?;

        let message = self
            .store
            .append_message(NewMessage {
                conversation_id,
                sender_id,
                content,
                attachment_url,
                kind,
            })
            .await?;

        let participants = self.store.participant_ids(conversation_id).await?;
        let payload = serde_json::to_string(&message).map_err(|e| {
            error!(error = %e, message_id = message.id, "failed to serialize message");
            AppError::Internal
        })?;
        let delivered = self.registry.broadcast(&payload, &participants);

        debug!(
            message_id = message.id,
            conversation_id,
            sender_id,
            recipients = participants.len(),
            delivered,
            "message routed"
        );
        Ok(message)
    }

    async fn ensure_participant(
        &self,
        conversation_id: ConversationId,
        user_id: UserId,
    ) -> AppResult<()> {
        if self.store.is_participant(conversation_id, user_id).await? {
            return Ok(());
        }
        match self.store.get_conversation(conversation_id).await? {
            Some(_) => Err(AppError::NotAParticipant),
            None => Err(AppError::ConversationNotFound),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{UserIdentity, UserRole};
    use crate::store::{ConversationStore, MemoryConversationStore};
    use std::sync::Arc;

    async fn setup() -> (MessageRouter, SharedStore, ConnectionRegistry, ConversationId) {
        let users = vec![
            UserIdentity::new(1, UserRole::Patient),
            UserIdentity::new(2, UserRole::Physician),
            UserIdentity::new(3, UserRole::Pharmacy),
        ];
        let store: SharedStore = Arc::new(MemoryConversationStore::with_users(users.clone()));
        let conversation = store
            .create_conversation(&users[..2], None)
            .await
            .unwrap();
        let registry = ConnectionRegistry::new();
        let router = MessageRouter::new(store.clone(), registry.clone());
        (router, store, registry, conversation.id)
    }

    #[tokio::test]
    async fn test_routes_to_all_online_participants() {
        let (router, store, registry, conv) = setup().await;
        let (_r1, mut rx1) = registry.connect(1);
        let (_r2, mut rx2) = registry.connect(2);
        let (_r3, mut rx3) = registry.connect(3);

        let message = router
            .route_inbound(1, conv, MessageKind::Text, Some("Hello".into()), None)
            .await
            .unwrap();

        let frame: serde_json::Value = serde_json::from_str(&rx2.try_recv().unwrap()).unwrap();
        assert_eq!(frame["content"], "Hello");
        assert_eq!(frame["sender_id"], 1);
        assert_eq!(frame["is_read"], true);
        assert!(message.is_read);
        assert!(rx1.try_recv().is_ok());
        assert!(rx3.try_recv().is_err());

        let summary = store.get_conversation(conv).await.unwrap().unwrap();
        assert_eq!(summary.last_message_at, Some(message.sent_at));
        assert_eq!(summary.last_message_preview.as_deref(), Some("Hello"));
    }

    #[tokio::test]
    async fn test_rejects_non_participant() {
        let (router, store, _registry, conv) = setup().await;
        let err = router
            .route_inbound(3, conv, MessageKind::Text, Some("hi".into()), None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotAParticipant));
        assert_eq!(store.message_history(conv, 50, 0).await.unwrap().total, 0);
    }

    #[tokio::test]
    async fn test_unknown_conversation() {
        let (router, _store, _registry, _conv) = setup().await;
        let err = router
            .route_inbound(1, 404, MessageKind::Text, Some("hi".into()), None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ConversationNotFound));
    }

    #[tokio::test]
    async fn test_bodyless_message_keeps_preview() {
        let (router, store, _registry, conv) = setup().await;
        router
            .route_inbound(1, conv, MessageKind::Text, Some("Hello".into()), None)
            .await
            .unwrap();

        let empty = router
            .route_inbound(2, conv, MessageKind::Text, Some(String::new()), None)
            .await
            .unwrap();
        assert_eq!(empty.content, None);
        assert_eq!(empty.attachment_url, None);

        let history = store.message_history(conv, 50, 0).await.unwrap();
        assert_eq!(history.total, 2);
        let summary = store.get_conversation(conv).await.unwrap().unwrap();
        assert_eq!(summary.last_message_at, Some(empty.sent_at));
        assert_eq!(summary.last_message_preview.as_deref(), Some("Hello"));
    }

    #[tokio::test]
    async fn test_attachment_only_preview() {
        let (router, store, _registry, conv) = setup().await;
        router
            .route_inbound(
                2,
                conv,
                MessageKind::Image,
                None,
                Some("http://localhost/media/chat/x.png".into()),
            )
            .await
            .unwrap();
        let summary = store.get_conversation(conv).await.unwrap().unwrap();
        assert_eq!(
            summary.last_message_preview.as_deref(),
            Some("Image attachment")
        );
    }

    #[tokio::test]
    async fn test_concurrent_sends_keep_summary_on_latest() {
        let (router, store, _registry, conv) = setup().await;
        let mut tasks = Vec::new();
        for i in 0..20 {
            let router = router.clone();
            tasks.push(tokio::spawn(async move {
                let body = Some(format!("m{i}"));
                router
                    .route_inbound(1 + (i % 2), conv, MessageKind::Text, body, None)
                    .await
            }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let history = store.message_history(conv, 200, 0).await.unwrap();
        assert_eq!(history.total, 20);
        let newest = history.items.last().unwrap();
        let summary = store.get_conversation(conv).await.unwrap().unwrap();
        assert_eq!(summary.last_message_at, Some(newest.sent_at));
        assert_eq!(summary.last_message_preview, newest.content);
        assert!(history
            .items
            .windows(2)
            .all(|pair| pair[0].sent_at < pair[1].sent_at));
    }
}
