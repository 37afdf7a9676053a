use super::user::UserId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type ConversationId = i64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub id: ConversationId,
    pub title: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_message_at: Option<DateTime<Utc>>,
    pub last_message_preview: Option<String>,
    pub participant_ids: Vec<UserId>,
}

/// Conversation as seen in a user's inbox.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationListItem {
    #[serde(flatten)]
    pub conversation: ConversationSummary,
    /// Messages not sent by the viewer and not yet read.
    pub unread_count: i64,
}

/// Inbox ordering: most recent activity first, conversations without messages last.
pub fn inbox_order(a: &ConversationSummary, b: &ConversationSummary) -> std::cmp::Ordering {
    match (a.last_message_at, b.last_message_at) {
        (Some(x), Some(y)) => y.cmp(&x).then_with(|| b.id.cmp(&a.id)),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => b.id.cmp(&a.id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn summary(id: ConversationId, last: Option<DateTime<Utc>>) -> ConversationSummary {
        let now = Utc::now();
        ConversationSummary {
            id,
            title: None,
            created_at: now,
            updated_at: now,
            last_message_at: last,
            last_message_preview: None,
            participant_ids: vec![1, 2],
        }
    }

    #[test]
    fn test_inbox_order_puts_silent_conversations_last() {
        let now = Utc::now();
        let mut items = vec![
            summary(1, None),
            summary(2, Some(now - Duration::minutes(5))),
            summary(3, Some(now)),
        ];
        items.sort_by(inbox_order);
        let ids: Vec<_> = items.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![3, 2, 1]);
    }

    #[test]
    fn test_list_item_flattens_summary() {
        let item = ConversationListItem {
            conversation: summary(7, None),
            unread_count: 2,
        };
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["id"], 7);
        assert_eq!(json["unread_count"], 2);
        assert_eq!(json["participant_ids"], serde_json::json!([1, 2]));
    }
}
