use super::ConversationStore;
use crate::error::{AppError, AppResult};
use crate::models::{
    next_timestamp, ConversationId, ConversationListItem, ConversationSummary, HistoryPage,
    Message, MessageId, MessageKind, NewMessage, UserId, UserIdentity, UserRole,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgConnection, PgPool, Postgres, Transaction};
use tracing::debug;

const SUMMARY_COLUMNS: &str = r#"
    c.id, c.title, c.created_at, c.updated_at, c.last_message_at, c.last_message_preview,
    ARRAY(
        SELECT p.user_id FROM conversation_participants p
        WHERE p.conversation_id = c.id ORDER BY p.user_id
    ) AS participant_ids
"#;

const MESSAGE_COLUMNS: &str =
    "id, conversation_id, sender_id, content, attachment_url, message_type, sent_at, is_read";

#[derive(Debug, FromRow)]
struct UserRow {
    id: i64,
    role: String,
    is_active: bool,
}

impl From<UserRow> for UserIdentity {
    fn from(row: UserRow) -> Self {
        UserIdentity {
            id: row.id,
            role: UserRole::from_tag(&row.role),
            is_active: row.is_active,
        }
    }
}

#[derive(Debug, FromRow)]
struct SummaryRow {
    id: i64,
    title: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    last_message_at: Option<DateTime<Utc>>,
    last_message_preview: Option<String>,
    participant_ids: Vec<i64>,
}

impl From<SummaryRow> for ConversationSummary {
    fn from(row: SummaryRow) -> Self {
        ConversationSummary {
            id: row.id,
            title: row.title,
            created_at: row.created_at,
            updated_at: row.updated_at,
            last_message_at: row.last_message_at,
            last_message_preview: row.last_message_preview,
            participant_ids: row.participant_ids,
        }
    }
}

#[derive(Debug, FromRow)]
struct ListRow {
    #[sqlx(flatten)]
    summary: SummaryRow,
    unread_count: i64,
}

#[derive(Debug, FromRow)]
struct MessageRow {
    id: i64,
    conversation_id: i64,
    sender_id: i64,
    content: Option<String>,
    attachment_url: Option<String>,
    message_type: String,
    sent_at: DateTime<Utc>,
    is_read: bool,
}

impl From<MessageRow> for Message {
    fn from(row: MessageRow) -> Self {
        Message {
            id: row.id,
            conversation_id: row.conversation_id,
            sender_id: row.sender_id,
            content: row.content,
            attachment_url: row.attachment_url,
            kind: MessageKind::from_tag(&row.message_type),
            sent_at: row.sent_at,
            is_read: row.is_read,
        }
    }
}

/// Advisory lock key shared by both orderings of a user pair.
fn pair_lock_key(a: UserId, b: UserId) -> i64 {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    lo.wrapping_mul(0x9E37_79B9_7F4A_7C15_u64 as i64) ^ hi
}

/// Postgres-backed store. Queries are checked at runtime so the crate builds
/// without a live database.
#[derive(Clone)]
pub struct PgConversationStore {
    pool: PgPool,
}

impl PgConversationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn insert_conversation(
        tx: &mut Transaction<'_, Postgres>,
        participants: &[UserIdentity],
        title: Option<&str>,
    ) -> AppResult<ConversationId> {
        let (id,): (i64,) =
            sqlx::query_as("INSERT INTO conversations (title) VALUES ($1) RETURNING id")
                .bind(title)
                .fetch_one(&mut **tx)
                .await?;

        for participant in participants {
            sqlx::query(
                "INSERT INTO conversation_participants (conversation_id, user_id, role) \
                 VALUES ($1, $2, $3)",
            )
            .bind(id)
            .bind(participant.id)
            .bind(participant.participant_role().as_str())
            .execute(&mut **tx)
            .await
            .map_err(|e| {
                let unknown_user = matches!(
                    &e,
                    sqlx::Error::Database(db) if db.is_foreign_key_violation()
                );
                if unknown_user {
                    AppError::ParticipantNotFound
                } else {
                    AppError::Database(e)
                }
            })?;
        }

        Ok(id)
    }

    async fn load_summary(
        conn: &mut PgConnection,
        id: ConversationId,
    ) -> AppResult<Option<ConversationSummary>> {
        let sql = summary_by_id_sql();
        let row: Option<SummaryRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(conn)
            .await?;
        Ok(row.map(Into::into))
    }
}

fn summary_by_id_sql() -> String {
    format!("SELECT {SUMMARY_COLUMNS} FROM conversations c WHERE c.id = $1")
}

#[async_trait]
impl ConversationStore for PgConversationStore {
    async fn upsert_user(&self, user: &UserIdentity) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO users (id, role, is_active) VALUES ($1, $2, $3) \
             ON CONFLICT (id) DO UPDATE SET role = EXCLUDED.role, is_active = EXCLUDED.is_active",
        )
        .bind(user.id)
        .bind(user.role.as_str())
        .bind(user.is_active)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_user(&self, id: UserId) -> AppResult<Option<UserIdentity>> {
        let row: Option<UserRow> =
            sqlx::query_as("SELECT id, role, is_active FROM users WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(Into::into))
    }

    async fn find_users(&self, ids: &[UserId]) -> AppResult<Vec<UserIdentity>> {
        let rows: Vec<UserRow> =
            sqlx::query_as("SELECT id, role, is_active FROM users WHERE id = ANY($1)")
                .bind(ids)
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn create_conversation(
        &self,
        participants: &[UserIdentity],
        title: Option<&str>,
    ) -> AppResult<ConversationSummary> {
        let mut tx = self.pool.begin().await?;
        let id = Self::insert_conversation(&mut tx, participants, title).await?;
        let summary = Self::load_summary(&mut *tx, id)
            .await?
            .ok_or(AppError::Internal)?;
        tx.commit().await?;

        debug!(
            conversation_id = id,
            participants = participants.len(),
            "conversation created"
        );
        Ok(summary)
    }

    async fn get_or_create_direct(
        &self,
        a: &UserIdentity,
        b: &UserIdentity,
    ) -> AppResult<ConversationSummary> {
        let mut tx = self.pool.begin().await?;

        // Serializes concurrent callers for the same pair until commit.
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(pair_lock_key(a.id, b.id))
            .execute(&mut *tx)
            .await?;

        let existing: Option<(i64,)> = sqlx::query_as(
            r#"
            SELECT cp.conversation_id
            FROM conversation_participants cp
            WHERE cp.conversation_id IN (
                SELECT conversation_id FROM conversation_participants WHERE user_id = $1
            )
            GROUP BY cp.conversation_id
            HAVING COUNT(*) = 2 AND bool_and(cp.user_id = ANY($2))
            ORDER BY cp.conversation_id
            LIMIT 1
            "#,
        )
        .bind(a.id)
        .bind(vec![a.id, b.id])
        .fetch_optional(&mut *tx)
        .await?;

        let id = match existing {
            Some((id,)) => id,
            None => {
                let pair = [a.clone(), b.clone()];
                let id = Self::insert_conversation(&mut tx, &pair, None).await?;
                debug!(
                    conversation_id = id,
                    user_a = a.id,
                    user_b = b.id,
                    "direct conversation created"
                );
                id
            }
        };

        let summary = Self::load_summary(&mut *tx, id)
            .await?
            .ok_or(AppError::Internal)?;
        tx.commit().await?;
        Ok(summary)
    }

    async fn get_conversation(&self, id: ConversationId) -> AppResult<Option<ConversationSummary>> {
        let sql = summary_by_id_sql();
        let row: Option<SummaryRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Into::into))
    }

    async fn participant_ids(&self, id: ConversationId) -> AppResult<Vec<UserId>> {
        let rows: Vec<(i64,)> = sqlx::query_as(
            "SELECT user_id FROM conversation_participants \
             WHERE conversation_id = $1 ORDER BY user_id",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    async fn is_participant(&self, id: ConversationId, user_id: UserId) -> AppResult<bool> {
        let (exists,): (bool,) = sqlx::query_as(
            "SELECT EXISTS(SELECT 1 FROM conversation_participants \
             WHERE conversation_id = $1 AND user_id = $2)",
        )
        .bind(id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn list_for_user(&self, user_id: UserId) -> AppResult<Vec<ConversationListItem>> {
        let sql = format!(
            r#"
            SELECT {SUMMARY_COLUMNS},
                (
                    SELECT COUNT(*) FROM messages m
                    WHERE m.conversation_id = c.id AND m.sender_id <> $1 AND m.is_read = FALSE
                ) AS unread_count
            FROM conversations c
            JOIN conversation_participants me
                ON me.conversation_id = c.id AND me.user_id = $1
            ORDER BY c.last_message_at DESC NULLS LAST, c.id DESC
            "#
        );
        let rows: Vec<ListRow> = sqlx::query_as(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| ConversationListItem {
                conversation: row.summary.into(),
                unread_count: row.unread_count,
            })
            .collect())
    }

    async fn append_message(&self, message: NewMessage) -> AppResult<Message> {
        let mut tx = self.pool.begin().await?;

        // Row lock serializes writers on this conversation.
        let locked: Option<(Option<DateTime<Utc>>,)> =
            sqlx::query_as("SELECT last_message_at FROM conversations WHERE id = $1 FOR UPDATE")
                .bind(message.conversation_id)
                .fetch_optional(&mut *tx)
                .await?;
        let (last_message_at,) = locked.ok_or(AppError::ConversationNotFound)?;

        let sent_at = next_timestamp(Utc::now(), last_message_at);
        let preview = message.preview();

        let sql = format!(
            "INSERT INTO messages \
             (conversation_id, sender_id, content, attachment_url, message_type, sent_at, is_read) \
             VALUES ($1, $2, $3, $4, $5, $6, TRUE) RETURNING {MESSAGE_COLUMNS}"
        );
        let row: MessageRow = sqlx::query_as(&sql)
            .bind(message.conversation_id)
            .bind(message.sender_id)
            .bind(&message.content)
            .bind(&message.attachment_url)
            .bind(message.kind.as_str())
            .bind(sent_at)
            .fetch_one(&mut *tx)
            .await?;

        sqlx::query(
            "UPDATE conversations \
             SET last_message_at = $2, updated_at = NOW(), \
                 last_message_preview = COALESCE($3, last_message_preview) \
             WHERE id = $1",
        )
        .bind(message.conversation_id)
        .bind(sent_at)
        .bind(preview)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(row.into())
    }

    async fn message_history(
        &self,
        id: ConversationId,
        limit: i64,
        offset: i64,
    ) -> AppResult<HistoryPage> {
        let (total,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM messages WHERE conversation_id = $1")
                .bind(id)
                .fetch_one(&self.pool)
                .await?;

        let sql = format!(
            r#"
            SELECT {MESSAGE_COLUMNS} FROM (
                SELECT {MESSAGE_COLUMNS} FROM messages
                WHERE conversation_id = $1
                ORDER BY sent_at DESC, id DESC
                LIMIT $2 OFFSET $3
            ) page
            ORDER BY sent_at ASC, id ASC
            "#
        );
        let rows: Vec<MessageRow> = sqlx::query_as(&sql)
            .bind(id)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        Ok(HistoryPage {
            items: rows.into_iter().map(Into::into).collect(),
            total,
        })
    }

    async fn get_message(&self, id: MessageId) -> AppResult<Option<Message>> {
        let sql = format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = $1");
        let row: Option<MessageRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Into::into))
    }

    async fn mark_read(&self, id: MessageId) -> AppResult<Message> {
        let sql = format!(
            "UPDATE messages SET is_read = TRUE WHERE id = $1 RETURNING {MESSAGE_COLUMNS}"
        );
        let row: Option<MessageRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Into::into).ok_or(AppError::MessageNotFound)
    }
}
