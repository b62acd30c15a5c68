//! Repository for conversations and messages

use crate::error::RepositoryError;
use crate::models::{Conversation, ConversationSummary, Message};
use crate::repositories::{ChatRepository, RepoResult};
use chrono::NaiveDateTime;
use sqlx::PgPool;
use uuid::Uuid;

const CONVERSATION_COLUMNS: &str = "id, case_id, customer_id, provider_id, created_at, last_message_at";
const MESSAGE_COLUMNS: &str = "id, conversation_id, sender_id, body, created_at, read_at";

pub struct PgChatRepository {
    pool: PgPool,
}

impl PgChatRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl ChatRepository for PgChatRepository {
    async fn find_or_create_conversation(
        &self,
        customer_id: Uuid,
        provider_id: Uuid,
        case_id: Option<Uuid>,
    ) -> RepoResult<Conversation> {
        let inserted = sqlx::query_as::<_, Conversation>(&format!(
            r#"
            INSERT INTO conversations (customer_id, provider_id, case_id)
            VALUES ($1, $2, $3)
            ON CONFLICT DO NOTHING
            RETURNING {}
            "#,
            CONVERSATION_COLUMNS
        ))
        .bind(customer_id)
        .bind(provider_id)
        .bind(case_id)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(conversation) = inserted {
            return Ok(conversation);
        }

        // Lost the race or already existed
        let existing = sqlx::query_as::<_, Conversation>(&format!(
            r#"
            SELECT {}
            FROM conversations
            WHERE customer_id = $1 AND provider_id = $2 AND case_id IS NOT DISTINCT FROM $3
            "#,
            CONVERSATION_COLUMNS
        ))
        .bind(customer_id)
        .bind(provider_id)
        .bind(case_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(existing)
    }

    async fn find_conversation(&self, id: Uuid) -> RepoResult<Option<Conversation>> {
        let conversation = sqlx::query_as::<_, Conversation>(&format!(
            "SELECT {} FROM conversations WHERE id = $1",
            CONVERSATION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(conversation)
    }

    async fn list_for_user(&self, user_id: Uuid, limit: i64, offset: i64) -> RepoResult<Vec<ConversationSummary>> {
        let rows = sqlx::query_as::<_, ConversationSummary>(
            r#"
            SELECT c.id, c.case_id, c.customer_id, c.provider_id, c.created_at, c.last_message_at,
                   (SELECT COUNT(*) FROM messages m
                     WHERE m.conversation_id = c.id AND m.sender_id <> $1 AND m.read_at IS NULL
                   ) AS unread_count
            FROM conversations c
            WHERE c.customer_id = $1 OR c.provider_id = $1
            ORDER BY c.last_message_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn add_message(&self, message: Message) -> RepoResult<Message> {
        let mut tx = self.pool.begin().await?;

        let touched = sqlx::query("UPDATE conversations SET last_message_at = $2 WHERE id = $1")
            .bind(message.conversation_id)
            .bind(message.created_at)
            .execute(&mut *tx)
            .await?;
        if touched.rows_affected() == 0 {
            return Err(RepositoryError::NotFound("Conversation not found".to_string()));
        }

        let stored = sqlx::query_as::<_, Message>(&format!(
            r#"
            INSERT INTO messages ({cols})
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {cols}
            "#,
            cols = MESSAGE_COLUMNS
        ))
        .bind(message.id)
        .bind(message.conversation_id)
        .bind(message.sender_id)
        .bind(&message.body)
        .bind(message.created_at)
        .bind(message.read_at)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(stored)
    }

    async fn list_messages(
        &self,
        conversation_id: Uuid,
        before: Option<NaiveDateTime>,
        limit: i64,
    ) -> RepoResult<Vec<Message>> {
        let mut messages = sqlx::query_as::<_, Message>(&format!(
            r#"
            SELECT {}
            FROM messages
            WHERE conversation_id = $1 AND ($2::TIMESTAMP IS NULL OR created_at < $2)
            ORDER BY created_at DESC
            LIMIT $3
            "#,
            MESSAGE_COLUMNS
        ))
        .bind(conversation_id)
        .bind(before)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        messages.reverse();
        Ok(messages)
    }

    async fn mark_read(&self, conversation_id: Uuid, reader_id: Uuid) -> RepoResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE messages
            SET read_at = NOW()
            WHERE conversation_id = $1 AND sender_id <> $2 AND read_at IS NULL
            "#,
        )
        .bind(conversation_id)
        .bind(reader_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
