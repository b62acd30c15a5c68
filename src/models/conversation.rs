use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Chat thread between a customer and a provider, optionally about a case
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Conversation {
    pub id: Uuid,
    pub case_id: Option<Uuid>,
    pub customer_id: Uuid,
    pub provider_id: Uuid,
    pub created_at: NaiveDateTime,
    pub last_message_at: NaiveDateTime,
}

impl Conversation {
    pub fn new(customer_id: Uuid, provider_id: Uuid, case_id: Option<Uuid>) -> Self {
        let now = chrono::Utc::now().naive_utc();
        Self {
            id: Uuid::new_v4(),
            case_id,
            customer_id,
            provider_id,
            created_at: now,
            last_message_at: now,
        }
    }

    pub fn is_participant(&self, user_id: Uuid) -> bool {
        self.customer_id == user_id || self.provider_id == user_id
    }

    /// The participant that is not `user_id`
    pub fn counterpart(&self, user_id: Uuid) -> Uuid {
        if self.customer_id == user_id {
            self.provider_id
        } else {
            self.customer_id
        }
    }
}

/// Conversation list row with the caller's unread count
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ConversationSummary {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub conversation: Conversation,
    pub unread_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Message {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub body: String,
    pub created_at: NaiveDateTime,
    pub read_at: Option<NaiveDateTime>,
}

impl Message {
    pub fn new(conversation_id: Uuid, sender_id: Uuid, body: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            conversation_id,
            sender_id,
            body,
            created_at: chrono::Utc::now().naive_utc(),
            read_at: None,
        }
    }
}
