use crate::auth::AuthUser;
use crate::error::{AppError, AppResult};
use crate::models::{Conversation, ConversationSummary, Message, UserRole};
use crate::repositories::Repositories;
use crate::services::Pagination;
use crate::websocket::WebSocketServer;
use chrono::NaiveDateTime;
use serde::Deserialize;
use tracing::debug;
use uuid::Uuid;

const MAX_MESSAGE_CHARS: usize = 4000;

#[derive(Debug, Clone, Deserialize)]
pub struct OpenConversationRequest {
    /// The provider when a customer opens the chat, the customer otherwise
    pub participant_id: Uuid,
    #[serde(default)]
    pub case_id: Option<Uuid>,
}

/// Customer and provider messaging
pub struct ChatService {
    repos: Repositories,
    ws: WebSocketServer,
}

impl ChatService {
    pub fn new(repos: Repositories, ws: WebSocketServer) -> Self {
        Self { repos, ws }
    }

    /// Conversation the user takes part in
    async fn load_for(&self, user: &AuthUser, conversation_id: Uuid) -> AppResult<Conversation> {
        let conversation = self
            .repos
            .chat
            .find_conversation(conversation_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Conversation not found".to_string()))?;

        if !conversation.is_participant(user.id) {
            return Err(AppError::Forbidden("You are not part of this conversation".to_string()));
        }
        Ok(conversation)
    }

    pub async fn open_conversation(&self, user: &AuthUser, request: OpenConversationRequest) -> AppResult<Conversation> {
        let other = self
            .repos
            .users
            .find_by_id(request.participant_id)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        let (customer_id, provider_id) = match (user.role, other.role_enum()) {
            (UserRole::Customer, UserRole::Provider) => (user.id, other.id),
            (UserRole::Provider, UserRole::Customer) => (other.id, user.id),
            _ => {
                return Err(AppError::Validation(
                    "Conversations are between a customer and a provider".to_string(),
                ))
            }
        };

        if let Some(case_id) = request.case_id {
            let case = self
                .repos
                .cases
                .find_by_id(case_id)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("Case {} not found", case_id)))?;
            if case.customer_id != customer_id {
                return Err(AppError::Forbidden("Case belongs to another customer".to_string()));
            }
        }

        Ok(self
            .repos
            .chat
            .find_or_create_conversation(customer_id, provider_id, request.case_id)
            .await?)
    }

    pub async fn list_conversations(&self, user: &AuthUser, page: Pagination) -> AppResult<Vec<ConversationSummary>> {
        Ok(self
            .repos
            .chat
            .list_for_user(user.id, page.limit(), page.offset())
            .await?)
    }

    pub async fn send_message(&self, user: &AuthUser, conversation_id: Uuid, body: &str) -> AppResult<Message> {
        let body = body.trim();
        let len = body.chars().count();
        if len == 0 || len > MAX_MESSAGE_CHARS {
            return Err(AppError::Validation(format!(
                "Message must be between 1 and {} characters",
                MAX_MESSAGE_CHARS
            )));
        }

        let conversation = self.load_for(user, conversation_id).await?;
        let message = self
            .repos
            .chat
            .add_message(Message::new(conversation_id, user.id, body.to_string()))
            .await?;
        debug!("Message {} in conversation {}", message.id, conversation_id);

        self.ws
            .broadcast_new_message(
                conversation_id,
                message.id,
                user.id,
                conversation.counterpart(user.id),
                message.created_at,
            )
            .await;

        Ok(message)
    }

    pub async fn list_messages(
        &self,
        user: &AuthUser,
        conversation_id: Uuid,
        before: Option<NaiveDateTime>,
        limit: Option<i64>,
    ) -> AppResult<Vec<Message>> {
        self.load_for(user, conversation_id).await?;
        let limit = limit.unwrap_or(50).clamp(1, 100);
        Ok(self.repos.chat.list_messages(conversation_id, before, limit).await?)
    }

    /// Returns how many messages were marked
    pub async fn mark_read(&self, user: &AuthUser, conversation_id: Uuid) -> AppResult<u64> {
        self.load_for(user, conversation_id).await?;
        Ok(self.repos.chat.mark_read(conversation_id, user.id).await?)
    }
}
