use super::extract::{ApiJson, ApiPath, ApiQuery};
use super::response::{created, ok, ApiResult, CreatedResult};
use crate::auth::AuthUser;
use crate::models::{Conversation, ConversationSummary, Message};
use crate::services::{OpenConversationRequest, Pagination};
use crate::AppState;
use axum::extract::State;
use axum::routing::{get, post};
use axum::Router;
use chrono::NaiveDateTime;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_conversations).post(open_conversation))
        .route("/:id/messages", get(list_messages).post(send_message))
        .route("/:id/read", post(mark_read))
}

#[derive(Debug, Deserialize)]
struct MessagesQuery {
    before: Option<NaiveDateTime>,
    limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct SendMessageRequest {
    body: String,
}

async fn list_conversations(
    State(state): State<AppState>,
    user: AuthUser,
    ApiQuery(page): ApiQuery<Pagination>,
) -> ApiResult<Vec<ConversationSummary>> {
    ok(state.chat.list_conversations(&user, page).await?)
}

async fn open_conversation(
    State(state): State<AppState>,
    user: AuthUser,
    ApiJson(payload): ApiJson<OpenConversationRequest>,
) -> ApiResult<Conversation> {
    ok(state.chat.open_conversation(&user, payload).await?)
}

async fn list_messages(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiQuery(query): ApiQuery<MessagesQuery>,
) -> ApiResult<Vec<Message>> {
    ok(state
        .chat
        .list_messages(&user, id, query.before, query.limit)
        .await?)
}

async fn send_message(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<SendMessageRequest>,
) -> CreatedResult<Message> {
    created(state.chat.send_message(&user, id, &payload.body).await?)
}

async fn mark_read(State(state): State<AppState>, user: AuthUser, ApiPath(id): ApiPath<Uuid>) -> ApiResult<Value> {
    let marked = state.chat.mark_read(&user, id).await?;
    ok(json!({ "marked_read": marked }))
}
