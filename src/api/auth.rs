use super::extract::ApiJson;
use super::response::{created, ok, ApiResult, CreatedResult};
use crate::auth::AuthUser;
use crate::services::{AuthResponse, LoginRequest, RegisterRequest};
use crate::AppState;
use axum::extract::State;
use axum::routing::{get, post};
use axum::Router;
use serde_json::{json, Value};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/me", get(me))
}

async fn register(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<RegisterRequest>,
) -> CreatedResult<AuthResponse> {
    let response = state.auth.register(payload).await?;
    created(response)
}

async fn login(State(state): State<AppState>, ApiJson(payload): ApiJson<LoginRequest>) -> ApiResult<AuthResponse> {
    ok(state.auth.login(payload).await?)
}

async fn me(State(state): State<AppState>, user: AuthUser) -> ApiResult<Value> {
    let (user, profile) = state.auth.me(user.id).await?;
    ok(json!({ "user": user, "profile": profile }))
}
