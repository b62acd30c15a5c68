use super::extract::{ApiJson, ApiQuery};
use super::response::{ok, ApiResult};
use crate::auth::AuthUser;
use crate::models::{PointsPackage, PointsTransaction};
use crate::AppState;
use axum::extract::State;
use axum::routing::{get, post};
use axum::Router;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/balance", get(balance))
        .route("/transactions", get(history))
        .route("/purchase", post(purchase))
        .route("/grant", post(grant))
}

#[derive(Debug, Deserialize)]
struct HistoryQuery {
    limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct PurchaseRequest {
    package: PointsPackage,
}

#[derive(Debug, Deserialize)]
struct GrantRequest {
    provider_id: Uuid,
    amount: i64,
    #[serde(default)]
    reason: Option<String>,
}

async fn balance(State(state): State<AppState>, user: AuthUser) -> ApiResult<Value> {
    let balance = state.points.balance(&user).await?;
    ok(json!({ "points_balance": balance }))
}

async fn history(
    State(state): State<AppState>,
    user: AuthUser,
    ApiQuery(query): ApiQuery<HistoryQuery>,
) -> ApiResult<Vec<PointsTransaction>> {
    ok(state.points.history(&user, query.limit.unwrap_or(50)).await?)
}

async fn purchase(
    State(state): State<AppState>,
    user: AuthUser,
    ApiJson(payload): ApiJson<PurchaseRequest>,
) -> ApiResult<PointsTransaction> {
    ok(state.points.purchase(&user, payload.package).await?)
}

async fn grant(
    State(state): State<AppState>,
    user: AuthUser,
    ApiJson(payload): ApiJson<GrantRequest>,
) -> ApiResult<PointsTransaction> {
    ok(state
        .points
        .grant(&user, payload.provider_id, payload.amount, payload.reason)
        .await?)
}
