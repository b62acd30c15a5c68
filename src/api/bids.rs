use super::extract::{ApiJson, ApiPath};
use super::response::{created, ok, ApiResult, CreatedResult};
use crate::auth::AuthUser;
use crate::bidding::Eligibility;
use crate::models::Bid;
use crate::repositories::{PlacedBid, WinnerSelection};
use crate::services::PlaceBidRequest;
use crate::AppState;
use axum::extract::State;
use axum::routing::{get, post};
use axum::Router;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/:id/bids", get(list_bids).post(place_bid))
        .route("/:id/can-bid", get(can_bid))
        .route("/:id/bids/:bid_id/select", post(select_winner))
}

async fn list_bids(State(state): State<AppState>, user: AuthUser, ApiPath(id): ApiPath<uuid::Uuid>) -> ApiResult<Vec<Bid>> {
    ok(state.bidding.list_bids(&user, id).await?)
}

async fn place_bid(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<uuid::Uuid>,
    ApiJson(payload): ApiJson<PlaceBidRequest>,
) -> CreatedResult<PlacedBid> {
    created(state.bidding.place_bid(&user, id, payload).await?)
}

async fn can_bid(State(state): State<AppState>, user: AuthUser, ApiPath(id): ApiPath<uuid::Uuid>) -> ApiResult<Eligibility> {
    ok(state.bidding.can_bid(&user, id).await?)
}

async fn select_winner(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath((id, bid_id)): ApiPath<(uuid::Uuid, uuid::Uuid)>,
) -> ApiResult<WinnerSelection> {
    ok(state.bidding.select_winner(&user, id, bid_id).await?)
}
