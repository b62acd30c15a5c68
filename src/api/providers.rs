use super::extract::{ApiJson, ApiPath, ApiQuery};
use super::response::{ok, ApiResult};
use crate::auth::AuthUser;
use crate::models::{Bid, ProviderProfile, ProviderProfileInput, Review};
use crate::services::{Pagination, ProviderDashboard};
use crate::AppState;
use axum::extract::State;
use axum::routing::get;
use axum::Router;
use serde::Deserialize;
use uuid::Uuid;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(search))
        .route("/me", get(my_profile).put(upsert_profile))
        .route("/me/dashboard", get(dashboard))
        .route("/me/bids", get(my_bids))
        .route("/:id", get(get_profile))
        .route("/:id/reviews", get(list_reviews))
}

#[derive(Debug, Default, Deserialize)]
struct SearchQuery {
    category: Option<String>,
    city: Option<String>,
    page: Option<i64>,
    limit: Option<i64>,
}

async fn search(State(state): State<AppState>, ApiQuery(query): ApiQuery<SearchQuery>) -> ApiResult<Vec<ProviderProfile>> {
    let page = Pagination {
        page: query.page,
        limit: query.limit,
    };
    ok(state
        .providers
        .search(query.category.as_deref(), query.city.as_deref(), page)
        .await?)
}

async fn my_profile(State(state): State<AppState>, user: AuthUser) -> ApiResult<ProviderProfile> {
    ok(state.providers.get_profile(user.id).await?)
}

async fn upsert_profile(
    State(state): State<AppState>,
    user: AuthUser,
    ApiJson(payload): ApiJson<ProviderProfileInput>,
) -> ApiResult<ProviderProfile> {
    ok(state.providers.upsert_profile(&user, payload).await?)
}

async fn dashboard(State(state): State<AppState>, user: AuthUser) -> ApiResult<ProviderDashboard> {
    ok(state.providers.dashboard(&user).await?)
}

async fn my_bids(State(state): State<AppState>, user: AuthUser) -> ApiResult<Vec<Bid>> {
    ok(state.bidding.my_bids(&user).await?)
}

async fn get_profile(State(state): State<AppState>, ApiPath(id): ApiPath<Uuid>) -> ApiResult<ProviderProfile> {
    ok(state.providers.get_profile(id).await?)
}

async fn list_reviews(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ApiQuery(page): ApiQuery<Pagination>,
) -> ApiResult<Vec<Review>> {
    ok(state.reviews.list_reviews(id, page).await?)
}
