use super::extract::{ApiJson, ApiPath, ApiQuery};
use super::response::{created, ok, ApiResult, CreatedResult};
use crate::auth::AuthUser;
use crate::models::{Case, CaseFilter, CaseStatus, Review};
use crate::services::{CreateCaseRequest, CreateReviewRequest, Pagination};
use crate::AppState;
use axum::extract::State;
use axum::routing::{get, post};
use axum::Router;
use serde::Deserialize;
use uuid::Uuid;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_case).get(list_cases))
        .route("/available", get(available_cases))
        .route("/:id", get(get_case))
        .route("/:id/accept", post(accept_case))
        .route("/:id/decline", post(decline_case))
        .route("/:id/undecline", post(undecline_case))
        .route("/:id/complete", post(complete_case))
        .route("/:id/cancel", post(cancel_case))
        .route("/:id/review", post(create_review))
}

#[derive(Debug, Default, Deserialize)]
struct CaseQuery {
    status: Option<CaseStatus>,
    category: Option<String>,
    city: Option<String>,
    customer_id: Option<Uuid>,
    provider_id: Option<Uuid>,
    page: Option<i64>,
    limit: Option<i64>,
}

async fn create_case(
    State(state): State<AppState>,
    user: AuthUser,
    ApiJson(payload): ApiJson<CreateCaseRequest>,
) -> CreatedResult<Case> {
    created(state.cases.create_case(&user, payload).await?)
}

async fn list_cases(State(state): State<AppState>, _user: AuthUser, ApiQuery(query): ApiQuery<CaseQuery>) -> ApiResult<Vec<Case>> {
    let filter = CaseFilter {
        status: query.status,
        category: query.category,
        city: query.city,
        customer_id: query.customer_id,
        provider_id: query.provider_id,
        ..CaseFilter::default()
    };
    let page = Pagination {
        page: query.page,
        limit: query.limit,
    };
    ok(state.cases.list_cases(filter, page).await?)
}

async fn available_cases(
    State(state): State<AppState>,
    user: AuthUser,
    ApiQuery(page): ApiQuery<Pagination>,
) -> ApiResult<Vec<Case>> {
    ok(state.cases.available_cases(&user, page).await?)
}

async fn get_case(State(state): State<AppState>, _user: AuthUser, ApiPath(id): ApiPath<Uuid>) -> ApiResult<Case> {
    ok(state.cases.get_case(id).await?)
}

async fn accept_case(State(state): State<AppState>, user: AuthUser, ApiPath(id): ApiPath<Uuid>) -> ApiResult<Case> {
    ok(state.cases.accept_case(&user, id).await?)
}

async fn decline_case(State(state): State<AppState>, user: AuthUser, ApiPath(id): ApiPath<Uuid>) -> ApiResult<Case> {
    ok(state.cases.decline_case(&user, id).await?)
}

async fn undecline_case(State(state): State<AppState>, user: AuthUser, ApiPath(id): ApiPath<Uuid>) -> ApiResult<Case> {
    ok(state.cases.undecline_case(&user, id).await?)
}

async fn complete_case(State(state): State<AppState>, user: AuthUser, ApiPath(id): ApiPath<Uuid>) -> ApiResult<Case> {
    ok(state.cases.complete_case(&user, id).await?)
}

async fn cancel_case(State(state): State<AppState>, user: AuthUser, ApiPath(id): ApiPath<Uuid>) -> ApiResult<Case> {
    ok(state.cases.cancel_case(&user, id).await?)
}

async fn create_review(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<CreateReviewRequest>,
) -> CreatedResult<Review> {
    created(state.reviews.create_review(&user, id, payload).await?)
}
