use crate::auth::AuthUser;
use crate::error::{AppError, AppResult};
use crate::models::{CaseStatus, NewReview, Review};
use crate::repositories::Repositories;
use crate::services::Pagination;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone, Deserialize)]
pub struct CreateReviewRequest {
    pub rating: i16,
    #[serde(default)]
    pub comment: Option<String>,
}

pub struct ReviewService {
    repos: Repositories,
}

impl ReviewService {
    pub fn new(repos: Repositories) -> Self {
        Self { repos }
    }

    pub async fn create_review(&self, user: &AuthUser, case_id: Uuid, request: CreateReviewRequest) -> AppResult<Review> {
        user.require_customer()?;

        let case = self
            .repos
            .cases
            .find_by_id(case_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Case {} not found", case_id)))?;
        if case.customer_id != user.id {
            return Err(AppError::Forbidden("Only the case's customer can review it".to_string()));
        }
        if case.status_enum() != CaseStatus::Completed {
            return Err(AppError::BusinessLogic("Only completed cases can be reviewed".to_string()));
        }
        let provider_id = case
            .provider_id
            .ok_or_else(|| AppError::BusinessLogic("Case has no assigned provider".to_string()))?;
        if self.repos.reviews.find_by_case(case_id).await?.is_some() {
            return Err(AppError::BusinessLogic("Case already reviewed".to_string()));
        }

        let review = NewReview {
            case_id,
            customer_id: user.id,
            provider_id,
            rating: request.rating,
            comment: request.comment.map(|c| c.trim().to_string()).filter(|c| !c.is_empty()),
        };
        review.validate().map_err(AppError::Validation)?;

        let review = self.repos.reviews.create_review(review).await?;
        info!("Case {} reviewed: {} stars for {}", case_id, review.rating, provider_id);
        Ok(review)
    }

    pub async fn list_reviews(&self, provider_id: Uuid, page: Pagination) -> AppResult<Vec<Review>> {
        Ok(self
            .repos
            .reviews
            .list_for_provider(provider_id, page.limit(), page.offset())
            .await?)
    }
}
