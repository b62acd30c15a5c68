use crate::auth::AuthUser;
use crate::bidding::BiddingRules;
use crate::error::{AppError, AppResult};
use crate::models::{ProviderProfile, ProviderProfileInput};
use crate::repositories::{ProviderStats, Repositories};
use crate::services::Pagination;
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct ProviderDashboard {
    #[serde(flatten)]
    pub stats: ProviderStats,
    pub points_balance: i64,
    pub rating_avg: Decimal,
    pub review_count: i32,
}

pub struct ProviderService {
    repos: Repositories,
    signup_bonus: i64,
}

impl ProviderService {
    pub fn new(repos: Repositories, rules: &BiddingRules) -> Self {
        Self {
            repos,
            signup_bonus: rules.signup_bonus,
        }
    }

    /// The first save of a profile carries the signup bonus
    pub async fn upsert_profile(&self, user: &AuthUser, input: ProviderProfileInput) -> AppResult<ProviderProfile> {
        user.require_provider()?;
        input.validate().map_err(AppError::Validation)?;
        Ok(self
            .repos
            .providers
            .upsert_profile(user.id, &input, self.signup_bonus)
            .await?)
    }

    pub async fn get_profile(&self, user_id: Uuid) -> AppResult<ProviderProfile> {
        self.repos
            .providers
            .find_profile(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Provider {} not found", user_id)))
    }

    pub async fn search(
        &self,
        category: Option<&str>,
        city: Option<&str>,
        page: Pagination,
    ) -> AppResult<Vec<ProviderProfile>> {
        let category = category.map(str::trim).filter(|c| !c.is_empty());
        let city = city.map(str::trim).filter(|c| !c.is_empty());
        Ok(self
            .repos
            .providers
            .search(category, city, page.limit(), page.offset())
            .await?)
    }

    pub async fn dashboard(&self, user: &AuthUser) -> AppResult<ProviderDashboard> {
        user.require_provider()?;
        let profile = self.get_profile(user.id).await?;
        let stats = self.repos.providers.stats(user.id).await?;

        Ok(ProviderDashboard {
            stats,
            points_balance: profile.points_balance,
            rating_avg: profile.rating_avg,
            review_count: profile.review_count,
        })
    }
}
