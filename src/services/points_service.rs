use crate::auth::AuthUser;
use crate::error::{AppError, AppResult};
use crate::models::{PointsPackage, PointsTransaction, PointsTransactionType};
use crate::repositories::Repositories;
use tracing::info;
use uuid::Uuid;

/// Provider points wallet
pub struct PointsService {
    repos: Repositories,
}

impl PointsService {
    pub fn new(repos: Repositories) -> Self {
        Self { repos }
    }

    pub async fn balance(&self, user: &AuthUser) -> AppResult<i64> {
        user.require_provider()?;
        Ok(self.repos.points.balance(user.id).await?)
    }

    pub async fn history(&self, user: &AuthUser, limit: i64) -> AppResult<Vec<PointsTransaction>> {
        user.require_provider()?;
        Ok(self.repos.points.history(user.id, limit.clamp(1, 200)).await?)
    }

    /// Payment capture happens before this call
    pub async fn purchase(&self, user: &AuthUser, package: PointsPackage) -> AppResult<PointsTransaction> {
        user.require_provider()?;

        let tx = self
            .repos
            .points
            .credit(
                user.id,
                package.points(),
                PointsTransactionType::Purchase,
                Some(format!("Purchased {} package", package.as_str())),
            )
            .await?;

        info!("Provider {} bought {} points", user.id, package.points());
        Ok(tx)
    }

    pub async fn grant(
        &self,
        admin: &AuthUser,
        provider_id: Uuid,
        amount: i64,
        reason: Option<String>,
    ) -> AppResult<PointsTransaction> {
        admin.require_admin()?;
        if amount <= 0 {
            return Err(AppError::Validation("Amount must be greater than zero".to_string()));
        }

        let description = reason
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| "Bonus points".to_string());
        let tx = self
            .repos
            .points
            .credit(provider_id, amount, PointsTransactionType::Bonus, Some(description))
            .await?;

        info!("Admin {} granted {} points to {}", admin.id, amount, provider_id);
        Ok(tx)
    }
}
