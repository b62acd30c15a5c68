//! Repository for the points wallet

use super::{change_points, POINTS_COLUMNS};
use crate::error::RepositoryError;
use crate::models::{PointsTransaction, PointsTransactionType};
use crate::repositories::{PointsRepository, RepoResult};
use sqlx::PgPool;
use uuid::Uuid;

pub struct PgPointsRepository {
    pool: PgPool,
}

impl PgPointsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl PointsRepository for PgPointsRepository {
    async fn credit(
        &self,
        provider_id: Uuid,
        amount: i64,
        tx_type: PointsTransactionType,
        description: Option<String>,
    ) -> RepoResult<PointsTransaction> {
        if amount <= 0 {
            return Err(RepositoryError::InvalidInput("Credit amount must be positive".to_string()));
        }

        let mut tx = self.pool.begin().await?;
        let record = change_points(&mut tx, provider_id, amount, tx_type, None, None, description).await?;
        tx.commit().await?;

        Ok(record)
    }

    async fn balance(&self, provider_id: Uuid) -> RepoResult<i64> {
        sqlx::query_scalar::<_, i64>("SELECT points_balance FROM provider_profiles WHERE user_id = $1")
            .bind(provider_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| RepositoryError::NotFound("Provider profile not found".to_string()))
    }

    async fn history(&self, provider_id: Uuid, limit: i64) -> RepoResult<Vec<PointsTransaction>> {
        let rows = sqlx::query_as::<_, PointsTransaction>(&format!(
            r#"
            SELECT {}
            FROM points_transactions
            WHERE provider_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
            POINTS_COLUMNS
        ))
        .bind(provider_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}
