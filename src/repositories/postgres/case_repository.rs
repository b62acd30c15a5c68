//! Repository for cases and provider declines

use super::{apply_settlements, ensure_status, lock_case, BID_COLUMNS, CASE_COLUMNS};
use crate::bidding::plan_full_refund;
use crate::error::RepositoryError;
use crate::models::{Bid, Case, CaseFilter, CaseStatus, NewCase};
use crate::repositories::{CancelledCase, CaseRepository, RepoResult};
use chrono::NaiveDateTime;
use sqlx::PgPool;
use uuid::Uuid;

pub struct PgCaseRepository {
    pool: PgPool,
}

impl PgCaseRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Explain why a guarded update touched no row
    async fn update_miss(&self, id: Uuid, to: CaseStatus) -> RepositoryError {
        let current = sqlx::query_scalar::<_, String>("SELECT status FROM cases WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await;

        match current {
            Ok(Some(status)) => RepositoryError::BusinessRule(format!(
                "Cannot move case from {} to {}",
                status,
                to.as_str()
            )),
            Ok(None) => RepositoryError::NotFound(format!("Case {} not found", id)),
            Err(e) => e.into(),
        }
    }
}

#[async_trait::async_trait]
impl CaseRepository for PgCaseRepository {
    async fn create_case(&self, case: NewCase) -> RepoResult<Case> {
        let case = case.into_case();
        let created = sqlx::query_as::<_, Case>(&format!(
            r#"
            INSERT INTO cases ({cols})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20, $21)
            RETURNING {cols}
            "#,
            cols = CASE_COLUMNS
        ))
        .bind(case.id)
        .bind(case.customer_id)
        .bind(case.provider_id)
        .bind(&case.category)
        .bind(&case.title)
        .bind(&case.description)
        .bind(&case.city)
        .bind(&case.address)
        .bind(case.budget)
        .bind(&case.priority)
        .bind(&case.assignment_type)
        .bind(&case.status)
        .bind(case.bidding_enabled)
        .bind(case.max_bidders)
        .bind(case.current_bidders)
        .bind(case.bidding_closed)
        .bind(case.winning_bid_id)
        .bind(case.preferred_date)
        .bind(case.created_at)
        .bind(case.updated_at)
        .bind(case.completed_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }

    async fn find_by_id(&self, id: Uuid) -> RepoResult<Option<Case>> {
        let case = sqlx::query_as::<_, Case>(&format!("SELECT {} FROM cases WHERE id = $1", CASE_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(case)
    }

    async fn list(&self, filter: &CaseFilter) -> RepoResult<Vec<Case>> {
        let cases = sqlx::query_as::<_, Case>(&format!(
            r#"
            SELECT {}
            FROM cases
            WHERE ($1::TEXT IS NULL OR status = $1)
              AND ($2::TEXT IS NULL OR category = LOWER($2))
              AND ($3::TEXT IS NULL OR city = $3)
              AND ($4::UUID IS NULL OR customer_id = $4)
              AND ($5::UUID IS NULL OR provider_id = $5)
            ORDER BY created_at DESC
            LIMIT $6 OFFSET $7
            "#,
            CASE_COLUMNS
        ))
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.category.as_deref())
        .bind(filter.city.as_deref())
        .bind(filter.customer_id)
        .bind(filter.provider_id)
        .bind(filter.limit)
        .bind(filter.offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(cases)
    }

    async fn list_available(&self, provider_id: Uuid, limit: i64, offset: i64) -> RepoResult<Vec<Case>> {
        let cases = sqlx::query_as::<_, Case>(&format!(
            r#"
            SELECT {}
            FROM cases c
            WHERE c.status = 'pending'
              AND c.customer_id <> $1
              AND ((c.assignment_type = 'direct' AND c.provider_id = $1)
                OR (c.assignment_type = 'open' AND NOT c.bidding_closed
                    AND NOT EXISTS (SELECT 1 FROM case_declines d
                                    WHERE d.case_id = c.id AND d.provider_id = $1)))
            ORDER BY c.created_at DESC
            LIMIT $2 OFFSET $3
            "#,
            CASE_COLUMNS
        ))
        .bind(provider_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(cases)
    }

    async fn transition(&self, id: Uuid, from: &[CaseStatus], to: CaseStatus) -> RepoResult<Case> {
        let from: Vec<String> = from
            .iter()
            .filter(|s| s.can_transition_to(to))
            .map(|s| s.as_str().to_string())
            .collect();
        let updated = sqlx::query_as::<_, Case>(&format!(
            r#"
            UPDATE cases
            SET status = $2, updated_at = NOW()
            WHERE id = $1 AND status = ANY($3)
            RETURNING {}
            "#,
            CASE_COLUMNS
        ))
        .bind(id)
        .bind(to.as_str())
        .bind(from)
        .fetch_optional(&self.pool)
        .await?;

        match updated {
            Some(case) => Ok(case),
            None => Err(self.update_miss(id, to).await),
        }
    }

    async fn assign(&self, id: Uuid, provider_id: Uuid) -> RepoResult<Case> {
        let updated = sqlx::query_as::<_, Case>(&format!(
            r#"
            UPDATE cases
            SET status = 'accepted', provider_id = $2, bidding_closed = TRUE, updated_at = NOW()
            WHERE id = $1 AND status = 'pending'
            RETURNING {}
            "#,
            CASE_COLUMNS
        ))
        .bind(id)
        .bind(provider_id)
        .fetch_optional(&self.pool)
        .await?;

        match updated {
            Some(case) => Ok(case),
            None => Err(self.update_miss(id, CaseStatus::Accepted).await),
        }
    }

    async fn complete(&self, id: Uuid) -> RepoResult<Case> {
        let mut tx = self.pool.begin().await?;

        let case = lock_case(&mut tx, id).await?;
        ensure_status(&case, &[CaseStatus::Accepted], CaseStatus::Completed)?;

        let case = sqlx::query_as::<_, Case>(&format!(
            r#"
            UPDATE cases
            SET status = 'completed', completed_at = NOW(), updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            CASE_COLUMNS
        ))
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        if let Some(provider_id) = case.provider_id {
            sqlx::query(
                "UPDATE provider_profiles SET completed_cases = completed_cases + 1, updated_at = NOW() WHERE user_id = $1",
            )
            .bind(provider_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(case)
    }

    async fn cancel(&self, id: Uuid, from: &[CaseStatus]) -> RepoResult<CancelledCase> {
        let mut tx = self.pool.begin().await?;

        let case = lock_case(&mut tx, id).await?;
        ensure_status(&case, from, CaseStatus::Cancelled)?;

        let bids = sqlx::query_as::<_, Bid>(&format!(
            "SELECT {} FROM bids WHERE case_id = $1 ORDER BY created_at FOR UPDATE",
            BID_COLUMNS
        ))
        .bind(id)
        .fetch_all(&mut *tx)
        .await?;

        let refunds = plan_full_refund(&bids);
        apply_settlements(&mut tx, id, &refunds).await?;

        let case = sqlx::query_as::<_, Case>(&format!(
            r#"
            UPDATE cases
            SET status = 'cancelled', bidding_closed = TRUE, updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            CASE_COLUMNS
        ))
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(CancelledCase { case, refunds })
    }

    async fn add_decline(&self, case_id: Uuid, provider_id: Uuid) -> RepoResult<()> {
        sqlx::query(
            "INSERT INTO case_declines (case_id, provider_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(case_id)
        .bind(provider_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn remove_decline(&self, case_id: Uuid, provider_id: Uuid) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM case_declines WHERE case_id = $1 AND provider_id = $2")
            .bind(case_id)
            .bind(provider_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn has_declined(&self, case_id: Uuid, provider_id: Uuid) -> RepoResult<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM case_declines WHERE case_id = $1 AND provider_id = $2)",
        )
        .bind(case_id)
        .bind(provider_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn find_stale(&self, created_before: NaiveDateTime, limit: i64) -> RepoResult<Vec<Case>> {
        let cases = sqlx::query_as::<_, Case>(&format!(
            r#"
            SELECT {}
            FROM cases
            WHERE status = 'pending' AND created_at < $1
            ORDER BY created_at ASC
            LIMIT $2
            "#,
            CASE_COLUMNS
        ))
        .bind(created_before)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(cases)
    }
}
