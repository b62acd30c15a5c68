//! Repository for reviews

use crate::models::{NewReview, Review};
use crate::repositories::{RepoResult, ReviewRepository};
use sqlx::PgPool;
use uuid::Uuid;

const REVIEW_COLUMNS: &str = "id, case_id, customer_id, provider_id, rating, comment, created_at";

pub struct PgReviewRepository {
    pool: PgPool,
}

impl PgReviewRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl ReviewRepository for PgReviewRepository {
    async fn create_review(&self, review: NewReview) -> RepoResult<Review> {
        let review = review.into_review();
        let mut tx = self.pool.begin().await?;

        let stored = sqlx::query_as::<_, Review>(&format!(
            r#"
            INSERT INTO reviews ({cols})
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {cols}
            "#,
            cols = REVIEW_COLUMNS
        ))
        .bind(review.id)
        .bind(review.case_id)
        .bind(review.customer_id)
        .bind(review.provider_id)
        .bind(review.rating)
        .bind(&review.comment)
        .bind(review.created_at)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            UPDATE provider_profiles p
            SET review_count = s.review_count,
                rating_avg = s.rating_avg,
                updated_at = NOW()
            FROM (
                SELECT COUNT(*)::INTEGER AS review_count,
                       ROUND(AVG(rating)::NUMERIC, 2) AS rating_avg
                FROM reviews
                WHERE provider_id = $1
            ) s
            WHERE p.user_id = $1
            "#,
        )
        .bind(stored.provider_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(stored)
    }

    async fn find_by_case(&self, case_id: Uuid) -> RepoResult<Option<Review>> {
        let review = sqlx::query_as::<_, Review>(&format!(
            "SELECT {} FROM reviews WHERE case_id = $1",
            REVIEW_COLUMNS
        ))
        .bind(case_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(review)
    }

    async fn list_for_provider(&self, provider_id: Uuid, limit: i64, offset: i64) -> RepoResult<Vec<Review>> {
        let reviews = sqlx::query_as::<_, Review>(&format!(
            r#"
            SELECT {}
            FROM reviews
            WHERE provider_id = $1
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
            REVIEW_COLUMNS
        ))
        .bind(provider_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(reviews)
    }
}
