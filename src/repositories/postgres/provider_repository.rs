//! Repository for provider profiles and dashboard counters

use super::{change_points, PROFILE_COLUMNS};
use crate::models::{PointsTransactionType, ProviderProfile, ProviderProfileInput};
use crate::repositories::{ProviderRepository, ProviderStats, RepoResult, SIGNUP_BONUS_DESCRIPTION};
use sqlx::PgPool;
use uuid::Uuid;

pub struct PgProviderRepository {
    pool: PgPool,
}

impl PgProviderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl ProviderRepository for PgProviderRepository {
    async fn upsert_profile(
        &self,
        user_id: Uuid,
        input: &ProviderProfileInput,
        signup_bonus: i64,
    ) -> RepoResult<ProviderProfile> {
        let mut tx = self.pool.begin().await?;

        // xmax is 0 only on the row version this INSERT created
        let inserted: bool = sqlx::query_scalar(
            r#"
            INSERT INTO provider_profiles
                (user_id, business_name, category, city, description, experience_years, hourly_rate)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (user_id) DO UPDATE
            SET business_name = EXCLUDED.business_name,
                category = EXCLUDED.category,
                city = EXCLUDED.city,
                description = EXCLUDED.description,
                experience_years = EXCLUDED.experience_years,
                hourly_rate = EXCLUDED.hourly_rate,
                updated_at = NOW()
            RETURNING (xmax = 0)
            "#,
        )
        .bind(user_id)
        .bind(input.business_name.trim())
        .bind(input.normalized_category())
        .bind(input.city.trim())
        .bind(&input.description)
        .bind(input.experience_years)
        .bind(input.hourly_rate)
        .fetch_one(&mut *tx)
        .await?;

        if inserted && signup_bonus > 0 {
            change_points(
                &mut tx,
                user_id,
                signup_bonus,
                PointsTransactionType::Bonus,
                None,
                None,
                Some(SIGNUP_BONUS_DESCRIPTION.to_string()),
            )
            .await?;
        }

        let profile = sqlx::query_as::<_, ProviderProfile>(&format!(
            "SELECT {} FROM provider_profiles WHERE user_id = $1",
            PROFILE_COLUMNS
        ))
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;

        Ok(profile)
    }

    async fn find_profile(&self, user_id: Uuid) -> RepoResult<Option<ProviderProfile>> {
        let profile = sqlx::query_as::<_, ProviderProfile>(&format!(
            "SELECT {} FROM provider_profiles WHERE user_id = $1",
            PROFILE_COLUMNS
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(profile)
    }

    async fn search(
        &self,
        category: Option<&str>,
        city: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> RepoResult<Vec<ProviderProfile>> {
        let profiles = sqlx::query_as::<_, ProviderProfile>(&format!(
            r#"
            SELECT {}
            FROM provider_profiles
            WHERE ($1::TEXT IS NULL OR category = LOWER($1))
              AND ($2::TEXT IS NULL OR LOWER(city) = LOWER($2))
            ORDER BY rating_avg DESC, completed_cases DESC, business_name ASC
            LIMIT $3 OFFSET $4
            "#,
            PROFILE_COLUMNS
        ))
        .bind(category.map(str::trim))
        .bind(city.map(str::trim))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(profiles)
    }

    async fn stats(&self, provider_id: Uuid) -> RepoResult<ProviderStats> {
        let row: (i64, i64, i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT
                (SELECT COUNT(*) FROM cases c
                  WHERE c.status = 'pending' AND c.customer_id <> $1
                    AND ((c.assignment_type = 'direct' AND c.provider_id = $1)
                      OR (c.assignment_type = 'open' AND NOT c.bidding_closed
                          AND NOT EXISTS (SELECT 1 FROM case_declines d
                                          WHERE d.case_id = c.id AND d.provider_id = $1)))),
                (SELECT COUNT(*) FROM cases WHERE provider_id = $1 AND status = 'accepted'),
                (SELECT COUNT(*) FROM cases WHERE provider_id = $1 AND status = 'completed'),
                (SELECT COUNT(*) FROM bids WHERE provider_id = $1 AND status = 'pending'),
                (SELECT COUNT(*) FROM bids WHERE provider_id = $1 AND status = 'won')
            "#,
        )
        .bind(provider_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(ProviderStats {
            available_cases: row.0,
            active_cases: row.1,
            completed_cases: row.2,
            pending_bids: row.3,
            won_bids: row.4,
        })
    }
}
