//! Repository for bids.
//!
//! Placement and winner selection lock the case row first, so concurrent
//! bidders on one case queue up behind each other.

use super::{apply_settlements, change_points, ensure_status, lock_case, BID_COLUMNS, CASE_COLUMNS};
use crate::bidding::{check_eligibility, plan_winner_settlement, BidderSnapshot, BiddingRules};
use crate::error::RepositoryError;
use crate::models::{Bid, Case, CaseStatus, NewBid, PointsTransactionType};
use crate::repositories::{BidRepository, PlacedBid, RepoResult, WinnerSelection};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

pub struct PgBidRepository {
    pool: PgPool,
}

impl PgBidRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

async fn load_snapshot(
    conn: &mut PgConnection,
    case_id: Uuid,
    provider_id: Uuid,
) -> RepoResult<BidderSnapshot> {
    let balance: Option<i64> =
        sqlx::query_scalar("SELECT points_balance FROM provider_profiles WHERE user_id = $1")
            .bind(provider_id)
            .fetch_optional(&mut *conn)
            .await?;

    let (has_bid, has_declined): (bool, bool) = sqlx::query_as(
        r#"
        SELECT
            EXISTS (SELECT 1 FROM bids WHERE case_id = $1 AND provider_id = $2),
            EXISTS (SELECT 1 FROM case_declines WHERE case_id = $1 AND provider_id = $2)
        "#,
    )
    .bind(case_id)
    .bind(provider_id)
    .fetch_one(&mut *conn)
    .await?;

    Ok(BidderSnapshot {
        provider_id,
        has_profile: balance.is_some(),
        points_balance: balance.unwrap_or(0),
        has_bid,
        has_declined,
    })
}

#[async_trait::async_trait]
impl BidRepository for PgBidRepository {
    async fn place_bid(&self, bid: NewBid, rules: &BiddingRules) -> RepoResult<PlacedBid> {
        let mut tx = self.pool.begin().await?;

        let case = lock_case(&mut tx, bid.case_id).await?;
        let snapshot = load_snapshot(&mut tx, case.id, bid.provider_id).await?;
        let cost = check_eligibility(rules, &case, &snapshot)
            .map_err(|rejection| RepositoryError::BusinessRule(rejection.to_string()))?;

        let bid = bid.into_bid(cost);
        let bid = sqlx::query_as::<_, Bid>(&format!(
            r#"
            INSERT INTO bids ({cols})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING {cols}
            "#,
            cols = BID_COLUMNS
        ))
        .bind(bid.id)
        .bind(bid.case_id)
        .bind(bid.provider_id)
        .bind(bid.proposed_price)
        .bind(&bid.message)
        .bind(bid.estimated_days)
        .bind(bid.points_spent)
        .bind(bid.points_refunded)
        .bind(&bid.status)
        .bind(bid.created_at)
        .bind(bid.settled_at)
        .fetch_one(&mut *tx)
        .await?;

        let charge = change_points(
            &mut tx,
            bid.provider_id,
            -cost,
            PointsTransactionType::BidPlaced,
            Some(case.id),
            Some(bid.id),
            Some(format!("Bid on case: {}", case.title)),
        )
        .await?;

        let case = sqlx::query_as::<_, Case>(&format!(
            r#"
            UPDATE cases
            SET current_bidders = current_bidders + 1,
                bidding_closed = (current_bidders + 1 >= max_bidders),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            CASE_COLUMNS
        ))
        .bind(case.id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(PlacedBid {
            bid,
            case,
            points_balance: charge.balance_after,
        })
    }

    async fn list_for_case(&self, case_id: Uuid) -> RepoResult<Vec<Bid>> {
        let bids = sqlx::query_as::<_, Bid>(&format!(
            "SELECT {} FROM bids WHERE case_id = $1 ORDER BY created_at ASC",
            BID_COLUMNS
        ))
        .bind(case_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(bids)
    }

    async fn list_for_provider(&self, provider_id: Uuid) -> RepoResult<Vec<Bid>> {
        let bids = sqlx::query_as::<_, Bid>(&format!(
            "SELECT {} FROM bids WHERE provider_id = $1 ORDER BY created_at DESC",
            BID_COLUMNS
        ))
        .bind(provider_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(bids)
    }

    async fn snapshot(&self, case_id: Uuid, provider_id: Uuid) -> RepoResult<BidderSnapshot> {
        let mut conn = self.pool.acquire().await?;
        load_snapshot(&mut conn, case_id, provider_id).await
    }

    async fn select_winner(&self, case_id: Uuid, bid_id: Uuid, rules: &BiddingRules) -> RepoResult<WinnerSelection> {
        let mut tx = self.pool.begin().await?;

        let case = lock_case(&mut tx, case_id).await?;
        ensure_status(&case, &[CaseStatus::Pending], CaseStatus::Accepted)?;

        let bids = sqlx::query_as::<_, Bid>(&format!(
            "SELECT {} FROM bids WHERE case_id = $1 ORDER BY created_at FOR UPDATE",
            BID_COLUMNS
        ))
        .bind(case_id)
        .fetch_all(&mut *tx)
        .await?;

        let winner = bids
            .iter()
            .find(|b| b.id == bid_id)
            .ok_or_else(|| RepositoryError::NotFound(format!("Bid {} not found on this case", bid_id)))?;
        if !winner.is_pending() {
            return Err(RepositoryError::BusinessRule("Bid is already settled".to_string()));
        }
        let winner_provider = winner.provider_id;

        let settlements = plan_winner_settlement(rules, &bids, bid_id);
        apply_settlements(&mut tx, case_id, &settlements).await?;

        let case = sqlx::query_as::<_, Case>(&format!(
            r#"
            UPDATE cases
            SET status = 'accepted', provider_id = $2, winning_bid_id = $3,
                bidding_closed = TRUE, updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            CASE_COLUMNS
        ))
        .bind(case_id)
        .bind(winner_provider)
        .bind(bid_id)
        .fetch_one(&mut *tx)
        .await?;

        let winner = sqlx::query_as::<_, Bid>(&format!("SELECT {} FROM bids WHERE id = $1", BID_COLUMNS))
            .bind(bid_id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(WinnerSelection {
            case,
            winner,
            settlements,
        })
    }
}
