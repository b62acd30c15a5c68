//! PostgreSQL storage adapter.
//!
//! Multi-row changes (bids, settlements, refunds, points) run in one
//! transaction that holds `SELECT ... FOR UPDATE` on the case row first and
//! the provider profile second.

pub mod bid_repository;
pub mod case_repository;
pub mod chat_repository;
pub mod points_repository;
pub mod provider_repository;
pub mod review_repository;
pub mod user_repository;

pub use bid_repository::PgBidRepository;
pub use case_repository::PgCaseRepository;
pub use chat_repository::PgChatRepository;
pub use points_repository::PgPointsRepository;
pub use provider_repository::PgProviderRepository;
pub use review_repository::PgReviewRepository;
pub use user_repository::PgUserRepository;

use super::RepoResult;
use crate::bidding::BidSettlement;
use crate::error::RepositoryError;
use crate::models::{Case, CaseStatus, PointsTransaction, PointsTransactionType};
use sqlx::PgConnection;
use uuid::Uuid;

pub(crate) const CASE_COLUMNS: &str = "id, customer_id, provider_id, category, title, description, city, \
     address, budget, priority, assignment_type, status, bidding_enabled, max_bidders, \
     current_bidders, bidding_closed, winning_bid_id, preferred_date, created_at, updated_at, completed_at";

pub(crate) const BID_COLUMNS: &str = "id, case_id, provider_id, proposed_price, message, estimated_days, \
     points_spent, points_refunded, status, created_at, settled_at";

pub(crate) const PROFILE_COLUMNS: &str = "user_id, business_name, category, city, description, \
     experience_years, hourly_rate, points_balance, rating_avg, review_count, completed_cases, updated_at";

pub(crate) const POINTS_COLUMNS: &str = "id, provider_id, case_id, bid_id, transaction_type, amount, \
     balance_before, balance_after, description, created_at";

/// Load a case and hold its row lock until the transaction ends
pub(crate) async fn lock_case(conn: &mut PgConnection, case_id: Uuid) -> RepoResult<Case> {
    sqlx::query_as::<_, Case>(&format!("SELECT {} FROM cases WHERE id = $1 FOR UPDATE", CASE_COLUMNS))
        .bind(case_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| RepositoryError::NotFound(format!("Case {} not found", case_id)))
}

pub(crate) fn ensure_status(case: &Case, from: &[CaseStatus], to: CaseStatus) -> RepoResult<()> {
    let current = case.status_enum();
    if !from.contains(&current) || !current.can_transition_to(to) {
        return Err(RepositoryError::BusinessRule(format!(
            "Cannot move case from {} to {}",
            current.as_str(),
            to.as_str()
        )));
    }
    Ok(())
}

/// Apply a signed points change under the profile row lock and write the ledger row
pub(crate) async fn change_points(
    conn: &mut PgConnection,
    provider_id: Uuid,
    amount: i64,
    tx_type: PointsTransactionType,
    case_id: Option<Uuid>,
    bid_id: Option<Uuid>,
    description: Option<String>,
) -> RepoResult<PointsTransaction> {
    let balance_before: i64 = sqlx::query_scalar(
        "SELECT points_balance FROM provider_profiles WHERE user_id = $1 FOR UPDATE",
    )
    .bind(provider_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| RepositoryError::NotFound("Provider profile not found".to_string()))?;

    let balance_after = balance_before + amount;
    if balance_after < 0 {
        return Err(RepositoryError::BusinessRule(format!(
            "Insufficient points: {} required, {} available",
            -amount, balance_before
        )));
    }

    sqlx::query("UPDATE provider_profiles SET points_balance = $2, updated_at = NOW() WHERE user_id = $1")
        .bind(provider_id)
        .bind(balance_after)
        .execute(&mut *conn)
        .await?;

    let tx = sqlx::query_as::<_, PointsTransaction>(&format!(
        r#"
        INSERT INTO points_transactions
            (provider_id, case_id, bid_id, transaction_type, amount, balance_before, balance_after, description)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING {}
        "#,
        POINTS_COLUMNS
    ))
    .bind(provider_id)
    .bind(case_id)
    .bind(bid_id)
    .bind(tx_type.as_str())
    .bind(amount)
    .bind(balance_before)
    .bind(balance_after)
    .bind(description)
    .fetch_one(&mut *conn)
    .await?;

    Ok(tx)
}

/// Write bid outcomes and pay out refunds
pub(crate) async fn apply_settlements(
    conn: &mut PgConnection,
    case_id: Uuid,
    settlements: &[BidSettlement],
) -> RepoResult<()> {
    for settlement in settlements {
        sqlx::query(
            "UPDATE bids SET status = $2, points_refunded = $3, settled_at = NOW() WHERE id = $1",
        )
        .bind(settlement.bid_id)
        .bind(settlement.status.as_str())
        .bind(settlement.refund)
        .execute(&mut *conn)
        .await?;

        if settlement.refund > 0 {
            change_points(
                conn,
                settlement.provider_id,
                settlement.refund,
                PointsTransactionType::BidRefund,
                Some(case_id),
                Some(settlement.bid_id),
                Some(format!("Refund for bid ({})", settlement.status.as_str())),
            )
            .await?;
        }
    }
    Ok(())
}
