use crate::auth::AuthUser;
use crate::bidding::{BiddingRules, Eligibility};
use crate::error::{AppError, AppResult};
use crate::models::{Bid, Case, CaseStatus, NewBid, UserRole};
use crate::repositories::{PlacedBid, Repositories, WinnerSelection};
use crate::services::AuditTrailService;
use crate::websocket::WebSocketServer;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone, Deserialize)]
pub struct PlaceBidRequest {
    pub proposed_price: Decimal,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub estimated_days: Option<i32>,
}

/// Points-based bidding on open cases
pub struct BiddingService {
    repos: Repositories,
    rules: BiddingRules,
    ws: WebSocketServer,
    audit: Arc<AuditTrailService>,
}

impl BiddingService {
    pub fn new(repos: Repositories, rules: BiddingRules, ws: WebSocketServer, audit: Arc<AuditTrailService>) -> Self {
        Self { repos, rules, ws, audit }
    }

    async fn load_case(&self, id: Uuid) -> AppResult<Case> {
        self.repos
            .cases
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Case {} not found", id)))
    }

    pub async fn can_bid(&self, user: &AuthUser, case_id: Uuid) -> AppResult<Eligibility> {
        let case = self.load_case(case_id).await?;
        let snapshot = self.repos.bids.snapshot(case_id, user.id).await?;
        Ok(Eligibility::evaluate(&self.rules, &case, &snapshot))
    }

    pub async fn place_bid(&self, user: &AuthUser, case_id: Uuid, request: PlaceBidRequest) -> AppResult<PlacedBid> {
        user.require_provider()?;

        let new_bid = NewBid {
            case_id,
            provider_id: user.id,
            proposed_price: request.proposed_price,
            message: request.message.map(|m| m.trim().to_string()).filter(|m| !m.is_empty()),
            estimated_days: request.estimated_days,
        };
        new_bid.validate().map_err(AppError::Validation)?;

        let placed = self.repos.bids.place_bid(new_bid, &self.rules).await?;
        info!(
            "Bid {} placed on case {} by {} ({} points, {}/{} bidders)",
            placed.bid.id,
            case_id,
            user.id,
            placed.bid.points_spent,
            placed.case.current_bidders,
            placed.case.max_bidders
        );

        self.audit.log_bid_placed(&placed.bid, placed.points_balance).await;
        self.ws
            .broadcast_bid_placed(
                case_id,
                placed.case.customer_id,
                placed.bid.id,
                user.id,
                placed.case.current_bidders,
                placed.case.max_bidders,
                placed.case.bidding_closed,
            )
            .await;

        Ok(placed)
    }

    /// The customer sees every bid; a bidder sees only their own
    pub async fn list_bids(&self, user: &AuthUser, case_id: Uuid) -> AppResult<Vec<Bid>> {
        let case = self.load_case(case_id).await?;
        let bids = self.repos.bids.list_for_case(case_id).await?;

        if case.customer_id == user.id || user.role == UserRole::Admin {
            return Ok(bids);
        }

        let own: Vec<Bid> = bids.into_iter().filter(|b| b.provider_id == user.id).collect();
        if own.is_empty() {
            return Err(AppError::Forbidden("Only the customer and bidders can see bids".to_string()));
        }
        Ok(own)
    }

    pub async fn select_winner(&self, user: &AuthUser, case_id: Uuid, bid_id: Uuid) -> AppResult<WinnerSelection> {
        let case = self.load_case(case_id).await?;
        if case.customer_id != user.id {
            return Err(AppError::Forbidden("Only the customer can pick the winning bid".to_string()));
        }

        let selection = self.repos.bids.select_winner(case_id, bid_id, &self.rules).await?;
        info!(
            "Case {} awarded to {} via bid {}",
            case_id, selection.winner.provider_id, bid_id
        );

        self.audit
            .log_case_status_changed(&selection.case, CaseStatus::Pending.as_str(), Some(user.id))
            .await;
        self.ws
            .broadcast_case_status(
                case_id,
                &selection.case.status,
                selection.case.provider_id,
                &[case.customer_id],
            )
            .await;

        for settlement in &selection.settlements {
            self.audit.log_bid_settled(case_id, settlement).await;
            self.ws
                .broadcast_bid_settled(
                    settlement.provider_id,
                    case_id,
                    settlement.bid_id,
                    settlement.status.as_str(),
                    settlement.refund,
                )
                .await;
        }

        Ok(selection)
    }

    pub async fn my_bids(&self, user: &AuthUser) -> AppResult<Vec<Bid>> {
        user.require_provider()?;
        Ok(self.repos.bids.list_for_provider(user.id).await?)
    }
}
