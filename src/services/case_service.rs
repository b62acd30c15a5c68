use crate::auth::AuthUser;
use crate::bidding::BiddingRules;
use crate::error::{AppError, AppResult};
use crate::models::{AssignmentType, Case, CaseFilter, CasePriority, CaseStatus, NewCase};
use crate::repositories::{CancelledCase, Repositories};
use crate::services::{AuditTrailService, Pagination};
use crate::websocket::WebSocketServer;
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Deserialize)]
pub struct CreateCaseRequest {
    pub category: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub city: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub budget: Option<Decimal>,
    #[serde(default)]
    pub priority: Option<CasePriority>,
    #[serde(default)]
    pub assignment_type: Option<AssignmentType>,
    /// Target provider of a direct case
    #[serde(default)]
    pub provider_id: Option<Uuid>,
    #[serde(default)]
    pub bidding_enabled: Option<bool>,
    #[serde(default)]
    pub preferred_date: Option<NaiveDateTime>,
}

/// Case lifecycle: creation, listing and every status transition
pub struct CaseService {
    repos: Repositories,
    rules: BiddingRules,
    ws: WebSocketServer,
    audit: Arc<AuditTrailService>,
}

impl CaseService {
    pub fn new(repos: Repositories, rules: BiddingRules, ws: WebSocketServer, audit: Arc<AuditTrailService>) -> Self {
        Self { repos, rules, ws, audit }
    }

    async fn load(&self, id: Uuid) -> AppResult<Case> {
        self.repos
            .cases
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Case {} not found", id)))
    }

    /// Audit and push a status change
    async fn announce(&self, case: &Case, from: CaseStatus, actor: Option<Uuid>) {
        info!("Case {} {} -> {}", case.id, from.as_str(), case.status);
        self.audit.log_case_status_changed(case, from.as_str(), actor).await;

        let mut participants = vec![case.customer_id];
        participants.extend(case.provider_id);
        self.ws
            .broadcast_case_status(case.id, &case.status, case.provider_id, &participants)
            .await;
    }

    async fn announce_refunds(&self, cancelled: &CancelledCase) {
        for refund in &cancelled.refunds {
            self.audit.log_bid_settled(cancelled.case.id, refund).await;
            self.ws
                .broadcast_bid_settled(
                    refund.provider_id,
                    cancelled.case.id,
                    refund.bid_id,
                    refund.status.as_str(),
                    refund.refund,
                )
                .await;
        }
    }

    pub async fn create_case(&self, user: &AuthUser, request: CreateCaseRequest) -> AppResult<Case> {
        user.require_customer()?;

        let assignment_type = request.assignment_type.unwrap_or(AssignmentType::Open);
        let bidding_enabled = match assignment_type {
            AssignmentType::Direct => false,
            AssignmentType::Open => request.bidding_enabled.unwrap_or(true),
        };

        let new_case = NewCase {
            customer_id: user.id,
            provider_id: request.provider_id,
            category: request.category,
            title: request.title,
            description: request.description,
            city: request.city,
            address: request.address,
            budget: request.budget,
            priority: request.priority.unwrap_or(CasePriority::Normal),
            assignment_type,
            bidding_enabled,
            max_bidders: self.rules.max_bidders,
            preferred_date: request.preferred_date,
        };
        new_case.validate().map_err(AppError::Validation)?;

        if let Some(provider_id) = new_case.provider_id {
            if provider_id == user.id {
                return Err(AppError::Validation("You cannot assign a case to yourself".to_string()));
            }
            self.repos
                .providers
                .find_profile(provider_id)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("Provider {} not found", provider_id)))?;
        }

        let case = self.repos.cases.create_case(new_case).await?;
        info!(
            "Case {} created by {} ({}, {})",
            case.id, user.id, case.category, case.assignment_type
        );

        if let Some(provider_id) = case.provider_id {
            self.ws
                .broadcast_case_status(case.id, &case.status, Some(provider_id), &[provider_id])
                .await;
        }

        Ok(case)
    }

    pub async fn get_case(&self, id: Uuid) -> AppResult<Case> {
        self.load(id).await
    }

    pub async fn list_cases(&self, mut filter: CaseFilter, page: Pagination) -> AppResult<Vec<Case>> {
        filter.limit = page.limit();
        filter.offset = page.offset();
        Ok(self.repos.cases.list(&filter).await?)
    }

    pub async fn available_cases(&self, user: &AuthUser, page: Pagination) -> AppResult<Vec<Case>> {
        user.require_provider()?;
        Ok(self
            .repos
            .cases
            .list_available(user.id, page.limit(), page.offset())
            .await?)
    }

    pub async fn accept_case(&self, user: &AuthUser, id: Uuid) -> AppResult<Case> {
        user.require_provider()?;
        let case = self.load(id).await?;

        match case.assignment_enum() {
            AssignmentType::Direct if case.provider_id != Some(user.id) => {
                return Err(AppError::Forbidden("This case is addressed to another provider".to_string()));
            }
            AssignmentType::Open if case.bidding_enabled => {
                return Err(AppError::BusinessLogic(
                    "This case takes bids; place a bid instead".to_string(),
                ));
            }
            AssignmentType::Open => {
                if case.customer_id == user.id {
                    return Err(AppError::Forbidden("You cannot accept your own case".to_string()));
                }
                if self.repos.cases.has_declined(id, user.id).await? {
                    return Err(AppError::BusinessLogic("You have declined this case".to_string()));
                }
                self.repos
                    .providers
                    .find_profile(user.id)
                    .await?
                    .ok_or_else(|| AppError::Forbidden("Create a provider profile first".to_string()))?;
            }
            AssignmentType::Direct => {}
        }

        let accepted = self.repos.cases.assign(id, user.id).await?;
        self.announce(&accepted, case.status_enum(), Some(user.id)).await;
        Ok(accepted)
    }

    pub async fn decline_case(&self, user: &AuthUser, id: Uuid) -> AppResult<Case> {
        user.require_provider()?;
        let case = self.load(id).await?;

        match case.assignment_enum() {
            AssignmentType::Direct => {
                if case.provider_id != Some(user.id) {
                    return Err(AppError::Forbidden("This case is addressed to another provider".to_string()));
                }
                let declined = self
                    .repos
                    .cases
                    .transition(id, &[CaseStatus::Pending], CaseStatus::Declined)
                    .await?;
                self.announce(&declined, CaseStatus::Pending, Some(user.id)).await;
                Ok(declined)
            }
            AssignmentType::Open => {
                if !case.is_pending() {
                    return Err(AppError::BusinessLogic("Case is no longer pending".to_string()));
                }
                self.repos.cases.add_decline(id, user.id).await?;
                info!("Provider {} hid case {}", user.id, id);
                Ok(case)
            }
        }
    }

    pub async fn undecline_case(&self, user: &AuthUser, id: Uuid) -> AppResult<Case> {
        user.require_provider()?;
        let case = self.load(id).await?;

        match case.assignment_enum() {
            AssignmentType::Direct => {
                if case.provider_id != Some(user.id) {
                    return Err(AppError::Forbidden("This case is addressed to another provider".to_string()));
                }
                let restored = self
                    .repos
                    .cases
                    .transition(id, &[CaseStatus::Declined], CaseStatus::Pending)
                    .await?;
                self.announce(&restored, CaseStatus::Declined, Some(user.id)).await;
                Ok(restored)
            }
            AssignmentType::Open => {
                if !self.repos.cases.remove_decline(id, user.id).await? {
                    warn!("Provider {} undeclined case {} without a decline", user.id, id);
                }
                Ok(case)
            }
        }
    }

    pub async fn complete_case(&self, user: &AuthUser, id: Uuid) -> AppResult<Case> {
        let case = self.load(id).await?;
        if !case.is_participant(user.id) {
            return Err(AppError::Forbidden("Only the customer or the assigned provider can complete a case".to_string()));
        }

        let completed = self.repos.cases.complete(id).await?;
        self.announce(&completed, case.status_enum(), Some(user.id)).await;
        Ok(completed)
    }

    pub async fn cancel_case(&self, user: &AuthUser, id: Uuid) -> AppResult<Case> {
        let case = self.load(id).await?;
        if case.customer_id != user.id {
            return Err(AppError::Forbidden("Only the customer can cancel this case".to_string()));
        }

        let cancelled = self
            .repos
            .cases
            .cancel(id, &[CaseStatus::Pending, CaseStatus::Accepted])
            .await?;
        info!(
            "Case {} cancelled, {} bids refunded",
            id,
            cancelled.refunds.len()
        );
        self.announce(&cancelled.case, case.status_enum(), Some(user.id)).await;
        self.announce_refunds(&cancelled).await;
        Ok(cancelled.case)
    }

    /// Cancel pending cases created before the cutoff; returns how many were expired
    pub async fn expire_stale(&self, created_before: NaiveDateTime, batch: i64) -> AppResult<usize> {
        let stale = self.repos.cases.find_stale(created_before, batch).await?;
        let mut expired = 0;

        for case in stale {
            match self.repos.cases.cancel(case.id, &[CaseStatus::Pending]).await {
                Ok(cancelled) => {
                    self.announce(&cancelled.case, CaseStatus::Pending, None).await;
                    self.announce_refunds(&cancelled).await;
                    expired += 1;
                }
                // Someone moved it since the scan
                Err(crate::error::RepositoryError::BusinessRule(reason)) => {
                    warn!("Skipping expiry of case {}: {}", case.id, reason);
                }
                Err(e) => return Err(e.into()),
            }
        }

        Ok(expired)
    }
}
